//! Clients for the services around the normalization pipeline.

mod error;
pub mod http;
pub mod memory;

pub use error::ClientError;
pub use http::{DecisionApiClient, NerClient, ZoningClient};
pub use memory::{
    MemoryClassificationLookup, MemoryDecisionStore, StaticAnnotationService, StaticZoningService,
};
