//! `reqwest` clients for the services around the pipeline.

use jurisnorm_core::{
    AnnotationService, CanonicalDecision, ClassificationCode, ClassificationLookup, DecisionPatch,
    DecisionStore, NerRequest, NerResponse, NormalizationError, SourceName, Zoning,
    ZoningRequest, ZoningService,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ClientError;

const API_KEY_HEADER: &str = "x-api-key";

/// Base URL, optional API key and a shared connection pool.
#[derive(Debug, Clone)]
struct ServiceClient {
    service: &'static str,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ServiceClient {
    fn new(service: &'static str, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            service,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::Server {
            service: self.service,
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let resp = self.check(req.send().await?).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

// ── Annotation service ──

/// Client for the pseudonymisation service's `POST /ner`.
#[derive(Debug, Clone)]
pub struct NerClient {
    inner: ServiceClient,
}

impl NerClient {
    /// `base_url` like `http://localhost:8081` (a trailing slash is ignored).
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: ServiceClient::new("annotation service", base_url, None),
        }
    }
}

#[async_trait::async_trait]
impl AnnotationService for NerClient {
    async fn ner(&self, request: &NerRequest) -> jurisnorm_core::Result<NerResponse> {
        debug!(source_id = %request.source_id, categories = request.categories.len(), "calling NER");
        let req = self.inner.request(Method::POST, "/ner").json(request);
        let response: NerResponse = self.inner.send_json(req).await?;
        info!(entities = response.entities.len(), "NER returned");
        Ok(response)
    }
}

// ── Zoning service ──

#[derive(Debug, Clone)]
pub struct ZoningClient {
    inner: ServiceClient,
}

impl ZoningClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: ServiceClient::new("zoning service", base_url, None),
        }
    }
}

#[async_trait::async_trait]
impl ZoningService for ZoningClient {
    async fn zone(&self, request: &ZoningRequest) -> jurisnorm_core::Result<Zoning> {
        let req = self.inner.request(Method::POST, "/zonage").json(request);
        Ok(self.inner.send_json(req).await?)
    }
}

// ── Decision store ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionPage {
    #[serde(default)]
    decisions: Vec<CanonicalDecision>,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Serialize)]
struct PutBody<'a> {
    decision: &'a CanonicalDecision,
}

#[derive(Deserialize)]
struct PutResponse {
    #[serde(rename = "_id", default)]
    id: Option<String>,
}

/// Client for the decision store API, which also serves classification codes.
#[derive(Debug, Clone)]
pub struct DecisionApiClient {
    inner: ServiceClient,
}

impl DecisionApiClient {
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            inner: ServiceClient::new("decision store", base_url, Some(api_key)),
        }
    }
}

#[async_trait::async_trait]
impl DecisionStore for DecisionApiClient {
    async fn find(
        &self,
        source_name: SourceName,
        source_id: &str,
    ) -> jurisnorm_core::Result<Option<CanonicalDecision>> {
        let req = self
            .inner
            .request(Method::GET, "/decisions")
            .query(&[("sourceName", source_name.as_str()), ("sourceId", source_id)]);
        let page: DecisionPage = self.inner.send_json(req).await?;
        if page.next_page.is_some() {
            debug!(source_id, "decision store returned more than one page");
        }
        Ok(page.decisions.into_iter().next())
    }

    async fn put(&self, decision: &CanonicalDecision) -> jurisnorm_core::Result<String> {
        let req = self
            .inner
            .request(Method::PUT, "/decisions")
            .json(&PutBody { decision });
        let resp: PutResponse = self.inner.send_json(req).await?;
        resp.id
            .or_else(|| decision.id.clone())
            .ok_or_else(|| NormalizationError::unexpected("decision store returned no id"))
    }

    async fn patch(&self, id: &str, patch: &DecisionPatch) -> jurisnorm_core::Result<()> {
        let req = self
            .inner
            .request(Method::PATCH, &format!("/decisions/{id}"))
            .json(patch);
        self.inner.check(req.send().await.map_err(ClientError::from)?).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClassificationLookup for DecisionApiClient {
    async fn find(&self, code: &str) -> jurisnorm_core::Result<Option<ClassificationCode>> {
        let req = self.inner.request(Method::GET, &format!("/codenacs/{code}"));
        let resp = req.send().await.map_err(ClientError::from)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = self.inner.check(resp).await?;
        let bytes = resp.bytes().await.map_err(ClientError::from)?;
        Ok(serde_json::from_slice(&bytes).map_err(ClientError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = DecisionApiClient::new("http://localhost:3008/", "k".into());
        assert_eq!(client.inner.base_url, "http://localhost:3008");
    }

    #[test]
    fn decision_store_requests_carry_api_key() {
        let client = DecisionApiClient::new("http://localhost:3008", "secret".into());
        let req = client
            .inner
            .request(Method::GET, "/decisions")
            .query(&[("sourceName", "juritj"), ("sourceId", "42")])
            .build()
            .unwrap();
        assert_eq!(req.headers()[API_KEY_HEADER], "secret");
        assert_eq!(
            req.url().as_str(),
            "http://localhost:3008/decisions?sourceName=juritj&sourceId=42"
        );
    }

    #[test]
    fn ner_requests_have_no_api_key() {
        let client = NerClient::new("http://nlp:8081");
        let req = client.inner.request(Method::POST, "/ner").build().unwrap();
        assert!(req.headers().get(API_KEY_HEADER).is_none());
        assert_eq!(req.url().path(), "/ner");
    }

    #[test]
    fn put_body_wraps_decision() {
        let decision = CanonicalDecision::new(SourceName::Juritcom, "7", "texte");
        let json = serde_json::to_value(PutBody {
            decision: &decision,
        })
        .unwrap();
        assert_eq!(json["decision"]["sourceId"], "7");
    }

    #[test]
    fn decision_page_tolerates_missing_fields() {
        let page: DecisionPage = serde_json::from_str(r#"{"totalDecisions": 0}"#).unwrap();
        assert!(page.decisions.is_empty());
        assert!(page.next_page.is_none());
    }
}
