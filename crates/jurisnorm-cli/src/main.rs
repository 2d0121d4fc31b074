use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use jurisnorm_annotate::AnnotationOrchestrator;
use jurisnorm_client::{DecisionApiClient, NerClient, StaticZoningService, ZoningClient};
use jurisnorm_core::rules::parse_day;
use jurisnorm_core::{
    LabelRules, NormalizationError, Query, SourceName, ZoningService, select,
};
use jurisnorm_runner::{
    BatchDriver, Buckets, Normalizer, PayloadAdapter, PipelineConfig, Reconciler, RetryPolicy,
};
use jurisnorm_store::{DuckRawStore, EventLog, FsObjectStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod display;

#[derive(Parser, Debug)]
#[command(name = "jurisnorm", version)]
#[command(about = "Normalize judicial decisions and reconcile them with the decision store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every eligible raw record
    Normalize {
        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Reprocess records received during the last 24 hours
    Yesterday,
    /// Reprocess the given raw record ids, whatever their history
    Ids {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Mark older receptions of the same source id as deleted
    MarkDuplicates,
}

#[derive(clap::Args, Debug)]
struct Settings {
    /// Source system of the raw records (jurinet, jurica, juritj, juritcom, portalis-cph)
    #[arg(long, env = "JURISNORM_SOURCE", global = true)]
    source: Option<String>,

    /// DuckDB file holding raw records and their events
    #[arg(long, env = "JURISNORM_RAW_STORE", global = true)]
    raw_store: Option<PathBuf>,

    /// Root directory of the object buckets
    #[arg(long, env = "JURISNORM_OBJECT_ROOT", global = true)]
    object_root: Option<PathBuf>,

    #[arg(long, env = "JURISNORM_RAW_BUCKET", default_value = "raw", global = true)]
    raw_bucket: String,

    #[arg(long, env = "JURISNORM_NORMALIZED_BUCKET", default_value = "normalized", global = true)]
    normalized_bucket: String,

    #[arg(long, env = "JURISNORM_FAILED_BUCKET", default_value = "failed", global = true)]
    failed_bucket: String,

    #[arg(long, env = "JURISNORM_DECISION_STORE_URL", global = true)]
    decision_store_url: Option<String>,

    #[arg(long, env = "JURISNORM_DECISION_STORE_API_KEY", global = true, hide_env_values = true)]
    decision_store_api_key: Option<String>,

    #[arg(long, env = "JURISNORM_ANNOTATION_URL", global = true)]
    annotation_url: Option<String>,

    /// Required for zoned sources only
    #[arg(long, env = "JURISNORM_ZONING_URL", global = true)]
    zoning_url: Option<String>,

    /// Decisions dated before this day (YYYY-MM-DD) are ignored
    #[arg(long, env = "JURISNORM_COMMISSIONING_DATE", global = true)]
    commissioning_date: Option<String>,

    /// End-case codes whose decisions are never published
    #[arg(long, env = "JURISNORM_BLOCKED_END_CASE_CODES", value_delimiter = ',', global = true)]
    blocked_end_case_codes: Vec<String>,

    #[arg(long, env = "JURISNORM_MAX_POSTPONED", default_value_t = 3, global = true)]
    max_postponed: u32,

    #[arg(long, env = "JURISNORM_POSTPONE_DELAY_SECS", default_value_t = 20, global = true)]
    postpone_delay_secs: u64,

    #[arg(long, env = "JURISNORM_FAILURE_DELAY_SECS", default_value_t = 10, global = true)]
    failure_delay_secs: u64,

    /// Raw records loaded per selection page
    #[arg(long, env = "JURISNORM_PAGE_SIZE", default_value_t = 100, global = true)]
    page_size: usize,
}

fn required<'a, T: ?Sized>(value: Option<&'a T>, name: &str) -> Result<&'a T, NormalizationError> {
    value.ok_or_else(|| NormalizationError::MissingConfiguration(name.to_string()))
}

impl Settings {
    fn source_name(&self) -> Result<SourceName, NormalizationError> {
        let source = required(self.source.as_deref(), "JURISNORM_SOURCE")?;
        SourceName::parse(source).ok_or_else(|| {
            NormalizationError::MissingConfiguration(format!("unknown source {source:?}"))
        })
    }

    fn raw_store(&self) -> Result<&Path, NormalizationError> {
        required(self.raw_store.as_deref(), "JURISNORM_RAW_STORE")
    }

    fn pipeline_config(&self, source_name: SourceName) -> Result<PipelineConfig, NormalizationError> {
        let commissioning_date = match self.commissioning_date.as_deref() {
            Some(day) => Some(parse_day(day).ok_or_else(|| {
                NormalizationError::MissingConfiguration(format!(
                    "JURISNORM_COMMISSIONING_DATE is not a date: {day:?}"
                ))
            })?),
            None => None,
        };
        Ok(PipelineConfig {
            source_name,
            buckets: Buckets {
                raw: self.raw_bucket.clone(),
                normalized: self.normalized_bucket.clone(),
                failed: self.failed_bucket.clone(),
            },
            label_rules: LabelRules {
                commissioning_date,
                blocked_end_case_codes: self.blocked_end_case_codes.clone(),
            },
            retry: RetryPolicy {
                max_postponed: self.max_postponed,
                postpone_delay: Duration::from_secs(self.postpone_delay_secs),
                failure_delay: Duration::from_secs(self.failure_delay_secs),
            },
            page_size: self.page_size.max(1),
        })
    }
}

fn open_events(settings: &Settings) -> anyhow::Result<EventLog> {
    let path = settings.raw_store()?;
    let store = DuckRawStore::open_persistent(path)
        .with_context(|| format!("opening raw store {}", path.display()))?;
    Ok(EventLog::new(Arc::new(store)))
}

fn build_driver(settings: &Settings) -> anyhow::Result<BatchDriver> {
    let source_name = settings.source_name()?;
    let config = settings.pipeline_config(source_name)?;
    let object_root = required(settings.object_root.as_deref(), "JURISNORM_OBJECT_ROOT")?;
    let store_url = required(settings.decision_store_url.as_deref(), "JURISNORM_DECISION_STORE_URL")?;
    let api_key = required(
        settings.decision_store_api_key.as_deref(),
        "JURISNORM_DECISION_STORE_API_KEY",
    )?;
    let annotation_url = required(settings.annotation_url.as_deref(), "JURISNORM_ANNOTATION_URL")?;

    let zoning: Arc<dyn ZoningService> = if source_name.supports_zoning() {
        let url = required(settings.zoning_url.as_deref(), "JURISNORM_ZONING_URL")?;
        Arc::new(ZoningClient::new(url))
    } else {
        Arc::new(StaticZoningService::unavailable())
    };

    let objects = Arc::new(FsObjectStore::new(object_root));
    let decisions = Arc::new(DecisionApiClient::new(store_url, api_key.to_string()));
    let normalizer = Normalizer::new(
        Arc::new(PayloadAdapter::for_source(
            source_name,
            objects.clone(),
            config.buckets.raw.clone(),
        )),
        zoning,
        decisions.clone(),
        config.label_rules.clone(),
    );
    let reconciler = Reconciler::new(
        decisions,
        AnnotationOrchestrator::new(Arc::new(NerClient::new(annotation_url))),
    );

    Ok(BatchDriver::new(
        config,
        open_events(settings)?,
        objects,
        normalizer,
        reconciler,
    ))
}

async fn normalize(settings: &Settings, selection: &str, query: Query) -> anyhow::Result<()> {
    let mut driver = build_driver(settings)?;
    let source = settings.source_name()?;
    let start = Instant::now();
    let summary = driver.run(query).await;
    print!(
        "{}",
        display::run_card(source.as_str(), selection, &summary, start.elapsed())
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "jurisnorm starting");

    match cli.command {
        Command::Normalize { limit } => {
            normalize(&cli.settings, "eligible", select(None, limit)).await
        }
        Command::Yesterday => {
            let query = Query::last_day(chrono::Utc::now());
            normalize(&cli.settings, "last 24 hours", select(Some(query), None)).await
        }
        Command::Ids { ids } => {
            let selection = format!("{} explicit ids", ids.len());
            normalize(&cli.settings, &selection, select(Some(Query::ids(ids)), None)).await
        }
        Command::MarkDuplicates => {
            let events = open_events(&cli.settings)?;
            let summary = events
                .mark_duplicates()
                .await
                .context("marking duplicate receptions")?;
            print!("{}", display::duplicates_card(&summary));
            Ok(())
        }
    }
}
