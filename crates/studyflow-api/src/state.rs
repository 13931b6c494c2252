//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! `SessionService` is generic over the checkpoint repository; AppState pins
//! it to the SQLite implementation.

use std::path::PathBuf;
use std::sync::Arc;

use studyflow_core::event::EventBus;
use studyflow_core::llm::box_provider::BoxLlmProvider;
use studyflow_core::llm::provider::LlmProvider;
use studyflow_core::retrieval::box_retriever::BoxRetriever;
use studyflow_core::service::session::SessionService;
use studyflow_core::workflow::engine::SessionEngine;
use studyflow_core::workflow::step_runner::{EngineSettings, StepRunner};
use studyflow_infra::config::{corpus_dir, load_config, resolve_data_dir};
use studyflow_infra::llm::create_provider;
use studyflow_infra::retrieval::CorpusRetriever;
use studyflow_infra::sqlite::checkpoint::SqliteCheckpointRepository;
use studyflow_infra::sqlite::pool::{DatabasePool, database_url};
use studyflow_types::config::StudyFlowConfig;
use studyflow_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Concrete type alias for the service pinned to the SQLite repository.
pub type ConcreteSessionService = SessionService<SqliteCheckpointRepository>;

/// Shared application state.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: ConcreteSessionService,
    pub events: EventBus,
    pub config: Arc<StudyFlowConfig>,
    pub data_dir: PathBuf,
    /// False when no API key was found; model-backed commands refuse to run.
    pub model_ready: bool,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, index
    /// the corpus and wire the engine.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;

        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;
        let repo = SqliteCheckpointRepository::new(db_pool);

        let (llm, model_ready) = match create_provider(&config.model, config.model.api_key.as_deref()) {
            Ok(provider) => (provider, true),
            Err(LlmError::AuthenticationFailed) => {
                tracing::warn!("no API key configured, model-backed steps will fail");
                (BoxLlmProvider::new(UnconfiguredProvider), false)
            }
            Err(e) => return Err(e.into()),
        };

        let corpus = corpus_dir(&config, &data_dir);
        let retriever = match CorpusRetriever::open(&corpus, config.retrieval.chunk_chars).await {
            Ok(retriever) => retriever,
            Err(e) => {
                tracing::warn!(corpus = %corpus.display(), error = %e, "corpus indexing failed, retrieval disabled");
                CorpusRetriever::empty(&corpus)
            }
        };

        let runner = StepRunner::new(
            llm,
            BoxRetriever::new(retriever),
            EngineSettings::from(&config),
        );
        let events = EventBus::new(config.engine.event_capacity);
        let engine = SessionEngine::new(repo, runner, events.clone())?;

        Ok(Self {
            sessions: SessionService::new(Arc::new(engine)),
            events,
            config: Arc::new(config),
            data_dir,
            model_ready,
        })
    }

    /// Fail with a setup hint when no model provider is available.
    pub fn require_model(&self) -> anyhow::Result<()> {
        if self.model_ready {
            Ok(())
        } else {
            anyhow::bail!(
                "no API key configured: set ANTHROPIC_API_KEY or [model].api_key in {}",
                self.data_dir.join("config.toml").display()
            )
        }
    }
}

/// Stand-in provider used when no API key is configured. Every call fails
/// with [`LlmError::AuthenticationFailed`].
struct UnconfiguredProvider;

impl LlmProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::AuthenticationFailed)
    }
}
