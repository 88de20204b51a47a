//! Process wiring and singleton lifecycle
//!
//! The provider, embedder, vector store, and relational pool are built once
//! here and passed down; nothing reaches for ambient globals. The entry
//! point owns the `AppState` and drops it at shutdown.

use crate::health::HealthService;
use crate::mission::MissionService;
use crate::query::{QueryService, ReportService};
use intelscout_agents::{MissionExecutor, Toolset};
use intelscout_config::IntelScoutConfig;
use intelscout_core::Result;
use intelscout_providers::{ProviderInstance, ProviderManager};
use intelscout_rag::{
    embedding_from_config, ChunkingConfig, EmbeddingModel, IngestionPipeline, RagQueryService,
    VectorStore,
};
use intelscout_storage::RelationalLog;
use intelscout_tools::{
    ActionDispatcher, ActionsSetup, ScraperConfig, WebScraperTool, WebSearchConfig, WebSearchTool,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything the transport layer needs, built once per process.
pub struct AppState {
    pub missions: MissionService,
    pub queries: QueryService,
    pub reports: ReportService,
    pub health: HealthService,
    pub log: RelationalLog,
    pub store: Arc<VectorStore>,
}

impl AppState {
    /// Initialize from configuration: select the provider (running model
    /// discovery where the provider needs it), open both stores, and wire
    /// the tools and services.
    pub async fn init(config: IntelScoutConfig) -> Result<Self> {
        config.validate()?;

        let provider = ProviderManager::from_config(&config.provider).await?.active();
        let embedder = embedding_from_config(&config.embedding)?;
        let log = RelationalLog::open(&config.storage.database_url, config.storage.pool_size)?;
        let store = Arc::new(
            VectorStore::open(Path::new(&config.storage.vector_dir), embedder.dimensions())
                .await?,
        );

        let ingestion = IngestionPipeline::new(
            ChunkingConfig::default(),
            Arc::clone(&embedder),
            Arc::clone(&store),
        );

        let search = Arc::new(WebSearchTool::new(WebSearchConfig::from(&config.tools))?);
        let scraper = Arc::new(
            WebScraperTool::new(ScraperConfig::from(&config.tools))
                .with_ingestion(Arc::new(ingestion.clone())),
        );
        let actions = Arc::new(ActionDispatcher::new(ActionsSetup::from_config(
            &config.actions,
        )));
        let toolset = Toolset::new(search, scraper, actions);

        Ok(Self::assemble(provider, embedder, toolset, log, store, ingestion))
    }

    /// Wire services from pre-built components; the seam tests and
    /// embedders use to avoid network-touching constructors.
    pub fn with_components(
        provider: Arc<dyn ProviderInstance>,
        embedder: Arc<dyn EmbeddingModel>,
        toolset: Toolset,
        log: RelationalLog,
        store: Arc<VectorStore>,
    ) -> Self {
        let ingestion = IngestionPipeline::new(
            ChunkingConfig::default(),
            Arc::clone(&embedder),
            Arc::clone(&store),
        );
        Self::assemble(provider, embedder, toolset, log, store, ingestion)
    }

    fn assemble(
        provider: Arc<dyn ProviderInstance>,
        embedder: Arc<dyn EmbeddingModel>,
        toolset: Toolset,
        log: RelationalLog,
        store: Arc<VectorStore>,
        ingestion: IngestionPipeline,
    ) -> Self {
        let executor = Arc::new(MissionExecutor::new(
            Arc::clone(&provider),
            toolset,
            log.clone(),
            ingestion,
        ));
        let rag = Arc::new(RagQueryService::new(
            embedder,
            Arc::clone(&store),
            provider,
        ));

        Self {
            missions: MissionService::new(executor),
            queries: QueryService::new(rag, log.clone()),
            reports: ReportService::new(log.clone()),
            health: HealthService::new(log.clone(), Arc::clone(&store)),
            log,
            store,
        }
    }

    /// Explicit shutdown: background ingestion tasks are abandoned (their
    /// writes are idempotent), the pool and store close on drop.
    pub async fn shutdown(self) {
        info!("intelscout shutting down");
        drop(self);
    }
}
