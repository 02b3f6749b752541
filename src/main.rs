use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use knowledge_seeker::augmenter::TaskResearchAugmenter;
use knowledge_seeker::cache::ResponseCache;
use knowledge_seeker::detector::ResearchDetector;
use knowledge_seeker::domain::{
    KnowledgeQuery, Priority, QueryMetadata, QueryType, Task,
};
use knowledge_seeker::processor::InformationProcessor;
use knowledge_seeker::provenance::ProvenanceLog;
use knowledge_seeker::providers::build_registry;
use knowledge_seeker::seeker::KnowledgeSeeker;
use knowledge_seeker::Config;

#[derive(Parser)]
#[command(name = "knowledge_seeker")]
#[command(about = "Multi-provider search orchestration for autonomous agent task research")]
struct Cli {
    /// Path to a TOML configuration file; defaults to the platform config
    /// directory if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single search query and print the response as JSON
    Search {
        /// The query text
        query: String,
        /// Maximum number of results to return
        #[arg(long, default_value_t = 10)]
        max_results: usize,
        /// Minimum relevance threshold (0.0-1.0)
        #[arg(long, default_value_t = 0.3)]
        relevance_threshold: f64,
    },
    /// Decide whether a task needs research, run it, and print the
    /// annotated task as JSON
    Augment {
        /// Free-text description of the task
        description: String,
        /// Task type (general, analysis, research, validation, ...)
        #[arg(long, default_value = "general")]
        task_type: String,
    },
    /// Print seeker and provider health status as JSON
    Status,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| Level::INFO.into()))
        .with_target(false)
        .json()
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!(error = %err, "knowledge_seeker exited with an error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;
    info!(
        path = %config_path.display(),
        providers = config.providers.len(),
        "configuration loaded"
    );

    let registry = Arc::new(build_registry(&config.providers, &config.seeker).await?);
    let processor = InformationProcessor::new(config.processor.clone());
    let cache = Arc::new(match &config.cache.durable_path {
        Some(path) => ResponseCache::with_durable(config.seeker.cache_ttl(), path),
        None => ResponseCache::new(config.seeker.cache_ttl()),
    });
    let events = knowledge_seeker::events::null_sink();

    let seeker = Arc::new(KnowledgeSeeker::new(
        config.seeker.clone(),
        registry,
        processor,
        cache,
        events,
    ));

    match cli.command {
        Commands::Search {
            query,
            max_results,
            relevance_threshold,
        } => {
            let knowledge_query = KnowledgeQuery {
                id: uuid::Uuid::new_v4().to_string(),
                query,
                query_type: QueryType::Factual,
                max_results,
                relevance_threshold,
                timeout_ms: config.seeker.default_timeout_ms,
                preferred_sources: None,
                filters: None,
                priority: Priority::Medium,
                context: Default::default(),
                metadata: QueryMetadata::default(),
            };
            let response = seeker.process_query(knowledge_query).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Augment {
            description,
            task_type,
        } => {
            let detector = ResearchDetector::new(config.detector.clone());
            let provenance = ProvenanceLog::in_memory();
            let augmenter = TaskResearchAugmenter::new(
                config.augmenter.clone(),
                detector,
                seeker,
                provenance,
            );
            let task = Task {
                id: uuid::Uuid::new_v4().to_string(),
                description,
                task_type,
                metadata: Default::default(),
            };
            let augmented = augmenter.augment(task).await;
            println!("{}", serde_json::to_string_pretty(&augmented)?);
        }
        Commands::Status => {
            let status = seeker.status().await;
            let summary = serde_json::json!({
                "enabled": status.enabled,
                "cache_size": status.cache_size,
                "cache_hit_rate": status.cache_hit_rate,
                "system_health": format!("{:?}", status.system_health),
                "providers": status.providers.iter().map(|p| serde_json::json!({
                    "name": p.name,
                    "available": p.available,
                })).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
