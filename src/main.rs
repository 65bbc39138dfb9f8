use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use microcosm_core::{init_logging, AppConfig, Metrics};
use microcosm_io::{EventArchive, StorageManager};
use microcosm_lib::SimRuntime;
use microcosm_observer::{HttpBackend, LlmBackend, NarrationDesk, Orchestrator, Tier};
use microcosm_server::{AppState, SimHandle};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// SQLite database path
    #[arg(long, default_value = "microcosm.db")]
    db: String,

    /// Directory for the JSONL event archive; omit to disable
    #[arg(long)]
    archive_dir: Option<String>,

    /// Override the world seed
    #[arg(long)]
    seed: Option<u64>,

    /// Address for the HTTP API
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = match std::fs::read_to_string(&args.config) {
        Ok(content) => AppConfig::from_toml(&content)
            .with_context(|| format!("invalid config file {}", args.config))?,
        Err(_) => {
            tracing::info!("no config file at {}, using defaults", args.config);
            AppConfig::default()
        }
    };
    if let Some(seed) = args.seed {
        config.world.seed = Some(seed);
    }
    config.validate()?;
    tracing::info!(fingerprint = %config.fingerprint(), "configuration loaded");

    let storage =
        Arc::new(StorageManager::new(&args.db).context("failed to open storage backend")?);
    storage.purge_ledger(config.llm.ledger_expiry_days);

    let api_key = std::env::var("MICROCOSM_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());
    if api_key.is_none() {
        tracing::warn!("no MICROCOSM_API_KEY set, admin endpoints are open");
    }
    let llm_key = std::env::var("MICROCOSM_LLM_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    let timeout = Duration::from_secs(config.llm.request_timeout_secs);
    let backends: Vec<Arc<dyn LlmBackend>> = vec![
        Arc::new(HttpBackend::new(
            Tier::God,
            &config.llm.god_endpoint,
            &config.llm.god_model,
            llm_key.clone(),
            timeout,
        )?) as Arc<dyn LlmBackend>,
        Arc::new(HttpBackend::new(
            Tier::Premium,
            &config.llm.premium_endpoint,
            &config.llm.premium_model,
            llm_key,
            timeout,
        )?),
        Arc::new(HttpBackend::new(
            Tier::Local,
            &config.llm.local_endpoint,
            &config.llm.local_model,
            None,
            timeout,
        )?),
    ];
    let orchestrator = Arc::new(Orchestrator::new(
        backends,
        Arc::new(storage.ledger()),
        config.llm.clone(),
    ));
    let desk = NarrationDesk::new(orchestrator);
    let metrics = Arc::new(Metrics::new());

    let mut runtime = SimRuntime::new(config, Arc::clone(&storage), desk, metrics);
    if let Some(dir) = &args.archive_dir {
        runtime.add_sink(Box::new(EventArchive::new_at(dir)?));
    }
    let (sim, commands) = SimHandle::channel(256);
    tokio::spawn(runtime.run(commands));

    let state = Arc::new(AppState {
        sim,
        storage,
        api_key,
    });
    let app = microcosm_server::router(state);

    tracing::info!("Microcosm listening on http://{}", args.bind);
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    axum::serve(listener, app).await?;
    Ok(())
}
