use clap::Parser;
use rca_core::{AnalysisPipeline, RcaConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use rca_server::router::AppContext;

#[derive(Parser, Debug)]
#[command(author, version, about = "RCA Agent: LLM-assisted log analyzer", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "rca.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (API_KEY, AZURE_ENDPOINT)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match RcaConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Open DB
    let pool = match rca_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", config.database.url, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rca_core::db::init_schema(&pool).await {
        eprintln!("Failed to initialize database schema: {}", e);
        std::process::exit(1);
    }

    if args.health {
        match rca_server::subsystems::health::check_store(&pool).await {
            Ok(h) => {
                println!("✅ SQLite available: {}", h.sqlite_version);
                println!("✅ {} stored analyses in {}", h.records, config.database.url);
                println!("✅ RCA Agent DB health check passed");
                return Ok(());
            }
            Err(e) => {
                println!("❌ DB health check failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    // The UI and history stay usable without an LLM; /analyze reports 503
    let pipeline = match AnalysisPipeline::from_config(&config) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!("Analysis disabled: failed to create LLM backend: {}", e);
            None
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let ctx = AppContext {
        pool: pool.clone(),
        config,
        pipeline,
    };

    rca_server::http::start_http_server(ctx, tx.subscribe()).await?;

    pool.close().await;
    Ok(())
}
