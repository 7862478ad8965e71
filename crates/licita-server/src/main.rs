//! Licita: procurement notice summarizer with a highlighted Q&A transcript.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("LICITA_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-V" | "version" => {
                println!("licita {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("Licita: procurement notice summarizer (Gemini)");
                println!();
                println!("Usage: licita [command]");
                println!();
                println!("Commands:");
                println!("  (none)       Start the server");
                println!("  version      Print the version");
                println!("  help         Show this help message");
                println!();
                println!("Environment:");
                println!("  LICITA_DATA_DIR             Data directory (default ./data)");
                println!("  PORT                        HTTP port (default 3003)");
                println!("  LICITA_MAX_UPLOAD_MB        Upload limit in MB (default 50)");
                println!("  LICITA_SESSION_TTL_MINUTES  Idle session lifetime (default 60)");
                println!("  GEMINI_API_KEY              Gemini API key (fallback: API_KEY)");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'licita help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = licita_core::LicitaConfig::from_env(&data_dir)?;
    let port = config.port;
    info!("Upload limit: {} MB", config.max_upload_mb());

    let state = Arc::new(AppState::new(config));
    state::start_session_sweeper(state.clone());
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Licita server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
