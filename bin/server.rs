// Roster - Web Server
// REST API with Axum over the SQLite (or in-memory) repository

use anyhow::{Context, Result};
use log::info;
use std::env;

use roster::api::{router, AppState};
use roster::{init_logging, Config, MemoryRepository, SqliteRepository};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(&config.log_level, config.log_dir.as_deref())?;

    println!("🌐 Roster - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━");

    let in_memory = env::args().skip(1).any(|arg| arg == "--memory");

    let state = if in_memory {
        println!("✓ Using in-memory storage (nothing is persisted)");
        AppState::new(MemoryRepository::new(), config.unresolved_company)
    } else {
        let repo = SqliteRepository::open(&config.database_path)
            .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
        println!("✓ Database opened: {}", config.database_path.display());
        AppState::new(repo, config.unresolved_company)
    };

    info!("Unresolved company policy: {}", config.unresolved_company);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;

    println!("\n🚀 Server running on http://{}", config.bind_address);
    println!("   API: http://{}/api/health", config.bind_address);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
