use std::io;

use nutrilog::console::{Console, Prompter};
use nutrilog::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "nutrilog=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    // Logs go to stderr so they do not interleave with the menu on stdout.
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    }

    let state = AppState::init().await?;
    tracing::info!("console session started");

    let stdin = io::stdin();
    let prompter = Prompter::new(stdin.lock(), io::stdout());
    let mut console = Console::new(state, prompter);
    console.run().await?;

    Ok(())
}
