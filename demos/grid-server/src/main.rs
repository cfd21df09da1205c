//! Stand-alone trivia-grid server.
//!
//! Run with:
//! ```not_rust
//! cargo run -p grid-server
//! cargo run -p grid-server -- --bind 0.0.0.0:9000 --tokens tokens.json --criteria grid.json
//! ```
//!
//! `tokens.json` maps bearer tokens to users:
//! `{"alice-token": {"user_id": 1, "username": "alice"}}`.
//! Without it, two development tokens (`alice-token`, `bob-token`) are
//! accepted. Without `--criteria`, every answer is accepted.

use std::path::{Path, PathBuf};

use clap::Parser;
use gridforge::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "grid-server")]
#[command(about = "Multiplayer trivia-grid WebSocket server", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short = 'b', long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// JSON file mapping bearer tokens to users
    #[arg(short = 't', long)]
    tokens: Option<PathBuf>,

    /// JSON file with the 3x3 category grid used to judge answers
    #[arg(short = 'c', long)]
    criteria: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn load_tokens(path: Option<&Path>) -> Result<StaticTokenAuthenticator, BoxError> {
    let Some(path) = path else {
        tracing::warn!("no token file given, accepting development tokens");
        return Ok(StaticTokenAuthenticator::new()
            .with_token("alice-token", Identity::new(1, "alice"))
            .with_token("bob-token", Identity::new(2, "bob")));
    };

    let auth = StaticTokenAuthenticator::from_json(&std::fs::read_to_string(path)?)?;
    tracing::info!(path = %path.display(), tokens = auth.len(), "loaded token table");
    Ok(auth)
}

fn configure(args: &Args) -> Result<GridforgeServerBuilder, BoxError> {
    let builder = GridforgeServer::<StaticTokenAuthenticator>::builder().bind(&args.bind);

    match &args.criteria {
        Some(path) => {
            let grid = CategoryGrid::from_json(&std::fs::read_to_string(path)?)?;
            tracing::info!(path = %path.display(), "loaded category grid");
            Ok(builder.answer_checker(grid))
        }
        None => Ok(builder.answer_checker(AcceptAnyAnswer)),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    gridforge::logging::init_tracing(&args.log_level);

    let auth = load_tokens(args.tokens.as_deref())?;
    let server = configure(&args)?.build(auth).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}
