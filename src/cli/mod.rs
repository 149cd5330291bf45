use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::load_dotenv;

pub mod triage;

/// Score unread Gmail with a language model and post the result to a
/// chat webhook. Configured entirely through environment variables.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub async fn run() -> Result<()> {
    let _args = Cli::parse();
    init_tracing();
    load_dotenv();
    triage::run().await
}
