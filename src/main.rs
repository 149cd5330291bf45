use anyhow::Result;
use inbox_triage::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    cli::run().await
}
