//! CLI entrypoint. All subcommand logic lives in `cli.rs`; this stays thin.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    workspace_composer::cli::run().await
}
