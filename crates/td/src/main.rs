use anyhow::bail;
use clap::Parser;
use tracing_subscriber::{EnvFilter, prelude::*};

mod app;
mod cli;
mod render;
mod shell;

use app::App;
use cli::{Cli, Command};

fn init_tracing() -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,td={level},tasks={level},db={level},config={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(env_filter),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let app = App::load().await?;
    if matches!(cli.command, Command::Shell) {
        return shell::run(&app.keep_task_page(), cli.json).await;
    }
    if !app.execute(cli.command, cli.json).await? {
        bail!("Command finished with errors");
    }
    Ok(())
}
