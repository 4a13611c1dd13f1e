use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    app::App,
    cli::{Command, ShellLine},
};

const PROMPT: &str = "td> ";

/// Read commands from stdin until EOF or `exit`, sharing one session and
/// one mounted task page.
pub async fn run(app: &App, json: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let Some(words) = shlex::split(line) else {
            eprintln!("error: unbalanced quotes");
            continue;
        };
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(err) => {
                let _ = err.print();
                continue;
            }
        };
        if matches!(parsed.command, Command::Shell) {
            eprintln!("error: already in a shell");
            continue;
        }
        if let Err(err) = app.execute(parsed.command, json || parsed.json).await {
            tracing::debug!(error = ?err, "Shell command failed");
            eprintln!("error: {err:#}");
        }
    }
    Ok(())
}
