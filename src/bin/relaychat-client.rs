//! Terminal chat client
//!
//! Connects to a relaychat server, answers the name prompt from stdin and
//! prints incoming messages. Local commands:
//!   /block <names>, /unblock <names>, /add <names>, /remove <names>,
//!   /private, /public, /quit

use anyhow::{Context, Result};
use clap::Parser;
use relaychat::chat::{Command, ServerLine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Parser)]
#[command(name = "relaychat-client")]
#[command(about = "Terminal client for a relaychat server")]
struct Cli {
    /// Server address
    #[arg(default_value = "127.0.0.1:59001")]
    server: String,
}

fn names<'a>(words: impl Iterator<Item = &'a str>) -> Vec<String> {
    words.map(str::to_string).collect()
}

/// Translate one line of user input into a wire line.
///
/// Returns `None` for local-only commands that change the send mode.
fn translate(input: &str, private: &AtomicBool) -> Option<String> {
    let mut words = input.split_whitespace();

    let command = match words.next() {
        Some("/block") => Command::Block(names(words)),
        Some("/unblock") => Command::Unblock(names(words)),
        Some("/add") => Command::GroupAdd(names(words)),
        Some("/remove") => Command::GroupRemove(names(words)),
        Some("/private") => {
            private.store(true, Ordering::Relaxed);
            eprintln!("[private mode]");
            return None;
        }
        Some("/public") => {
            private.store(false, Ordering::Relaxed);
            eprintln!("[broadcast mode]");
            return None;
        }
        _ if relaychat::chat::command::is_quit(input) => Command::Quit,
        _ => Command::Message {
            private: private.load(Ordering::Relaxed),
            text: input.to_string(),
        },
    };

    Some(command.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let stream = TcpStream::connect(&cli.server)
        .await
        .with_context(|| format!("Failed to connect to {}", cli.server))?;

    eprintln!("Connected to {}", cli.server);

    let (read_half, mut write_half) = stream.into_split();
    let registered = Arc::new(AtomicBool::new(false));
    let private = AtomicBool::new(false);

    // Spawn a task to read from the server
    let registered_reader = registered.clone();
    let read_task = tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match ServerLine::parse(&line) {
                    Some(ServerLine::SubmitName) => eprintln!("Choose a screen name:"),
                    Some(ServerLine::NameAccepted(name)) => {
                        registered_reader.store(true, Ordering::Relaxed);
                        eprintln!("Joined as {}", name);
                    }
                    Some(ServerLine::Message(text)) => println!("{}", text),
                    None => tracing::debug!("Ignoring unknown line: {}", line),
                },
                Ok(None) => {
                    eprintln!("Connection closed by server");
                    break;
                }
                Err(e) => {
                    eprintln!("Error reading from server: {}", e);
                    break;
                }
            }
        }
    });

    // Read from stdin and send to server
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(input) = stdin.next_line().await.context("Failed to read stdin")? {
        let line = if registered.load(Ordering::Relaxed) {
            match translate(&input, &private) {
                Some(line) => line,
                None => continue,
            }
        } else {
            input.clone()
        };

        write_half
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .context("Failed to send line")?;

        if relaychat::chat::command::is_quit(&input) {
            break;
        }
    }

    read_task.abort();
    Ok(())
}
