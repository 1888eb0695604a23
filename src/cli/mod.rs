//! CLI subcommand handlers extracted from `main.rs`.
//!
//! Keeps `main.rs` slim: clap parsing stays there, heavy logic lives here.

use std::sync::Arc;

use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::comm::{Intent, IntentKind};
use crate::dialogue;
use crate::events::EventLog;
use crate::session::SessionStore;
use crate::trainer;

/// Print the numbered topic list.
pub fn print_topics() {
    println!("Training topics:");
    for (i, topic) in dialogue::TOPICS.iter().enumerate() {
        println!("  {}. {}", i + 1, topic);
    }
}

fn demo_intent(kind: IntentKind) -> Intent {
    Intent {
        user_id: 0,
        channel: "cli:demo".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        kind,
    }
}

/// Parse one REPL line into an intent.  `None` means unclassifiable.
fn parse_demo_line(line: &str) -> Option<IntentKind> {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "/start" | "start" => return Some(IntentKind::Start),
        "/end" | "end" => return Some(IntentKind::End),
        _ => {}
    }
    if let Ok(index) = trimmed.parse::<usize>() {
        return Some(IntentKind::SelectTopic { index });
    }
    if trimmed.chars().count() == 1 && trimmed.chars().all(|c| c.is_alphabetic()) {
        return Some(IntentKind::SubmitChoice {
            letter: trimmed.to_string(),
        });
    }
    None
}

/// Interactive stdin REPL that drives the session core directly,
/// bypassing the bus and connector registry.  `/start`, a topic
/// number, then letters; `/end` to finish; `quit` to leave.
pub async fn run_demo() -> anyhow::Result<()> {
    let store = Arc::new(SessionStore::new());

    println!("cogni demo — type /start to begin, quit to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("read stdin")? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed.to_lowercase().as_str(), "quit" | "exit") {
            break;
        }

        match parse_demo_line(trimmed) {
            Some(kind) => {
                let intent = demo_intent(kind);
                debug!(kind = ?intent.kind, "demo intent");
                for reply in trainer::handle_intent(&store, &intent).await {
                    println!("{}\n", reply.as_plain_text());
                }
            }
            None => println!("{}\n", trainer::FALLBACK_GUIDANCE),
        }
    }

    Ok(())
}

/// Append one event record through the logger seam and print where it
/// landed.
pub async fn debug_log_event(
    log_dir: std::path::PathBuf,
    user_id: i64,
    case_id: &str,
    step: u32,
    client: &str,
    reply: &str,
    is_good: bool,
) -> anyhow::Result<()> {
    let log = EventLog::new(log_dir);
    let path = log
        .log_event(user_id, case_id, step, client, reply, is_good)
        .await?;
    println!("logged to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognizes_commands() {
        assert!(matches!(parse_demo_line("/start"), Some(IntentKind::Start)));
        assert!(matches!(parse_demo_line("END"), Some(IntentKind::End)));
        assert!(matches!(
            parse_demo_line("3"),
            Some(IntentKind::SelectTopic { index: 3 })
        ));
        assert!(matches!(
            parse_demo_line(" b "),
            Some(IntentKind::SubmitChoice { .. })
        ));
        assert!(parse_demo_line("hello there").is_none());
    }
}
