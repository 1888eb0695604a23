//! Generic communication layer.
//!
//! Provides [`Intent`] -- a gateway-agnostic envelope for the four user
//! actions the core understands -- and a process-wide broadcast channel
//! that the trainer runtime subscribes to.
//!
//! The global channel is initialised lazily via `once_cell::sync::Lazy`.
//! Gateways call `sender()` to push intents; the trainer runtime calls
//! `subscribe()` to obtain an independent receiver.  Outbound replies
//! flow back through registered [`ChannelConnector`]s.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tokio::sync::{broadcast, RwLock};

// ---------------------------------------------------------------------------
// Intent — gateway-agnostic inbound action
// ---------------------------------------------------------------------------

/// The classified user action carried by an [`Intent`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentKind {
    /// Begin a fresh lifecycle; always accepted.
    Start,
    /// Pick a topic by 1-based index into the topic list.
    SelectTopic { index: usize },
    /// Submit one of the offered responses (letter A-D, either alphabet).
    SubmitChoice { letter: String },
    /// Terminate the session and go to sleep until the next start.
    End,
}

/// A gateway-agnostic inbound user action.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Intent {
    /// Stable numeric identity of the user across the gateway.
    pub user_id: i64,
    /// Originating channel identifier, used to route the reply back.
    pub channel: String,
    /// Unix-epoch timestamp (seconds).
    pub timestamp: i64,
    pub kind: IntentKind,
}

// ---------------------------------------------------------------------------
// Reply — platform-agnostic outbound content model
// ---------------------------------------------------------------------------

/// Input affordance to render alongside a reply.  Connectors translate
/// this into their native widget (inline keyboard, numbered prompt, …).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyMarkup {
    /// No affordance.
    #[default]
    None,
    /// Remove any affordance previously shown to this user.
    Remove,
    /// Numbered topic list; one button per entry.
    TopicList { topics: Vec<String> },
    /// The single A-D button row.
    ChoiceRow,
}

/// Platform-agnostic outbound message.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_default_markup")]
    pub markup: ReplyMarkup,
}

fn is_default_markup(m: &ReplyMarkup) -> bool {
    matches!(m, ReplyMarkup::None)
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: ReplyMarkup::None,
        }
    }

    pub fn with_markup(text: impl Into<String>, markup: ReplyMarkup) -> Self {
        Self {
            text: text.into(),
            markup,
        }
    }

    /// Flatten to plain text for connectors without widget support.
    pub fn as_plain_text(&self) -> String {
        match &self.markup {
            ReplyMarkup::TopicList { topics } => {
                let mut parts = vec![self.text.clone()];
                for (i, t) in topics.iter().enumerate() {
                    parts.push(format!("{}. {}", i + 1, t));
                }
                parts.join("\n")
            }
            ReplyMarkup::ChoiceRow => format!("{}\n[A] [B] [C] [D]", self.text),
            _ => self.text.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Global broadcast channel
// ---------------------------------------------------------------------------

/// Capacity of the in-process broadcast channel.
const CHANNEL_CAPACITY: usize = 256;

/// Global broadcast sender, created once on first access.
static SENDER: Lazy<broadcast::Sender<Intent>> = Lazy::new(|| {
    let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
    tx
});

/// Obtain a clone of the global broadcast sender.
///
/// Call `sender().send(intent)` from any gateway to push an intent
/// onto the bus.
pub fn sender() -> broadcast::Sender<Intent> {
    SENDER.clone()
}

/// Create a new receiver subscribed to the global bus.
///
/// Each call returns an independent `Receiver` that will see all
/// intents sent **after** subscription.
pub fn subscribe() -> broadcast::Receiver<Intent> {
    SENDER.subscribe()
}

/// Create a one-shot `(sender, receiver)` pair (useful for tests or
/// isolated pipelines that don't need the global bus).
pub fn message_bus() -> (broadcast::Sender<Intent>, broadcast::Receiver<Intent>) {
    broadcast::channel(CHANNEL_CAPACITY)
}

// ---------------------------------------------------------------------------
// ChannelConnector trait + global registry
// ---------------------------------------------------------------------------

/// A channel connector can deliver replies to a specific platform.
///
/// Connectors are registered at startup; the trainer runtime looks up
/// the matching connector by channel when it needs to deliver a reply.
#[async_trait]
pub trait ChannelConnector: Send + Sync + 'static {
    /// A short identifier used to match against `channel` values, e.g.
    /// `"telegram"` matches channels prefixed with `"telegram:"`.
    fn name(&self) -> &str;

    /// Return true if this connector should handle the given channel string.
    fn matches(&self, channel: &str) -> bool;

    /// Deliver plain `text` to the specified channel.
    async fn send(&self, channel: &str, text: &str) -> anyhow::Result<()>;

    /// Deliver a [`Reply`] with its markup.  The default implementation
    /// flattens to plain text and delegates to [`send`](Self::send).
    async fn send_reply(&self, channel: &str, reply: Reply) -> anyhow::Result<()> {
        self.send(channel, &reply.as_plain_text()).await
    }
}

/// Process-wide registry of channel connectors.
static CONNECTORS: Lazy<RwLock<HashMap<String, Arc<dyn ChannelConnector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a channel connector. Replaces any previous connector with the
/// same `name()`.
pub async fn register_connector(connector: Arc<dyn ChannelConnector>) {
    let name = connector.name().to_string();
    CONNECTORS.write().await.insert(name, connector);
}

/// Deliver a reply through whichever connector matches `channel`.
///
/// Returns `Ok(())` when no connector matched; the reply is dropped
/// with a debug log rather than failing the turn.
pub async fn deliver(channel: &str, reply: Reply) -> anyhow::Result<()> {
    let connectors = CONNECTORS.read().await;
    for connector in connectors.values() {
        if connector.matches(channel) {
            return connector.send_reply(channel, reply).await;
        }
    }
    tracing::debug!(channel = %channel, "no connector matched channel — reply dropped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_flattens_topic_list() {
        let reply = Reply::with_markup(
            "Pick a topic:",
            ReplyMarkup::TopicList {
                topics: vec!["First".into(), "Second".into()],
            },
        );
        let flat = reply.as_plain_text();
        assert!(flat.starts_with("Pick a topic:\n1. First"));
        assert!(flat.ends_with("2. Second"));
    }

    #[test]
    fn plain_text_flattens_choice_row() {
        let reply = Reply::with_markup("Options:", ReplyMarkup::ChoiceRow);
        assert_eq!(reply.as_plain_text(), "Options:\n[A] [B] [C] [D]");
    }

    #[tokio::test]
    async fn bus_delivers_to_subscriber() {
        let (tx, mut rx) = message_bus();
        tx.send(Intent {
            user_id: 1,
            channel: "test:1".into(),
            timestamp: 0,
            kind: IntentKind::Start,
        })
        .unwrap();
        let intent = rx.recv().await.unwrap();
        assert!(matches!(intent.kind, IntentKind::Start));
        assert_eq!(intent.user_id, 1);
    }
}
