//! Integration tests for the trainer dispatcher: intents in on the bus,
//! replies out through a capturing connector.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use mini_cbt::comm::{self, ChannelConnector, Intent, IntentKind, Reply, ReplyMarkup};
use mini_cbt::session::SessionStore;
use mini_cbt::trainer::{self, Trainer};

/// Connector that records every reply it is asked to deliver.
struct CapturingConnector {
    name: String,
    prefix: String,
    captured: Arc<Mutex<Vec<(String, Reply)>>>,
}

#[async_trait]
impl ChannelConnector for CapturingConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, channel: &str) -> bool {
        channel.starts_with(&self.prefix)
    }

    async fn send(&self, channel: &str, text: &str) -> anyhow::Result<()> {
        self.captured
            .lock()
            .await
            .push((channel.to_string(), Reply::text(text)));
        Ok(())
    }

    async fn send_reply(&self, channel: &str, reply: Reply) -> anyhow::Result<()> {
        self.captured
            .lock()
            .await
            .push((channel.to_string(), reply));
        Ok(())
    }
}

/// Register a fresh capturing connector under a unique channel prefix.
async fn capture_channel(prefix: &str) -> Arc<Mutex<Vec<(String, Reply)>>> {
    let captured = Arc::new(Mutex::new(Vec::new()));
    comm::register_connector(Arc::new(CapturingConnector {
        name: prefix.to_string(),
        prefix: prefix.to_string(),
        captured: Arc::clone(&captured),
    }))
    .await;
    captured
}

async fn wait_for_replies(
    captured: &Arc<Mutex<Vec<(String, Reply)>>>,
    at_least: usize,
) -> Vec<(String, Reply)> {
    for _ in 0..100 {
        {
            let got = captured.lock().await;
            if got.len() >= at_least {
                return got.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    captured.lock().await.clone()
}

fn intent(channel: &str, user_id: i64, kind: IntentKind) -> Intent {
    Intent {
        user_id,
        channel: channel.to_string(),
        timestamp: 0,
        kind,
    }
}

#[tokio::test]
async fn start_intent_flows_to_connector() {
    let captured = capture_channel("disp-start:").await;
    let (bus, _keepalive) = comm::message_bus();
    let cancel = CancellationToken::new();
    Trainer::init(Arc::new(SessionStore::new()), bus.clone(), cancel.clone());

    bus.send(intent("disp-start:1", 1, IntentKind::Start)).unwrap();

    let replies = wait_for_replies(&captured, 1).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0, "disp-start:1");
    assert!(matches!(
        replies[0].1.markup,
        ReplyMarkup::TopicList { .. }
    ));

    cancel.cancel();
}

#[tokio::test]
async fn full_exchange_over_the_bus() {
    let captured = capture_channel("disp-flow:").await;
    let (bus, _keepalive) = comm::message_bus();
    let cancel = CancellationToken::new();
    Trainer::init(Arc::new(SessionStore::new()), bus.clone(), cancel.clone());

    let ch = "disp-flow:7";
    bus.send(intent(ch, 7, IntentKind::Start)).unwrap();
    let _ = wait_for_replies(&captured, 1).await;

    bus.send(intent(ch, 7, IntentKind::SelectTopic { index: 1 }))
        .unwrap();
    let _ = wait_for_replies(&captured, 4).await;

    bus.send(intent(
        ch,
        7,
        IntentKind::SubmitChoice { letter: "a".into() },
    ))
    .unwrap();
    let _ = wait_for_replies(&captured, 7).await;

    bus.send(intent(ch, 7, IntentKind::End)).unwrap();
    let replies = wait_for_replies(&captured, 8).await;

    // 1 greeting + 3 topic-selection + 3 choice + 1 end
    assert_eq!(replies.len(), 8);
    assert!(replies[1].1.text.starts_with("You picked the topic:"));
    assert_eq!(replies[3].1.markup, ReplyMarkup::ChoiceRow);
    assert_eq!(replies[4].1.text, trainer::CHOICE_ACK);
    assert_eq!(replies[7].1.markup, ReplyMarkup::Remove);

    cancel.cancel();
}

#[tokio::test]
async fn guidance_reply_for_out_of_protocol_intent() {
    let captured = capture_channel("disp-guid:").await;
    let (bus, _keepalive) = comm::message_bus();
    let cancel = CancellationToken::new();
    Trainer::init(Arc::new(SessionStore::new()), bus.clone(), cancel.clone());

    // No session exists for this user.
    bus.send(intent(
        "disp-guid:2",
        2,
        IntentKind::SubmitChoice { letter: "a".into() },
    ))
    .unwrap();

    let replies = wait_for_replies(&captured, 1).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].1.text, "Press /start to begin a new session.");
    assert_eq!(replies[0].1.markup, ReplyMarkup::None);

    cancel.cancel();
}

#[tokio::test]
async fn cancelled_dispatcher_stops_consuming() {
    let captured = capture_channel("disp-cancel:").await;
    let (bus, _keepalive) = comm::message_bus();
    let cancel = CancellationToken::new();
    Trainer::init(Arc::new(SessionStore::new()), bus.clone(), cancel.clone());

    cancel.cancel();
    // Give the dispatcher a moment to observe the cancellation.
    tokio::time::sleep(Duration::from_millis(50)).await;

    bus.send(intent("disp-cancel:1", 1, IntentKind::Start)).ok();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(captured.lock().await.is_empty());
}

#[tokio::test]
async fn drain_returns_when_idle() {
    // Nothing in flight: must return promptly rather than wait out the timeout.
    let started = tokio::time::Instant::now();
    trainer::drain_in_flight(Duration::from_secs(5)).await;
    assert!(started.elapsed() < Duration::from_secs(1));
}
