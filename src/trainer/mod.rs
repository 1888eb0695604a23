//! Trainer runtime: turns [`Intent`]s into rendered replies.
//!
//! Call [`Trainer::init()`] once at startup to spawn a background task
//! that subscribes to the [`crate::comm`] intent bus and dispatches
//! incoming intents through the [`SessionStore`].  Each intent is
//! handled on its own task (tracked by an in-flight counter so shutdown
//! can drain) and its replies are delivered via the connector registry.
//!
//! [`handle_intent`] is the pure-ish core: it mutates session state and
//! produces the ordered reply sequence, but never touches a connector,
//! which keeps it directly unit-testable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::comm::{self, Intent, IntentKind, Reply, ReplyMarkup};
use crate::dialogue;
use crate::session::SessionStore;
use crate::utils::truncate_str;

// ---------------------------------------------------------------------------
// Message texts
// ---------------------------------------------------------------------------

pub const GREETING: &str =
    "Hi! This is a CBT practice demo (no external AI services).\nChoose a training topic:";
pub const CHOICE_ACK: &str = "Thanks, noted. Let's continue.";
pub const SESSION_OVER: &str = "Session over. Press /start to begin a new chat.";

/// Shown for free text the gateway could not classify into an intent.
pub const FALLBACK_GUIDANCE: &str =
    "Choose a topic via /start, then use the A-D buttons. To finish, send /end.";

/// Render the fixed option block shown under every client line.
fn render_options(options: &[String; 4]) -> String {
    format!(
        "Therapist response options (A-D):\n\nA) {}\n\nB) {}\n\nC) {}\n\nD) {}",
        options[0], options[1], options[2], options[3]
    )
}

fn client_line_message(line: &str, first_turn: bool) -> String {
    if first_turn {
        format!("Client: {line}\n(Reply and we'll continue)")
    } else {
        format!("Client: {line}")
    }
}

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);

/// Number of intents currently being handled.
pub fn in_flight_count() -> usize {
    IN_FLIGHT.load(Ordering::Relaxed)
}

/// Wait until all in-flight intents complete, or `timeout` elapses.
pub async fn drain_in_flight(timeout: std::time::Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while IN_FLIGHT.load(Ordering::Relaxed) > 0 {
        if tokio::time::Instant::now() >= deadline {
            warn!(
                remaining = IN_FLIGHT.load(Ordering::Relaxed),
                "drain timeout reached with intents still in flight"
            );
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

// ---------------------------------------------------------------------------
// Intent handling
// ---------------------------------------------------------------------------

/// Apply one intent to the store and produce the replies to deliver,
/// in order.  Rejections come back as a single guidance reply; no
/// intent ever produces a hard failure.
pub async fn handle_intent(store: &SessionStore, intent: &Intent) -> Vec<Reply> {
    match &intent.kind {
        IntentKind::Start => {
            store.start(intent.user_id).await;
            vec![Reply::with_markup(
                GREETING,
                ReplyMarkup::TopicList {
                    topics: dialogue::TOPICS.iter().map(|t| t.to_string()).collect(),
                },
            )]
        }
        IntentKind::SelectTopic { index } => {
            match store.select_topic(intent.user_id, *index).await {
                Ok(turn) => {
                    // Topic title may differ from the list entry (freeform slot).
                    let topic = store
                        .snapshot(intent.user_id)
                        .await
                        .map(|s| s.topic)
                        .unwrap_or_default();
                    debug!(
                        user_id = intent.user_id,
                        line = %truncate_str(&turn.client_line, 80),
                        "opening turn generated"
                    );
                    vec![
                        Reply::text(format!("You picked the topic: {topic}")),
                        Reply::text(client_line_message(&turn.client_line, true)),
                        Reply::with_markup(render_options(&turn.options), ReplyMarkup::ChoiceRow),
                    ]
                }
                Err(e) => vec![Reply::text(e.guidance())],
            }
        }
        IntentKind::SubmitChoice { letter } => {
            match store.submit_choice(intent.user_id, letter).await {
                Ok(turn) => {
                    debug!(
                        user_id = intent.user_id,
                        line = %truncate_str(&turn.client_line, 80),
                        "continuation turn generated"
                    );
                    vec![
                        Reply::text(CHOICE_ACK),
                        Reply::text(client_line_message(&turn.client_line, false)),
                        Reply::with_markup(render_options(&turn.options), ReplyMarkup::ChoiceRow),
                    ]
                }
                Err(e) => vec![Reply::text(e.guidance())],
            }
        }
        IntentKind::End => {
            store.end(intent.user_id).await;
            vec![Reply::with_markup(SESSION_OVER, ReplyMarkup::Remove)]
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Trainer;

impl Trainer {
    /// Spawn the dispatcher task.  It runs until `cancel` fires or the
    /// bus closes; in-flight intents are allowed to finish (tracked via
    /// the `IN_FLIGHT` counter, drained from `main`).
    pub fn init(
        store: Arc<SessionStore>,
        bus: tokio::sync::broadcast::Sender<Intent>,
        cancel: CancellationToken,
    ) {
        let mut rx = bus.subscribe();

        tokio::spawn(async move {
            debug!("trainer dispatcher started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("trainer dispatcher received shutdown signal");
                        break;
                    }
                    result = rx.recv() => {
                        match result {
                            Ok(intent) => {
                                let store = Arc::clone(&store);
                                tokio::spawn(async move {
                                    IN_FLIGHT.fetch_add(1, Ordering::Relaxed);
                                    let replies = handle_intent(&store, &intent).await;
                                    IN_FLIGHT.fetch_sub(1, Ordering::Relaxed);
                                    info!(
                                        user_id = intent.user_id,
                                        replies = replies.len(),
                                        "intent handled"
                                    );
                                    for reply in replies {
                                        if let Err(e) = comm::deliver(&intent.channel, reply).await {
                                            warn!(error = %e, channel = %intent.channel, "failed to deliver reply");
                                        }
                                    }
                                });
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "trainer dispatch lagged, dropped intents");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                                debug!("intent bus closed, trainer dispatcher exiting");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }
}

// ── Tests ────────────────────────────────────────────────────
