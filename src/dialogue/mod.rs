//! Scripted turn generation for the training dialogue.
//!
//! Everything in this module is a pure lookup over small static tables:
//! the fixed topic list, a handful of topic-specific opening lines, four
//! continuation lines keyed by the trainee's previous choice, and the
//! single ranked option list shown on every turn.  There is no model,
//! scoring, or randomness behind any of it.

/// Fixed training topics, shown to the user as a numbered 1-based list.
///
/// The final entry is the freeform slot; selecting it stores
/// [`FREEFORM_TOPIC`] as the session topic instead of the list title.
pub const TOPICS: &[&str] = &[
    "Procrastination and self-criticism",
    "Heightened anxiety (before public speaking)",
    "Fear of failure",
    "Feelings of guilt",
    "Jealousy and anxiety in relationships",
    "Fear of change",
    "Difficulty making decisions",
    "Difficulties in close relationships",
    "Low self-esteem",
    "Burnout",
    "My own topic",
];

/// Topic stored when the user picks the last ("my own topic") entry.
pub const FREEFORM_TOPIC: &str = "My own topic (freeform)";

/// Opening lines for topics that have a scripted entry.  Topics without
/// one fall back to [`GENERIC_OPENING`].
const OPENINGS: &[(&str, &str)] = &[
    (
        "Procrastination and self-criticism",
        "I keep putting everything off and beating myself up over it. I feel like I'm not capable of anything.",
    ),
    (
        "Fear of failure",
        "If I fail at this, everyone will think I'm worthless.",
    ),
];

const GENERIC_OPENING: &str =
    "I'm having a hard time managing my thoughts; they spiral straight into negativity.";

/// Continuation lines keyed by the normalized previous choice.
/// An absent or unrecognized letter uses the `'b'` entry; the original
/// behaved that way and it is kept as-is for parity.
const CONTINUATIONS: &[(char, &str)] = &[
    (
        'a',
        "What facts actually point to that? Maybe I'm not seeing the whole picture.",
    ),
    (
        'b',
        "On one hand that sounds logical... but the doubts are still there.",
    ),
    ('c', "Well, maybe... Though I'm not sure."),
    (
        'd',
        "No, I don't think that's me. I just can't cope.",
    ),
];

/// The four response options offered on every turn, identical for every
/// topic and step, ordered most- to least-clinically-appropriate.  The
/// topic-independence is deliberate demo behavior, not an oversight.
pub const OPTIONS: [&str; 4] = [
    "Let's notice the automatic thought and test how accurate it is: what facts speak for it, and what facts against?",
    "It sounds like you're being very hard on yourself. Could we rephrase that with a little more kindness?",
    "This happens to a lot of people. Maybe just slot one small step into today's plan.",
    "You just need to stop being lazy and pull yourself together.",
];

/// One generated exchange: the simulated client's line plus the four
/// response options to offer.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub client_line: String,
    pub options: [String; 4],
}

/// Normalize a choice letter to one of `'a'..='d'`.
///
/// Case-insensitive; accepts the Cyrillic letters that look like (or
/// transliterate to) the Latin ones, since users on Cyrillic keyboards
/// routinely type those instead.  Returns `None` for anything else.
pub fn normalize_choice(s: &str) -> Option<char> {
    let lowered = s.trim().to_lowercase();
    match lowered.as_str() {
        "a" | "а" => Some('a'),
        "b" | "в" => Some('b'),
        "c" | "с" => Some('c'),
        "d" | "д" => Some('d'),
        _ => None,
    }
}

/// Produce the next client line and option set.
///
/// With an empty history this returns the opening line for `topic` (or
/// the generic opening when the topic has no scripted entry).  With a
/// non-empty history it returns the continuation keyed by `last_reply`,
/// defaulting to `'b'` when the letter is absent or unrecognized.
pub fn generate_turn(topic: &str, history_len: usize, last_reply: Option<&str>) -> Turn {
    let client_line = if history_len == 0 {
        OPENINGS
            .iter()
            .find(|(t, _)| *t == topic)
            .map(|(_, line)| *line)
            .unwrap_or(GENERIC_OPENING)
    } else {
        let key = last_reply.and_then(normalize_choice).unwrap_or('b');
        CONTINUATIONS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, line)| *line)
            .expect("continuation table covers a-d")
    };

    Turn {
        client_line: client_line.to_string(),
        options: OPTIONS.map(String::from),
    }
}
