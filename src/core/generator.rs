//! Offline turn writer that stitches canned phrases around the topic.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::message::Transcript;
use crate::core::persona::Persona;

const CONNECTIVE_PHRASES: &[&str] = &[
    "Building on that",
    "Here's the twist",
    "The overlooked part",
    "On the ground",
    "Zooming in",
];

const CALLS_TO_ACTION: &[&str] = &[
    "let's prototype this",
    "we need shared governance",
    "someone should publish the spec",
    "pair it with civic dividends",
    "document the failure modes",
];

const TOPIC_HOOKS: &[&str] = &[
    "AI feels abstract until it touches paychecks and public services.",
    "Every breakthrough lowers the cost of prediction and coordination.",
    "We keep rediscovering that tooling is easy and governance is harder.",
    "The interesting fight is about who captures the upside.",
    "Multiplying copilots means multiplying accountability layers.",
];

fn pick<'a, R: Rng + ?Sized>(items: &'a [&'a str], rng: &mut R) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn pick_owned<'a, R: Rng + ?Sized>(items: &'a [String], rng: &mut R) -> &'a str {
    items.choose(rng).map(String::as_str).unwrap_or_default()
}

fn collapse_whitespace(sentence: &str) -> String {
    sentence.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Writes one turn for `persona`: an opener, a hook, and a call to action.
///
/// The opening turn leads with one of the persona's tics. Replies lead with
/// a connective and the persona's signature tic so they read as a response.
pub fn generate_turn<R: Rng + ?Sized>(
    persona: &Persona,
    topic: &str,
    history: &Transcript,
    rng: &mut R,
) -> String {
    let topic = topic.to_lowercase();

    let intro = if history.is_empty() {
        format!("{} {}", pick_owned(&persona.verbal_tics, rng), topic)
    } else {
        format!(
            "{}, {} {}",
            pick(CONNECTIVE_PHRASES, rng),
            persona.signature_tic().to_lowercase(),
            topic
        )
    };
    let body = pick(TOPIC_HOOKS, rng);
    let outro = format!(
        "{}: {}.",
        pick(CONNECTIVE_PHRASES, rng),
        pick(CALLS_TO_ACTION, rng)
    );

    [intro.as_str(), body, outro.as_str()]
        .iter()
        .map(|sentence| collapse_whitespace(sentence))
        .collect::<Vec<_>>()
        .join(" ")
}
