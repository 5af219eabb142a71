//! Input classification: small talk, canned replies, follow-ups
//!
//! Every classifier is an ordered table of tagged rules. Tables are scanned
//! top to bottom and the first matching rule decides.

use regex::Regex;
use std::sync::OnceLock;

/// A single matching rule over raw input
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Case-insensitive substring
    Contains(&'static str),
    /// Case-insensitive prefix of the trimmed text
    StartsWith(&'static str),
    /// Case-insensitive regex, unanchored unless the pattern anchors itself
    Pattern(&'static str),
}

impl Rule {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Rule::Contains(needle) => text.to_lowercase().contains(needle),
            Rule::StartsWith(prefix) => text.trim().to_lowercase().starts_with(prefix),
            Rule::Pattern(pattern) => compiled(pattern).is_some_and(|re| re.is_match(text)),
        }
    }
}

/// Regex cache for the static rule tables
fn compiled(pattern: &'static str) -> Option<&'static Regex> {
    static CACHE: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| {
        CASUAL_RULES
            .iter()
            .chain(RESPONSE_RULES.iter().map(|(rule, _)| rule))
            .filter_map(|rule| match rule {
                Rule::Pattern(p) => Regex::new(&format!("(?i){}", p)).ok().map(|re| (*p, re)),
                _ => None,
            })
            .collect()
    });
    cache.iter().find(|(p, _)| *p == pattern).map(|(_, re)| re)
}

/// Which canned reply a casual message receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasualKind {
    How,
    Hello,
    Who,
    What,
    Generic,
}

impl CasualKind {
    pub fn response(&self) -> &'static str {
        match self {
            CasualKind::How => HOW_RESPONSE,
            CasualKind::Hello => HELLO_RESPONSE,
            CasualKind::Who => WHO_RESPONSE,
            CasualKind::What => WHAT_RESPONSE,
            CasualKind::Generic => GENERIC_RESPONSE,
        }
    }
}

const HOW_RESPONSE: &str = "I'm doing great, thanks for asking! I love helping people discover \
amazing books. What kind of books interest you? I'd be happy to recommend something that \
matches your taste!";

const HELLO_RESPONSE: &str = "Hello! It's wonderful to chat with you! I'm excited to help you \
find your next favorite book. What genres or themes do you enjoy?";

const WHO_RESPONSE: &str = "I'm an AI book recommender, passionate about connecting readers \
with books they'll love! I know quite a bit about literature and enjoy making personalized \
recommendations. What would you like to know?";

const WHAT_RESPONSE: &str = "I'm here to help you discover great books! I can recommend books \
based on your interests, suggest similar books to ones you've enjoyed, or help you explore new \
genres. What would you like to explore?";

const GENERIC_RESPONSE: &str = "I'm doing great! I love chatting about books and helping people \
find their next great read. What kind of books interest you?";

/// Small-talk detection. Greetings match anywhere in the text.
pub const CASUAL_RULES: &[Rule] = &[
    Rule::Pattern(r"how are you"),
    Rule::Pattern(r"how('s| is) it going"),
    Rule::Pattern(r"what('s| is) up"),
    Rule::Pattern(r"hello|hi|hey"),
    Rule::Pattern(r"good (morning|afternoon|evening)"),
    Rule::Pattern(r"who are you"),
    Rule::Pattern(r"what can you do"),
];

/// Canned reply selection, highest priority first
pub const RESPONSE_RULES: &[(Rule, CasualKind)] = &[
    (Rule::Contains("how are you"), CasualKind::How),
    (Rule::Contains("how's it going"), CasualKind::How),
    (Rule::Pattern(r"^(hi|hello|hey)"), CasualKind::Hello),
    (Rule::Contains("who are you"), CasualKind::Who),
    (Rule::Contains("what can you do"), CasualKind::What),
];

/// Continuation phrases that mark a follow-up question
pub const FOLLOW_UP_RULES: &[Rule] = &[
    Rule::StartsWith("what about"),
    Rule::StartsWith("how about"),
    Rule::StartsWith("and"),
    Rule::StartsWith("what else"),
    Rule::StartsWith("tell me more"),
    Rule::StartsWith("more"),
];

pub fn is_casual_conversation(text: &str) -> bool {
    CASUAL_RULES.iter().any(|rule| rule.matches(text))
}

/// Winning label for a casual message
pub fn classify_casual(text: &str) -> CasualKind {
    let lowered = text.to_lowercase();
    RESPONSE_RULES
        .iter()
        .find(|(rule, _)| rule.matches(&lowered))
        .map(|(_, kind)| *kind)
        .unwrap_or(CasualKind::Generic)
}

pub fn casual_response(text: &str) -> &'static str {
    classify_casual(text).response()
}

pub fn is_follow_up_question(text: &str) -> bool {
    FOLLOW_UP_RULES.iter().any(|rule| rule.matches(text))
}
