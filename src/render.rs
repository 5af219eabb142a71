//! Pure rendering: messages, book cards, session list
//!
//! Nothing here touches the terminal. Functions take chat state and return
//! display values; `tui` turns those into widgets.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{self, Message, Recommendation, Role, SessionCollection};

/// Preview length in the session list
pub const PREVIEW_CHARS: usize = 40;

pub const RECOMMENDATIONS_HEADING: &str = "Here are some books you might enjoy:";

const NEW_CHAT_PLACEHOLDER: &str = "New Chat";
const UNKNOWN_DATE: &str = "Unknown date";

/// Example queries offered by the welcome message
pub const WELCOME_SUGGESTIONS: [&str; 4] = [
    "Recommend me some fantasy books",
    "Books about personal development",
    "Best science fiction novels",
    "Popular romance books",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStyle {
    Plain,
    /// Book title, explicit or inferred
    Title,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

impl Span {
    fn plain(text: &str) -> Self {
        Self { text: text.to_string(), style: SpanStyle::Plain }
    }

    fn title(text: &str) -> Self {
        Self { text: text.to_string(), style: SpanStyle::Title }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub role: Role,
    pub spans: Vec<Span>,
}

impl RenderedMessage {
    /// Text without styling
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookCard {
    pub title: String,
    pub category: String,
    pub reading_time: String,
    /// `None` when the book has no themes; the tag row is omitted
    pub themes: Option<Vec<String>>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationPanel {
    pub heading: &'static str,
    pub cards: Vec<BookCard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub id: String,
    pub preview: String,
    pub date: String,
    pub active: bool,
}

/// A whole chat ready for display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub messages: Vec<RenderedMessage>,
    /// Latest recommendation set in the chat
    pub panel: Option<RecommendationPanel>,
}

// ═══════════════════════════════════════════════════════════════
// MESSAGES
// ═══════════════════════════════════════════════════════════════

pub fn render_message(message: &Message) -> RenderedMessage {
    let spans = match message.role {
        Role::Assistant => emphasize_titles(&strip_markup(&message.content)),
        _ => vec![Span::plain(&message.content)],
    };
    RenderedMessage {
        role: message.role,
        spans,
    }
}

fn bold_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid bold regex"))
}

/// `Capitalized Title by Author`; small connector words may sit inside the title
fn attribution_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b([A-Z][\w'’:-]*(?:\s+(?:(?:of|the|and|a|an|in|on|to|for|with)\s+)*[A-Z][\w'’:-]*)*) by [A-Z]",
        )
        .expect("valid attribution regex")
    })
}

/// Split reply text into plain and title spans
pub fn emphasize_titles(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in bold_regex().captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_attributed(&mut spans, &text[last..whole.start()]);
        if !inner.as_str().is_empty() {
            spans.push(Span::title(inner.as_str()));
        }
        last = whole.end();
    }
    push_attributed(&mut spans, &text[last..]);

    merge_plain(spans)
}

fn push_attributed(spans: &mut Vec<Span>, text: &str) {
    let mut last = 0;
    for caps in attribution_regex().captures_iter(text) {
        let Some(title) = caps.get(1) else { continue };
        if title.start() > last {
            spans.push(Span::plain(&text[last..title.start()]));
        }
        spans.push(Span::title(title.as_str()));
        last = title.end();
    }
    if last < text.len() {
        spans.push(Span::plain(&text[last..]));
    }
}

fn merge_plain(spans: Vec<Span>) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(prev) if prev.style == SpanStyle::Plain && span.style == SpanStyle::Plain => {
                prev.text.push_str(&span.text);
            }
            _ => merged.push(span),
        }
    }
    merged
}

/// Reduce service HTML (paragraph divs, line breaks) to plain lines
pub fn strip_markup(text: &str) -> String {
    if !text.contains('<') {
        return text.to_string();
    }

    static BREAKS: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let breaks = BREAKS.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(div|p|li|ul|ol)>").expect("valid break regex")
    });
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

    let text = breaks.replace_all(text, "\n");
    let text = tags.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ═══════════════════════════════════════════════════════════════
// RECOMMENDATIONS
// ═══════════════════════════════════════════════════════════════

/// Card panel for a recommendation set; `None` clears the display
pub fn render_recommendations(books: &[Recommendation]) -> Option<RecommendationPanel> {
    if books.is_empty() {
        return None;
    }
    let cards = books
        .iter()
        .map(|book| BookCard {
            title: book.title.clone(),
            category: book.category.clone(),
            reading_time: book.reading_time.clone(),
            themes: (!book.themes.is_empty()).then(|| book.themes.clone()),
            summary: book.summary.clone(),
        })
        .collect();
    Some(RecommendationPanel {
        heading: RECOMMENDATIONS_HEADING,
        cards,
    })
}

/// Render a stored chat in order. Stored card lists feed the panel.
pub fn render_transcript(messages: &[Message]) -> Transcript {
    let mut transcript = Transcript::default();
    for message in messages {
        if message.role == Role::Recommendations {
            match message.parse_recommendations() {
                Ok(books) => transcript.panel = render_recommendations(&books),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable recommendations"),
            }
        } else {
            transcript.messages.push(render_message(message));
        }
    }
    transcript
}

// ═══════════════════════════════════════════════════════════════
// SESSION LIST
// ═══════════════════════════════════════════════════════════════

pub fn truncate_preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// First user message, truncated, or the placeholder
pub fn session_preview(messages: &[Message]) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| truncate_preview(&m.content))
        .unwrap_or_else(|| NEW_CHAT_PLACEHOLDER.to_string())
}

pub fn session_date(id: &str) -> String {
    models::session_created_at(id)
        .map(|at| at.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

/// Sidebar entries, newest first
pub fn render_session_list(chats: &SessionCollection, active_id: &str) -> Vec<SessionEntry> {
    models::ids_newest_first(chats)
        .into_iter()
        .map(|id| SessionEntry {
            id: id.clone(),
            preview: session_preview(&chats[id]),
            date: session_date(id),
            active: id == active_id,
        })
        .collect()
}

/// Keep entries whose preview contains `term`, ignoring case
pub fn filter_sessions(entries: Vec<SessionEntry>, term: &str) -> Vec<SessionEntry> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .filter(|e| e.preview.to_lowercase().contains(&term))
        .collect()
}

// ═══════════════════════════════════════════════════════════════
// WELCOME
// ═══════════════════════════════════════════════════════════════

pub fn welcome_message() -> String {
    let mut text = String::from(
        "Hello! I'm your AI book recommender, ready to help you discover your perfect next read.\n\n\
         Here are some ways you can ask for recommendations:\n",
    );
    for (i, suggestion) in WELCOME_SUGGESTIONS.iter().enumerate() {
        text.push_str(&format!("  [F{}] \"{}\"\n", i + 1, suggestion));
    }
    text.push_str("\nWhat kind of books would you like to explore today?");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(spans: &[Span]) -> Vec<&str> {
        spans
            .iter()
            .filter(|s| s.style == SpanStyle::Title)
            .map(|s| s.text.as_str())
            .collect()
    }

    #[test]
    fn test_user_and_error_are_plain() {
        let rendered = render_message(&Message::user("**not bold** Dune by Frank Herbert"));
        assert_eq!(rendered.spans, vec![Span::plain("**not bold** Dune by Frank Herbert")]);

        let rendered = render_message(&Message::error("Sorry"));
        assert_eq!(rendered.role, Role::Error);
        assert_eq!(rendered.text(), "Sorry");
    }

    #[test]
    fn test_bold_markers_become_titles() {
        let spans = emphasize_titles("Try **dune** next.");
        assert_eq!(
            spans,
            vec![Span::plain("Try "), Span::title("dune"), Span::plain(" next.")]
        );
    }

    #[test]
    fn test_attribution_without_markers() {
        let spans = emphasize_titles("I loved The Name of the Wind by Patrick Rothfuss.");
        assert_eq!(titles(&spans), vec!["The Name of the Wind"]);
        assert_eq!(
            spans.iter().map(|s| s.text.as_str()).collect::<String>(),
            "I loved The Name of the Wind by Patrick Rothfuss."
        );
    }

    #[test]
    fn test_lowercase_author_is_not_attribution() {
        let spans = emphasize_titles("Dune by someone unknown");
        assert!(titles(&spans).is_empty());
    }

    #[test]
    fn test_assistant_markup_is_stripped() {
        let msg = Message::assistant(
            "<div class=\"message-paragraph\">Try **Dune**.</div>\n<div class=\"message-paragraph\">Enjoy &amp; relax</div>",
        );
        let rendered = render_message(&msg);
        assert_eq!(rendered.text(), "Try Dune.\nEnjoy & relax");
        assert_eq!(titles(&rendered.spans), vec!["Dune"]);
    }

    #[test]
    fn test_plain_text_layout_survives() {
        let text = "Line one\n\n  indented";
        assert_eq!(strip_markup(text), text);
    }

    #[test]
    fn test_recommendation_cards() {
        let books = vec![
            Recommendation {
                title: "The Hobbit".into(),
                category: "Fantasy".into(),
                reading_time: "4 min read".into(),
                themes: vec!["adventure".into(), "home".into()],
                summary: "There and back again.".into(),
                similarity_score: None,
            },
            Recommendation {
                title: "Dune".into(),
                category: "Science Fiction".into(),
                reading_time: "6 min read".into(),
                themes: vec![],
                summary: "Spice.".into(),
                similarity_score: Some(0.5),
            },
        ];
        let panel = render_recommendations(&books).unwrap();
        assert_eq!(panel.heading, RECOMMENDATIONS_HEADING);
        assert_eq!(panel.cards.len(), 2);
        assert_eq!(panel.cards[0].themes.as_ref().unwrap().len(), 2);
        assert!(panel.cards[1].themes.is_none());
        assert!(render_recommendations(&[]).is_none());
    }

    #[test]
    fn test_transcript_expands_stored_cards() {
        let book = Recommendation {
            title: "Emma".into(),
            category: "Romance".into(),
            reading_time: String::new(),
            themes: vec![],
            summary: "Matchmaking.".into(),
            similarity_score: None,
        };
        let messages = vec![
            Message::user("romance"),
            Message::assistant("Here you go"),
            Message::recommendations(&[book]).unwrap(),
        ];
        let transcript = render_transcript(&messages);
        assert_eq!(transcript.messages.len(), 2);
        assert_eq!(transcript.panel.unwrap().cards[0].title, "Emma");
    }

    #[test]
    fn test_preview_truncation() {
        let forty_five = "a".repeat(45);
        assert_eq!(truncate_preview(&forty_five), format!("{}...", "a".repeat(40)));

        let forty = "b".repeat(40);
        assert_eq!(truncate_preview(&forty), forty);
    }

    #[test]
    fn test_preview_uses_first_user_message() {
        let messages = vec![
            Message::assistant("welcome"),
            Message::user("first question"),
            Message::user("second question"),
        ];
        assert_eq!(session_preview(&messages), "first question");
        assert_eq!(session_preview(&[Message::assistant("welcome")]), "New Chat");
    }

    #[test]
    fn test_session_list_order_and_active() {
        let mut chats = SessionCollection::new();
        chats.insert("1700000000000".into(), vec![Message::user("older")]);
        chats.insert("1800000000000".into(), vec![Message::user("newer")]);

        let entries = render_session_list(&chats, "1700000000000");
        assert_eq!(entries[0].preview, "newer");
        assert!(!entries[0].active);
        assert!(entries[1].active);
        assert_ne!(entries[0].date, UNKNOWN_DATE);
    }

    #[test]
    fn test_filter_sessions() {
        let mut chats = SessionCollection::new();
        chats.insert("1".into(), vec![Message::user("Fantasy epics")]);
        chats.insert("2".into(), vec![Message::user("Cookbooks")]);

        let entries = render_session_list(&chats, "1");
        let hits = filter_sessions(entries.clone(), "FANTASY");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
        assert_eq!(filter_sessions(entries, "  ").len(), 2);
    }

    #[test]
    fn test_welcome_lists_suggestions() {
        let text = welcome_message();
        for suggestion in WELCOME_SUGGESTIONS {
            assert!(text.contains(suggestion));
        }
    }
}
