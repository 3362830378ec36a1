//! Cache key generators for consistent key naming.
//!
//! Every key is a namespace followed by parts, joined with [`KEY_DELIMITER`].
//! Builders are pure: the same logical inputs always produce byte-identical
//! keys, so independent read and write call sites converge on one entry.
//! Parts must not contain the delimiter themselves; free text goes through
//! [`normalize_query`] first.

use std::fmt::{self, Display};

/// Separator between key segments.
pub const KEY_DELIMITER: char = ':';

/// Leading key segment identifying the entity category.
///
/// The string forms are shared with already-deployed consumers and must not
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    User,
    Book,
    Progress,
    Guide,
    Flashcard,
    Assessment,
    Search,
    Api,
    Leaderboard,
    Forum,
    Session,
    /// Used by the downstream analytics service.
    Analytics,
}

impl Namespace {
    /// Every namespace, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::User,
        Self::Book,
        Self::Progress,
        Self::Guide,
        Self::Flashcard,
        Self::Assessment,
        Self::Search,
        Self::Api,
        Self::Leaderboard,
        Self::Forum,
        Self::Session,
        Self::Analytics,
    ];

    /// The key prefix for this namespace.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Book => "book",
            Self::Progress => "progress",
            Self::Guide => "guide",
            Self::Flashcard => "flashcard",
            Self::Assessment => "assessment",
            Self::Search => "search",
            Self::Api => "api",
            Self::Leaderboard => "leaderboard",
            Self::Forum => "forum",
            Self::Session => "session",
            Self::Analytics => "analytics",
        }
    }

    /// Pattern matching every key in this namespace.
    #[must_use]
    pub fn pattern(self) -> String {
        format!("{}{}*", self.as_str(), KEY_DELIMITER)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Joins a namespace and parts with the key delimiter.
#[must_use]
pub fn build_key(namespace: Namespace, parts: &[&dyn Display]) -> String {
    let mut key = String::from(namespace.as_str());
    for part in parts {
        key.push(KEY_DELIMITER);
        key.push_str(&part.to_string());
    }
    key
}

/// Builds a key from a namespace and any number of displayable parts.
///
/// ```ignore
/// let key = cache_key!(Namespace::Book, book_id, "progress");
/// ```
#[macro_export]
macro_rules! cache_key {
    ($namespace:expr $(, $part:expr)* $(,)?) => {
        $crate::keys::build_key(
            $namespace,
            &[$(&$part as &dyn ::std::fmt::Display),*],
        )
    };
}

/// Normalizes free text so equivalent queries share one key.
///
/// Lowercases, trims, collapses runs of whitespace into a single `_`, and
/// replaces the key delimiter so the text stays one segment.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
        .replace(KEY_DELIMITER, "_")
}

fn scoped(namespace: Namespace, id: &dyn Display, parts: &[&dyn Display]) -> String {
    let mut all: Vec<&dyn Display> = Vec::with_capacity(parts.len() + 1);
    all.push(id);
    all.extend_from_slice(parts);
    build_key(namespace, &all)
}

/// `user:<id>[:parts...]`
#[must_use]
pub fn user_key(user_id: impl Display, parts: &[&dyn Display]) -> String {
    scoped(Namespace::User, &user_id, parts)
}

/// `book:<id>[:parts...]`
#[must_use]
pub fn book_key(book_id: impl Display, parts: &[&dyn Display]) -> String {
    scoped(Namespace::Book, &book_id, parts)
}

/// `progress:<user>:<book>`
#[must_use]
pub fn progress_key(user_id: impl Display, book_id: impl Display) -> String {
    build_key(Namespace::Progress, &[&user_id, &book_id])
}

/// `guide:<book>`
#[must_use]
pub fn guide_key(book_id: impl Display) -> String {
    build_key(Namespace::Guide, &[&book_id])
}

/// `flashcard:<user>[:parts...]`
#[must_use]
pub fn flashcard_key(user_id: impl Display, parts: &[&dyn Display]) -> String {
    scoped(Namespace::Flashcard, &user_id, parts)
}

/// `assessment:<id>[:parts...]`
#[must_use]
pub fn assessment_key(id: impl Display, parts: &[&dyn Display]) -> String {
    scoped(Namespace::Assessment, &id, parts)
}

/// `search:<normalized query>[:filters...]`
#[must_use]
pub fn search_key(query: &str, filters: &[&dyn Display]) -> String {
    scoped(Namespace::Search, &normalize_query(query), filters)
}

/// `api:<route>[:params...]`
#[must_use]
pub fn api_key(route: impl Display, params: &[&dyn Display]) -> String {
    scoped(Namespace::Api, &route, params)
}

/// `leaderboard:<type>:<timeframe>:<page>`
#[must_use]
pub fn leaderboard_key(kind: impl Display, timeframe: impl Display, page: u32) -> String {
    build_key(Namespace::Leaderboard, &[&kind, &timeframe, &page])
}

/// `forum:<id>[:parts...]`
#[must_use]
pub fn forum_key(id: impl Display, parts: &[&dyn Display]) -> String {
    scoped(Namespace::Forum, &id, parts)
}

/// `session:<id>`
#[must_use]
pub fn session_key(session_id: impl Display) -> String {
    build_key(Namespace::Session, &[&session_id])
}

/// `analytics:<scope>[:parts...]`
#[must_use]
pub fn analytics_key(scope: impl Display, parts: &[&dyn Display]) -> String {
    scoped(Namespace::Analytics, &scope, parts)
}

/// Escapes glob metacharacters so `text` only matches itself in a `SCAN` pattern.
#[must_use]
pub fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Pattern catching keys where `id` appears as an inner segment.
///
/// The id is matched literally.
#[must_use]
pub fn id_segment_pattern(id: impl Display) -> String {
    format!("*{}{}{}*", KEY_DELIMITER, escape_glob(&id.to_string()), KEY_DELIMITER)
}
