//! The closed set of document origins understood by the plugin API.
//!
//! Clients send the source as a free-form string (`"email"`, `"FILE"`, ...).
//! Anything outside the known members collapses to [`Source::Unknown`]; a bad
//! source value is never a request error.
use serde::{Deserialize, Serialize};

/// Where a document came from.
///
/// | Member | `name()` | `label()` |
/// |--------|----------|-----------|
/// | `Unknown` | `UNKNOWN` | `None` |
/// | `Email` | `EMAIL` | `Some("email")` |
/// | `File` | `FILE` | `Some("file")` |
/// | `Chat` | `CHAT` | `Some("chat")` |
///
/// # Examples
///
/// ```rust
/// use entity::Source;
///
/// assert_eq!(Source::parse("Email"), Source::Email);
/// assert_eq!(Source::parse("fax"), Source::Unknown);
/// assert_eq!(Source::Chat.label(), Some("chat"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Unknown,
    Email,
    File,
    Chat,
}

impl Source {
    /// Resolve a client-supplied value, ignoring ASCII case.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("email") {
            Source::Email
        } else if value.eq_ignore_ascii_case("file") {
            Source::File
        } else if value.eq_ignore_ascii_case("chat") {
            Source::Chat
        } else {
            Source::Unknown
        }
    }

    /// Upper-case member name.
    pub fn name(&self) -> &'static str {
        match self {
            Source::Unknown => "UNKNOWN",
            Source::Email => "EMAIL",
            Source::File => "FILE",
            Source::Chat => "CHAT",
        }
    }

    /// Value stored in the index label field, `None` for [`Source::Unknown`].
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Source::Unknown => None,
            Source::Email => Some("email"),
            Source::File => Some("file"),
            Source::Chat => Some("chat"),
        }
    }

    /// Map an index label back to a source. Labels are matched exactly.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "email" => Some(Source::Email),
            "file" => Some(Source::File),
            "chat" => Some(Source::Chat),
            _ => None,
        }
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Source::parse(value)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
