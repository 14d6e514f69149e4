//! Documents decoded from the `/upsert` endpoint.
use crate::date;
use crate::source::Source;

/// Descriptive attributes carried alongside a [`Document`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    source: Source,
    source_id: Option<String>,
    url: Option<String>,
    author: Option<String>,
    created_at: i64,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Source::parse(source);
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Unparseable values leave the timestamp unset.
    pub fn with_created_at(mut self, created_at: &str) -> Self {
        self.created_at = date::parse(created_at);
        self
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Epoch milliseconds, `0` when unset.
    pub fn created_at_millis(&self) -> i64 {
        self.created_at
    }

    pub fn created_at(&self) -> Option<String> {
        date::format(self.created_at)
    }
}

/// A single item to ingest.
///
/// # Examples
///
/// ```rust
/// use entity::{Document, Metadata, Source};
///
/// let doc = Document::new("Meeting notes")
///     .with_id("notes-1")
///     .with_metadata(Metadata::new().with_source("chat").with_author("kim"));
///
/// assert_eq!(doc.id(), Some("notes-1"));
/// assert_eq!(doc.metadata().source(), Source::Chat);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: Option<String>,
    text: String,
    metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            metadata: Metadata::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
