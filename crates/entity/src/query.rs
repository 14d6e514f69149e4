//! Search requests decoded from the `/query` endpoint.
use crate::date;
use crate::source::Source;

/// Result count used when the client sends no `top_k`.
pub const DEFAULT_TOP_K: i32 = 3;

/// Optional constraints attached to a [`Query`].
///
/// Dates are held as epoch milliseconds; `0` means unset and the string
/// accessors return `None` for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    document_id: Option<String>,
    source: Source,
    source_id: Option<String>,
    author: Option<String>,
    start_date: i64,
    end_date: i64,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Unknown source strings leave the filter at [`Source::Unknown`].
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Source::parse(source);
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Unparseable dates leave the bound unset.
    pub fn with_start_date(mut self, start_date: &str) -> Self {
        self.start_date = date::parse(start_date);
        self
    }

    pub fn with_end_date(mut self, end_date: &str) -> Self {
        self.end_date = date::parse(end_date);
        self
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Lower bound rendered as `yyyy-MM-ddTHH:mm:ss.SSSZ`.
    pub fn start_date(&self) -> Option<String> {
        date::format(self.start_date)
    }

    /// Upper bound rendered as `yyyy-MM-ddTHH:mm:ss.SSSZ`.
    pub fn end_date(&self) -> Option<String> {
        date::format(self.end_date)
    }
}

/// A single search request.
///
/// # Examples
///
/// ```rust
/// use entity::{Filter, Query, Source};
///
/// let query = Query::new("quarterly report")
///     .with_top_k(5)
///     .with_filter(Filter::new().with_source("email"));
///
/// assert_eq!(query.top_k(), 5);
/// assert_eq!(query.filter().source(), Source::Email);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    top_k: i32,
    filter: Filter,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: DEFAULT_TOP_K,
            filter: Filter::default(),
        }
    }

    /// Stored as given; callers decide how non-positive values are treated.
    pub fn with_top_k(mut self, top_k: i32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn top_k(&self) -> i32 {
        self.top_k
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}
