//! Permissive decoders for the `/query` and `/upsert` request bodies.
//!
//! Both parsers follow the same rules:
//!
//! - The body must be a JSON object holding a `"queries"` (or `"documents"`)
//!   array. Any other shape decodes to an empty list.
//! - Elements that are not objects, or that lack the required string field
//!   (`query` / `text`), are dropped without error.
//! - Optional fields with the wrong JSON type are ignored and keep their
//!   default.
//!
//! Each parser owns its reader until [`parse`](QueryParser::parse) finishes
//! or [`close`](QueryParser::close) is called; the reader is dropped exactly
//! once and closing twice is a no-op.
//!
//! ```rust
//! use entity::QueryParser;
//!
//! let body = br#"{"queries":[{"query":"Q","top_k":10},{"top_k":1},"junk"]}"#;
//! let mut parser = QueryParser::new(&body[..]);
//! let queries = parser.parse().unwrap();
//!
//! assert_eq!(queries.len(), 1);
//! assert_eq!(queries[0].top_k(), 10);
//! ```
use std::io::Read;

use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{Document, Metadata};
use crate::error::ParseError;
use crate::query::{Filter, Query};

/// Decodes `{"queries":[...]}` into [`Query`] values.
#[derive(Debug)]
pub struct QueryParser<R> {
    reader: Option<R>,
}

impl<R: Read> QueryParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }

    /// Consume the reader and decode every well-formed query.
    pub fn parse(&mut self) -> Result<Vec<Query>, ParseError> {
        let body = read_body(self.reader.take())?;
        let queries: Vec<Query> = elements(&body, "queries")
            .iter()
            .filter_map(parse_query)
            .collect();
        debug!(count = queries.len(), "parsed queries");
        Ok(queries)
    }

    /// Release the reader if parsing has not already done so.
    pub fn close(&mut self) {
        self.reader.take();
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

/// Decodes `{"documents":[...]}` into [`Document`] values.
#[derive(Debug)]
pub struct DocumentParser<R> {
    reader: Option<R>,
}

impl<R: Read> DocumentParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }

    /// Consume the reader and decode every well-formed document.
    pub fn parse(&mut self) -> Result<Vec<Document>, ParseError> {
        let body = read_body(self.reader.take())?;
        let documents: Vec<Document> = elements(&body, "documents")
            .iter()
            .filter_map(parse_document)
            .collect();
        debug!(count = documents.len(), "parsed documents");
        Ok(documents)
    }

    pub fn close(&mut self) {
        self.reader.take();
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

// The reader is moved in here and dropped on return, whatever the outcome.
fn read_body<R: Read>(reader: Option<R>) -> Result<Value, ParseError> {
    let reader = reader.ok_or(ParseError::Closed)?;
    Ok(serde_json::from_reader(reader)?)
}

fn elements<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    body.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn object_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    map.get(key).and_then(Value::as_object)
}

/// Any JSON number, truncated toward zero and saturated to `i32`.
fn int_field(map: &Map<String, Value>, key: &str) -> Option<i32> {
    let number = map.get(key)?.as_number()?;
    let value = match number.as_i64() {
        Some(v) => v,
        None => number.as_f64().map(|f| f as i64)?,
    };
    Some(value.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

fn parse_query(value: &Value) -> Option<Query> {
    let map = value.as_object()?;
    let text = str_field(map, "query")?;
    if text.is_empty() {
        return None;
    }

    let mut query = Query::new(text);
    if let Some(top_k) = int_field(map, "top_k") {
        query = query.with_top_k(top_k);
    }
    if let Some(filter_map) = object_field(map, "filter") {
        query = query.with_filter(parse_filter(filter_map));
    }
    Some(query)
}

fn parse_filter(map: &Map<String, Value>) -> Filter {
    let mut filter = Filter::new();
    if let Some(document_id) = str_field(map, "document_id") {
        filter = filter.with_document_id(document_id);
    }
    if let Some(source) = str_field(map, "source") {
        filter = filter.with_source(source);
    }
    if let Some(source_id) = str_field(map, "source_id") {
        filter = filter.with_source_id(source_id);
    }
    if let Some(author) = str_field(map, "author") {
        filter = filter.with_author(author);
    }
    if let Some(start_date) = str_field(map, "start_date") {
        filter = filter.with_start_date(start_date);
    }
    if let Some(end_date) = str_field(map, "end_date") {
        filter = filter.with_end_date(end_date);
    }
    filter
}

fn parse_document(value: &Value) -> Option<Document> {
    let map = value.as_object()?;
    let text = str_field(map, "text")?;

    let mut document = Document::new(text);
    if let Some(id) = str_field(map, "id") {
        document = document.with_id(id);
    }
    if let Some(metadata_map) = object_field(map, "metadata") {
        document = document.with_metadata(parse_metadata(metadata_map));
    }
    Some(document)
}

fn parse_metadata(map: &Map<String, Value>) -> Metadata {
    let mut metadata = Metadata::new();
    if let Some(source) = str_field(map, "source") {
        metadata = metadata.with_source(source);
    }
    if let Some(source_id) = str_field(map, "source_id") {
        metadata = metadata.with_source_id(source_id);
    }
    if let Some(url) = str_field(map, "url") {
        metadata = metadata.with_url(url);
    }
    if let Some(author) = str_field(map, "author") {
        metadata = metadata.with_author(author);
    }
    if let Some(created_at) = str_field(map, "created_at") {
        metadata = metadata.with_created_at(created_at);
    }
    metadata
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::rc::Rc;

    use super::*;
    use crate::source::Source;

    fn parse_queries(body: &str) -> Vec<Query> {
        QueryParser::new(body.as_bytes())
            .parse()
            .expect("body should parse")
    }

    fn parse_documents(body: &str) -> Vec<Document> {
        DocumentParser::new(body.as_bytes())
            .parse()
            .expect("body should parse")
    }

    #[test]
    fn test_parse_full_query() {
        let body = r#"{
          "queries": [
            {
              "query": "QUERY",
              "filter": {
                "document_id": "DOCUMENT_ID",
                "source": "email",
                "source_id": "SOURCE_ID",
                "author": "AUTHOR",
                "start_date": "2013-05-11T21:23:58.970460+07:00",
                "end_date": "2013-05-05 12:30:45"
              },
              "top_k": 10
            }
          ]
        }"#;

        let queries = parse_queries(body);
        assert_eq!(queries.len(), 1);
        let query = &queries[0];
        assert_eq!(query.text(), "QUERY");
        assert_eq!(query.top_k(), 10);
        let filter = query.filter();
        assert_eq!(filter.document_id(), Some("DOCUMENT_ID"));
        assert_eq!(filter.source(), Source::Email);
        assert_eq!(filter.source_id(), Some("SOURCE_ID"));
        assert_eq!(filter.author(), Some("AUTHOR"));
        assert_eq!(filter.start_date().as_deref(), Some("2013-05-11T14:23:58.970Z"));
        assert_eq!(filter.end_date().as_deref(), Some("2013-05-05T12:30:45.000Z"));
    }

    #[test]
    fn test_missing_top_k_defaults_to_three() {
        let queries = parse_queries(r#"{"queries":[{"query":"a"},{"query":"b","top_k":"7"}]}"#);
        assert_eq!(queries.len(), 2);
        assert!(queries.iter().all(|q| q.top_k() == 3));
    }

    #[test]
    fn test_fractional_and_huge_top_k() {
        let queries = parse_queries(
            r#"{"queries":[{"query":"a","top_k":4.9},{"query":"b","top_k":99999999999}]}"#,
        );
        assert_eq!(queries[0].top_k(), 4);
        assert_eq!(queries[1].top_k(), i32::MAX);
    }

    #[test]
    fn test_invalid_elements_are_dropped() {
        let body = r#"{"queries":[
            "text",
            42,
            {"top_k": 2},
            {"query": 12},
            {"query": ""},
            {"query": "kept", "filter": "not-an-object"}
        ]}"#;
        let queries = parse_queries(body);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].text(), "kept");
        assert_eq!(queries[0].filter(), &Filter::default());
    }

    #[test]
    fn test_whitespace_query_text_is_kept_verbatim() {
        let queries = parse_queries(r#"{"queries":[{"query":"   "},{"query":" a "}]}"#);
        let texts: Vec<&str> = queries.iter().map(Query::text).collect();
        assert_eq!(texts, ["   ", " a "]);
    }

    #[test]
    fn test_mistyped_filter_fields_are_skipped() {
        let body = r#"{"queries":[{"query":"q","filter":{
            "document_id": 1, "source": ["email"], "author": "ann", "start_date": "not a date"
        }}]}"#;
        let queries = parse_queries(body);
        let filter = queries[0].filter();
        assert_eq!(filter.document_id(), None);
        assert_eq!(filter.source(), Source::Unknown);
        assert_eq!(filter.author(), Some("ann"));
        assert_eq!(filter.start_date(), None);
    }

    #[test]
    fn test_wrong_top_level_shapes_yield_empty() {
        for body in [r#"{}"#, r#"{"queries":{}}"#, r#"[]"#, r#""queries""#, "null"] {
            assert!(parse_queries(body).is_empty(), "body {body}");
            assert!(parse_documents(body).is_empty(), "body {body}");
        }
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = QueryParser::new(&b"{\"queries\": ["[..]).parse().unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn test_reader_failure_is_io_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("connection reset"))
            }
        }
        let err = DocumentParser::new(Broken).parse().unwrap_err();
        assert!(matches!(err, ParseError::Io(_)));
    }

    #[test]
    fn test_parse_full_document() {
        let body = r#"{"documents":[{
            "id": "doc-1",
            "text": "hello",
            "metadata": {
                "source": "FILE",
                "source_id": "notes.txt",
                "url": "https://example.com/notes.txt",
                "author": "kim",
                "created_at": "2013-05-11T21:23:58.970460+07:00"
            }
        }]}"#;
        let documents = parse_documents(body);
        assert_eq!(documents.len(), 1);
        let doc = &documents[0];
        assert_eq!(doc.id(), Some("doc-1"));
        assert_eq!(doc.text(), "hello");
        let metadata = doc.metadata();
        assert_eq!(metadata.source(), Source::File);
        assert_eq!(metadata.source_id(), Some("notes.txt"));
        assert_eq!(metadata.url(), Some("https://example.com/notes.txt"));
        assert_eq!(metadata.author(), Some("kim"));
        assert_eq!(metadata.created_at().as_deref(), Some("2013-05-11T14:23:58.970Z"));
    }

    #[test]
    fn test_documents_without_text_are_dropped() {
        let body = r#"{"documents":[{"id":"a"},{"text":null},{"text":"","id":7},[1]]}"#;
        let documents = parse_documents(body);
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text(), "");
        assert_eq!(documents[0].id(), None);
    }

    #[test]
    fn test_reader_released_once() {
        let shared = Rc::new(());
        struct Tracked(Cursor<Vec<u8>>, Rc<()>);
        impl Read for Tracked {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                self.0.read(buf)
            }
        }

        let reader = Tracked(Cursor::new(br#"{"queries":[]}"#.to_vec()), Rc::clone(&shared));
        let mut parser = QueryParser::new(reader);
        assert_eq!(Rc::strong_count(&shared), 2);
        assert!(parser.parse().unwrap().is_empty());
        assert_eq!(Rc::strong_count(&shared), 1);
        assert!(parser.is_closed());

        parser.close();
        parser.close();
        assert!(matches!(parser.parse(), Err(ParseError::Closed)));
    }

    #[test]
    fn test_close_before_parse() {
        let mut parser = DocumentParser::new(&b"{}"[..]);
        parser.close();
        assert!(parser.is_closed());
        assert!(matches!(parser.parse(), Err(ParseError::Closed)));
    }
}
