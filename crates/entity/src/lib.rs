//! Retrieval plugin entities
//!
//! This is where request bodies become typed values. Clients of the plugin
//! API are loose about what they send, so decoding here is deliberately
//! forgiving: a bad element is dropped, a bad field is ignored, a bad date is
//! treated as unset. Only a body that is not JSON at all is an error.
//!
//! ## What lives here
//!
//! - **[`Source`]** - the closed set of document origins
//! - **[`Query`] / [`Filter`]** - search requests from `/query`
//! - **[`Document`] / [`Metadata`]** - ingestion items from `/upsert`
//! - **[`QueryParser`] / [`DocumentParser`]** - body decoders that own their reader
//! - **[`date`]** - flexible date parsing and UTC rendering
//!
//! ## Example
//!
//! ```
//! use entity::{DocumentParser, Source};
//!
//! let body = br#"{"documents":[{"text":"hi","metadata":{"source":"chat"}}]}"#;
//! let documents = DocumentParser::new(&body[..]).parse().unwrap();
//!
//! assert_eq!(documents.len(), 1);
//! assert_eq!(documents[0].metadata().source(), Source::Chat);
//! ```

pub mod date;
mod document;
mod error;
mod parser;
mod query;
mod source;

pub use crate::document::{Document, Metadata};
pub use crate::error::ParseError;
pub use crate::parser::{DocumentParser, QueryParser};
pub use crate::query::{Filter, Query, DEFAULT_TOP_K};
pub use crate::source::Source;
