//! Dataset import pipeline: fetch, unpack, parse, route.

mod bundle;
mod error;
mod fetch;
mod manager;
mod parser;

pub use bundle::{Payload, unpack};
pub use error::{FetchError, ImportError, ParseError, UnpackError};
pub use fetch::{FetchConfig, Fetcher, HttpFetcher};
pub use manager::{DatasetOutcome, DatasetReport, ImportConfig, ImportManager, ImportReport};
pub use parser::{JsonEntityParser, Parser, ParserRegistry};
