//! Service layer.
//!
//! Business logic shared by the CLI and the HTTP server.

pub mod batch;
pub mod parser;

pub use batch::{BatchEvent, BatchRunner, JobSummary};
pub use parser::{ParseOutcome, ParserService, ServiceError, PARSE_ATTEMPTS};
