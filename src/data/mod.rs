//! Data persistence module
//!
//! Durable JSON documents rewritten atomically

mod document;

pub use document::{read_document, temp_path, write_document, DocumentError};
