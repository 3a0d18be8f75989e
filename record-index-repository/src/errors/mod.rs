//! Error types for the record index repository.

mod search_error;

pub use search_error::SearchError;
