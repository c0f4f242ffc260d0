//! Utility functions shared by the fetch, parse and CLI layers.
//!
//! - **URL validation**: absolute http(s) check with an optional private-host guard
//! - **Text processing**: cleaning feed text and fitting it to terminal width

mod text;
mod url_validator;

pub use text::{clean_text, truncate_to_width};
pub use url_validator::{validate_url, HostPolicy, UrlValidationError};
