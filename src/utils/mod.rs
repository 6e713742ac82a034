//! Utility modules shared by the literature libraries.
//!
//! - [`HttpClient`]: shared reqwest client with user agent and timeouts

mod http;

pub use http::{HttpClient, DEFAULT_TIMEOUT};
