//! Literature libraries with an extensible trait-based architecture.
//!
//! This module defines the [`Library`] trait that every literature backend
//! implements. The acquisition engine only ever talks to a library through
//! this trait, so new backends can be added by implementing it and
//! registering them with the [`LibraryRegistry`].
//!
//! # Pacing
//!
//! Each library declares exactly one [`Pacing`] constraint, which the
//! orchestrator turns into an admission gate in front of every page fetch:
//!
//! - [`Pacing::MaxConcurrent`] - at most N page fetches in flight
//! - [`Pacing::MinInterval`] - page fetches start no faster than one every D
//!
//! # Layered capabilities
//!
//! Libraries may serve more than the acquisition contract. Abstract retrieval
//! lives in the separate [`AbstractSource`] trait and is advertised through
//! [`LibraryCapabilities::ABSTRACTS`]; the orchestrator never requires it.

pub mod mock;
mod registry;
pub mod scopus;

pub use mock::MockLibrary;
pub use registry::{LibraryCapabilities, LibraryRegistry};
pub use scopus::ScopusLibrary;

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::models::{Abstract, Publication, Request, Response, DEFAULT_PER_PAGE};
use async_trait::async_trait;

/// How aggressively the orchestrator may drive a library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// At most this many page fetches in flight at once
    MaxConcurrent(NonZeroUsize),

    /// Page fetches are admitted no faster than one per interval
    MinInterval(Duration),
}

impl std::fmt::Display for Pacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pacing::MaxConcurrent(n) => write!(f, "max {} concurrent requests", n),
            Pacing::MinInterval(d) => write!(f, "one request every {}ms", d.as_millis()),
        }
    }
}

/// The Library trait defines the contract between the acquisition engine and
/// any literature backend.
///
/// # Implementing a New Library
///
/// 1. Create a struct that implements `Library`
/// 2. Implement `fetch_page` and `total_count` against the backend's API
/// 3. Declare the backend's pacing constraint
/// 4. Register it with [`LibraryRegistry::register`]
///
/// Implementations must not retry internally; a failed page aborts the run.
#[async_trait]
pub trait Library: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this library (e.g. "scopus")
    fn id(&self) -> &str;

    /// Human-readable name of this library
    fn name(&self) -> &str;

    /// Describe the capabilities of this library
    fn capabilities(&self) -> LibraryCapabilities {
        LibraryCapabilities::PAGES
    }

    /// Page size used when the request leaves it unresolved
    fn default_per_page(&self) -> usize {
        DEFAULT_PER_PAGE
    }

    /// Pacing constraint, constant for the lifetime of a run
    fn pacing(&self) -> Pacing;

    /// Fetch exactly the page identified by `request.page` and `request.per_page`
    async fn fetch_page(&self, request: &Request) -> Result<Response, LibraryError>;

    /// Total number of publications matching the query, independent of pagination
    async fn total_count(&self, request: &Request) -> Result<usize, LibraryError>;
}

/// Libraries that can retrieve abstracts for publications they delivered
#[async_trait]
pub trait AbstractSource: Send + Sync {
    async fn fetch_abstract(&self, publication: &Publication) -> Result<Abstract, LibraryError>;
}

/// Errors that can occur when interacting with a library
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LibraryError {
    /// The requested operation is not implemented for this library
    #[error("Operation not implemented for this library")]
    NotImplemented,

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (JSON, dates, counts)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Publication or resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// API error from the library
    #[error("API error: {0}")]
    Api(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for LibraryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LibraryError::Parse(err.to_string())
        } else {
            LibraryError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::Parse(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_capabilities() {
        let caps = LibraryCapabilities::PAGES | LibraryCapabilities::ABSTRACTS;

        assert!(caps.contains(LibraryCapabilities::PAGES));
        assert!(caps.contains(LibraryCapabilities::ABSTRACTS));
        assert!(!LibraryCapabilities::PAGES.contains(LibraryCapabilities::ABSTRACTS));
    }

    #[test]
    fn test_pacing_display() {
        let slots = Pacing::MaxConcurrent(NonZeroUsize::new(6).unwrap());
        assert_eq!(slots.to_string(), "max 6 concurrent requests");

        let ticker = Pacing::MinInterval(Duration::from_millis(166));
        assert_eq!(ticker.to_string(), "one request every 166ms");
    }

    #[test]
    fn test_json_error_is_parse() {
        let err: LibraryError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, LibraryError::Parse(_)));
    }
}
