//! # Research Harvest
//!
//! Acquisition engine for paginated literature search services.
//!
//! Given a query and a literature library, a run sizes the result set once,
//! fetches every page concurrently under the library's pacing constraint and
//! streams each publication to a single consumer. The first failure stops the
//! run; everything already delivered stays delivered.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Request, Response, Publication)
//! - [`library`]: Literature backends with an extensible trait-based architecture
//! - [`acquire`]: The fetch orchestrator, pacing gates and the delivery queue
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal output for the CLI
//! - [`utils`]: HTTP client

pub mod acquire;
pub mod config;
pub mod library;
pub mod models;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use acquire::{AcquireError, Acquirer, Delivery, PublicationQueue};
pub use library::{Library, LibraryError, LibraryRegistry, Pacing};
pub use models::{Publication, Request, Response};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
