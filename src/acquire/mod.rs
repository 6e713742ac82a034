//! The acquisition engine.
//!
//! A run sizes the result set once, splits it into pages, fetches the pages
//! concurrently under the library's [`Pacing`](crate::library::Pacing)
//! constraint and streams every publication through a bounded
//! [`Delivery`] queue. The first failure cancels the rest of the run and
//! becomes the queue's terminal error.
//!
//! ```rust,no_run
//! use research_harvest::acquire::Acquirer;
//! use research_harvest::library::MockLibrary;
//! use research_harvest::models::Request;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let acquirer = Acquirer::new(Arc::new(MockLibrary::new(100)));
//! let mut queue = acquirer
//!     .acquire(Request::new("graph neural networks"), CancellationToken::new())
//!     .await;
//!
//! while let Some(publication) = queue.recv().await {
//!     println!("{}", publication.title);
//! }
//! if let Some(err) = queue.err() {
//!     eprintln!("partial run: {}", err);
//! }
//! # }
//! ```

mod delivery;
mod orchestrator;
mod pacing;

pub use delivery::{channel, Delivery, DeliveryError, Feeder, Publisher};
pub use orchestrator::{AcquireError, Acquirer, PublicationQueue, DEFAULT_QUEUE_CAPACITY};
pub use pacing::{Admission, PacingGate};
