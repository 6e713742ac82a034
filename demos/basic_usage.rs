//! Basic usage example for the Research Harvest library.
//!
//! Streams a complete run from the mock library, then shows what a consumer
//! sees when a page fails halfway through.

use research_harvest::acquire::Acquirer;
use research_harvest::library::{LibraryError, MockLibrary};
use research_harvest::models::Request;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let library = Arc::new(MockLibrary::new(120).with_latency(Duration::from_millis(20)));
    let acquirer = Acquirer::new(library);

    let mut queue = acquirer
        .acquire(Request::new("machine learning transformers"), CancellationToken::new())
        .await;
    println!("Expecting up to {} publications", queue.declared_max());

    while let Some(publication) = queue.recv().await {
        if queue.received() <= 3 {
            println!("  {} [{}]", publication.title, publication.bib_id());
        }
    }
    match queue.err() {
        Some(e) => println!("Run aborted after {}: {}", queue.received(), e),
        None => println!("Received all {} publications\n", queue.received()),
    }

    // A failing page stops the run; what was delivered stays delivered
    let failing = Arc::new(
        MockLibrary::new(120).failing_pages([3], LibraryError::Api("quota exceeded".to_string())),
    );
    let (items, result) = Acquirer::new(failing)
        .acquire(Request::new("q").per_page(20), CancellationToken::new())
        .await
        .collect_all()
        .await;

    println!("Partial run delivered {} publications", items.len());
    if let Err(e) = result {
        println!("Terminal error: {}", e);
    }

    Ok(())
}
