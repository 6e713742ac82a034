//! Mock library for testing purposes.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::library::{AbstractSource, Library, LibraryCapabilities, LibraryError, Pacing};
use crate::models::{Abstract, Publication, PublicationBuilder, Request, Response};

/// A mock library serving `total` synthetic publications.
///
/// Failures can be injected for the sizing call, for specific pages or for
/// every page. Request and delivery counters are atomic so tests can inspect
/// them after a concurrent run.
#[derive(Debug)]
pub struct MockLibrary {
    total: usize,
    pacing: Pacing,
    latency: Duration,
    page_latency: HashMap<usize, Duration>,
    count_error: Option<LibraryError>,
    page_error: Option<LibraryError>,
    failing_pages: Option<HashSet<usize>>,
    requests: AtomicUsize,
    served: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLibrary {
    /// Create a new mock library with `total` publications and 4 concurrent slots
    pub fn new(total: usize) -> Self {
        Self {
            total,
            pacing: Pacing::MaxConcurrent(NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN)),
            latency: Duration::ZERO,
            page_latency: HashMap::new(),
            count_error: None,
            page_error: None,
            failing_pages: None,
            requests: AtomicUsize::new(0),
            served: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Set the declared pacing constraint
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Delay every page fetch by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay fetches of `page` by `latency` instead of the library-wide latency
    pub fn with_page_latency(mut self, page: usize, latency: Duration) -> Self {
        self.page_latency.insert(page, latency);
        self
    }

    /// Make `total_count` fail with `error`
    pub fn failing_count(mut self, error: LibraryError) -> Self {
        self.count_error = Some(error);
        self
    }

    /// Make fetches of the given pages fail with `error`
    pub fn failing_pages(mut self, pages: impl IntoIterator<Item = usize>, error: LibraryError) -> Self {
        self.failing_pages = Some(pages.into_iter().collect());
        self.page_error = Some(error);
        self
    }

    /// Make every page fetch fail with `error`
    pub fn failing_every_page(mut self, error: LibraryError) -> Self {
        self.failing_pages = None;
        self.page_error = Some(error);
        self
    }

    /// Number of `fetch_page` calls received
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of publications returned by successful fetches
    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent `fetch_page` calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn page_fails(&self, page: usize) -> Option<LibraryError> {
        let error = self.page_error.as_ref()?;
        match &self.failing_pages {
            Some(pages) if !pages.contains(&page) => None,
            _ => Some(error.clone()),
        }
    }

    fn publications(&self, request: &Request) -> Result<Vec<Publication>, LibraryError> {
        let start = request.offset();
        if start > self.total {
            return Err(LibraryError::InvalidRequest(format!(
                "request out of bounds: {} over {}",
                start, self.total
            )));
        }
        let size = (self.total - start).min(request.per_page);
        let cover_date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN);

        Ok((start..start + size)
            .map(|i| {
                PublicationBuilder::new(format!("pub #{}", i), "Ciuck Taylor", cover_date)
                    .value("index", i.to_string())
                    .value("page", request.page.to_string())
                    .build()
            })
            .collect())
    }
}

/// Decrements the in-flight counter when a fetch ends, however it ends
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Library for MockLibrary {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Library"
    }

    fn capabilities(&self) -> LibraryCapabilities {
        LibraryCapabilities::PAGES | LibraryCapabilities::ABSTRACTS
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    async fn fetch_page(&self, request: &Request) -> Result<Response, LibraryError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = self
            .page_latency
            .get(&request.page)
            .copied()
            .unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.page_fails(request.page) {
            return Err(error);
        }

        let literature = self.publications(request)?;
        self.served.fetch_add(literature.len(), Ordering::SeqCst);
        Ok(Response::new(request.clone(), literature))
    }

    async fn total_count(&self, _request: &Request) -> Result<usize, LibraryError> {
        match &self.count_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.total),
        }
    }
}

#[async_trait]
impl AbstractSource for MockLibrary {
    async fn fetch_abstract(&self, publication: &Publication) -> Result<Abstract, LibraryError> {
        Ok(Abstract::new(format!("Abstract of {}", publication.title)))
    }
}
