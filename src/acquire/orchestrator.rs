//! Fetch orchestrator driving one query run to completion or first failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::acquire::delivery::{channel, Delivery, DeliveryError, Feeder, Publisher};
use crate::acquire::pacing::PacingGate;
use crate::library::{Library, LibraryError};
use crate::models::{Publication, Request};

/// Items buffered between fetch tasks and the consumer
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Delivery queue of publications produced by one run
pub type PublicationQueue = Delivery<Publication>;

/// Terminal error of a literature run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// The total count could not be read; no page was attempted
    #[error("get max literature: {0}")]
    Sizing(#[source] LibraryError),

    /// A page fetch failed and aborted the run
    #[error("get literature: page {page}: {source}")]
    Page {
        page: usize,
        #[source]
        source: LibraryError,
    },

    /// The run was cancelled by the caller
    #[error("literature run cancelled")]
    Cancelled,

    /// Items could not be handed to the consumer
    #[error("deliver literature: {0}")]
    Delivery(#[from] DeliveryError),

    /// A fetch task panicked or the queue was abandoned
    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Drives paginated acquisition against one library
#[derive(Debug, Clone)]
pub struct Acquirer {
    library: Arc<dyn Library>,
    queue_capacity: usize,
}

impl Acquirer {
    pub fn new(library: Arc<dyn Library>) -> Self {
        Self {
            library,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set how many publications may wait for the consumer
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn library(&self) -> &Arc<dyn Library> {
        &self.library
    }

    /// Total number of publications matching `request`.
    ///
    /// An unresolved page size is sent as the library default.
    #[instrument(skip(self, request), fields(library = %self.library.id(), query = %request.query))]
    pub async fn total_count(&self, request: &Request) -> Result<usize, LibraryError> {
        self.library.total_count(&self.sizing_request(request)).await
    }

    fn sizing_request(&self, request: &Request) -> Request {
        request.resolve(self.library.default_per_page(), 0)
    }

    /// Start a run and return its delivery queue.
    ///
    /// Sizing happens before this returns, so the queue's declared maximum is
    /// known up front. Page fetches continue in the background; the consumer
    /// drains the queue and reads the terminal error after end of stream.
    /// Cancelling `cancel` aborts the run with [`AcquireError::Cancelled`].
    #[instrument(skip(self, request, cancel), fields(library = %self.library.id(), query = %request.query))]
    pub async fn acquire(&self, request: Request, cancel: CancellationToken) -> PublicationQueue {
        let cancel = cancel.child_token();
        let sizing = self.sizing_request(&request);

        let total = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AcquireError::Cancelled),
            total = self.library.total_count(&sizing) => total.map_err(AcquireError::Sizing),
        };
        let total = match total {
            Ok(total) => total,
            Err(error) => {
                warn!(error = %error, "sizing failed, no pages fetched");
                let (publisher, delivery) = channel(0, 1);
                publisher.close_with_error(Some(error));
                return delivery;
            }
        };

        let request = sizing.resolve(self.library.default_per_page(), total);
        let (publisher, delivery) = channel(total, self.queue_capacity);

        if request.max_page == 0 {
            info!(total, "nothing to fetch");
            publisher.close_with_error(None);
            return delivery;
        }

        info!(
            total,
            rounds = request.max_page,
            per_page = request.per_page,
            pacing = %self.library.pacing(),
            "starting literature run"
        );

        let run = Run {
            library: Arc::clone(&self.library),
            gate: PacingGate::new(self.library.pacing()),
            cancel,
            first_error: Arc::new(OnceLock::new()),
            delivered: Arc::new(AtomicUsize::new(0)),
        };
        tokio::spawn(run.drive(request, publisher).in_current_span());

        delivery
    }
}

/// State shared by every fetch task of one run
#[derive(Debug, Clone)]
struct Run {
    library: Arc<dyn Library>,
    gate: PacingGate,
    cancel: CancellationToken,
    first_error: Arc<OnceLock<AcquireError>>,
    delivered: Arc<AtomicUsize>,
}

impl Run {
    async fn drive(self, request: Request, publisher: Publisher<Publication>) {
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for page in request.pages() {
            let run = self.clone();
            let feeder = publisher.feeder();
            tasks.spawn(async move { run.fetch_round(page, feeder).await }.in_current_span());
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                self.fail(AcquireError::Task(e.to_string()));
            }
        }

        let error = self.first_error.get().cloned();
        let delivered = self.delivered.load(Ordering::SeqCst);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &error {
            None => info!(delivered, elapsed_ms, "literature run complete"),
            Some(e) => warn!(delivered, elapsed_ms, error = %e, "literature run aborted"),
        }

        publisher.close_with_error(error);
    }

    /// Fetch one page and push its publications in order
    async fn fetch_round(&self, request: Request, feeder: Feeder<Publication>) {
        let page = request.page;

        // Held until every publication of the page is pushed.
        let _admission = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.fail(AcquireError::Cancelled),
            admission = self.gate.admit() => admission,
        };

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.fail(AcquireError::Cancelled),
            response = self.library.fetch_page(&request) => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(source) => return self.fail(AcquireError::Page { page, source }),
        };
        debug!(page, items = response.len(), "page fetched");

        for publication in response.literature {
            let pushed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.fail(AcquireError::Cancelled),
                pushed = feeder.push(publication) => pushed,
            };
            if let Err(e) = pushed {
                return self.fail(e.into());
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Keep the first error of the run and cancel every other task.
    ///
    /// Later errors, including the cancellations they cause, are dropped.
    fn fail(&self, error: AcquireError) {
        if self.first_error.set(error).is_ok() {
            if let Some(error) = self.first_error.get() {
                debug!(error = %error, "first failure of the run");
            }
            self.cancel.cancel();
        }
    }
}
