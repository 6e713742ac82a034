//! Bounded hand-off between page-fetch tasks and a single consumer.
//!
//! [`channel`] returns three kinds of handle:
//!
//! - [`Publisher`] - owned by the orchestrator, hands out feeders and closes the
//!   queue exactly once with the run's terminal error
//! - [`Feeder`] - cloned into every fetch task, pushes items and waits while the
//!   queue is full
//! - [`Delivery`] - owned by the consumer, yields items until end of stream and
//!   then exposes the terminal error
//!
//! Feeders only hold a weak reference to the channel. Once the publisher is
//! closed, end of stream is reached as soon as the consumer drains what is
//! buffered, and any further push fails with [`DeliveryError::Closed`].

use futures_util::Stream;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::acquire::AcquireError;

type Terminal = Arc<OnceLock<Option<AcquireError>>>;

/// Errors returned to producers pushing into a delivery queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The queue was already closed by its publisher
    #[error("delivery queue is closed")]
    Closed,

    /// The consumer dropped its end of the queue
    #[error("delivery consumer went away")]
    ConsumerGone,
}

/// Create a delivery queue announcing `declared_max` items and buffering at
/// most `capacity` of them
pub fn channel<T>(declared_max: usize, capacity: usize) -> (Publisher<T>, Delivery<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let terminal: Terminal = Arc::new(OnceLock::new());

    let publisher = Publisher {
        tx: Some(tx),
        terminal: Arc::clone(&terminal),
    };
    let delivery = Delivery {
        rx,
        declared_max,
        terminal,
        received: 0,
        closed: false,
    };
    (publisher, delivery)
}

/// Closing end of a delivery queue
#[derive(Debug)]
pub struct Publisher<T> {
    tx: Option<mpsc::Sender<T>>,
    terminal: Terminal,
}

impl<T> Publisher<T> {
    /// Hand out a producer handle
    pub fn feeder(&self) -> Feeder<T> {
        Feeder {
            tx: self.tx.as_ref().map(mpsc::Sender::downgrade),
        }
    }

    /// Record the terminal error and signal end of stream.
    ///
    /// Must only be called after every producer has finished. Consuming the
    /// publisher makes a second close unrepresentable.
    pub fn close_with_error(mut self, error: Option<AcquireError>) {
        self.close(error);
    }

    fn close(&mut self, error: Option<AcquireError>) {
        if self.terminal.set(error).is_err() {
            panic!("delivery queue closed twice");
        }
        self.tx = None;
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.close(Some(AcquireError::Task(
                "delivery queue dropped without being closed".to_string(),
            )));
        }
    }
}

/// Producer end of a delivery queue
#[derive(Debug)]
pub struct Feeder<T> {
    tx: Option<mpsc::WeakSender<T>>,
}

impl<T> Clone for Feeder<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Feeder<T> {
    /// Push one item, waiting while the queue is full.
    ///
    /// Never drops an accepted item.
    pub async fn push(&self, item: T) -> Result<(), DeliveryError> {
        let tx = self
            .tx
            .as_ref()
            .and_then(mpsc::WeakSender::upgrade)
            .ok_or(DeliveryError::Closed)?;
        tx.send(item).await.map_err(|_| DeliveryError::ConsumerGone)
    }
}

/// Consumer end of a delivery queue
#[derive(Debug)]
pub struct Delivery<T> {
    rx: mpsc::Receiver<T>,
    declared_max: usize,
    terminal: Terminal,
    received: usize,
    closed: bool,
}

impl<T> Delivery<T> {
    /// Number of items announced before the first one arrived.
    ///
    /// A progress hint only: an aborted run delivers fewer.
    pub fn declared_max(&self) -> usize {
        self.declared_max
    }

    /// Number of items received so far
    pub fn received(&self) -> usize {
        self.received
    }

    /// Whether end of stream has been observed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Receive the next item, or `None` at end of stream
    pub async fn recv(&mut self) -> Option<T> {
        let item = self.rx.recv().await;
        self.observe(item.is_some());
        item
    }

    fn observe(&mut self, got_item: bool) {
        if got_item {
            self.received += 1;
        } else {
            self.closed = true;
        }
    }

    /// Terminal error of the run.
    ///
    /// Always `None` until end of stream has been observed; afterwards `None`
    /// means every declared item was delivered.
    pub fn err(&self) -> Option<&AcquireError> {
        if !self.closed {
            return None;
        }
        self.terminal.get().and_then(Option::as_ref)
    }

    /// Terminal outcome of the run, valid after end of stream
    pub fn result(&self) -> Result<(), AcquireError> {
        match self.err() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Drain every remaining item, then return them with the terminal outcome
    pub async fn collect_all(mut self) -> (Vec<T>, Result<(), AcquireError>) {
        let mut items = Vec::new();
        while let Some(item) = self.recv().await {
            items.push(item);
        }
        let result = self.result();
        (items, result)
    }
}

impl<T> Stream for Delivery<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(item) => {
                self.observe(item.is_some());
                Poll::Ready(item)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::LibraryError;
    use futures_util::StreamExt;
    use tokio_test::{assert_pending, assert_ready_ok};

    #[tokio::test]
    async fn test_push_then_drain() {
        let (publisher, mut delivery) = channel::<u32>(3, 8);
        let feeder = publisher.feeder();

        for i in 0..3 {
            feeder.push(i).await.unwrap();
        }
        drop(feeder);
        publisher.close_with_error(None);

        assert_eq!(delivery.declared_max(), 3);
        assert_eq!(delivery.recv().await, Some(0));
        assert_eq!(delivery.recv().await, Some(1));
        assert_eq!(delivery.recv().await, Some(2));
        assert!(!delivery.is_closed());
        assert_eq!(delivery.recv().await, None);
        assert!(delivery.is_closed());
        assert_eq!(delivery.received(), 3);
        assert!(delivery.err().is_none());
    }

    #[tokio::test]
    async fn test_error_hidden_until_end_of_stream() {
        let (publisher, mut delivery) = channel::<u32>(10, 8);
        publisher.feeder().push(7).await.unwrap();
        publisher.close_with_error(Some(AcquireError::Cancelled));

        assert!(delivery.err().is_none());
        assert_eq!(delivery.recv().await, Some(7));
        assert!(delivery.err().is_none());
        assert_eq!(delivery.recv().await, None);
        assert_eq!(delivery.err(), Some(&AcquireError::Cancelled));
        assert_eq!(delivery.result(), Err(AcquireError::Cancelled));
    }

    #[tokio::test]
    async fn test_push_after_close_is_rejected() {
        let (publisher, mut delivery) = channel::<u32>(1, 8);
        let feeder = publisher.feeder();
        publisher.close_with_error(None);

        assert_eq!(feeder.push(1).await, Err(DeliveryError::Closed));
        assert_eq!(delivery.recv().await, None);
    }

    #[tokio::test]
    async fn test_push_waits_for_room() {
        let (publisher, mut delivery) = channel::<u32>(2, 1);
        let feeder = publisher.feeder();

        feeder.push(1).await.unwrap();

        let mut second = tokio_test::task::spawn(feeder.push(2));
        assert_pending!(second.poll());

        assert_eq!(delivery.recv().await, Some(1));
        assert!(second.is_woken());
        assert_ready_ok!(second.poll());

        drop(second);
        publisher.close_with_error(None);
        assert_eq!(delivery.recv().await, Some(2));
        assert_eq!(delivery.recv().await, None);
    }

    #[tokio::test]
    async fn test_push_to_dropped_consumer() {
        let (publisher, delivery) = channel::<u32>(1, 1);
        let feeder = publisher.feeder();
        drop(delivery);

        assert_eq!(feeder.push(1).await, Err(DeliveryError::ConsumerGone));
        publisher.close_with_error(None);
    }

    #[tokio::test]
    async fn test_dropped_publisher_reports_error() {
        let (publisher, delivery) = channel::<u32>(5, 1);
        drop(publisher);

        let (items, result) = delivery.collect_all().await;
        assert!(items.is_empty());
        assert!(matches!(result, Err(AcquireError::Task(_))));
    }

    #[tokio::test]
    async fn test_concurrent_feeders() {
        let (publisher, delivery) = channel::<usize>(400, 4);

        let mut handles = Vec::new();
        for worker in 0..8 {
            let feeder = publisher.feeder();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    feeder.push(worker * 50 + i).await.unwrap();
                }
            }));
        }

        let consumer = tokio::spawn(delivery.collect_all());
        for handle in handles {
            handle.await.unwrap();
        }
        publisher.close_with_error(Some(AcquireError::Sizing(LibraryError::RateLimit)));

        let (mut items, result) = consumer.await.unwrap();
        items.sort_unstable();
        assert_eq!(items, (0..400).collect::<Vec<_>>());
        assert_eq!(result, Err(AcquireError::Sizing(LibraryError::RateLimit)));
    }

    #[tokio::test]
    async fn test_delivery_is_a_stream() {
        let (publisher, delivery) = channel::<u32>(3, 4);
        let feeder = publisher.feeder();
        for i in 0..3 {
            feeder.push(i).await.unwrap();
        }
        publisher.close_with_error(None);

        let items: Vec<u32> = delivery.collect().await;
        assert_eq!(items, vec![0, 1, 2]);
    }
}
