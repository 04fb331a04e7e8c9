// ABOUTME: Ordered, closable channel carrying query events from a backend task to the caller.
// ABOUTME: The producer ends the stream by dropping its sink or by reporting an error.

use crate::error::{DeployError, Result};
use crate::event::QueryEvent;
use tokio::sync::mpsc;

const DEFAULT_CAPACITY: usize = 256;

/// Producer half, held by the backend task reading the transport
pub struct QuerySink {
    tx: mpsc::Sender<Result<QueryEvent>>,
}

impl QuerySink {
    /// Forward an event. Returns false once the consumer has closed the stream.
    pub async fn send(&self, event: QueryEvent) -> bool {
        self.tx.send(Ok(event)).await.is_ok()
    }

    /// Report a transport failure; the consumer sees it after all earlier events
    pub async fn fail(self, error: DeployError) {
        let _ = self.tx.send(Err(error)).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a query. Events arrive in transport order.
///
/// The caller drives iteration with [`QueryStream::recv`]. `None` means the
/// remote side closed the stream normally; an `Err` means it broke, and no
/// further items follow.
pub struct QueryStream {
    rx: mpsc::Receiver<Result<QueryEvent>>,
    finished: bool,
}

impl QueryStream {
    pub fn channel() -> (QuerySink, QueryStream) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (QuerySink, QueryStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            QuerySink { tx },
            QueryStream {
                rx,
                finished: false,
            },
        )
    }

    /// Build a stream that yields the given items and then closes
    pub fn from_items(items: Vec<Result<QueryEvent>>) -> QueryStream {
        let (sink, stream) = Self::with_capacity(items.len().max(1));
        for item in items {
            // capacity covers every item, so try_send cannot fill up
            let _ = sink.tx.try_send(item);
        }
        stream
    }

    /// Receive the next event, or None once the stream has ended
    pub async fn recv(&mut self) -> Option<Result<QueryEvent>> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(Ok(event)) => Some(Ok(event)),
            Some(Err(e)) => {
                self.finished = true;
                self.rx.close();
                Some(Err(e))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Stop consuming. The producer notices on its next send and stops reading.
    pub fn close(&mut self) {
        self.finished = true;
        self.rx.close();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
