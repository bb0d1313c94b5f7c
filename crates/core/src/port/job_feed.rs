// Job Feed Port
// Poll query and push subscription for pending print jobs

use async_trait::async_trait;

use super::remote_session::BackendError;
use crate::domain::{NotificationBatch, PrintJobParameter, QueueName};

#[async_trait]
pub trait JobFeed: Send + Sync {
    /// Query parameter rows of every pending job on the given queues
    async fn query_jobs(
        &self,
        queues: &[QueueName],
    ) -> Result<Vec<PrintJobParameter>, BackendError>;

    /// Open a push subscription for a named topic
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn JobSubscription>, BackendError>;
}

/// Live push subscription.
///
/// `next_batch` yields `None` once the stream has ended.
#[async_trait]
pub trait JobSubscription: Send {
    async fn next_batch(&mut self) -> Option<Result<NotificationBatch, BackendError>>;

    async fn close(&mut self);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::{mpsc, Notify};

    #[derive(Default)]
    struct State {
        rows: Vec<PrintJobParameter>,
        queries: Vec<Vec<QueueName>>,
        subscriptions: usize,
        closed: usize,
        fail_queries: bool,
        fail_subscribe: bool,
        push: Option<mpsc::UnboundedSender<Option<Result<NotificationBatch, BackendError>>>>,
        gate: Option<Arc<Notify>>,
    }

    /// In-memory job feed driven by the test
    #[derive(Clone, Default)]
    pub struct MockJobFeed {
        state: Arc<Mutex<State>>,
        subscribed: Arc<Notify>,
    }

    impl MockJobFeed {
        pub fn new() -> Self {
            Self::default()
        }

        /// Rows returned by every poll query
        pub fn set_rows(&self, rows: Vec<PrintJobParameter>) {
            self.state.lock().unwrap().rows = rows;
        }

        pub fn fail_queries(&self, fail: bool) {
            self.state.lock().unwrap().fail_queries = fail;
        }

        pub fn fail_subscribe(&self, fail: bool) {
            self.state.lock().unwrap().fail_subscribe = fail;
        }

        /// Hold poll queries until the returned handle is notified
        pub fn hold_queries(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.state.lock().unwrap().gate = Some(gate.clone());
            gate
        }

        /// Deliver a batch on the current subscription
        pub fn push(&self, batch: NotificationBatch) -> bool {
            self.send(Some(Ok(batch)))
        }

        /// Fail the current subscription
        pub fn push_error(&self, error: BackendError) -> bool {
            self.send(Some(Err(error)))
        }

        /// End the current subscription's stream
        pub fn end_stream(&self) -> bool {
            self.send(None)
        }

        fn send(&self, item: Option<Result<NotificationBatch, BackendError>>) -> bool {
            match &self.state.lock().unwrap().push {
                Some(tx) => tx.send(item).is_ok(),
                None => false,
            }
        }

        /// Resolves once a subscription has been opened
        pub async fn wait_subscribed(&self) {
            loop {
                let notified = self.subscribed.notified();
                if self.state.lock().unwrap().push.is_some() {
                    return;
                }
                notified.await;
            }
        }

        pub fn queries(&self) -> Vec<Vec<QueueName>> {
            self.state.lock().unwrap().queries.clone()
        }

        pub fn subscriptions(&self) -> usize {
            self.state.lock().unwrap().subscriptions
        }

        pub fn closed_subscriptions(&self) -> usize {
            self.state.lock().unwrap().closed
        }
    }

    #[async_trait]
    impl JobFeed for MockJobFeed {
        async fn query_jobs(
            &self,
            queues: &[QueueName],
        ) -> Result<Vec<PrintJobParameter>, BackendError> {
            let gate = {
                let mut state = self.state.lock().unwrap();
                state.queries.push(queues.to_vec());
                state.gate.clone()
            };
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let state = self.state.lock().unwrap();
            if state.fail_queries {
                return Err(BackendError::Http {
                    status: 500,
                    body: "query failed".to_string(),
                });
            }
            Ok(state.rows.clone())
        }

        async fn subscribe(&self, _topic: &str) -> Result<Box<dyn JobSubscription>, BackendError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_subscribe {
                return Err(BackendError::Unreachable("push endpoint".to_string()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            state.push = Some(tx);
            state.subscriptions += 1;
            drop(state);
            self.subscribed.notify_waiters();
            Ok(Box::new(MockSubscription {
                rx,
                state: self.state.clone(),
            }))
        }
    }

    pub struct MockSubscription {
        rx: mpsc::UnboundedReceiver<Option<Result<NotificationBatch, BackendError>>>,
        state: Arc<Mutex<State>>,
    }

    #[async_trait]
    impl JobSubscription for MockSubscription {
        async fn next_batch(&mut self) -> Option<Result<NotificationBatch, BackendError>> {
            self.rx.recv().await.flatten()
        }

        async fn close(&mut self) {
            let mut state = self.state.lock().unwrap();
            state.closed += 1;
            state.push = None;
        }
    }
}
