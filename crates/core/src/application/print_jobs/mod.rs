// Print Job Monitor
//
// One backend session at a time: verify queues, subscribe to push
// notifications, sweep pending jobs by polling, then keep serving pushes until
// the session faults or shutdown is requested.

mod dedup;
mod router;

pub use dedup::ProcessedJobSet;
pub use router::{JobRouter, PayloadKind, Route};

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::monitor::constants::PRINT_JOBS_TOPIC;
use crate::application::monitor::{shutdown_channel, Monitor, ShutdownToken, StatusReporter};
use crate::application::screens;
use crate::config::DeviceHubConfig;
use crate::domain::{group_rows, PrintJob, PrintQueue, QueueTable};
use crate::error::{AppError, Result};
use crate::port::{JobFeed, JobSubscription, RemoteSession, SessionConnector};

pub const PRINT_MONITOR_NAME: &str = "printing";

/// How a session ended without a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    QueuesMissing,
}

/// State shared by the push and poll channels of one session
struct Session {
    remote: Box<dyn RemoteSession>,
    seen: ProcessedJobSet,
    /// Serializes job processing across both channels
    processing: tokio::sync::Mutex<()>,
}

pub struct PrintJobMonitor {
    queues: QueueTable,
    polling_interval: Duration,
    error_wait: Duration,
    connector: Arc<dyn SessionConnector>,
    feed: Arc<dyn JobFeed>,
    router: JobRouter,
}

impl PrintJobMonitor {
    pub fn new(
        config: &DeviceHubConfig,
        connector: Arc<dyn SessionConnector>,
        feed: Arc<dyn JobFeed>,
        router: JobRouter,
    ) -> Self {
        Self {
            queues: config.queue_table(),
            polling_interval: config.intervals.printer_polling(),
            error_wait: config.intervals.error_wait(),
            connector,
            feed,
            router,
        }
    }

    /// Log in, retrying every polling interval until it succeeds.
    ///
    /// Returns `None` if shutdown is requested first.
    async fn login(
        &self,
        status: &StatusReporter,
        mut shutdown: ShutdownToken,
    ) -> Option<Box<dyn RemoteSession>> {
        loop {
            if shutdown.is_shutdown() {
                return None;
            }
            status.info(format!("Logging in to {}", self.connector.endpoint()));
            match self.connector.login().await {
                Ok(remote) => return Some(remote),
                Err(e) => {
                    warn!(error = %e, "Print monitor login failed");
                    status.info(format!(
                        "Login to {} failed ({}); retrying in {:?}",
                        self.connector.endpoint(),
                        e,
                        self.polling_interval
                    ));
                    if shutdown.sleep(self.polling_interval).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Run one session from login to teardown
    async fn run_session(
        &self,
        status: &StatusReporter,
        shutdown: &ShutdownToken,
    ) -> Result<SessionEnd> {
        let Some(remote) = self.login(status, shutdown.clone()).await else {
            return Ok(SessionEnd::Cancelled);
        };
        let session = Session {
            remote,
            seen: ProcessedJobSet::new(),
            processing: tokio::sync::Mutex::new(()),
        };

        let outcome = self.serve(&session, status, shutdown).await;

        if let Err(e) = session.remote.logout().await {
            debug!(error = %e, "Logout failed");
        }
        status.info("Logged out");
        outcome
    }

    async fn serve(
        &self,
        session: &Session,
        status: &StatusReporter,
        shutdown: &ShutdownToken,
    ) -> Result<SessionEnd> {
        if !self.verify_queues(session.remote.as_ref(), status).await? {
            return Ok(SessionEnd::QueuesMissing);
        }

        let mut subscription = self.feed.subscribe(PRINT_JOBS_TOPIC).await?;
        status.ok(format!(
            "Listening for print jobs on {} queue(s)",
            self.queues.len()
        ));

        let outcome = self
            .discover(session, subscription.as_mut(), status, shutdown)
            .await;
        subscription.close().await;
        outcome
    }

    /// Every configured queue must exist in the backend
    async fn verify_queues(
        &self,
        remote: &dyn RemoteSession,
        status: &StatusReporter,
    ) -> Result<bool> {
        status.info("Verifying print queues");
        let rows = remote
            .export(
                screens::PRINT_QUEUES_SCREEN,
                &screens::queue_export_commands(),
            )
            .await?;
        let available: HashSet<String> = rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect();

        for name in self.queues.names() {
            if !available.contains(name) {
                status.warning(format!(
                    "Print queue {} does not exist in the backend; print job monitoring is stopped until the configuration changes",
                    name
                ));
                return Ok(false);
            }
            status.info(format!("Print queue {} is ready", name));
        }
        Ok(true)
    }

    /// Run push listening and the poll sweep together.
    ///
    /// The sweep runs once; the push channel keeps going until it faults or
    /// shutdown is requested. When either channel stops, the other is halted
    /// at its next job boundary and awaited before the session ends, so a job
    /// is never abandoned between printing and deletion.
    async fn discover(
        &self,
        session: &Session,
        subscription: &mut dyn JobSubscription,
        status: &StatusReporter,
        shutdown: &ShutdownToken,
    ) -> Result<SessionEnd> {
        let (halt, halted) = shutdown_channel();
        let push = self.listen(
            session,
            subscription,
            status,
            shutdown.clone(),
            halted.clone(),
        );
        let sweep = self.sweep(session, status, shutdown.clone(), halted);
        tokio::pin!(push);
        tokio::pin!(sweep);

        tokio::select! {
            end = &mut push => {
                halt.shutdown();
                if let Err(e) = sweep.await {
                    // The push outcome decides how the session ended
                    warn!(error = %e, "Sweep failed while the session was ending");
                }
                return end;
            }
            swept = &mut sweep => {
                if let Err(e) = swept {
                    halt.shutdown();
                    if let Err(push_error) = push.await {
                        warn!(
                            error = %push_error,
                            "Push listener failed while the session was ending"
                        );
                    }
                    return Err(e);
                }
            }
        }

        session.seen.close();
        debug!("Initial sweep complete");
        push.await
    }

    /// Push channel: process inserted jobs as batches arrive
    async fn listen(
        &self,
        session: &Session,
        subscription: &mut dyn JobSubscription,
        status: &StatusReporter,
        mut shutdown: ShutdownToken,
        mut halted: ShutdownToken,
    ) -> Result<SessionEnd> {
        loop {
            let batch = tokio::select! {
                batch = subscription.next_batch() => batch,
                _ = shutdown.wait() => return Ok(SessionEnd::Cancelled),
                _ = halted.wait() => return Ok(SessionEnd::Cancelled),
            };
            let batch = match batch {
                Some(Ok(batch)) => batch,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(crate::port::BackendError::SubscriptionClosed.into()),
            };

            for job in batch.inserted_jobs() {
                if shutdown.is_shutdown() || halted.is_shutdown() {
                    return Ok(SessionEnd::Cancelled);
                }
                let Some(queue) = self.queues.get(job.queue()) else {
                    continue;
                };
                if !session.seen.claim(&job.key) {
                    debug!(job = %job.key, "Job already dispatched by sweep");
                    continue;
                }
                let _turn = session.processing.lock().await;
                self.process_job(session.remote.as_ref(), queue, &job, status)
                    .await?;
            }
        }
    }

    /// Poll channel: process every job pending at session start
    async fn sweep(
        &self,
        session: &Session,
        status: &StatusReporter,
        mut shutdown: ShutdownToken,
        mut halted: ShutdownToken,
    ) -> Result<()> {
        status.info("Checking print queues for pending jobs");
        let rows = tokio::select! {
            rows = self.feed.query_jobs(self.queues.names()) => rows?,
            _ = shutdown.wait() => return Ok(()),
            _ = halted.wait() => return Ok(()),
        };

        for job in group_rows(&rows) {
            if shutdown.is_shutdown() || halted.is_shutdown() {
                return Ok(());
            }
            let Some(queue) = self.queues.get(job.queue()) else {
                continue;
            };
            if !session.seen.claim(&job.key) {
                debug!(job = %job.key, "Job already dispatched by push");
                continue;
            }
            let _turn = session.processing.lock().await;
            self.process_job(session.remote.as_ref(), queue, &job, status)
                .await?;
        }
        Ok(())
    }

    /// Resolve payload, dispatch, then delete the job from the backend
    async fn process_job(
        &self,
        remote: &dyn RemoteSession,
        queue: &PrintQueue,
        job: &PrintJob,
        status: &StatusReporter,
    ) -> Result<()> {
        info!(job = %job.key, report = %job.report_id, "Processing print job");
        status.info(format!(
            "Processing print job {} from queue {}",
            job.id(),
            queue.name
        ));

        if let Some(payload) = self.resolve_payload(remote, job, status).await? {
            self.router.dispatch(queue, job, &payload, status).await?;
        }

        status.info(format!("Deleting print job {}", job.id()));
        remote
            .submit(
                screens::PRINT_JOBS_SCREEN,
                &screens::delete_job_commands(job.id()),
            )
            .await?;
        Ok(())
    }

    async fn resolve_payload(
        &self,
        remote: &dyn RemoteSession,
        job: &PrintJob,
        status: &StatusReporter,
    ) -> Result<Option<Vec<u8>>> {
        if job.is_file_backed() {
            let Some(file_id) = job.file_id() else {
                status.warning(format!(
                    "Print job {} has no report and no file; nothing to print",
                    job.id()
                ));
                return Ok(None);
            };
            return Ok(Some(remote.fetch_file(file_id).await?));
        }

        let results = remote
            .submit(&job.report_id, &screens::report_commands(&job.parameters))
            .await?;
        Ok(Some(screens::report_content(&job.report_id, &results)?))
    }
}

#[async_trait]
impl Monitor for PrintJobMonitor {
    fn name(&self) -> &'static str {
        PRINT_MONITOR_NAME
    }

    async fn run(self: Box<Self>, status: StatusReporter, mut shutdown: ShutdownToken) -> Result<()> {
        if self.queues.is_empty() {
            status.warning("No print queues are configured; print job monitoring is disabled");
            return Ok(());
        }
        info!(queues = self.queues.len(), "Print job monitor started");

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.run_session(&status, &shutdown).await {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::QueuesMissing) => return Ok(()),
                Err(e) => {
                    report_fault(&status, &e);
                    if shutdown.sleep(self.error_wait).await {
                        break;
                    }
                }
            }
        }

        info!("Print job monitor stopped");
        Ok(())
    }
}

fn report_fault(status: &StatusReporter, error: &AppError) {
    warn!(error = %error, "Print job session failed");
    status.error(format!("Print job processing failed: {}", error));
}
