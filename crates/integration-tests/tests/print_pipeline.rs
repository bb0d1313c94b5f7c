//! Print job pipeline end-to-end against in-memory backend, feed and spooler
//!
//! Covers push/poll deduplication, routing by payload and queue mode, and
//! session teardown after a push fault.

use base64::Engine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use devicehub_core::application::{
    screens, shutdown_channel, JobRouter, Monitor, MonitorEvent, PrintJobMonitor, ShutdownSender,
    StatusReporter, PRINT_MONITOR_NAME,
};
use devicehub_core::config::{BackendConfig, Intervals};
use devicehub_core::domain::{MonitorStatus, NotificationBatch, PrintJobParameter, PrintQueue};
use devicehub_core::port::job_feed::mocks::MockJobFeed;
use devicehub_core::port::printer::mocks::{MockPrinter, PrintCall};
use devicehub_core::port::remote_session::mocks::{MockConnector, SessionCall};
use devicehub_core::port::{ContainerValues, FieldValue, SubmitResult};
use devicehub_core::{DeviceHubConfig, Result};

const REPORT: &str = "SO641000";

fn config() -> DeviceHubConfig {
    DeviceHubConfig {
        backend: BackendConfig {
            url: "http://erp.test".to_string(),
            login: "agent@Warehouse".to_string(),
            password: "secret".to_string(),
        },
        queues: vec![
            PrintQueue::raw("LABELS", "Zebra"),
            PrintQueue::new("DOCS", "Laser"),
        ],
        scale: None,
        intervals: Intervals {
            printer_polling_ms: 50,
            error_wait_ms: 100,
            scale_read_ms: 50,
        },
    }
}

fn file_job(job: &str, queue: &str, file: &str) -> PrintJobParameter {
    PrintJobParameter {
        job_id: Some(job.to_string()),
        report_id: None,
        print_queue: Some(queue.to_string()),
        description: Some(format!("Job {}", job)),
        parameter_name: Some("FILEID".to_string()),
        parameter_value: Some(file.to_string()),
    }
}

fn report_job(job: &str, queue: &str, name: &str, value: &str) -> PrintJobParameter {
    PrintJobParameter {
        job_id: Some(job.to_string()),
        report_id: Some(REPORT.to_string()),
        print_queue: Some(queue.to_string()),
        description: Some(format!("Job {}", job)),
        parameter_name: Some(name.to_string()),
        parameter_value: Some(value.to_string()),
    }
}

fn inserted(rows: Vec<PrintJobParameter>) -> NotificationBatch {
    NotificationBatch {
        inserted: rows,
        ..Default::default()
    }
}

fn pdf_report(bytes: &[u8]) -> SubmitResult {
    SubmitResult {
        containers: vec![ContainerValues {
            name: screens::REPORT_RESULTS.to_string(),
            fields: vec![FieldValue {
                field: screens::PDF_CONTENT.to_string(),
                value: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            }],
        }],
    }
}

/// Poll `condition` until it holds, failing after two seconds
async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn settle<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("monitor did not stop")
}

struct Backend {
    connector: MockConnector,
    feed: MockJobFeed,
    printer: MockPrinter,
}

impl Backend {
    fn new() -> Self {
        let connector = MockConnector::new();
        connector.set_export(
            screens::PRINT_QUEUES_SCREEN,
            vec![vec!["LABELS".to_string()], vec!["DOCS".to_string()]],
        );
        Self {
            connector,
            feed: MockJobFeed::new(),
            printer: MockPrinter::new(),
        }
    }

    fn start(
        &self,
    ) -> (
        JoinHandle<Result<()>>,
        ShutdownSender,
        mpsc::UnboundedReceiver<MonitorEvent>,
    ) {
        let monitor = PrintJobMonitor::new(
            &config(),
            Arc::new(self.connector.clone()),
            Arc::new(self.feed.clone()),
            JobRouter::new(
                Arc::new(self.printer.clone()),
                Arc::new(self.printer.clone()),
            ),
        );
        let (status, events) = StatusReporter::channel(PRINT_MONITOR_NAME);
        let (shutdown, token) = shutdown_channel();
        let handle = tokio::spawn(Box::new(monitor).run(status, token));
        (handle, shutdown, events)
    }

    fn deletions(&self) -> Vec<Vec<devicehub_core::port::ScreenCommand>> {
        self.connector.submissions(screens::PRINT_JOBS_SCREEN)
    }
}

#[tokio::test]
async fn test_pushed_job_is_not_reprocessed_by_sweep() {
    let backend = Backend::new();
    backend.connector.set_file("F1", b"^XA^FDpushed^XZ".to_vec());
    let gate = backend.feed.hold_queries();
    let (handle, shutdown, _events) = backend.start();

    // Push arrives while the sweep query is still outstanding
    backend.feed.wait_subscribed().await;
    assert!(backend
        .feed
        .push(inserted(vec![file_job("0001", "LABELS", "F1")])));
    eventually("push deletion", || backend.deletions().len() == 1).await;

    // The sweep sees the same job, which the backend has not yet removed
    backend.feed.set_rows(vec![file_job("0001", "LABELS", "F1")]);
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A later push proves the session is still serving
    backend.connector.set_file("F2", b"^XA^FDlater^XZ".to_vec());
    assert!(backend
        .feed
        .push(inserted(vec![file_job("0002", "LABELS", "F2")])));
    eventually("second deletion", || backend.deletions().len() == 2).await;

    shutdown.shutdown();
    settle(handle).await.unwrap().unwrap();

    assert_eq!(backend.printer.calls().len(), 2);
    assert_eq!(
        backend.deletions(),
        vec![
            screens::delete_job_commands("0001"),
            screens::delete_job_commands("0002"),
        ]
    );
    assert_eq!(
        backend
            .connector
            .count(|c| *c == SessionCall::FetchFile("F1".to_string())),
        1
    );
}

#[tokio::test]
async fn test_job_inserted_and_deleted_in_one_batch_is_ignored() {
    let backend = Backend::new();
    let (handle, shutdown, _events) = backend.start();
    backend.feed.wait_subscribed().await;

    let row = file_job("0003", "LABELS", "F3");
    assert!(backend.feed.push(NotificationBatch {
        inserted: vec![row.clone()],
        deleted: vec![row],
        ..Default::default()
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown.shutdown();
    settle(handle).await.unwrap().unwrap();

    assert!(backend.printer.calls().is_empty());
    assert!(backend.deletions().is_empty());
}

#[tokio::test]
async fn test_jobs_for_unconfigured_queues_are_left_alone() {
    let backend = Backend::new();
    backend.connector.set_file("F4", b"data".to_vec());
    backend
        .feed
        .set_rows(vec![file_job("0004", "SHIPPING", "F4")]);
    let (handle, shutdown, _events) = backend.start();
    backend.feed.wait_subscribed().await;

    assert!(backend
        .feed
        .push(inserted(vec![file_job("0005", "SHIPPING", "F4")])));
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown.shutdown();
    settle(handle).await.unwrap().unwrap();

    assert!(backend.printer.calls().is_empty());
    assert!(backend.deletions().is_empty());
    let mut queried = backend.feed.queries()[0].clone();
    queried.sort();
    assert_eq!(queried, vec!["DOCS".to_string(), "LABELS".to_string()]);
}

#[tokio::test]
async fn test_report_job_prints_rendered_pdf() {
    let backend = Backend::new();
    let pdf = b"%PDF-1.7\n1 0 obj\n".to_vec();
    backend.connector.set_response(REPORT, vec![pdf_report(&pdf)]);
    backend.feed.set_rows(vec![
        report_job("0006", "DOCS", "OrderType", "SO"),
        report_job("0006", "DOCS", "OrderNbr", "SO004512"),
    ]);
    let (handle, shutdown, _events) = backend.start();

    backend.feed.wait_subscribed().await;
    eventually("report deletion", || backend.deletions().len() == 1).await;
    shutdown.shutdown();
    settle(handle).await.unwrap().unwrap();

    let reports = backend.connector.submissions(REPORT);
    assert_eq!(reports.len(), 1);
    let mut parameters = std::collections::HashMap::new();
    parameters.insert("OrderNbr".to_string(), "SO004512".to_string());
    parameters.insert("OrderType".to_string(), "SO".to_string());
    assert_eq!(reports[0], screens::report_commands(&parameters));

    match backend.printer.calls().as_slice() {
        [PrintCall::Pdf { request, data }] => {
            assert_eq!(request.printer, "Laser");
            assert_eq!(request.document_name, "Job 0006");
            assert_eq!(data, &pdf);
        }
        other => panic!("expected one PDF print, got {:?}", other),
    }
}

#[tokio::test]
async fn test_payload_mismatch_is_skipped_but_job_deleted() {
    let backend = Backend::new();
    backend.connector.set_file("F7", b"^XA^XZ".to_vec());
    backend.connector.set_file("F8", b"%PDF-1.4".to_vec());
    backend.feed.set_rows(vec![
        file_job("0007", "DOCS", "F7"),
        file_job("0008", "LABELS", "F8"),
    ]);
    let (handle, shutdown, mut events) = backend.start();

    backend.feed.wait_subscribed().await;
    eventually("both deletions", || backend.deletions().len() == 2).await;
    shutdown.shutdown();
    settle(handle).await.unwrap().unwrap();

    // Neither document matches its queue's mode
    assert!(backend.printer.calls().is_empty());

    let mut warnings = 0;
    while let Ok(event) = events.try_recv() {
        if event.message.status == MonitorStatus::Warning {
            warnings += 1;
        }
    }
    assert_eq!(warnings, 2);
}

#[tokio::test]
async fn test_stream_end_tears_down_and_restarts_after_error_wait() {
    let backend = Backend::new();
    let (handle, shutdown, mut events) = backend.start();
    backend.feed.wait_subscribed().await;

    assert!(backend.feed.end_stream());
    eventually("second subscription", || backend.feed.subscriptions() == 2).await;

    shutdown.shutdown();
    settle(handle).await.unwrap().unwrap();

    assert_eq!(backend.connector.count(|c| *c == SessionCall::Login), 2);
    assert_eq!(backend.connector.count(|c| *c == SessionCall::Logout), 2);
    assert_eq!(backend.feed.closed_subscriptions(), 2);

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        statuses.push(event.message.status);
    }
    let fault = statuses
        .iter()
        .position(|s| *s == MonitorStatus::Error)
        .expect("stream end is reported as an error");
    assert!(statuses[fault..].contains(&MonitorStatus::Ok));
}
