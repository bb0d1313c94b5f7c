// Job Router - payload classification and printer dispatch

use std::sync::Arc;
use tracing::info;

use crate::application::monitor::StatusReporter;
use crate::domain::{PrintJob, PrintQueue};
use crate::error::Result;
use crate::port::{PdfPrintRequest, PdfRenderer, RawPrinter};

const PDF_SIGNATURE: &[u8] = b"%PDF";

/// Payload format, decided by content sniffing only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Pdf,
    Raw,
}

impl PayloadKind {
    pub fn classify(payload: &[u8]) -> Self {
        if payload.starts_with(PDF_SIGNATURE) {
            PayloadKind::Pdf
        } else {
            PayloadKind::Raw
        }
    }
}

/// Where a payload goes for a given queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Raw,
    Pdf,
    /// Raw-mode queue received a PDF
    PdfOnRawQueue,
    /// PDF queue received non-PDF data
    RawOnPdfQueue,
}

impl Route {
    pub fn select(queue: &PrintQueue, kind: PayloadKind) -> Self {
        match (queue.raw_mode, kind) {
            (true, PayloadKind::Raw) => Route::Raw,
            (false, PayloadKind::Pdf) => Route::Pdf,
            (true, PayloadKind::Pdf) => Route::PdfOnRawQueue,
            (false, PayloadKind::Raw) => Route::RawOnPdfQueue,
        }
    }
}

/// Sends a resolved payload to the queue's printer
pub struct JobRouter {
    raw: Arc<dyn RawPrinter>,
    pdf: Arc<dyn PdfRenderer>,
}

impl JobRouter {
    pub fn new(raw: Arc<dyn RawPrinter>, pdf: Arc<dyn PdfRenderer>) -> Self {
        Self { raw, pdf }
    }

    /// Dispatch a payload. Mismatches are reported as warnings and skipped;
    /// the job is still considered handled.
    pub async fn dispatch(
        &self,
        queue: &PrintQueue,
        job: &PrintJob,
        payload: &[u8],
        status: &StatusReporter,
    ) -> Result<()> {
        match Route::select(queue, PayloadKind::classify(payload)) {
            Route::Raw => {
                status.info(format!(
                    "Sending {} bytes of raw data for job {} to printer {}",
                    payload.len(),
                    job.id(),
                    queue.printer_name
                ));
                self.raw
                    .send_raw(&queue.printer_name, &job.description, payload)
                    .await?;
            }
            Route::Pdf => self.print_pdf(queue, job, payload, status).await?,
            Route::PdfOnRawQueue => status.warning(format!(
                "Print queue {} is in raw mode but job {} contains a PDF document; job skipped",
                queue.name,
                job.id()
            )),
            Route::RawOnPdfQueue => status.warning(format!(
                "Print queue {} expects PDF documents but job {} is not a PDF; job skipped",
                queue.name,
                job.id()
            )),
        }
        Ok(())
    }

    async fn print_pdf(
        &self,
        queue: &PrintQueue,
        job: &PrintJob,
        payload: &[u8],
        status: &StatusReporter,
    ) -> Result<()> {
        let mut request =
            PdfPrintRequest::new(&queue.printer_name, &job.description, queue.orientation);

        if queue.paper_size.is_some() || queue.paper_source.is_some() {
            let capabilities = self.pdf.capabilities(&queue.printer_name).await?;

            if let Some(size) = &queue.paper_size {
                match capabilities.paper_size(size) {
                    Some(media) => request.paper_size = Some(media.id.clone()),
                    None => status.warning(format!(
                        "Paper size {} is not available on printer {}; using printer default",
                        size, queue.printer_name
                    )),
                }
            }
            if let Some(source) = &queue.paper_source {
                match capabilities.paper_source(source) {
                    Some(media) => request.paper_source = Some(media.id.clone()),
                    None => status.warning(format!(
                        "Paper source {} is not available on printer {}; using printer default",
                        source, queue.printer_name
                    )),
                }
            }
        }

        info!(
            job_id = job.id(),
            printer = %queue.printer_name,
            orientation = ?request.orientation,
            "Printing PDF"
        );
        status.info(format!(
            "Printing PDF job {} on printer {}",
            job.id(),
            queue.printer_name
        ));
        self.pdf.print_pdf(&request, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobKey, MonitorStatus, Orientation};
    use crate::port::printer::mocks::{MockPrinter, PrintCall};
    use crate::port::{MediaOption, PrinterCapabilities};
    use std::collections::HashMap;

    fn job() -> PrintJob {
        PrintJob {
            key: JobKey::new("0042", "LABELS"),
            report_id: String::new(),
            description: "Shipping label".to_string(),
            parameters: HashMap::new(),
        }
    }

    fn router(printer: &MockPrinter) -> JobRouter {
        JobRouter::new(Arc::new(printer.clone()), Arc::new(printer.clone()))
    }

    #[test]
    fn test_classify_by_signature() {
        assert_eq!(PayloadKind::classify(b"%PDF-1.7\n..."), PayloadKind::Pdf);
        assert_eq!(PayloadKind::classify(b"%PDF"), PayloadKind::Pdf);
        assert_eq!(PayloadKind::classify(b"^XA^FO50,50^XZ"), PayloadKind::Raw);
        assert_eq!(PayloadKind::classify(b"%PD"), PayloadKind::Raw);
        assert_eq!(PayloadKind::classify(b""), PayloadKind::Raw);
    }

    #[test]
    fn test_route_table() {
        let raw = PrintQueue::raw("LABELS", "Zebra");
        let pdf = PrintQueue::new("DOCS", "Laser");
        assert_eq!(Route::select(&raw, PayloadKind::Raw), Route::Raw);
        assert_eq!(Route::select(&raw, PayloadKind::Pdf), Route::PdfOnRawQueue);
        assert_eq!(Route::select(&pdf, PayloadKind::Pdf), Route::Pdf);
        assert_eq!(Route::select(&pdf, PayloadKind::Raw), Route::RawOnPdfQueue);
    }

    #[tokio::test]
    async fn test_raw_payload_sent_byte_exact() {
        let printer = MockPrinter::new();
        let (status, _rx) = StatusReporter::channel("printing");
        let payload = b"^XA^FO50,50^ADN,36,20^FDHello^FS^XZ".to_vec();

        router(&printer)
            .dispatch(&PrintQueue::raw("LABELS", "Zebra"), &job(), &payload, &status)
            .await
            .unwrap();

        assert_eq!(
            printer.calls(),
            vec![PrintCall::Raw {
                printer: "Zebra".to_string(),
                document_name: "Shipping label".to_string(),
                data: payload,
            }]
        );
    }

    #[tokio::test]
    async fn test_mismatch_warns_and_prints_nothing() {
        let printer = MockPrinter::new();
        let (status, mut rx) = StatusReporter::channel("printing");

        router(&printer)
            .dispatch(&PrintQueue::raw("LABELS", "Zebra"), &job(), b"%PDF-1.4", &status)
            .await
            .unwrap();

        assert!(printer.calls().is_empty());
        let event = rx.try_recv().unwrap();
        assert_eq!(event.message.status, MonitorStatus::Warning);
        assert!(event.message.text.contains("raw mode"));
    }

    #[tokio::test]
    async fn test_pdf_uses_matching_media_and_orientation() {
        let printer = MockPrinter::with_capabilities(PrinterCapabilities {
            paper_sizes: vec![MediaOption::new("A4", "A4"), MediaOption::new("Letter", "US Letter")],
            paper_sources: vec![MediaOption::new("Tray2", "Tray 2")],
        });
        let (status, _rx) = StatusReporter::channel("printing");
        let mut queue = PrintQueue::new("DOCS", "Laser");
        queue.paper_size = Some("Letter".to_string());
        queue.paper_source = Some("Tray2".to_string());
        queue.orientation = Orientation::Landscape;

        router(&printer)
            .dispatch(&queue, &job(), b"%PDF-1.4 body", &status)
            .await
            .unwrap();

        match printer.calls().as_slice() {
            [PrintCall::Pdf { request, .. }] => {
                assert_eq!(request.paper_size.as_deref(), Some("Letter"));
                assert_eq!(request.paper_source.as_deref(), Some("Tray2"));
                assert_eq!(request.orientation, Orientation::Landscape);
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_media_falls_back_to_default() {
        let printer = MockPrinter::with_capabilities(PrinterCapabilities::default());
        let (status, mut rx) = StatusReporter::channel("printing");
        let mut queue = PrintQueue::new("DOCS", "Laser");
        queue.paper_size = Some("A3".to_string());

        router(&printer)
            .dispatch(&queue, &job(), b"%PDF-1.4 body", &status)
            .await
            .unwrap();

        match printer.calls().as_slice() {
            [PrintCall::Pdf { request, .. }] => assert_eq!(request.paper_size, None),
            other => panic!("unexpected calls: {:?}", other),
        }
        let warning = rx.try_recv().unwrap();
        assert_eq!(warning.message.status, MonitorStatus::Warning);
        assert!(warning.message.text.contains("A3"));
    }

    #[tokio::test]
    async fn test_printer_failure_propagates() {
        let printer = MockPrinter::new();
        printer.set_failing(true);
        let (status, _rx) = StatusReporter::channel("printing");

        let result = router(&printer)
            .dispatch(&PrintQueue::raw("LABELS", "Zebra"), &job(), b"RAW", &status)
            .await;
        assert!(result.is_err());
    }
}
