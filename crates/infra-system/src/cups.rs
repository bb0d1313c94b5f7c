// CUPS spooler adapter
// reason: tokio::process for non-blocking `lp`/`lpoptions`/`lpstat` calls
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use devicehub_core::domain::Orientation;
use devicehub_core::port::{
    MediaOption, PdfPrintRequest, PdfRenderer, PrintError, PrinterCapabilities, RawPrinter,
};

/// Default deadline for a single spooler command
pub const SPOOLER_TIMEOUT: Duration = Duration::from_secs(30);

const PAGE_SIZE_OPTION: &str = "PageSize";
const INPUT_SLOT_OPTION: &str = "InputSlot";

/// Prints through the local CUPS command line tools
pub struct CupsSpooler {
    command_timeout: Duration,
}

impl Default for CupsSpooler {
    fn default() -> Self {
        Self::new(SPOOLER_TIMEOUT)
    }
}

impl CupsSpooler {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }

    /// Names of every configured print destination
    pub async fn list_printers(&self) -> Result<Vec<String>, PrintError> {
        let stdout = self.run("lpstat", &["-e".to_string()], None).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Spawn a spooler tool, feed `input` on stdin and collect stdout
    async fn run(
        &self,
        program: &str,
        args: &[String],
        input: Option<&[u8]>,
    ) -> Result<String, PrintError> {
        debug!(program, args = ?args, "Running spooler command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PrintError::Io(format!("{}: {}", program, e)))?;

        if let (Some(data), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin
                .write_all(data)
                .await
                .map_err(|e| PrintError::Io(e.to_string()))?;
            // Closing stdin tells the tool the document is complete
            drop(stdin);
        }

        let output = match timeout(self.command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(PrintError::Io(e.to_string())),
            Err(_) => {
                return Err(PrintError::Spooler(format!(
                    "{} did not finish within {:?}",
                    program, self.command_timeout
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_failure(program, &stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn classify_failure(program: &str, stderr: &str) -> PrintError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("does not exist") || lowered.contains("unknown destination") {
        PrintError::PrinterNotFound(stderr.to_string())
    } else {
        PrintError::Spooler(format!("{} failed: {}", program, stderr))
    }
}

/// `lp` arguments for a byte-exact job
pub fn raw_job_args(printer: &str, document_name: &str) -> Vec<String> {
    vec![
        "-d".to_string(),
        printer.to_string(),
        "-t".to_string(),
        document_name.to_string(),
        "-o".to_string(),
        "raw".to_string(),
        "-".to_string(),
    ]
}

/// `lp` arguments for a rendered PDF job
pub fn pdf_job_args(request: &PdfPrintRequest) -> Vec<String> {
    let mut args = vec![
        "-d".to_string(),
        request.printer.clone(),
        "-t".to_string(),
        request.document_name.clone(),
    ];
    if let Some(size) = &request.paper_size {
        args.push("-o".to_string());
        args.push(format!("{}={}", PAGE_SIZE_OPTION, size));
    }
    if let Some(source) = &request.paper_source {
        args.push("-o".to_string());
        args.push(format!("{}={}", INPUT_SLOT_OPTION, source));
    }
    match request.orientation {
        // CUPS rotates each page to fit when no orientation is requested
        Orientation::Automatic => {}
        Orientation::Portrait => {
            args.push("-o".to_string());
            args.push("orientation-requested=3".to_string());
        }
        Orientation::Landscape => {
            args.push("-o".to_string());
            args.push("orientation-requested=4".to_string());
        }
    }
    args.push("-".to_string());
    args
}

/// Parse `lpoptions -l` output into paper sizes and sources.
///
/// Lines look like `PageSize/Media Size: Letter *A4 Legal`; the `*` marks the
/// current default.
pub fn parse_capabilities(output: &str) -> PrinterCapabilities {
    let mut capabilities = PrinterCapabilities::default();
    for line in output.lines() {
        let Some((key, values)) = line.split_once(':') else {
            continue;
        };
        let option = key.split('/').next().unwrap_or_default().trim();
        let choices = values
            .split_whitespace()
            .map(|v| v.trim_start_matches('*'))
            .filter(|v| !v.is_empty())
            .map(|v| MediaOption::new(v, v));

        match option {
            PAGE_SIZE_OPTION => capabilities.paper_sizes.extend(choices),
            INPUT_SLOT_OPTION => capabilities.paper_sources.extend(choices),
            _ => {}
        }
    }
    capabilities
}

#[async_trait]
impl RawPrinter for CupsSpooler {
    async fn send_raw(
        &self,
        printer: &str,
        document_name: &str,
        data: &[u8],
    ) -> Result<(), PrintError> {
        let stdout = self
            .run("lp", &raw_job_args(printer, document_name), Some(data))
            .await?;
        info!(printer, bytes = data.len(), response = %stdout.trim(), "Raw job spooled");
        Ok(())
    }
}

#[async_trait]
impl PdfRenderer for CupsSpooler {
    async fn capabilities(&self, printer: &str) -> Result<PrinterCapabilities, PrintError> {
        let stdout = self
            .run(
                "lpoptions",
                &["-p".to_string(), printer.to_string(), "-l".to_string()],
                None,
            )
            .await?;
        Ok(parse_capabilities(&stdout))
    }

    async fn print_pdf(&self, request: &PdfPrintRequest, data: &[u8]) -> Result<(), PrintError> {
        let stdout = self.run("lp", &pdf_job_args(request), Some(data)).await?;
        info!(printer = %request.printer, bytes = data.len(), response = %stdout.trim(), "PDF job spooled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_args_disable_filtering() {
        let args = raw_job_args("Zebra", "Label 1");
        assert_eq!(args, vec!["-d", "Zebra", "-t", "Label 1", "-o", "raw", "-"]);
    }

    #[test]
    fn test_pdf_args_include_media_and_orientation() {
        let mut request = PdfPrintRequest::new("Laser", "Invoice", Orientation::Landscape);
        request.paper_size = Some("A4".to_string());
        request.paper_source = Some("Tray2".to_string());

        let args = pdf_job_args(&request);
        assert!(args.contains(&"PageSize=A4".to_string()));
        assert!(args.contains(&"InputSlot=Tray2".to_string()));
        assert!(args.contains(&"orientation-requested=4".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_pdf_args_automatic_uses_defaults() {
        let request = PdfPrintRequest::new("Laser", "Invoice", Orientation::Automatic);
        assert_eq!(pdf_job_args(&request), vec!["-d", "Laser", "-t", "Invoice", "-"]);
    }

    #[test]
    fn test_parse_capabilities() {
        let output = "\
PageSize/Media Size: Letter *A4 Legal Env10
InputSlot/Media Source: *Auto Tray1 Tray2
Duplex/2-Sided Printing: *None DuplexNoTumble
";
        let caps = parse_capabilities(output);
        assert_eq!(caps.paper_sizes.len(), 4);
        assert!(caps.paper_size("A4").is_some());
        assert!(caps.paper_source("Tray2").is_some());
        assert!(caps.paper_source("None").is_none());
    }

    #[test]
    fn test_unknown_destination_maps_to_not_found() {
        assert!(matches!(
            classify_failure("lp", "lp: The printer or class does not exist."),
            PrintError::PrinterNotFound(_)
        ));
        assert!(matches!(
            classify_failure("lp", "lp: Error - scheduler not responding."),
            PrintError::Spooler(_)
        ));
    }
}
