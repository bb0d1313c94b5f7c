// Backend screen identifiers and command sequences

use base64::Engine;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::port::{ScreenCommand, SubmitResult};

/// Print job maintenance screen (lookup + delete)
pub const PRINT_JOBS_SCREEN: &str = "SM206500";
/// Print queue list
pub const PRINT_QUEUES_SCREEN: &str = "SM206510";
/// Scale maintenance screen
pub const SCALES_SCREEN: &str = "SM206530";

const REPORT_PARAMETERS: &str = "Parameters";
pub const REPORT_RESULTS: &str = "ReportResults";
pub const PDF_CONTENT: &str = "PdfContent";

/// Export the names of every print queue defined in the backend
pub fn queue_export_commands() -> Vec<ScreenCommand> {
    vec![ScreenCommand::field("Queues", "PrintQueue")]
}

/// Delete one print job by ID
pub fn delete_job_commands(job_id: &str) -> Vec<ScreenCommand> {
    vec![
        ScreenCommand::key("Job", "JobID", "=[Job.JobID]"),
        ScreenCommand::action("Job", "Cancel"),
        ScreenCommand::committed_value("Job", "JobID", job_id),
        ScreenCommand::action("Job", "Delete"),
    ]
}

/// Store the last stable weight on a scale record
pub fn update_weight_commands(scale_id: &str, weight: Decimal) -> Vec<ScreenCommand> {
    vec![
        ScreenCommand::key("Scale", "ScaleID", "=[Scale.ScaleID]"),
        ScreenCommand::action("Scale", "Cancel"),
        ScreenCommand::committed_value("Scale", "ScaleID", scale_id),
        ScreenCommand::value("Scale", "LastWeight", weight.normalize().to_string()),
        ScreenCommand::action("Scale", "Save"),
    ]
}

/// Run a report with the job's parameters and request its PDF rendering
pub fn report_commands(parameters: &HashMap<String, String>) -> Vec<ScreenCommand> {
    let mut names: Vec<&String> = parameters.keys().collect();
    names.sort();

    let mut commands: Vec<ScreenCommand> = names
        .into_iter()
        .map(|name| ScreenCommand::value(REPORT_PARAMETERS, name, parameters[name].clone()))
        .collect();
    commands.push(ScreenCommand::field(REPORT_RESULTS, PDF_CONTENT));
    commands
}

/// Decode the base64 PDF content of a report run
pub fn report_content(report_id: &str, results: &[SubmitResult]) -> Result<Vec<u8>> {
    let encoded = results
        .iter()
        .find_map(|row| row.field(REPORT_RESULTS, PDF_CONTENT))
        .filter(|content| !content.is_empty())
        .ok_or_else(|| AppError::Report(format!("report {} returned no content", report_id)))?;

    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| AppError::Report(format!("report {} content is not base64: {}", report_id, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{ContainerValues, FieldValue};
    use std::str::FromStr;

    fn pdf_result(content: &str) -> SubmitResult {
        SubmitResult {
            containers: vec![ContainerValues {
                name: REPORT_RESULTS.to_string(),
                fields: vec![FieldValue {
                    field: PDF_CONTENT.to_string(),
                    value: Some(content.to_string()),
                }],
            }],
        }
    }

    #[test]
    fn test_delete_job_commits_id_before_delete() {
        let commands = delete_job_commands("000123");
        assert_eq!(
            commands[2],
            ScreenCommand::committed_value("Job", "JobID", "000123")
        );
        assert_eq!(commands.last(), Some(&ScreenCommand::action("Job", "Delete")));
    }

    #[test]
    fn test_update_weight_formats_decimal() {
        let commands = update_weight_commands("SCALE01", Decimal::from_str("1.60").unwrap());
        assert!(commands.contains(&ScreenCommand::value("Scale", "LastWeight", "1.6")));
        assert_eq!(commands.last(), Some(&ScreenCommand::action("Scale", "Save")));
    }

    #[test]
    fn test_report_commands_are_sorted_and_request_pdf() {
        let parameters = HashMap::from([
            ("OrderNbr".to_string(), "SO001".to_string()),
            ("OrderType".to_string(), "SO".to_string()),
        ]);
        let commands = report_commands(&parameters);
        assert_eq!(
            commands,
            vec![
                ScreenCommand::value("Parameters", "OrderNbr", "SO001"),
                ScreenCommand::value("Parameters", "OrderType", "SO"),
                ScreenCommand::field("ReportResults", "PdfContent"),
            ]
        );
    }

    #[test]
    fn test_report_content_decodes_base64() {
        let bytes = report_content("SO641000", &[pdf_result("JVBERi0xLjQ=")]).unwrap();
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[test]
    fn test_report_without_content_is_an_error() {
        assert!(report_content("SO641000", &[SubmitResult::default()]).is_err());
        assert!(report_content("SO641000", &[pdf_result("")]).is_err());
        assert!(report_content("SO641000", &[pdf_result("!!not base64!!")]).is_err());
    }
}
