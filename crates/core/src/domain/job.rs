// Print Job Domain Model

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::queue::QueueName;

/// Remote job identifier
pub type JobId = String;

/// Parameter that references a file in the backend file store (raw jobs)
pub const FILE_ID_PARAMETER: &str = "FILEID";

/// One (job, parameter) row as delivered by the job query and the push feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrintJobParameter {
    #[serde(rename = "JobID", default)]
    pub job_id: Option<JobId>,
    #[serde(rename = "ReportID", default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub print_queue: Option<QueueName>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameter_name: Option<String>,
    #[serde(default)]
    pub parameter_value: Option<String>,
}

/// Job identity: the same ID on two queues is two jobs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey {
    pub job_id: JobId,
    pub queue: QueueName,
}

impl JobKey {
    pub fn new(job_id: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            queue: queue.into(),
        }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.job_id, self.queue)
    }
}

/// A job materialized from parameter rows (transient, never persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub key: JobKey,
    /// Empty => raw job backed by a file in the backend file store
    pub report_id: String,
    pub description: String,
    pub parameters: HashMap<String, String>,
}

impl PrintJob {
    pub fn id(&self) -> &str {
        &self.key.job_id
    }

    pub fn queue(&self) -> &str {
        &self.key.queue
    }

    pub fn is_file_backed(&self) -> bool {
        self.report_id.is_empty()
    }

    pub fn file_id(&self) -> Option<&str> {
        self.parameters.get(FILE_ID_PARAMETER).map(String::as_str)
    }
}

/// Group parameter rows by job identity, in order of first appearance.
///
/// Rows without a job ID or queue are dropped. Report ID and description come
/// from the first row of each job; rows without a parameter name contribute
/// no parameter.
pub fn group_rows(rows: &[PrintJobParameter]) -> Vec<PrintJob> {
    let mut jobs: Vec<PrintJob> = Vec::new();
    let mut index: HashMap<JobKey, usize> = HashMap::new();

    for row in rows {
        let (Some(job_id), Some(queue)) = (&row.job_id, &row.print_queue) else {
            continue;
        };
        let key = JobKey::new(job_id.clone(), queue.clone());

        let slot = *index.entry(key.clone()).or_insert_with(|| {
            jobs.push(PrintJob {
                key,
                report_id: row.report_id.clone().unwrap_or_default(),
                description: row.description.clone().unwrap_or_default(),
                parameters: HashMap::new(),
            });
            jobs.len() - 1
        });

        if let Some(name) = &row.parameter_name {
            jobs[slot].parameters.insert(
                name.clone(),
                row.parameter_value.clone().unwrap_or_default(),
            );
        }
    }

    jobs
}

/// Push notification batch for the print-jobs topic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationBatch {
    #[serde(default)]
    pub inserted: Vec<PrintJobParameter>,
    #[serde(default)]
    pub deleted: Vec<PrintJobParameter>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub id: Option<uuid::Uuid>,
    #[serde(default)]
    pub time_stamp: i64,
    #[serde(default)]
    pub additional_info: Option<HashMap<String, serde_json::Value>>,
}

impl NotificationBatch {
    /// Jobs inserted by this batch, excluding any also deleted within it
    pub fn inserted_jobs(&self) -> Vec<PrintJob> {
        let deleted: HashSet<JobKey> = group_rows(&self.deleted)
            .into_iter()
            .map(|job| job.key)
            .collect();

        group_rows(&self.inserted)
            .into_iter()
            .filter(|job| !deleted.contains(&job.key))
            .collect()
    }
}
