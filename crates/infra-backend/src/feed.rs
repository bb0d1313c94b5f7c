// Job feed: OData query for pending jobs and the push stream subscription

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use devicehub_core::domain::{PrintJobParameter, QueueName};
use devicehub_core::port::{BackendError, JobFeed, JobSubscription};

use crate::endpoint::{
    check_status, session_client, streaming_client, transport_error, Endpoint, REQUEST_TIMEOUT,
};
use crate::push::PushSubscription;

const JOBS_ENTITY: &str = "PrintJobs";

#[derive(Deserialize)]
struct ODataResponse {
    #[serde(default)]
    value: Vec<PrintJobParameter>,
}

/// `PrintQueue eq 'A' or PrintQueue eq 'B'`
pub fn queue_filter(queues: &[QueueName]) -> String {
    queues
        .iter()
        .map(|q| format!("PrintQueue eq '{}'", q.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Company-scoped URL first, then the unscoped fallback
pub fn odata_urls(endpoint: &Endpoint) -> Vec<String> {
    let mut urls = Vec::with_capacity(2);
    if let Some(company) = endpoint.company() {
        urls.push(endpoint.url(&format!("odata/{}/{}", company, JOBS_ENTITY)));
    }
    urls.push(endpoint.url(&format!("odata/{}", JOBS_ENTITY)));
    urls
}

pub struct HttpJobFeed {
    endpoint: Endpoint,
    http: Client,
    stream_http: Client,
}

impl HttpJobFeed {
    pub fn new(endpoint: Endpoint) -> Result<Self, BackendError> {
        Ok(Self {
            endpoint,
            http: session_client()?,
            stream_http: streaming_client()?,
        })
    }
}

#[async_trait]
impl JobFeed for HttpJobFeed {
    async fn query_jobs(
        &self,
        queues: &[QueueName],
    ) -> Result<Vec<PrintJobParameter>, BackendError> {
        let filter = queue_filter(queues);
        let urls = odata_urls(&self.endpoint);

        for (attempt, url) in urls.iter().enumerate() {
            let request = self
                .http
                .get(url)
                .timeout(REQUEST_TIMEOUT)
                .query(&[("$filter", filter.as_str())]);
            let response = self
                .endpoint
                .basic_auth(request)
                .send()
                .await
                .map_err(transport_error)?;

            if response.status() == StatusCode::NOT_FOUND && attempt + 1 < urls.len() {
                debug!(url = %url, "Company-scoped job query not found, retrying unscoped");
                continue;
            }

            let parsed: ODataResponse = check_status(response)
                .await?
                .json()
                .await
                .map_err(transport_error)?;
            debug!(rows = parsed.value.len(), "Queried pending print jobs");
            return Ok(parsed.value);
        }
        Err(BackendError::Protocol("no job query endpoint".to_string()))
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn JobSubscription>, BackendError> {
        let request = self
            .stream_http
            .get(self.endpoint.url(&format!("push/{}", topic)))
            .header(reqwest::header::ACCEPT, "application/x-ndjson");
        let response = self
            .endpoint
            .basic_auth(request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        info!(topic, "Subscribed to push notifications");
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(transport_error))
            .boxed();
        Ok(Box::new(PushSubscription::new(topic, chunks)))
    }
}
