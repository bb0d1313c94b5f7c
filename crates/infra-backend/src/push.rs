// Push subscription: newline-delimited notification batches over a streamed response

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use devicehub_core::domain::NotificationBatch;
use devicehub_core::port::{BackendError, JobSubscription};

/// Longest notification line accepted before the stream is treated as broken
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Splits a byte stream into lines
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
    max_line: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_LEN)
    }
}

impl LineDecoder {
    pub fn with_limit(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete, non-blank line.
    ///
    /// Fails once the pending partial line grows past the limit.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>, BackendError> {
        while let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|b| *b == b'\n')
        {
            let end = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            self.scanned = 0;
            let trimmed = line.trim_ascii();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_vec()));
            }
        }
        self.scanned = self.buffer.len();
        if self.buffer.len() > self.max_line {
            let pending = self.buffer.len();
            self.buffer.clear();
            self.scanned = 0;
            return Err(BackendError::Protocol(format!(
                "notification line exceeds {} bytes ({} pending)",
                self.max_line, pending
            )));
        }
        Ok(None)
    }

    /// Whatever is left once the stream has ended
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buffer);
        let trimmed = rest.trim_ascii();
        (!trimmed.is_empty()).then(|| trimmed.to_vec())
    }
}

pub fn decode_batch(line: &[u8]) -> Result<NotificationBatch, BackendError> {
    serde_json::from_slice(line)
        .map_err(|e| BackendError::Protocol(format!("notification batch: {}", e)))
}

pub struct PushSubscription {
    topic: String,
    chunks: Option<BoxStream<'static, Result<Vec<u8>, BackendError>>>,
    decoder: LineDecoder,
}

impl PushSubscription {
    pub fn new(
        topic: impl Into<String>,
        chunks: BoxStream<'static, Result<Vec<u8>, BackendError>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            chunks: Some(chunks),
            decoder: LineDecoder::default(),
        }
    }
}

#[async_trait]
impl JobSubscription for PushSubscription {
    async fn next_batch(&mut self) -> Option<Result<NotificationBatch, BackendError>> {
        loop {
            match self.decoder.next_line() {
                Ok(Some(line)) => return Some(decode_batch(&line)),
                Ok(None) => {}
                Err(e) => {
                    warn!(topic = %self.topic, error = %e, "Push stream overflowed");
                    self.chunks = None;
                    return Some(Err(e));
                }
            }
            let chunks = self.chunks.as_mut()?;
            match chunks.next().await {
                Some(Ok(chunk)) => self.decoder.push(&chunk),
                Some(Err(e)) => {
                    warn!(topic = %self.topic, error = %e, "Push stream failed");
                    self.chunks = None;
                    return Some(Err(e));
                }
                None => {
                    debug!(topic = %self.topic, "Push stream ended");
                    self.chunks = None;
                    return self.decoder.finish().map(|line| decode_batch(&line));
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.chunks.take().is_some() {
            debug!(topic = %self.topic, "Push subscription closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    const BATCH: &str = r#"{"Inserted":[{"JobID":"0001","PrintQueue":"LABELS","ParameterName":"FILEID","ParameterValue":"F1"}],"Deleted":[],"TimeStamp":638400000000000000}"#;

    #[test]
    fn test_decoder_handles_split_chunks_and_blank_lines() {
        let mut decoder = LineDecoder::default();
        decoder.push(b"{\"a\":");
        assert_eq!(decoder.next_line().unwrap(), None);
        decoder.push(b"1}\r\n\n{\"b\":2}\n{\"c\"");
        assert_eq!(decoder.next_line().unwrap(), Some(b"{\"a\":1}".to_vec()));
        assert_eq!(decoder.next_line().unwrap(), Some(b"{\"b\":2}".to_vec()));
        assert_eq!(decoder.next_line().unwrap(), None);
        assert_eq!(decoder.finish(), Some(b"{\"c\"".to_vec()));
    }

    #[test]
    fn test_decoder_finds_newline_after_many_partial_chunks() {
        let mut decoder = LineDecoder::default();
        for _ in 0..100 {
            decoder.push(b"xxxx");
            assert_eq!(decoder.next_line().unwrap(), None);
        }
        decoder.push(b"y\nz");
        let line = decoder.next_line().unwrap().unwrap();
        assert_eq!(line.len(), 401);
        assert_eq!(line.last(), Some(&b'y'));
        assert_eq!(decoder.next_line().unwrap(), None);
        assert_eq!(decoder.finish(), Some(b"z".to_vec()));
    }

    #[test]
    fn test_decoder_rejects_line_past_limit() {
        let mut decoder = LineDecoder::with_limit(8);
        decoder.push(b"0123");
        assert_eq!(decoder.next_line().unwrap(), None);
        decoder.push(b"45678");
        assert!(matches!(
            decoder.next_line(),
            Err(BackendError::Protocol(_))
        ));
        // A complete line within the limit is still fine afterwards
        decoder.push(b"ok\n");
        assert_eq!(decoder.next_line().unwrap(), Some(b"ok".to_vec()));
    }

    #[tokio::test]
    async fn test_oversized_line_ends_subscription() {
        let chunk = vec![b'x'; MAX_LINE_LEN / 2 + 1];
        let chunks: Vec<Result<Vec<u8>, BackendError>> =
            vec![Ok(chunk.clone()), Ok(chunk), Ok(b"\n".to_vec())];
        let mut sub = PushSubscription::new("PrintJobs", stream::iter(chunks).boxed());

        assert!(matches!(
            sub.next_batch().await,
            Some(Err(BackendError::Protocol(_)))
        ));
        assert!(sub.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn test_subscription_yields_batches_then_ends() {
        let chunks: Vec<Result<Vec<u8>, BackendError>> = vec![
            Ok(BATCH[..20].as_bytes().to_vec()),
            Ok(format!("{}\n", &BATCH[20..]).into_bytes()),
        ];
        let mut sub = PushSubscription::new("PrintJobs", stream::iter(chunks).boxed());

        let batch = sub.next_batch().await.unwrap().unwrap();
        let jobs = batch.inserted_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].file_id(), Some("F1"));
        assert!(sub.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_once() {
        let chunks: Vec<Result<Vec<u8>, BackendError>> =
            vec![Err(BackendError::Unreachable("reset".to_string()))];
        let mut sub = PushSubscription::new("PrintJobs", stream::iter(chunks).boxed());

        assert!(matches!(sub.next_batch().await, Some(Err(_))));
        assert!(sub.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_line_is_protocol_error() {
        let chunks: Vec<Result<Vec<u8>, BackendError>> = vec![Ok(b"not json\n".to_vec())];
        let mut sub = PushSubscription::new("PrintJobs", stream::iter(chunks).boxed());
        assert!(matches!(
            sub.next_batch().await,
            Some(Err(BackendError::Protocol(_)))
        ));
    }
}
