//! HTTP range-request transport on top of the host `HttpClient`.

use crate::error::{PlaybackError, Result};
use crate::traits::{AudioTransport, FetchedChunk};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_library::TrackId;
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Maps a track to the URL its audio is served from.
pub type UrlResolver = Arc<dyn Fn(&TrackId) -> String + Send + Sync>;

/// [`AudioTransport`] that issues `Range` requests.
#[derive(Clone)]
pub struct HttpRangeTransport {
    client: Arc<dyn HttpClient>,
    resolve_url: UrlResolver,
}

impl HttpRangeTransport {
    pub fn new(client: Arc<dyn HttpClient>, resolve_url: UrlResolver) -> Self {
        Self {
            client,
            resolve_url,
        }
    }

    /// Convenience resolver: `{base}/{track_id}`.
    pub fn with_base_url(client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        Self::new(
            client,
            Arc::new(move |track_id: &TrackId| format!("{}/{}", base, track_id)),
        )
    }
}

impl std::fmt::Debug for HttpRangeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRangeTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl AudioTransport for HttpRangeTransport {
    #[instrument(skip(self, track_id), fields(track_id = %track_id))]
    async fn fetch_range(
        &self,
        track_id: &TrackId,
        offset: u64,
        max_len: u64,
    ) -> Result<FetchedChunk> {
        if max_len == 0 {
            return Err(PlaybackError::InvalidRange(format!(
                "zero-length fetch at offset {}",
                offset
            )));
        }

        let url = (self.resolve_url)(track_id);
        let end = offset.saturating_add(max_len - 1);
        let request = HttpRequest::new(HttpMethod::Get, url.clone()).range(offset, end);

        let response = self.client.execute(request).await.map_err(|e| {
            warn!(url = %redact_url(&url), error = %e, "Range request failed");
            PlaybackError::StreamingFailed(e.to_string())
        })?;

        debug!(
            url = %redact_url(&url),
            status = response.status,
            bytes = response.body.len(),
            "Range response"
        );

        chunk_from_response(response, offset, max_len)
    }
}

fn chunk_from_response(response: HttpResponse, offset: u64, max_len: u64) -> Result<FetchedChunk> {
    match response.status {
        206 => {
            let (start, total) = response
                .header("content-range")
                .and_then(parse_content_range)
                .map(|range| (range.start, range.total))
                .unwrap_or((offset, None));
            if start != offset {
                return Err(PlaybackError::StreamingFailed(format!(
                    "server returned range starting at {} for request at {}",
                    start, offset
                )));
            }
            Ok(FetchedChunk::new(response.body, total))
        }
        200 => {
            // Server ignored the Range header and sent the whole body.
            let total = response.body.len() as u64;
            if offset >= total {
                return Ok(FetchedChunk::end(Some(total)));
            }
            let end = offset.saturating_add(max_len).min(total);
            Ok(FetchedChunk::new(
                response.body.slice(offset as usize..end as usize),
                Some(total),
            ))
        }
        416 => {
            let total = response
                .header("content-range")
                .and_then(parse_content_range)
                .and_then(|range| range.total);
            Ok(FetchedChunk::end(total))
        }
        404 | 410 => Err(PlaybackError::SourceUnavailable(format!(
            "HTTP {}",
            response.status
        ))),
        status => Err(PlaybackError::StreamingFailed(format!("HTTP {}", status))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    start: u64,
    total: Option<u64>,
}

/// Parse `bytes a-b/total`, `bytes a-b/*` or `bytes */total`.
fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };
    let start = match range.trim() {
        "*" => total.unwrap_or(0),
        r => r.split_once('-')?.0.trim().parse().ok()?,
    };
    Some(ContentRange { start, total })
}
