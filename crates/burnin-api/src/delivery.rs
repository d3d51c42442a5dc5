//! Streaming delivery of finished exports.
//!
//! The file is read from disk in fixed-size chunks and every chunk handed to
//! the client is counted. When the response body is dropped, whether because
//! it finished or because the client went away, a guard logs how much was
//! delivered and schedules removal of the file after a grace delay. Range
//! requests only schedule removal when they cover the final byte; the output
//! sweeper takes care of abandoned partial downloads.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use burnin_export::ExportOrchestrator;
use burnin_models::ExportToken;

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Read size for streamed bodies.
pub const CHUNK_SIZE: usize = 64 * 1024;

const FALLBACK_FILENAME: &str = "export.mp4";

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ByteRange {
    /// Number of bytes covered; never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Whether the range ends at the last byte of a file of `size` bytes.
    pub fn reaches_end(&self, size: u64) -> bool {
        self.end + 1 >= size
    }

    fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse a `Range` header against a file of `size` bytes.
///
/// Returns `Ok(None)` when the header should be ignored and the whole file
/// served: unknown units, multiple ranges, or syntax that does not parse.
/// A range starting at or past the end of the file is not satisfiable.
pub fn parse_range(value: &str, size: u64) -> ApiResult<Option<ByteRange>> {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    if spec.contains(',') {
        return Ok(None);
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return Ok(None);
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix range: the final `n` bytes
        let Ok(suffix) = last.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || size == 0 {
            return Err(ApiError::RangeNotSatisfiable(size));
        }
        return Ok(Some(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        }));
    }

    let Ok(start) = first.parse::<u64>() else {
        return Ok(None);
    };
    if start >= size {
        return Err(ApiError::RangeNotSatisfiable(size));
    }

    let end = if last.is_empty() {
        size - 1
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(size - 1),
            _ => return Ok(None),
        }
    };

    Ok(Some(ByteRange { start, end }))
}

/// ASCII-only download name safe for a quoted header parameter.
pub fn sanitize_download_filename(name: &str) -> String {
    let safe_joined: String = name
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("");

    let sanitized: String = safe_joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(100)
        .collect();

    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() || sanitized == "mp4" {
        FALLBACK_FILENAME.to_string()
    } else if !sanitized.to_lowercase().ends_with(".mp4") {
        format!("{}.mp4", sanitized)
    } else {
        sanitized.to_string()
    }
}

/// `Content-Disposition` value with an ASCII fallback and the UTF-8 name.
pub fn content_disposition(name: &str) -> String {
    let ascii = sanitize_download_filename(name);

    let display: String = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .take(100)
        .collect();
    let display = display.trim();

    if display.is_empty() {
        return format!("attachment; filename=\"{}\"", ascii);
    }
    let display = if display.to_lowercase().ends_with(".mp4") {
        display.to_string()
    } else {
        format!("{}.mp4", display)
    };

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(&display)
    )
}

/// A finished export ready to be streamed.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub token: ExportToken,
    pub path: PathBuf,
    pub filename: String,
}

/// What the body guard knows when the response is dropped.
struct DeliveryReport {
    delivery: Delivery,
    orchestrator: ExportOrchestrator,
    grace: Duration,
    expected: u64,
    sent: u64,
    cleanup: bool,
    started: Instant,
}

impl DeliveryReport {
    fn finish(self) {
        let complete = self.sent >= self.expected;
        let outcome = if complete { "full" } else { "partial" };
        let elapsed_ms = self.started.elapsed().as_millis() as u64;

        if complete {
            info!(
                token = %self.delivery.token,
                bytes = self.sent,
                elapsed_ms,
                "Delivery finished"
            );
        } else {
            warn!(
                token = %self.delivery.token,
                bytes = self.sent,
                expected = self.expected,
                elapsed_ms,
                "Delivery ended early"
            );
        }
        metrics::record_delivery(outcome, self.sent);

        if self.cleanup {
            schedule_cleanup(
                self.orchestrator,
                self.delivery.token,
                self.delivery.path,
                self.grace,
            );
        }
    }
}

/// Remove the file and its record once the grace delay has passed.
pub fn schedule_cleanup(
    orchestrator: ExportOrchestrator,
    token: ExportToken,
    path: PathBuf,
    grace: Duration,
) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        warn!(token = %token, "No runtime for deferred cleanup, leaving file to the sweeper");
        return;
    };

    handle.spawn(async move {
        tokio::time::sleep(grace).await;
        if let Err(e) = orchestrator.discard(&token, &path).await {
            warn!(token = %token, error = %e, "Deferred cleanup failed");
        }
    });
}

/// Stream `delivery` to the client, honouring an optional `Range` header.
pub async fn stream_export(
    orchestrator: &ExportOrchestrator,
    delivery: Delivery,
    range_header: Option<&str>,
    grace: Duration,
) -> ApiResult<Response> {
    let mut file = match tokio::fs::File::open(&delivery.path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Export file not found or already delivered"));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to open export: {}", e))),
    };
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to stat export: {}", e)))?
        .len();

    let range = match range_header {
        Some(value) => parse_range(value, size)?,
        None => None,
    };

    let (start, expected) = match range {
        Some(r) => (r.start, r.len()),
        None => (0, size),
    };
    if start > 0 {
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| ApiError::internal(format!("Failed to seek export: {}", e)))?;
    }

    let disposition = content_disposition(&delivery.filename);
    let token = delivery.token.clone();

    let report = DeliveryReport {
        delivery,
        orchestrator: orchestrator.clone(),
        grace,
        expected,
        sent: 0,
        cleanup: range.map_or(true, |r| r.reaches_end(size)),
        started: Instant::now(),
    };
    let mut guard = scopeguard::guard(report, DeliveryReport::finish);

    let body = ReaderStream::with_capacity(file.take(expected), CHUNK_SIZE).map(move |chunk| {
        match &chunk {
            Ok(bytes) => guard.sent += bytes.len() as u64,
            Err(e) => warn!(token = %guard.delivery.token, error = %e, "Read failed during delivery"),
        }
        chunk
    });

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, expected)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "no-store");

    if let Ok(value) = HeaderValue::from_str(&disposition) {
        builder = builder.header(header::CONTENT_DISPOSITION, value);
    }

    builder = match range {
        Some(r) => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, r.content_range(size)),
        None => builder.status(StatusCode::OK),
    };

    info!(token = %token, bytes = expected, size, ranged = range.is_some(), "Starting delivery");

    builder
        .body(Body::from_stream(body))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(value: &str, size: u64) -> Option<ByteRange> {
        parse_range(value, size).unwrap()
    }

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(range("bytes=0-99", 1000), Some(ByteRange { start: 0, end: 99 }));
        assert_eq!(range("bytes=900-", 1000), Some(ByteRange { start: 900, end: 999 }));
        assert_eq!(range("bytes=-100", 1000), Some(ByteRange { start: 900, end: 999 }));
        // End past the file is clamped
        assert_eq!(range("bytes=500-5000", 1000), Some(ByteRange { start: 500, end: 999 }));
        // Suffix longer than the file covers all of it
        assert_eq!(range("bytes=-5000", 1000), Some(ByteRange { start: 0, end: 999 }));
    }

    #[test]
    fn test_parse_range_ignored() {
        assert_eq!(range("items=0-1", 1000), None);
        assert_eq!(range("bytes=0-1,5-6", 1000), None);
        assert_eq!(range("bytes=abc", 1000), None);
        assert_eq!(range("bytes=10-5", 1000), None);
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        assert!(matches!(
            parse_range("bytes=1000-", 1000),
            Err(ApiError::RangeNotSatisfiable(1000))
        ));
        assert!(matches!(
            parse_range("bytes=-0", 1000),
            Err(ApiError::RangeNotSatisfiable(1000))
        ));
        assert!(matches!(
            parse_range("bytes=0-", 0),
            Err(ApiError::RangeNotSatisfiable(0))
        ));
    }

    #[test]
    fn test_range_reaches_end() {
        assert!(ByteRange { start: 900, end: 999 }.reaches_end(1000));
        assert!(!ByteRange { start: 0, end: 998 }.reaches_end(1000));
        assert_eq!(ByteRange { start: 10, end: 19 }.len(), 10);
    }

    #[test]
    fn test_sanitize_download_filename() {
        assert_eq!(sanitize_download_filename("my-video.mp4"), "my-video.mp4");
        assert_eq!(sanitize_download_filename("my video"), "myvideo.mp4");
        assert_eq!(sanitize_download_filename(""), "export.mp4");
        assert_eq!(sanitize_download_filename("../../etc/passwd"), "etcpasswd.mp4");
        assert_eq!(sanitize_download_filename(".hidden.mp4"), "hidden.mp4");
    }

    #[test]
    fn test_content_disposition_utf8() {
        let value = content_disposition("Grüße aus Köln.mp4");
        assert!(value.starts_with("attachment; filename=\"Gre"));
        assert!(value.contains("filename*=UTF-8''Gr%C3%BC%C3%9Fe%20aus%20K%C3%B6ln.mp4"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn test_content_disposition_strips_quotes_and_dirs() {
        let value = content_disposition("clips/\"final\"");
        assert!(value.contains("filename*=UTF-8''final.mp4"));
        assert!(value.contains("filename=\"clipsfinal.mp4\""));
    }
}
