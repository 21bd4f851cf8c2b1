//! HTTP error mapping shared by the remote language model adapters.

use reqwest::StatusCode;
use std::time::Duration;

use crate::ports::AIError;

/// Maps a reqwest failure onto the port's error taxonomy.
pub(crate) fn map_send_error(err: reqwest::Error, timeout: Duration) -> AIError {
    if err.is_timeout() {
        AIError::timeout(timeout.as_secs())
    } else if err.is_connect() {
        AIError::network(format!("Connection failed: {}", err))
    } else {
        AIError::network(err.to_string())
    }
}

/// Maps a non-success HTTP status and its body.
pub(crate) fn map_status(status: StatusCode, body: &str) -> AIError {
    match status.as_u16() {
        401 | 403 => AIError::AuthenticationFailed,
        429 => AIError::rate_limited(parse_retry_after(body)),
        400 | 413 => {
            if body.contains("maximum context length") || body.contains("context_length_exceeded")
            {
                AIError::ContextTooLong {
                    message: body.to_string(),
                }
            } else {
                AIError::InvalidRequest(body.to_string())
            }
        }
        404 => AIError::InvalidRequest(format!("Endpoint or model not found: {}", body)),
        500..=599 => AIError::unavailable(format!("Server error {}: {}", status, body)),
        _ => AIError::network(format!("Unexpected status {}: {}", status, body)),
    }
}

/// Extracts "try again in Ns" from an error body, defaulting to 30 seconds.
fn parse_retry_after(body: &str) -> u32 {
    const MARKER: &str = "try again in ";
    body.find(MARKER)
        .map(|idx| &body[idx + MARKER.len()..])
        .and_then(|rest| {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .unwrap_or(30)
}
