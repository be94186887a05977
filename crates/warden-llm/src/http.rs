//! reqwest client for the OpenAI-compatible backend.

use std::time::Duration;

use crate::error::LlmError;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 5;

/// `request_timeout` bounds the whole request. Connecting is capped at
/// [`CONNECT_TIMEOUT`] on its own so an unreachable host fails fast.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn default_client(request_timeout: Duration) -> Result<reqwest::Client, LlmError> {
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
        .timeout(request_timeout)
        .user_agent(concat!("warden/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_short_timeout() {
        assert!(default_client(Duration::from_millis(500)).is_ok());
    }
}
