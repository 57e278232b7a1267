//! Retry with exponential backoff for transient storage failures.

use anyhow::Result;
use silo_core::SiloError;
use std::time::Duration;

/// Maximum retry attempts after the initial try.
const MAX_RETRIES: u32 = 3;
/// First backoff delay; doubles on each retry.
const INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Run `op`, retrying transient failures up to three times with
/// exponential backoff (100 ms, 200 ms, 400 ms).
///
/// Transience is decided by the error message, matching the storage
/// layer's retryable conditions (lock contention, connection loss,
/// timeouts). Permanent errors are returned immediately.
///
/// # Errors
/// Returns the last error when all attempts fail, or the first permanent
/// error encountered.
pub fn with_backoff<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut delay = INITIAL_DELAY;
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                let transient = SiloError::classify(err.to_string()).is_transient();
                if !transient || attempt >= MAX_RETRIES {
                    return Err(err);
                }
                attempt += 1;
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient storage failure, retrying"
                );
                std::thread::sleep(delay);
                delay *= 2;
            }
        }
    }
}
