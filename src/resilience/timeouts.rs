//! Timeout enforcement for optional subrequests.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Fail open: a late or failed subrequest yields `None` and the caller
//!   continues with what it already has
//! - The origin fetch itself is not wrapped here; its deadline lives on the
//!   HTTP client

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Await `fut` for at most `limit`. Timeouts and errors are logged and
/// turned into `None`.
pub async fn fail_open<F, T, E>(what: &'static str, limit: Duration, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::warn!(subrequest = what, error = %e, "Subrequest failed, continuing without it");
            None
        }
        Err(_) => {
            tracing::warn!(
                subrequest = what,
                timeout_ms = limit.as_millis() as u64,
                "Subrequest timed out, continuing without it"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn value_passes_through() {
        let out = fail_open("ok", Duration::from_secs(1), async { Ok::<_, String>(7) }).await;
        assert_eq!(out, Some(7));
    }

    #[tokio::test]
    async fn errors_become_none() {
        let out = fail_open("err", Duration::from_secs(1), async { Err::<u8, _>("boom") }).await;
        assert_eq!(out, None);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_futures_time_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, String>(1)
        };
        assert_eq!(fail_open("slow", Duration::from_secs(3), slow).await, None);
    }
}
