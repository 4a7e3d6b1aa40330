use std::fmt::Display;
use std::future::Future;

/// Result of a retried operation plus the number of attempts made.
#[derive(Debug)]
pub(crate) struct Attempts<T, E> {
    pub(crate) result: Result<T, E>,
    pub(crate) attempts: u64,
}

/// Run `operation` up to `1 + max(retries, 0)` times back to back, stopping at the first success.
pub(crate) async fn retry_immediately<T, E, F, Fut>(retries: i64, mut operation: F) -> Attempts<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = 1 + retries.max(0).unsigned_abs();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                return Attempts {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(error) if attempt < max_attempts => {
                tracing::warn!(attempt, max_attempts, %error, "Attempt failed; retrying");
            }
            Err(error) => {
                tracing::warn!(attempt, max_attempts, %error, "Attempt failed; giving up");
                return Attempts {
                    result: Err(error),
                    attempts: attempt,
                };
            }
        }
    }
}
