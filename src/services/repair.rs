//! Bounded validate-and-repair loop for generative model output.
//!
//! A model call returns raw text. The text is validated; on failure a repair
//! call receives the bad text and the validation error and produces a new
//! candidate. After `max_repairs` repairs the last validation error surfaces
//! as [`DomainError::SchemaValidation`].

use std::future::Future;

use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};

/// Run `call`, then validate and repair its output at most `max_repairs`
/// times.
///
/// Errors returned by `call` or `repair` themselves (transport, timeout,
/// cancellation) propagate immediately and are not counted as attempts.
pub async fn with_repair<T, C, CF, V, R, RF>(
    max_repairs: u32,
    call: C,
    validate: V,
    mut repair: R,
) -> DomainResult<T>
where
    C: FnOnce() -> CF,
    CF: Future<Output = DomainResult<String>>,
    V: Fn(&str) -> Result<T, String>,
    R: FnMut(String, String) -> RF,
    RF: Future<Output = DomainResult<String>>,
{
    let mut raw = call().await?;
    let mut attempt: u32 = 1;

    loop {
        match validate(&raw) {
            Ok(value) => return Ok(value),
            Err(message) if attempt > max_repairs => {
                return Err(DomainError::SchemaValidation {
                    attempts: attempt,
                    message,
                });
            }
            Err(message) => {
                warn!(attempt, max_repairs, error = %message, "invalid model output, requesting repair");
                raw = repair(raw, message).await?;
                attempt += 1;
            }
        }
    }
}
