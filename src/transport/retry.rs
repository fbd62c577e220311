//! Backoff math, retryable-status classification and idempotency keys.

use crate::config::RetryPolicy;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 409 (conflict), 429 (rate limited) and every 5xx.
pub fn is_retryable_status(status: u16) -> bool {
    status == 409 || status == 429 || (500..600).contains(&status)
}

/// Delay to wait after failed attempt number `attempt` (1-based).
///
/// `min(initial * multiplier^(attempt-1), max)`, then scaled by a uniform factor in `[0.5, 1.0]`
/// when jitter is enabled.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let raw = policy.initial_delay_ms as f64 * policy.multiplier.powi(exponent);
    let capped = if raw.is_finite() {
        raw.min(policy.max_delay_ms as f64)
    } else {
        policy.max_delay_ms as f64
    };
    let scaled = if policy.jitter {
        capped * rand::thread_rng().gen_range(0.5..=1.0)
    } else {
        capped
    };
    Duration::from_millis(scaled.max(0.0).round() as u64)
}

/// Opaque key, generated once per logical create/stream call.
///
/// Drawn from the OS CSPRNG. If that source is unavailable the key is derived from the process
/// id, the wall clock and the thread-local generator instead.
pub fn generate_idempotency_key() -> String {
    let mut bytes = [0u8; 16];
    if rand::rngs::OsRng.try_fill_bytes(&mut bytes).is_err() {
        bytes = mixed_entropy_bytes();
    }
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

fn mixed_entropy_bytes() -> [u8; 16] {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(rand::thread_rng().gen::<u64>().to_le_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}
