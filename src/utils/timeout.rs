//! Timeout validation utilities for browser operations

use std::time::Duration;

use crate::error::ValidationError;

/// Maximum timeout for browser navigation operations (5 minutes)
/// Covers slow-loading sites, heavy SPAs, and network delays
const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

/// Maximum timeout for element interaction operations (30 seconds)
/// Covers dynamic element loading and animations
const MAX_INTERACTION_TIMEOUT_MS: u64 = 30_000;

/// Validate timeout for navigation operations (navigate, page load waits)
///
/// # Arguments
/// * `timeout_ms` - Optional timeout in milliseconds
/// * `default_ms` - Default timeout if None provided
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(ValidationError)` - If timeout is zero or exceeds MAX_NAVIGATION_TIMEOUT_MS
pub fn validate_navigation_timeout(
    timeout_ms: Option<u64>,
    default_ms: u64,
) -> Result<Duration, ValidationError> {
    let ms = timeout_ms.unwrap_or(default_ms);

    if ms == 0 {
        return Err(ValidationError::field(
            "timeout",
            "Timeout must be a positive number of milliseconds",
        ));
    }

    if ms > MAX_NAVIGATION_TIMEOUT_MS {
        return Err(ValidationError::field(
            "timeout",
            format!(
                "Timeout cannot exceed {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
                MAX_NAVIGATION_TIMEOUT_MS,
                MAX_NAVIGATION_TIMEOUT_MS / 60_000,
                ms,
                ms as f64 / 60_000.0
            ),
        ));
    }

    Ok(Duration::from_millis(ms))
}

/// Validate timeout for element interaction operations (click, fill, wait)
pub fn validate_interaction_timeout(
    timeout_ms: Option<u64>,
    default_ms: u64,
) -> Result<Duration, ValidationError> {
    let ms = timeout_ms.unwrap_or(default_ms);

    if ms == 0 {
        return Err(ValidationError::field(
            "timeout_ms",
            "Timeout must be a positive number of milliseconds",
        ));
    }

    if ms > MAX_INTERACTION_TIMEOUT_MS {
        return Err(ValidationError::field(
            "timeout_ms",
            format!(
                "Timeout cannot exceed {}ms ({} seconds). Received: {}ms ({} seconds)",
                MAX_INTERACTION_TIMEOUT_MS,
                MAX_INTERACTION_TIMEOUT_MS / 1000,
                ms,
                ms / 1000
            ),
        ));
    }

    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_timeout_defaults_and_limits() {
        assert_eq!(
            validate_navigation_timeout(None, 30_000).unwrap(),
            Duration::from_secs(30)
        );
        assert!(validate_navigation_timeout(Some(MAX_NAVIGATION_TIMEOUT_MS), 1).is_ok());
        let err = validate_navigation_timeout(Some(MAX_NAVIGATION_TIMEOUT_MS + 1), 1).unwrap_err();
        assert!(err.message.contains("cannot exceed"));
    }

    #[test]
    fn test_interaction_timeout_rejects_zero_and_excess() {
        assert!(validate_interaction_timeout(Some(0), 10_000).is_err());
        assert!(validate_interaction_timeout(Some(31_000), 10_000).is_err());
        assert_eq!(
            validate_interaction_timeout(Some(5_000), 10_000).unwrap(),
            Duration::from_secs(5)
        );
    }
}
