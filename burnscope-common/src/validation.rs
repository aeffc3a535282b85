//! Input validation utilities and patterns

use crate::{
    error::{ScopeError, ScopeResult},
    types::BurnHeight,
};

/// Largest window span accepted for a single analysis run
pub const MAX_WINDOW_SPAN: u64 = 10_000;

/// Validation utilities for common data types
pub struct ValidationUtils;

impl ValidationUtils {
    /// Whether a hex hash is all zeros (the ledger's "no value" marker)
    pub fn is_zero_hash(hex_str: &str) -> bool {
        let digits = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        !digits.is_empty() && digits.chars().all(|c| c == '0')
    }

    /// Validate an analysis window and return its inclusive bounds
    pub fn validate_window(
        start_height: BurnHeight,
        span: u64,
    ) -> ScopeResult<(BurnHeight, BurnHeight)> {
        if span == 0 {
            return Err(ScopeError::validation("Window span must be greater than 0"));
        }

        if span > MAX_WINDOW_SPAN {
            return Err(ScopeError::validation(format!(
                "Window span {} exceeds maximum {}",
                span, MAX_WINDOW_SPAN
            )));
        }

        Ok((start_height.saturating_sub(span), start_height))
    }

    /// Validate the list of window spans requested for one run
    pub fn validate_block_counts(counts: &[u64]) -> ScopeResult<()> {
        if counts.is_empty() {
            return Err(ScopeError::validation("At least one block count is required"));
        }

        for &count in counts {
            Self::validate_window(count, count)?;
        }

        Ok(())
    }

    /// Validate a sender address
    pub fn validate_address(address: &str) -> ScopeResult<()> {
        if address.is_empty() {
            return Err(ScopeError::validation("Address cannot be empty"));
        }

        if address.len() > 128 {
            return Err(ScopeError::validation("Address too long"));
        }

        if !address.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ScopeError::validation("Address contains invalid characters"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hash() {
        assert!(ValidationUtils::is_zero_hash(&"0".repeat(64)));
        assert!(!ValidationUtils::is_zero_hash(&format!("{}1", "0".repeat(63))));
        assert!(!ValidationUtils::is_zero_hash(""));
    }

    #[test]
    fn test_window_validation() {
        assert_eq!(ValidationUtils::validate_window(102, 2).unwrap(), (100, 102));
        assert_eq!(ValidationUtils::validate_window(5, 20).unwrap(), (0, 5));
        assert!(ValidationUtils::validate_window(100, 0).is_err());
        assert!(ValidationUtils::validate_window(100, MAX_WINDOW_SPAN + 1).is_err());
    }

    #[test]
    fn test_block_counts_validation() {
        assert!(ValidationUtils::validate_block_counts(&[20, 50, 100]).is_ok());
        assert!(ValidationUtils::validate_block_counts(&[]).is_err());
        assert!(ValidationUtils::validate_block_counts(&[20, 0]).is_err());
    }

    #[test]
    fn test_address_validation() {
        assert!(ValidationUtils::validate_address("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7").is_ok());
        assert!(ValidationUtils::validate_address("").is_err());
        assert!(ValidationUtils::validate_address("bad address").is_err());
        assert!(ValidationUtils::validate_address(&"x".repeat(200)).is_err());
    }
}
