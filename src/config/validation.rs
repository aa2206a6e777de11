use url::Url;
use crate::error::{LyricSyncError, Result};

/// Centralized configuration validation utilities
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a URL string
    pub fn validate_url(url: &str, field_name: &str) -> Result<()> {
        Url::parse(url).map_err(|e| {
            LyricSyncError::Validation(format!("Invalid {} URL '{}': {}", field_name, url, e))
        })?;
        Ok(())
    }

    /// Validate numeric range
    pub fn validate_range<T>(value: T, min: T, max: T, field_name: &str) -> Result<()>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            return Err(LyricSyncError::Validation(format!(
                "{} must be between {} and {}, got {}",
                field_name, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate Redis URL format
    pub fn validate_redis_url(url: &str) -> Result<()> {
        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(LyricSyncError::Validation(format!(
                "Redis URL must start with 'redis://' or 'rediss://', got: {}",
                url
            )));
        }

        Self::validate_url(url, "Redis")?;
        Ok(())
    }

    /// Language codes passed to the enrichment and translation endpoints (`ja`, `zh-TW`)
    pub fn validate_language(tag: &str, field_name: &str) -> Result<()> {
        let (primary, region) = tag.split_once('-').unwrap_or((tag, ""));
        let primary_ok = (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_lowercase());
        let region_ok = region.is_empty() || region.chars().all(|c| c.is_ascii_alphanumeric());
        if !primary_ok || !region_ok {
            return Err(LyricSyncError::Validation(format!(
                "{} must be a language code like 'zh' or 'zh-TW', got: {}",
                field_name, tag
            )));
        }
        Ok(())
    }
}
