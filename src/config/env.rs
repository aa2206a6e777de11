use std::env;
use std::path::PathBuf;
use crate::error::{ConfigError, LyricSyncError, Result};

/// Environment variable names
pub struct EnvVars;

impl EnvVars {
    pub const ENABLE_QQ: &'static str = "ENABLE_QQ";
    pub const ENABLE_KUGOU: &'static str = "ENABLE_KUGOU";
    pub const ENABLE_NETEASE: &'static str = "ENABLE_NETEASE";
    pub const ENRICH_KEY: &'static str = "ENRICH_KEY";
    pub const ENRICH_URL: &'static str = "ENRICH_URL";
    pub const ENRICH_MODEL: &'static str = "ENRICH_MODEL";
    pub const TRANSLATE_URL: &'static str = "LYRICSYNC_TRANSLATE_URL";
    pub const CACHE_DIR: &'static str = "LYRICSYNC_CACHE_DIR";
    pub const CACHE_ENABLED: &'static str = "LYRICSYNC_CACHE_ENABLED";
    pub const REDIS_URL: &'static str = "LYRICSYNC_REDIS_URL";
    pub const SEARCH_TIMEOUT_SECS: &'static str = "LYRICSYNC_SEARCH_TIMEOUT_SECS";
    pub const FETCH_TIMEOUT_SECS: &'static str = "LYRICSYNC_FETCH_TIMEOUT_SECS";
    pub const FETCH_CONCURRENCY: &'static str = "LYRICSYNC_FETCH_CONCURRENCY";
}

/// Environment variable parsing utilities with validation
pub struct EnvParser;

impl EnvParser {
    /// Trimmed value, `None` when unset or blank
    pub fn parse_string(var_name: &str, validator: Option<fn(&str) -> Result<()>>) -> Result<Option<String>> {
        match env::var(var_name) {
            Ok(value) => {
                let trimmed = value.trim().to_string();
                if trimmed.is_empty() {
                    return Ok(None);
                }

                if let Some(validate_fn) = validator {
                    validate_fn(&trimmed)?;
                }

                Ok(Some(trimmed))
            }
            Err(env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Environment(e).into()),
        }
    }

    pub fn parse_path(var_name: &str, should_exist: bool) -> Result<Option<PathBuf>> {
        let Some(path_str) = Self::parse_string(var_name, None)? else {
            return Ok(None);
        };
        let path = PathBuf::from(path_str);

        if should_exist && !path.exists() {
            return Err(LyricSyncError::Validation(format!(
                "Path specified in {} does not exist: {}",
                var_name,
                path.display()
            )));
        }

        Ok(Some(path))
    }

    /// Accepts true/false, 1/0, yes/no, on/off
    pub fn parse_bool(var_name: &str) -> Result<Option<bool>> {
        let Some(value_str) = Self::parse_string(var_name, None)? else {
            return Ok(None);
        };

        match value_str.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(LyricSyncError::Validation(format!(
                "Invalid boolean value in {}: '{}'. Use: true/false, 1/0, yes/no, on/off",
                var_name, value_str
            ))),
        }
    }

    pub fn parse_u64(var_name: &str, min: u64, max: u64) -> Result<Option<u64>> {
        Self::parse_ranged(var_name, min, max)
    }

    pub fn parse_usize(var_name: &str, min: usize, max: usize) -> Result<Option<usize>> {
        Self::parse_ranged(var_name, min, max)
    }

    fn parse_ranged<T>(var_name: &str, min: T, max: T) -> Result<Option<T>>
    where
        T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
    {
        let Some(value_str) = Self::parse_string(var_name, None)? else {
            return Ok(None);
        };

        let value = value_str.parse::<T>().map_err(|_| {
            LyricSyncError::Validation(format!(
                "Invalid number in {}: '{}'. Must be a positive integer",
                var_name, value_str
            ))
        })?;

        if value < min || value > max {
            return Err(LyricSyncError::Validation(format!(
                "Value in {} must be between {} and {}, got {}",
                var_name, min, max, value
            )));
        }

        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_parse_bool() {
        env::set_var("LYRICSYNC_TEST_BOOL_TRUE", "yes");
        env::set_var("LYRICSYNC_TEST_BOOL_FALSE", "0");
        env::set_var("LYRICSYNC_TEST_BOOL_INVALID", "maybe");

        assert_eq!(EnvParser::parse_bool("LYRICSYNC_TEST_BOOL_TRUE").unwrap(), Some(true));
        assert_eq!(EnvParser::parse_bool("LYRICSYNC_TEST_BOOL_FALSE").unwrap(), Some(false));
        assert!(EnvParser::parse_bool("LYRICSYNC_TEST_BOOL_INVALID").is_err());
        assert_eq!(EnvParser::parse_bool("LYRICSYNC_TEST_BOOL_NOT_SET").unwrap(), None);

        env::remove_var("LYRICSYNC_TEST_BOOL_TRUE");
        env::remove_var("LYRICSYNC_TEST_BOOL_FALSE");
        env::remove_var("LYRICSYNC_TEST_BOOL_INVALID");
    }

    #[test]
    fn test_parse_u64() {
        env::set_var("LYRICSYNC_TEST_U64_VALID", "42");
        env::set_var("LYRICSYNC_TEST_U64_OUT_OF_RANGE", "150");
        env::set_var("LYRICSYNC_TEST_U64_INVALID", "not_a_number");

        assert_eq!(EnvParser::parse_u64("LYRICSYNC_TEST_U64_VALID", 1, 100).unwrap(), Some(42));
        assert!(EnvParser::parse_u64("LYRICSYNC_TEST_U64_OUT_OF_RANGE", 1, 100).is_err());
        assert!(EnvParser::parse_u64("LYRICSYNC_TEST_U64_INVALID", 1, 100).is_err());
        assert_eq!(EnvParser::parse_u64("LYRICSYNC_TEST_U64_NOT_SET", 1, 100).unwrap(), None);

        env::remove_var("LYRICSYNC_TEST_U64_VALID");
        env::remove_var("LYRICSYNC_TEST_U64_OUT_OF_RANGE");
        env::remove_var("LYRICSYNC_TEST_U64_INVALID");
    }

    #[test]
    fn test_blank_string_is_unset() {
        env::set_var("LYRICSYNC_TEST_BLANK", "   ");
        assert_eq!(EnvParser::parse_string("LYRICSYNC_TEST_BLANK", None).unwrap(), None);
        env::remove_var("LYRICSYNC_TEST_BLANK");
    }
}
