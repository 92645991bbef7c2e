//! Configuration for filter evaluation and parsing.
//!
//! Loaded from TOML, with support for environment variable interpolation
//! using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [evaluation]
//! case_ignore = true
//!
//! [dates]
//! attributes = ["createDate", "${EXTRA_DATE_ATTRIBUTE}"]
//! format = "%Y-%m-%d"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

mod observability;

use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use observability::*;

use crate::filter::{DateOptions, DefaultVisitor};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Date handling handed to expression parsers.
    #[serde(default)]
    pub dates: DateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FilterConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: FilterConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.dates.validate()
    }

    /// The evaluator matching `evaluation.case_ignore`.
    pub fn visitor(&self) -> DefaultVisitor {
        DefaultVisitor::new(self.evaluation.case_ignore)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationConfig {
    /// Compare strings and characters without regard to case.
    #[serde(default)]
    pub case_ignore: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateConfig {
    /// Attributes whose filter literals are dates.
    #[serde(default)]
    pub attributes: Vec<String>,

    /// `chrono` format the literals are written in.
    #[serde(default = "default_date_format")]
    pub format: String,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            attributes: Vec::new(),
            format: default_date_format(),
        }
    }
}

fn default_date_format() -> String {
    DateOptions::DEFAULT_FORMAT.to_string()
}

impl DateConfig {
    pub fn options(&self) -> DateOptions {
        DateOptions {
            attributes: self.attributes.clone(),
            format: Some(self.format.clone()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.format.trim().is_empty() {
            return Err(ConfigError::Validation(
                "dates.format must not be empty".into(),
            ));
        }
        if StrftimeItems::new(&self.format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Validation(format!(
                "dates.format '{}' is not a valid date format",
                self.format
            )));
        }
        if self.attributes.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "dates.attributes must not contain blank names".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables after a `#` on the same line are left alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in ENV_VAR.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);
            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);
            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = FilterConfig::from_str("").unwrap();
        assert!(!config.evaluation.case_ignore);
        assert!(config.dates.attributes.is_empty());
        assert_eq!(config.dates.format, "%Y-%m-%d");
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.visitor(), DefaultVisitor::CASE_SENSITIVE);
    }

    #[test]
    fn test_full_config() {
        let config = FilterConfig::from_str(
            r#"
            [evaluation]
            case_ignore = true

            [dates]
            attributes = ["createDate", "modifyDate"]
            format = "%d/%m/%Y"

            [logging]
            level = "trace"
            format = "json"
            timestamps = false
            filter = "entity_filter=trace"
        "#,
        )
        .unwrap();

        assert_eq!(config.visitor(), DefaultVisitor::CASE_IGNORE);
        let options = config.dates.options();
        assert_eq!(options.attributes, vec!["createDate", "modifyDate"]);
        assert_eq!(options.format.as_deref(), Some("%d/%m/%Y"));
        assert_eq!(config.logging.level, LogLevel::Trace);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.logging.timestamps);
        assert_eq!(config.logging.filter.as_deref(), Some("entity_filter=trace"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = FilterConfig::from_str("[evaluation]\ncase_insensitive = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_date_format_rejected() {
        let err = FilterConfig::from_str("[dates]\nformat = \" \"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_date_format_rejected() {
        let err = FilterConfig::from_str("[dates]\nformat = \"%Y-%Q\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("%Y-%Q")));
    }

    #[test]
    fn test_blank_date_attribute_rejected() {
        let err = FilterConfig::from_str("[dates]\nattributes = [\"created\", \"\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("TEST_DATE_ATTRIBUTE", Some("lastLogin"), || {
            let config = FilterConfig::from_str(
                "[dates]\nattributes = [\"${TEST_DATE_ATTRIBUTE}\"]",
            )
            .unwrap();
            assert_eq!(config.dates.attributes, vec!["lastLogin"]);
        });
    }

    #[test]
    fn test_missing_env_var() {
        temp_env::with_var_unset("TEST_MISSING_FILTER_VAR", || {
            let err = FilterConfig::from_str("[logging]\nfilter = \"${TEST_MISSING_FILTER_VAR}\"")
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::EnvVarNotFound(ref name) if name == "TEST_MISSING_FILTER_VAR")
            );
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# format = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# format = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_before_comment_expanded() {
        temp_env::with_var("TEST_BEFORE_COMMENT", Some("expanded"), || {
            let result =
                expand_env_vars("key = \"${TEST_BEFORE_COMMENT}\" # ${NONEXISTENT}").unwrap();
            assert_eq!(result, "key = \"expanded\" # ${NONEXISTENT}");
        });
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[evaluation]\ncase_ignore = true").unwrap();

        let config = FilterConfig::from_file(file.path()).unwrap();
        assert!(config.evaluation.case_ignore);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FilterConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
