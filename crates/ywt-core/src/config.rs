//! Run configuration

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration of one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of entities requested from the generator
    pub target_entity_count: usize,
    /// Maximum number of state transitions
    pub step_limit: usize,
    /// Overall run timeout in milliseconds, `None` for no deadline
    pub timeout_ms: Option<u64>,
    /// Maximum concurrent analysis calls within one phase
    pub max_concurrency: usize,
}

impl RunConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With target entity count
    #[inline]
    #[must_use]
    pub fn with_target_entity_count(mut self, count: usize) -> Self {
        self.target_entity_count = count;
        self
    }

    /// With step limit
    #[inline]
    #[must_use]
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// With run timeout
    ///
    /// Stored at millisecond precision; a sub-millisecond remainder rounds
    /// up so a non-zero timeout never becomes zero.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout
            .map(|t| u64::try_from(t.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX));
        self
    }

    /// With analysis concurrency
    #[inline]
    #[must_use]
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers;
        self
    }

    /// Run timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Transitions of a sequential successful run over `entities` entities
    ///
    /// One generation step, then per phase one analysis and one completion
    /// check per entity plus summarize, advance and phase-completion steps.
    #[inline]
    #[must_use]
    pub fn required_steps(entities: usize) -> usize {
        1 + 3 * (2 * entities + 3)
    }

    /// Reject unusable settings
    ///
    /// # Errors
    /// `WorkflowError::InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.target_entity_count == 0 {
            return Err(WorkflowError::InvalidConfig(
                "target_entity_count must be at least 1".to_string(),
            ));
        }
        if self.step_limit == 0 {
            return Err(WorkflowError::InvalidConfig(
                "step_limit must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(WorkflowError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(WorkflowError::InvalidConfig(
                "timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// `WorkflowError::InvalidConfig` on syntax errors or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self, WorkflowError> {
        let config: Self =
            toml::from_str(text).map_err(|e| WorkflowError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `WorkflowError::InvalidConfig` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_entity_count: 5,
            step_limit: 1000,
            timeout_ms: Some(600_000),
            max_concurrency: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::default();
        assert_eq!(config.target_entity_count, 5);
        assert_eq!(config.timeout(), Some(Duration::from_secs(600)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn required_steps_formula() {
        assert_eq!(RunConfig::required_steps(1), 16);
        assert_eq!(RunConfig::required_steps(5), 40);
    }

    #[test]
    fn rejects_zero_counts() {
        assert!(RunConfig::new().with_target_entity_count(0).validate().is_err());
        assert!(RunConfig::new().with_step_limit(0).validate().is_err());
        assert!(RunConfig::new().with_max_concurrency(0).validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let config = RunConfig::from_toml_str("target_entity_count = 3\nmax_concurrency = 2\n").unwrap();
        assert_eq!(config.target_entity_count, 3);
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.step_limit, 1000);
    }

    #[test]
    fn fractional_timeouts_keep_their_length() {
        let half = RunConfig::new().with_timeout(Some(Duration::from_millis(500)));
        assert_eq!(half.timeout(), Some(Duration::from_millis(500)));
        assert!(half.validate().is_ok());

        let almost_two = RunConfig::new().with_timeout(Some(Duration::from_millis(1900)));
        assert_eq!(almost_two.timeout(), Some(Duration::from_millis(1900)));

        let tiny = RunConfig::new().with_timeout(Some(Duration::from_micros(10)));
        assert_eq!(tiny.timeout(), Some(Duration::from_millis(1)));
        assert!(tiny.validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let config = RunConfig::new().with_timeout(Some(Duration::ZERO));
        assert!(matches!(config.validate(), Err(WorkflowError::InvalidConfig(_))));
        assert!(RunConfig::from_toml_str("timeout_ms = 0").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "step_limit = 50").unwrap();
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.step_limit, 50);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RunConfig::load("/nonexistent/ywt.toml").unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidConfig(_)));
    }
}
