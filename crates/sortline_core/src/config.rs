//! Key-space configuration.
//!
//! # Responsibility
//! - Hold the spacing constants used by allocation and renormalization.
//! - Load overrides from a JSON file and validate them before use.
//!
//! # Invariants
//! - Every gap is finite, strictly positive and at most [`MAX_GAP`].
//! - `min_gap <= default_gap`, so head/tail allocation is never below threshold.
//! - `2 * min_gap <= renorm_gap`, so one allocation always fits between two
//!   freshly renormalized neighbors.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Default head/tail spacing (2^16).
pub const DEFAULT_GAP: f64 = 65_536.0;
/// Default spacing written by a renormalization pass (2^16).
pub const DEFAULT_RENORM_GAP: f64 = 65_536.0;
/// Largest accepted gap (2^52).
///
/// Gap multiples stay finite and exactly spaced for any realistic sibling count.
pub const MAX_GAP: f64 = 4_503_599_627_370_496.0;
/// Default smallest per-step spacing accepted between two neighbors (2^-20).
///
/// Halving a fresh 2^16 gap reaches this after 36 boundary insertions.
pub const DEFAULT_MIN_GAP: f64 = 1.0 / 1_048_576.0;

/// Errors from loading or validating key-space configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file exists but could not be read.
    Io(std::io::Error),
    /// Config file is not valid JSON for [`KeySpaceConfig`].
    Parse(serde_json::Error),
    /// Values parsed but violate a config invariant.
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Spacing constants for [`crate::key::KeySpace`] and [`crate::key::renormalize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeySpaceConfig {
    /// Spacing used when appending at the tail or inserting at the head.
    pub default_gap: f64,
    /// Spacing between neighbors after a renormalization pass.
    pub renorm_gap: f64,
    /// Per-step spacing below which an insertion reports exhaustion.
    pub min_gap: f64,
}

impl Default for KeySpaceConfig {
    fn default() -> Self {
        Self {
            default_gap: DEFAULT_GAP,
            renorm_gap: DEFAULT_RENORM_GAP,
            min_gap: DEFAULT_MIN_GAP,
        }
    }
}

impl KeySpaceConfig {
    /// Checks config invariants.
    ///
    /// # Errors
    /// - Returns [`ConfigError::Invalid`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("default_gap", self.default_gap),
            ("renorm_gap", self.renorm_gap),
            ("min_gap", self.min_gap),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "`{name}` must be a finite number > 0, got {value}"
                )));
            }
            if value > MAX_GAP {
                return Err(ConfigError::Invalid(format!(
                    "`{name}` must not exceed {MAX_GAP}, got {value}"
                )));
            }
        }
        if self.min_gap > self.default_gap {
            return Err(ConfigError::Invalid(format!(
                "`min_gap` ({}) must not exceed `default_gap` ({})",
                self.min_gap, self.default_gap
            )));
        }
        if self.min_gap * 2.0 > self.renorm_gap {
            return Err(ConfigError::Invalid(format!(
                "`renorm_gap` ({}) must be at least twice `min_gap` ({})",
                self.renorm_gap, self.min_gap
            )));
        }
        Ok(())
    }
}

/// Loads config from a JSON file.
///
/// A missing file yields [`KeySpaceConfig::default`]; absent fields fall back
/// to their defaults.
///
/// # Errors
/// - [`ConfigError::Io`] when the file exists but cannot be read.
/// - [`ConfigError::Parse`] for malformed JSON or unknown fields.
/// - [`ConfigError::Invalid`] when values violate config invariants.
pub fn load_config(path: impl AsRef<Path>) -> Result<KeySpaceConfig, ConfigError> {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::info!(
                "event=config_load module=config status=default path={}",
                path.display()
            );
            return Ok(KeySpaceConfig::default());
        }
        Err(err) => return Err(err.into()),
    };

    let config: KeySpaceConfig = serde_json::from_str(&content)?;
    config.validate()?;
    log::info!(
        "event=config_load module=config status=ok path={} default_gap={} renorm_gap={} min_gap={}",
        path.display(),
        config.default_gap,
        config.renorm_gap,
        config.min_gap
    );
    Ok(config)
}
