//! Key allocation between neighbors.
//!
//! # Responsibility
//! - Produce `count` ordered keys for an insertion point.
//! - Detect exhaustion deterministically instead of emitting degenerate keys.
//!
//! # Invariants
//! - Returned keys are finite and strictly increasing.
//! - Returned keys are strictly above `prev` and strictly below `next`.
//! - Between two neighbors, every step is at least `min_gap`.

use super::order::ensure_finite;
use super::{KeyError, KeyResult};
use crate::config::{ConfigError, KeySpaceConfig};

/// Allocator for positional sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeySpace {
    config: KeySpaceConfig,
}

impl KeySpace {
    /// Creates an allocator from validated config.
    pub fn new(config: KeySpaceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &KeySpaceConfig {
        &self.config
    }

    /// Allocates `count` keys between `prev` and `next`.
    ///
    /// - `(None, None)`: `g, 2g, ..` with `g = default_gap`.
    /// - `(Some(p), None)`: `p + g, p + 2g, ..`.
    /// - `(None, Some(n))`: `.., n - 2g, n - g`.
    /// - `(Some(p), Some(n))`: `p + (n - p) * i / (count + 1)` for `i = 1..=count`.
    ///
    /// # Errors
    /// - [`KeyError::InvalidCount`] when `count == 0`.
    /// - [`KeyError::NonFiniteKey`] when a neighbor is NaN or infinite.
    /// - [`KeyError::InvalidRange`] when `prev >= next`.
    /// - [`KeyError::Exhausted`] when steps fall below `min_gap` or the computed
    ///   keys would collide after rounding.
    pub fn allocate(
        &self,
        prev: Option<f64>,
        next: Option<f64>,
        count: usize,
    ) -> KeyResult<Vec<f64>> {
        if count == 0 {
            return Err(KeyError::InvalidCount(count));
        }
        let prev = prev.map(ensure_finite).transpose()?;
        let next = next.map(ensure_finite).transpose()?;
        let gap = self.config.default_gap;

        let keys: Vec<f64> = match (prev, next) {
            (None, None) => (1..=count).map(|i| gap * i as f64).collect(),
            (Some(prev), None) => (1..=count).map(|i| prev + gap * i as f64).collect(),
            (None, Some(next)) => (1..=count).rev().map(|i| next - gap * i as f64).collect(),
            (Some(prev), Some(next)) => self.between(prev, next, count)?,
        };

        ensure_strictly_ordered(&keys, prev, next)?;
        Ok(keys)
    }

    fn between(&self, prev: f64, next: f64, count: usize) -> KeyResult<Vec<f64>> {
        if prev >= next {
            return Err(KeyError::InvalidRange { prev, next });
        }

        let steps = (count + 1) as f64;
        let span = next - prev;
        if span.is_finite() {
            if span / steps < self.config.min_gap {
                return Err(KeyError::Exhausted);
            }
            return Ok((1..=count)
                .map(|i| prev + span * (i as f64 / steps))
                .collect());
        }

        // Span overflows f64 only for neighbors near opposite ends of the range.
        Ok((1..=count)
            .map(|i| {
                let t = i as f64 / steps;
                prev * (1.0 - t) + next * t
            })
            .collect())
    }
}

fn ensure_strictly_ordered(keys: &[f64], prev: Option<f64>, next: Option<f64>) -> KeyResult<()> {
    if keys.iter().any(|key| !key.is_finite()) {
        return Err(KeyError::Exhausted);
    }
    if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(KeyError::Exhausted);
    }
    if let (Some(prev), Some(first)) = (prev, keys.first()) {
        if *first <= prev {
            return Err(KeyError::Exhausted);
        }
    }
    if let (Some(next), Some(last)) = (next, keys.last()) {
        if *last >= next {
            return Err(KeyError::Exhausted);
        }
    }
    Ok(())
}
