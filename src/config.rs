//! Allocator configuration.
//!
//! The process-wide allocator (see [`crate::externc`]) is configured from the
//! environment:
//!
//! - `DBGMALLOC_CAPACITY`: arena size in bytes. A `k` or `m` suffix
//!   (case-insensitive) multiplies by 1024 or 1024².
//! - `DBGMALLOC_DIAGNOSTICS`: `stderr` (default) or `stdout`, where reports and
//!   invalid-free diagnostics are written.

use std::env;

use serde::{Deserialize, Serialize};

use crate::{alloc::arena::DEFAULT_CAPACITY, error::ConfigError};

pub const CAPACITY_VAR: &str = "DBGMALLOC_CAPACITY";
pub const DIAGNOSTICS_VAR: &str = "DBGMALLOC_DIAGNOSTICS";

/// Where report lines and invalid-free diagnostics go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Diagnostics {
    #[default]
    Stderr,
    Stdout,
}

impl Diagnostics {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stderr" => Ok(Self::Stderr),
            "stdout" => Ok(Self::Stdout),
            _ => Err(ConfigError::InvalidDiagnostics {
                var: DIAGNOSTICS_VAR,
                value: value.to_owned(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugAllocConfig {
    /// Bytes the arena can hand out over its whole lifetime.
    pub capacity: usize,
    pub diagnostics: Diagnostics,
}

impl Default for DebugAllocConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            diagnostics: Diagnostics::Stderr,
        }
    }
}

impl DebugAllocConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Defaults, overridden by whichever of `DBGMALLOC_CAPACITY` and
    /// `DBGMALLOC_DIAGNOSTICS` are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(CAPACITY_VAR) {
            config.capacity = parse_capacity(&value).ok_or(ConfigError::InvalidCapacity {
                var: CAPACITY_VAR,
                value,
            })?;
        }
        if let Some(value) = lookup(DIAGNOSTICS_VAR) {
            config.diagnostics = Diagnostics::parse(&value)?;
        }
        Ok(config)
    }
}

fn parse_capacity(value: &str) -> Option<usize> {
    let value = value.trim();
    let (digits, scale) = match value.char_indices().last()? {
        (i, 'k' | 'K') => (&value[..i], 1 << 10),
        (i, 'm' | 'M') => (&value[..i], 1 << 20),
        _ => (value, 1),
    };
    let capacity = digits.parse::<usize>().ok()?.checked_mul(scale)?;
    (capacity != 0).then_some(capacity)
}
