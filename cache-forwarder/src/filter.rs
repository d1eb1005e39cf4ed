//! Device name filtering with glob patterns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Filter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Only forward devices matching one of these patterns.
    /// If empty, all devices are forwarded.
    #[serde(default)]
    pub include: Vec<String>,

    /// Never forward devices matching these patterns.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Compiled device filter.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl DeviceFilter {
    /// Compile the configured patterns.
    pub fn new(config: &FilterConfig) -> Result<Self, glob::PatternError> {
        Ok(Self {
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
        })
    }

    /// Check if a device should be forwarded. Exclusion wins.
    pub fn allows(&self, device: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(device)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.matches(device))
    }

    /// Keep only the allowed devices.
    pub fn apply(&self, devices: BTreeSet<String>) -> BTreeSet<String> {
        devices.into_iter().filter(|d| self.allows(d)).collect()
    }
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>, glob::PatternError> {
    patterns.iter().map(|p| glob::Pattern::new(p)).collect()
}
