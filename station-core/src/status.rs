use std::fmt;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PluginStatus {
    #[default]
    Initializing,
    NotConfigured(String),
    Running,
    Failed(String),
}

impl PluginStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, PluginStatus::Running)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginStatus::Initializing => f.write_str("initializing"),
            PluginStatus::NotConfigured(reason) => write!(f, "not configured: {reason}"),
            PluginStatus::Running => f.write_str("running"),
            PluginStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Plugin status state machine. Only configuration outcomes move it; poll
/// errors never do.
#[derive(Debug, Default)]
pub struct StatusReporter {
    current: PluginStatus,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &PluginStatus {
        &self.current
    }

    pub fn is_running(&self) -> bool {
        self.current.is_running()
    }

    pub fn not_configured(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "plugin is not configured");
        self.current = PluginStatus::NotConfigured(reason);
    }

    pub fn running(&mut self) {
        if !self.current.is_running() {
            info!(previous = %self.current, "plugin is running");
        }
        self.current = PluginStatus::Running;
    }

    pub fn failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(%reason, "plugin failed");
        self.current = PluginStatus::Failed(reason);
    }
}
