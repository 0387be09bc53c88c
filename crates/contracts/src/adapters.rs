//! Active input adapter set, derived once from configuration

use crate::{ContractError, InputsConfig};

/// Which input adapters run for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterSet {
    /// HTTP listener only
    HttpOnly,
    /// Log watcher as the sole foreground loop; no HTTP surface at all
    WatcherOnly,
    /// HTTP listener with the log watcher running alongside
    HttpAndWatcher,
}

impl AdapterSet {
    /// Derive the set from input flags
    ///
    /// # Errors
    /// Returns a validation error when no input is enabled.
    pub fn from_inputs(inputs: &InputsConfig) -> Result<Self, ContractError> {
        match (inputs.http.enabled, inputs.log.enabled) {
            (true, false) => Ok(Self::HttpOnly),
            (false, true) => Ok(Self::WatcherOnly),
            (true, true) => Ok(Self::HttpAndWatcher),
            (false, false) => Err(ContractError::config_validation(
                "inputs",
                "at least one of inputs.http or inputs.log must be enabled",
            )),
        }
    }

    pub fn runs_http(self) -> bool {
        matches!(self, Self::HttpOnly | Self::HttpAndWatcher)
    }

    pub fn runs_watcher(self) -> bool {
        matches!(self, Self::WatcherOnly | Self::HttpAndWatcher)
    }
}
