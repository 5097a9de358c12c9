//! Device configuration.
//!
//! Small set of tunables persisted in NVS via
//! [`ConfigPort`](crate::app::ports::ConfigPort). The attribute values
//! themselves are not config — they live in the characteristic store's
//! own namespace.

use serde::{Deserialize, Serialize};

/// Persisted device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// BLE advertising local name. Empty means "derive from the factory
    /// MAC" (`blestore-xxyyzz`).
    pub adv_name: heapless::String<24>,
    /// Emit a diagnostic dump of all stored attribute values after load.
    pub dump_on_boot: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adv_name: heapless::String::new(),
            dump_on_boot: true,
        }
    }
}
