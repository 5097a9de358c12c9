//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CharacteristicStore (domain)
//! ```
//!
//! Driven adapters (NVS, BLE transport, log sink) implement these traits.
//! The [`CharacteristicStore`](super::store::CharacteristicStore) consumes
//! them via generics at call sites, so the domain core never touches
//! ESP-IDF directly and runs unmodified in host tests.

use crate::app::attributes::{AttrValue, AttributeId};
use crate::config::DeviceConfig;

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage backed by NVS.
///
/// Keys are namespaced to prevent collisions between subsystems: the
/// attribute store and the crash log each use their own namespace. Write
/// operations are atomic — the ESP-IDF NVS API guarantees this natively;
/// the in-memory simulation achieves it trivially.
pub trait StoragePort {
    /// Read a string value. `Ok(None)` if the key has never been written.
    fn get_str(&self, namespace: &str, key: &str) -> Result<Option<AttrValue>, StorageError>;

    /// Write a string value atomically, overwriting any prior value.
    fn put_str(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError>;

    /// Read a binary blob. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a binary blob atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Mirror port (driven adapter: domain → GATT transport)
// ───────────────────────────────────────────────────────────────

/// The transport-exposed copy of each attribute value.
///
/// The store pushes every accepted value through this port so that client
/// reads return the persisted value. Implementations must treat both
/// operations as best-effort: the store never observes transport failures.
pub trait MirrorPort {
    /// Set the readable value returned on client reads of `id`.
    fn set_value(&mut self, id: AttributeId, value: &str);

    /// Push a value-changed notification to subscribed clients.
    /// Only invoked for notify-capable attributes.
    fn notify(&mut self, id: AttributeId, value: &str);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`DeviceConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log today;
/// an MQTT or RPC adapter would implement the same trait).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
