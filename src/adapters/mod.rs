//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements             | Connects to              |
//! |-------------|------------------------|--------------------------|
//! | `ble`       | MirrorPort             | Bluedroid GATT server    |
//! | `nvs`       | StoragePort            | NVS / in-memory store    |
//! |             | ConfigPort             |                          |
//! | `log_sink`  | EventSink              | Serial log output        |
//! | `device_id` | (identity helpers)     | eFuse factory MAC        |

pub mod ble;
pub mod device_id;
pub mod log_sink;
pub mod nvs;
pub(super) mod utils;
