//! Application core — hardware-agnostic characteristic-store logic.
//!
//! The [`CharacteristicStore`](store::CharacteristicStore) owns the fixed
//! attribute table and consumes the outside world exclusively through the
//! port traits in [`ports`], so the whole core runs unmodified in host
//! tests with mock adapters.

pub mod attributes;
pub mod events;
pub mod ports;
pub mod store;
