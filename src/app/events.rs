//! Outbound application events.
//!
//! The [`CharacteristicStore`](super::store::CharacteristicStore) and the
//! main loop emit these through the [`EventSink`](super::ports::EventSink)
//! port. Adapters on the other side decide what to do with them — log to
//! serial today, publish elsewhere tomorrow.

use crate::app::attributes::AttrValue;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// All attributes have been loaded from persistence.
    Loaded { attributes: usize },

    /// An attribute was written and the new value is durable.
    AttributeChanged {
        name: &'static str,
        value: AttrValue,
    },

    /// A BLE central connected.
    ClientConnected,

    /// The BLE central disconnected; advertising restarts.
    ClientDisconnected,
}
