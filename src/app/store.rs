//! The characteristic store — table-driven write dispatch and
//! persistence sync.
//!
//! [`CharacteristicStore`] owns the cached value of every registered
//! attribute and defines the write-acceptance policy: a write is accepted
//! only for a registered UUID with a non-empty, in-bounds UTF-8 payload,
//! and only becomes visible (cache, GATT mirror, notification) after the
//! value is durable in storage. Everything else is absorbed without
//! surfacing an error to the client.
//!
//! ```text
//!  BLE write ──▶ handle_write ──▶ StoragePort (persist first)
//!                      │
//!                      ├──▶ cached value
//!                      ├──▶ MirrorPort (readable slot, notify)
//!                      └──▶ EventSink
//! ```

use log::{debug, info, warn};

use super::attributes::{
    lookup_uuid, AttrValue, AttributeId, ATTRIBUTES, ATTRIBUTE_COUNT, ATTR_NAMESPACE,
    DEFAULT_PLACEHOLDER, MAX_VALUE_LEN,
};
use super::events::AppEvent;
use super::ports::{EventSink, MirrorPort, StoragePort};

/// Owns the fixed attribute table and its cached values.
///
/// Invariant: after [`load_all`](Self::load_all), every cached value equals
/// the most recently persisted value for its storage key, or
/// [`DEFAULT_PLACEHOLDER`] if none exists. A failed persistence write
/// changes nothing — cache and mirror never diverge from storage.
pub struct CharacteristicStore {
    values: [AttrValue; ATTRIBUTE_COUNT],
    loaded: bool,
}

impl CharacteristicStore {
    pub fn new() -> Self {
        Self {
            values: core::array::from_fn(|_| AttrValue::new()),
            loaded: false,
        }
    }

    /// Load every attribute from persistence and seed the transport mirror.
    ///
    /// Missing keys and read errors fall back to the placeholder (errors
    /// are logged); persistence is never mutated here. Must run to
    /// completion before the first [`handle_write`](Self::handle_write) —
    /// enforced by startup order in `main`, not by runtime checks.
    pub fn load_all(&mut self, storage: &impl StoragePort, mirror: &mut impl MirrorPort) {
        for desc in &ATTRIBUTES {
            let value = match storage.get_str(ATTR_NAMESPACE, desc.storage_key) {
                Ok(Some(v)) => v,
                Ok(None) => placeholder(),
                Err(e) => {
                    warn!(
                        "store: loading '{}' failed ({}), using placeholder",
                        desc.storage_key, e
                    );
                    placeholder()
                }
            };
            mirror.set_value(desc.id, &value);
            self.values[desc.id.index()] = value;
        }
        self.loaded = true;
        info!("store: {} attributes loaded", ATTRIBUTE_COUNT);
    }

    /// Dispatch one inbound write event from the transport layer.
    ///
    /// Accepted writes persist first, then update the cache and the GATT
    /// mirror, notify subscribed clients for notify-capable attributes,
    /// and emit [`AppEvent::AttributeChanged`]. Rejected writes (unknown
    /// UUID, empty payload, transport-invalid payload, persistence
    /// failure) leave cache and persistence untouched and re-assert the
    /// previous value on the transport mirror.
    pub fn handle_write(
        &mut self,
        uuid: u128,
        payload: &[u8],
        storage: &mut impl StoragePort,
        mirror: &mut impl MirrorPort,
        sink: &mut impl EventSink,
    ) {
        let Some(desc) = lookup_uuid(uuid) else {
            debug!("store: write to unregistered characteristic {:032x} dropped", uuid);
            return;
        };

        // Empty writes are a no-op, not a request to clear the value.
        if payload.is_empty() {
            debug!("store: empty write to '{}' ignored", desc.name);
            self.reassert_mirror(desc.id, mirror);
            return;
        }

        // The GATT attribute slot bounds the payload on target; anything
        // past that bound here is transport-invalid, not a client error.
        let Ok(text) = core::str::from_utf8(payload) else {
            warn!(
                "store: non-UTF-8 write to '{}' ignored ({} bytes)",
                desc.name,
                payload.len()
            );
            self.reassert_mirror(desc.id, mirror);
            return;
        };
        let mut value = AttrValue::new();
        if value.push_str(text).is_err() {
            warn!(
                "store: write to '{}' exceeds {} bytes, ignored",
                desc.name, MAX_VALUE_LEN
            );
            self.reassert_mirror(desc.id, mirror);
            return;
        }

        // Persist first: the cached value and the readable mirror only
        // change once the new value is durable.
        if let Err(e) = storage.put_str(ATTR_NAMESPACE, desc.storage_key, &value) {
            warn!(
                "store: persisting '{}' failed ({}), keeping previous value",
                desc.storage_key, e
            );
            self.reassert_mirror(desc.id, mirror);
            return;
        }

        mirror.set_value(desc.id, &value);
        if desc.notify {
            mirror.notify(desc.id, &value);
        }
        info!("store: {} updated to '{}'", desc.name, value);
        sink.emit(&AppEvent::AttributeChanged {
            name: desc.name,
            value: value.clone(),
        });
        self.values[desc.id.index()] = value;
    }

    /// Auto-respond transports hold the raw client payload in the readable
    /// slot before dispatch runs, so a rejected write must push the
    /// authoritative value back or reads would surface the rejected bytes.
    fn reassert_mirror(&self, id: AttributeId, mirror: &mut impl MirrorPort) {
        mirror.set_value(id, self.values[id.index()].as_str());
    }

    /// Current cached value of one attribute.
    pub fn value(&self, id: AttributeId) -> &str {
        self.values[id.index()].as_str()
    }

    /// Read-only `(name, cached value)` pairs for diagnostics.
    /// Touches neither persistence nor the transport layer.
    pub fn dump_all(&self) -> impl Iterator<Item = (&'static str, &str)> {
        ATTRIBUTES
            .iter()
            .map(move |d| (d.name, self.values[d.id.index()].as_str()))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl Default for CharacteristicStore {
    fn default() -> Self {
        Self::new()
    }
}

fn placeholder() -> AttrValue {
    let mut v = AttrValue::new();
    // DEFAULT_PLACEHOLDER is well under MAX_VALUE_LEN.
    let _ = v.push_str(DEFAULT_PLACEHOLDER);
    v
}
