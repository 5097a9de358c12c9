//! Property tests for the characteristic store's write policy.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use std::collections::HashMap;

use blestore::app::attributes::{
    AttrValue, AttributeId, ATTRIBUTES, ATTR_NAMESPACE, DEFAULT_PLACEHOLDER, MAX_VALUE_LEN,
};
use blestore::app::events::AppEvent;
use blestore::app::ports::{EventSink, MirrorPort, StorageError, StoragePort};
use blestore::app::store::CharacteristicStore;
use proptest::prelude::*;

// ── Minimal in-memory ports ───────────────────────────────────

#[derive(Default)]
struct MemStorage {
    data: HashMap<String, String>,
}

impl StoragePort for MemStorage {
    fn get_str(&self, ns: &str, key: &str) -> Result<Option<AttrValue>, StorageError> {
        Ok(self.data.get(&format!("{}::{}", ns, key)).map(|v| {
            let mut s = AttrValue::new();
            let _ = s.push_str(v);
            s
        }))
    }

    fn put_str(&mut self, ns: &str, key: &str, value: &str) -> Result<(), StorageError> {
        self.data
            .insert(format!("{}::{}", ns, key), value.to_string());
        Ok(())
    }

    fn read(&self, _ns: &str, _key: &str, _buf: &mut [u8]) -> Result<usize, StorageError> {
        Err(StorageError::NotFound)
    }

    fn write(&mut self, _ns: &str, _key: &str, _data: &[u8]) -> Result<(), StorageError> {
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(&format!("{}::{}", ns, key));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data.contains_key(&format!("{}::{}", ns, key))
    }
}

#[derive(Default)]
struct MemMirror {
    values: HashMap<AttributeId, String>,
}

impl MirrorPort for MemMirror {
    fn set_value(&mut self, id: AttributeId, value: &str) {
        self.values.insert(id, value.to_string());
    }

    fn notify(&mut self, _id: AttributeId, _value: &str) {}
}

#[derive(Default)]
struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

fn booted() -> (CharacteristicStore, MemStorage, MemMirror, NullSink) {
    let storage = MemStorage::default();
    let mut mirror = MemMirror::default();
    let mut store = CharacteristicStore::new();
    store.load_all(&storage, &mut mirror);
    (store, storage, mirror, NullSink)
}

fn arb_attribute_index() -> impl Strategy<Value = usize> {
    0..ATTRIBUTES.len()
}

proptest! {
    /// Any printable-ASCII payload within bounds is accepted verbatim:
    /// cache, storage, and mirror all end up with exactly the payload.
    #[test]
    fn printable_payload_round_trips(
        index in arb_attribute_index(),
        payload in "[ -~]{1,64}",
    ) {
        let (mut store, mut storage, mut mirror, mut sink) = booted();
        let desc = &ATTRIBUTES[index];

        store.handle_write(desc.uuid, payload.as_bytes(), &mut storage, &mut mirror, &mut sink);

        prop_assert_eq!(store.value(desc.id), payload.as_str());
        let persisted = storage
            .get_str(ATTR_NAMESPACE, desc.storage_key)
            .unwrap()
            .unwrap();
        prop_assert_eq!(persisted.as_str(), payload.as_str());
        prop_assert_eq!(
            mirror.values.get(&desc.id).map(String::as_str),
            Some(payload.as_str())
        );
    }

    /// Writing the same payload twice leaves the same state as writing it once.
    #[test]
    fn repeated_writes_are_idempotent(
        index in arb_attribute_index(),
        payload in "[ -~]{1,64}",
    ) {
        let (mut store, mut storage, mut mirror, mut sink) = booted();
        let desc = &ATTRIBUTES[index];

        store.handle_write(desc.uuid, payload.as_bytes(), &mut storage, &mut mirror, &mut sink);
        let after_one = store.value(desc.id).to_string();
        store.handle_write(desc.uuid, payload.as_bytes(), &mut storage, &mut mirror, &mut sink);

        prop_assert_eq!(store.value(desc.id), after_one.as_str());
    }

    /// Arbitrary bytes to an arbitrary UUID never panic, and the cache never
    /// diverges from what is persisted: every attribute shows either the
    /// placeholder (nothing persisted) or the persisted value.
    #[test]
    fn arbitrary_writes_never_corrupt(
        writes in proptest::collection::vec(
            (any::<u128>(), proptest::collection::vec(any::<u8>(), 0..=128)),
            0..=30,
        ),
    ) {
        let (mut store, mut storage, mut mirror, mut sink) = booted();

        for (uuid, payload) in &writes {
            store.handle_write(*uuid, payload, &mut storage, &mut mirror, &mut sink);
        }

        for desc in &ATTRIBUTES {
            let cached = store.value(desc.id);
            match storage.get_str(ATTR_NAMESPACE, desc.storage_key).unwrap() {
                Some(persisted) => prop_assert_eq!(cached, persisted.as_str()),
                None => prop_assert_eq!(cached, DEFAULT_PLACEHOLDER),
            }
            prop_assert!(cached.len() <= MAX_VALUE_LEN);
        }
    }

    /// Writes targeting a registered attribute touch only that attribute's
    /// storage key.
    #[test]
    fn writes_are_isolated_per_attribute(
        index in arb_attribute_index(),
        payload in "[ -~]{1,64}",
    ) {
        let (mut store, mut storage, mut mirror, mut sink) = booted();
        let desc = &ATTRIBUTES[index];

        store.handle_write(desc.uuid, payload.as_bytes(), &mut storage, &mut mirror, &mut sink);

        for other in ATTRIBUTES.iter().filter(|d| d.id != desc.id) {
            prop_assert_eq!(
                storage.get_str(ATTR_NAMESPACE, other.storage_key).unwrap(),
                None
            );
            prop_assert_eq!(store.value(other.id), DEFAULT_PLACEHOLDER);
        }
    }
}
