//! Fuzz target: `CharacteristicStore::handle_write`
//!
//! Drives the write dispatcher with arbitrary UUIDs and payloads and
//! verifies:
//! - No panics under arbitrary byte inputs
//! - The cached value of every attribute always matches what is
//!   persisted (or the placeholder if nothing is persisted)
//! - Cached values never exceed `MAX_VALUE_LEN`
//!
//! cargo fuzz run fuzz_handle_write

#![no_main]

use libfuzzer_sys::fuzz_target;

use blestore::app::attributes::{
    AttrValue, AttributeId, ATTRIBUTES, ATTR_NAMESPACE, DEFAULT_PLACEHOLDER, MAX_VALUE_LEN,
};
use blestore::app::events::AppEvent;
use blestore::app::ports::{EventSink, MirrorPort, StorageError, StoragePort};
use blestore::app::store::CharacteristicStore;
use std::collections::HashMap;

// ── In-memory ports for fuzz testing ──────────────────────────

struct MemStore {
    data: HashMap<String, String>,
}

impl StoragePort for MemStore {
    fn get_str(&self, ns: &str, key: &str) -> Result<Option<AttrValue>, StorageError> {
        Ok(self.data.get(&format!("{ns}::{key}")).map(|v| {
            let mut s = AttrValue::new();
            let _ = s.push_str(v);
            s
        }))
    }

    fn put_str(&mut self, ns: &str, key: &str, value: &str) -> Result<(), StorageError> {
        self.data.insert(format!("{ns}::{key}"), value.to_string());
        Ok(())
    }

    fn read(&self, _ns: &str, _key: &str, _buf: &mut [u8]) -> Result<usize, StorageError> {
        Err(StorageError::NotFound)
    }

    fn write(&mut self, _ns: &str, _key: &str, _data: &[u8]) -> Result<(), StorageError> {
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(&format!("{ns}::{key}"));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data.contains_key(&format!("{ns}::{key}"))
    }
}

struct NullMirror;

impl MirrorPort for NullMirror {
    fn set_value(&mut self, _id: AttributeId, _value: &str) {}
    fn notify(&mut self, _id: AttributeId, _value: &str) {}
}

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let mut storage = MemStore {
        data: HashMap::new(),
    };
    let mut mirror = NullMirror;
    let mut sink = NullSink;
    let mut store = CharacteristicStore::new();
    store.load_all(&storage, &mut mirror);

    // Each chunk: 1 selector byte + up to 80 payload bytes. Even selectors
    // target a registered UUID, odd selectors an arbitrary garbage one.
    for chunk in data.chunks(81) {
        let Some((&sel, payload)) = chunk.split_first() else {
            continue;
        };
        let uuid = if sel % 2 == 0 {
            ATTRIBUTES[(sel as usize / 2) % ATTRIBUTES.len()].uuid
        } else {
            u128::from(sel) << 64 | payload.len() as u128
        };
        store.handle_write(uuid, payload, &mut storage, &mut mirror, &mut sink);
    }

    // Cache must never diverge from persistence.
    for desc in &ATTRIBUTES {
        let cached = store.value(desc.id);
        assert!(cached.len() <= MAX_VALUE_LEN);
        match storage.get_str(ATTR_NAMESPACE, desc.storage_key).unwrap() {
            Some(persisted) => assert_eq!(cached, persisted.as_str()),
            None => assert_eq!(cached, DEFAULT_PLACEHOLDER),
        }
    }
});
