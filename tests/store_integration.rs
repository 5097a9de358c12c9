//! Integration tests for the characteristic store wired to mock ports.
//!
//! Exercises the full write path (dispatch → persistence → mirror →
//! notification → event sink) the way the firmware main loop drives it,
//! without hardware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use blestore::app::attributes::{
    AttrValue, AttributeId, ATTRIBUTES, ATTRIBUTE_COUNT, ATTR_NAMESPACE, CHAR_IP_ADDRESS,
    CHAR_NAME, CHAR_VALUE_A, CHAR_VALUE_B, CHAR_VALUE_C, DEFAULT_PLACEHOLDER,
};
use blestore::app::events::AppEvent;
use blestore::app::ports::{EventSink, MirrorPort, StorageError, StoragePort};
use blestore::app::store::CharacteristicStore;

// ── Mock ports ────────────────────────────────────────────────

#[derive(Default)]
struct MockStorage {
    data: HashMap<String, String>,
    fail_writes: bool,
    write_count: usize,
}

impl MockStorage {
    fn key(ns: &str, key: &str) -> String {
        format!("{}::{}", ns, key)
    }

    fn persisted(&self, key: &str) -> Option<&str> {
        self.data
            .get(&Self::key(ATTR_NAMESPACE, key))
            .map(String::as_str)
    }
}

impl StoragePort for MockStorage {
    fn get_str(&self, ns: &str, key: &str) -> Result<Option<AttrValue>, StorageError> {
        Ok(self.data.get(&Self::key(ns, key)).map(|v| {
            let mut s = AttrValue::new();
            let _ = s.push_str(v);
            s
        }))
    }

    fn put_str(&mut self, ns: &str, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Full);
        }
        self.write_count += 1;
        self.data.insert(Self::key(ns, key), value.to_string());
        Ok(())
    }

    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.data.get(&Self::key(ns, key)) {
            Some(v) => {
                let bytes = v.as_bytes();
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(len)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.data.insert(
            Self::key(ns, key),
            String::from_utf8_lossy(data).into_owned(),
        );
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(&Self::key(ns, key));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data.contains_key(&Self::key(ns, key))
    }
}

#[derive(Default)]
struct MockMirror {
    values: HashMap<AttributeId, String>,
    notifications: Vec<(AttributeId, String)>,
}

impl MirrorPort for MockMirror {
    fn set_value(&mut self, id: AttributeId, value: &str) {
        self.values.insert(id, value.to_string());
    }

    fn notify(&mut self, id: AttributeId, value: &str) {
        self.notifications.push((id, value.to_string()));
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

struct Rig {
    storage: MockStorage,
    mirror: MockMirror,
    sink: RecordingSink,
    store: CharacteristicStore,
}

impl Rig {
    fn boot() -> Self {
        let storage = MockStorage::default();
        Self::boot_with(storage)
    }

    fn boot_with(storage: MockStorage) -> Self {
        let mut mirror = MockMirror::default();
        let mut store = CharacteristicStore::new();
        store.load_all(&storage, &mut mirror);
        Self {
            storage,
            mirror,
            sink: RecordingSink::default(),
            store,
        }
    }

    fn write(&mut self, uuid: u128, payload: &[u8]) {
        self.store.handle_write(
            uuid,
            payload,
            &mut self.storage,
            &mut self.mirror,
            &mut self.sink,
        );
    }
}

// ── Boot + load ───────────────────────────────────────────────

#[test]
fn first_boot_every_attribute_is_placeholder() {
    let rig = Rig::boot();

    for desc in &ATTRIBUTES {
        assert_eq!(rig.store.value(desc.id), DEFAULT_PLACEHOLDER);
        assert_eq!(
            rig.mirror.values.get(&desc.id).map(String::as_str),
            Some(DEFAULT_PLACEHOLDER)
        );
    }
    assert!(rig.store.is_loaded());
}

#[test]
fn reboot_restores_persisted_values() {
    let mut rig = Rig::boot();
    rig.write(CHAR_IP_ADDRESS, b"10.1.2.3");
    rig.write(CHAR_NAME, b"bench-unit");

    // Simulated reboot: new store over the surviving storage.
    let rig2 = Rig::boot_with(rig.storage);
    assert_eq!(rig2.store.value(AttributeId::IpAddress), "10.1.2.3");
    assert_eq!(rig2.store.value(AttributeId::Name), "bench-unit");
    assert_eq!(rig2.store.value(AttributeId::ValueA), DEFAULT_PLACEHOLDER);
}

#[test]
fn load_never_writes_to_storage() {
    let rig = Rig::boot();
    assert_eq!(rig.storage.write_count, 0);
    assert!(rig.storage.data.is_empty());
}

// ── Write dispatch ────────────────────────────────────────────

#[test]
fn writes_to_all_five_attributes_land_in_their_own_keys() {
    let mut rig = Rig::boot();
    rig.write(CHAR_IP_ADDRESS, b"192.168.0.9");
    rig.write(CHAR_NAME, b"node-7");
    rig.write(CHAR_VALUE_A, b"1");
    rig.write(CHAR_VALUE_B, b"2");
    rig.write(CHAR_VALUE_C, b"3");

    assert_eq!(rig.storage.persisted("ip_address"), Some("192.168.0.9"));
    assert_eq!(rig.storage.persisted("name"), Some("node-7"));
    assert_eq!(rig.storage.persisted("value_A"), Some("1"));
    assert_eq!(rig.storage.persisted("value_B"), Some("2"));
    assert_eq!(rig.storage.persisted("value_C"), Some("3"));
    assert_eq!(rig.sink.events.len(), 5);
}

#[test]
fn only_ip_and_name_notify() {
    let mut rig = Rig::boot();
    rig.write(CHAR_IP_ADDRESS, b"10.0.0.1");
    rig.write(CHAR_VALUE_A, b"a");
    rig.write(CHAR_VALUE_B, b"b");
    rig.write(CHAR_VALUE_C, b"c");
    rig.write(CHAR_NAME, b"n");

    let notified: Vec<AttributeId> = rig.mirror.notifications.iter().map(|(id, _)| *id).collect();
    assert_eq!(notified, vec![AttributeId::IpAddress, AttributeId::Name]);
}

#[test]
fn rejected_writes_emit_no_events() {
    let mut rig = Rig::boot();
    rig.write(0xdead_beef, b"x"); // unknown UUID
    rig.write(CHAR_VALUE_A, b""); // empty payload
    rig.write(CHAR_VALUE_A, &[0xC3]); // truncated UTF-8

    assert!(rig.sink.events.is_empty());
    assert!(rig.mirror.notifications.is_empty());
    assert_eq!(rig.storage.write_count, 0);
}

#[test]
fn persistence_failure_leaves_all_three_views_consistent() {
    let mut rig = Rig::boot();
    rig.write(CHAR_NAME, b"before");
    rig.storage.fail_writes = true;
    rig.write(CHAR_NAME, b"after");

    assert_eq!(rig.store.value(AttributeId::Name), "before");
    assert_eq!(rig.storage.persisted("name"), Some("before"));
    assert_eq!(
        rig.mirror.values.get(&AttributeId::Name).map(String::as_str),
        Some("before")
    );
    // No notification for the failed write either.
    let name_notes = rig
        .mirror
        .notifications
        .iter()
        .filter(|(id, _)| *id == AttributeId::Name)
        .count();
    assert_eq!(name_notes, 1);
}

#[test]
fn dump_matches_cache_after_mixed_traffic() {
    let mut rig = Rig::boot();
    rig.write(CHAR_VALUE_B, b"77");
    rig.write(CHAR_VALUE_B, b""); // ignored
    rig.write(0x1234, b"junk"); // ignored

    let dump: HashMap<&str, String> = rig
        .store
        .dump_all()
        .map(|(n, v)| (n, v.to_string()))
        .collect();
    assert_eq!(dump.len(), ATTRIBUTE_COUNT);
    assert_eq!(dump["Value B"], "77");
    assert_eq!(dump["IP Address"], DEFAULT_PLACEHOLDER);
}

// ── Serialized concurrent access ──────────────────────────────

#[test]
fn mutex_serialized_writers_never_corrupt_the_store() {
    // Two clients writing different attributes through the shared lock,
    // the way the main loop serializes transport callbacks.
    let rig = Arc::new(Mutex::new(Rig::boot()));

    let rig_a = Arc::clone(&rig);
    let t_a = std::thread::spawn(move || {
        for i in 0..50 {
            let mut r = rig_a.lock().unwrap();
            let payload = format!("a{}", i);
            r.write(CHAR_VALUE_A, payload.as_bytes());
        }
    });

    let rig_b = Arc::clone(&rig);
    let t_b = std::thread::spawn(move || {
        for i in 0..50 {
            let mut r = rig_b.lock().unwrap();
            let payload = format!("b{}", i);
            r.write(CHAR_VALUE_B, payload.as_bytes());
        }
    });

    t_a.join().unwrap();
    t_b.join().unwrap();

    let r = rig.lock().unwrap();
    assert_eq!(r.store.value(AttributeId::ValueA), "a49");
    assert_eq!(r.store.value(AttributeId::ValueB), "b49");
    assert_eq!(r.storage.persisted("value_A"), Some("a49"));
    assert_eq!(r.storage.persisted("value_B"), Some("b49"));
    assert_eq!(r.sink.events.len(), 100);
}
