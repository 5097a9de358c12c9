//! The fixed attribute registry.
//!
//! Five independently addressable pieces of device state, each bound to one
//! GATT characteristic UUID and one NVS storage key. The set is defined
//! once here and never changes at runtime — dispatch is data-driven through
//! [`lookup_uuid`] instead of a UUID equality chain.
//!
//! | Attribute  | Storage key  | Notify |
//! |------------|--------------|--------|
//! | IP Address | `ip_address` | yes    |
//! | Name       | `name`       | yes    |
//! | Value A    | `value_A`    | no     |
//! | Value B    | `value_B`    | no     |
//! | Value C    | `value_C`    | no     |

pub const SERVICE_UUID: u128 = 0x12345678_1234_5678_1234_56789abcdef0;
pub const CHAR_IP_ADDRESS: u128 = 0x12345678_1234_5678_1234_56789abcdef1;
pub const CHAR_VALUE_A: u128 = 0x12345678_1234_5678_1234_56789abcdef2;
pub const CHAR_VALUE_B: u128 = 0x12345678_1234_5678_1234_56789abcdef3;
pub const CHAR_VALUE_C: u128 = 0x12345678_1234_5678_1234_56789abcdef4;
pub const CHAR_NAME: u128 = 0x12345678_1234_5678_1234_56789abcdef6;

/// Longest accepted characteristic value, in bytes. The GATT attribute
/// slots are declared with this maximum, so longer client writes never
/// reach the store on target.
pub const MAX_VALUE_LEN: usize = 64;

/// Reported for attributes that have never been written.
pub const DEFAULT_PLACEHOLDER: &str = "Not set";

/// NVS namespace shared by all five attribute keys.
pub const ATTR_NAMESPACE: &str = "attrs";

/// A single attribute value, mirrored in memory and in the GATT table.
pub type AttrValue = heapless::String<MAX_VALUE_LEN>;

pub const ATTRIBUTE_COUNT: usize = 5;

/// Identifies one of the five registered attributes.
///
/// Discriminants double as indices into the cached-value array and the
/// GATT handle table, in [`ATTRIBUTES`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeId {
    IpAddress = 0,
    Name = 1,
    ValueA = 2,
    ValueB = 3,
    ValueC = 4,
}

impl AttributeId {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Static description of one attribute: identity, persistence binding,
/// and capability set.
#[derive(Debug)]
pub struct AttributeDescriptor {
    pub id: AttributeId,
    pub uuid: u128,
    /// Human-readable name used in diagnostics and logs.
    pub name: &'static str,
    /// NVS key under [`ATTR_NAMESPACE`]; one-to-one with `uuid`.
    pub storage_key: &'static str,
    /// Whether value changes are pushed to subscribed clients.
    pub notify: bool,
}

/// The registry. Order must match [`AttributeId`] discriminants.
pub const ATTRIBUTES: [AttributeDescriptor; ATTRIBUTE_COUNT] = [
    AttributeDescriptor {
        id: AttributeId::IpAddress,
        uuid: CHAR_IP_ADDRESS,
        name: "IP Address",
        storage_key: "ip_address",
        notify: true,
    },
    AttributeDescriptor {
        id: AttributeId::Name,
        uuid: CHAR_NAME,
        name: "Name",
        storage_key: "name",
        notify: true,
    },
    AttributeDescriptor {
        id: AttributeId::ValueA,
        uuid: CHAR_VALUE_A,
        name: "Value A",
        storage_key: "value_A",
        notify: false,
    },
    AttributeDescriptor {
        id: AttributeId::ValueB,
        uuid: CHAR_VALUE_B,
        name: "Value B",
        storage_key: "value_B",
        notify: false,
    },
    AttributeDescriptor {
        id: AttributeId::ValueC,
        uuid: CHAR_VALUE_C,
        name: "Value C",
        storage_key: "value_C",
        notify: false,
    },
];

/// Descriptor for a known attribute.
pub fn descriptor(id: AttributeId) -> &'static AttributeDescriptor {
    &ATTRIBUTES[id.index()]
}

/// Look up a characteristic UUID. Returns `None` for unregistered UUIDs —
/// the caller drops those writes silently.
pub fn lookup_uuid(uuid: u128) -> Option<&'static AttributeDescriptor> {
    ATTRIBUTES.iter().find(|d| d.uuid == uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_matches_id_index() {
        for (i, desc) in ATTRIBUTES.iter().enumerate() {
            assert_eq!(desc.id.index(), i, "descriptor {} out of order", desc.name);
        }
    }

    #[test]
    fn uuids_are_unique() {
        for (i, a) in ATTRIBUTES.iter().enumerate() {
            for b in &ATTRIBUTES[i + 1..] {
                assert_ne!(a.uuid, b.uuid);
            }
        }
    }

    #[test]
    fn storage_keys_are_unique_and_nvs_sized() {
        for (i, a) in ATTRIBUTES.iter().enumerate() {
            // NVS keys are limited to 15 characters.
            assert!(a.storage_key.len() <= 15, "{} key too long", a.name);
            for b in &ATTRIBUTES[i + 1..] {
                assert_ne!(a.storage_key, b.storage_key);
            }
        }
    }

    #[test]
    fn notify_capability_per_registry() {
        assert!(descriptor(AttributeId::IpAddress).notify);
        assert!(descriptor(AttributeId::Name).notify);
        assert!(!descriptor(AttributeId::ValueA).notify);
        assert!(!descriptor(AttributeId::ValueB).notify);
        assert!(!descriptor(AttributeId::ValueC).notify);
    }

    #[test]
    fn lookup_finds_every_registered_uuid() {
        for desc in &ATTRIBUTES {
            let found = lookup_uuid(desc.uuid).expect("registered UUID");
            assert_eq!(found.id, desc.id);
        }
    }

    #[test]
    fn lookup_rejects_unknown_uuid() {
        assert!(lookup_uuid(SERVICE_UUID).is_none());
        assert!(lookup_uuid(0).is_none());
    }
}
