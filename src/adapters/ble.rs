//! BLE GATT transport adapter.
//!
//! Implements [`MirrorPort`] — the hexagonal boundary between the
//! characteristic store and the Bluetooth transport.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid BLE GATT server via `esp_idf_svc::sys`.
//! - **all other targets**: simulation mirror for host-side tests.
//!
//! ## GATT Service Layout
//!
//! One primary service (`12345678-…-def0`) with the five registered
//! characteristics from [`crate::app::attributes`], all read+write; IP and
//! Name carry a CCCD and notify. Client writes are never handled in the
//! BT task: the GATTS callback copies the payload into a mutex-protected
//! pending-write queue and pushes [`Event::AttributeWritten`] for the main
//! loop to consume.

use crate::app::attributes::{AttributeId, ATTRIBUTE_COUNT, MAX_VALUE_LEN};
use crate::app::ports::MirrorPort;
use log::info;

#[cfg(target_os = "espidf")]
use crate::app::attributes::ATTRIBUTES;

#[cfg(not(target_os = "espidf"))]
use crate::app::attributes::AttrValue;

// ───────────────────────────────────────────────────────────────
// BLE state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Connected,
    Failed,
}

/// One client write lifted out of the GATTS callback context.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub uuid: u128,
    pub data: heapless::Vec<u8, MAX_VALUE_LEN>,
}

// ── ESP-IDF BLE static state (BT-task-safe atomics) ───────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These statics bridge the callback context to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
/// `conn_id + 1`; 0 means no central is connected (conn_id 0 is valid).
#[cfg(target_os = "espidf")]
static BLE_CONN: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);
/// Attribute handle per registered characteristic, in ATTRIBUTES order.
#[cfg(target_os = "espidf")]
static BLE_CHAR_HANDLES: [AtomicU32; ATTRIBUTE_COUNT] = [
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
];

// Client writes bridging GATTS callback → main loop.
// GATTS callbacks run in the Bluedroid task (not ISR), so std Mutex is safe.
#[cfg(target_os = "espidf")]
static BLE_WRITE_QUEUE: std::sync::Mutex<heapless::Deque<PendingWrite, 8>> =
    std::sync::Mutex::new(heapless::Deque::new());

/// Consume the oldest client write captured by the GATTS callback.
#[cfg(target_os = "espidf")]
pub fn take_pending_write() -> Option<PendingWrite> {
    BLE_WRITE_QUEUE.lock().ok()?.pop_front()
}

#[cfg(not(target_os = "espidf"))]
pub fn take_pending_write() -> Option<PendingWrite> {
    None
}

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    unsafe {
        t.uuid.uuid128 = uuid.to_le_bytes();
    }
    t
}

#[cfg(target_os = "espidf")]
static CHAR_INIT_VALUE: [u8; 7] = *b"Not set";

/// Add one characteristic with a stack-managed (auto-respond) value slot.
#[cfg(target_os = "espidf")]
unsafe fn add_gatt_char(svc_handle: u16, uuid: u128, prop: u32) {
    use esp_idf_svc::sys::*;
    let mut char_uuid = uuid128_to_esp(uuid);
    let mut attr_value = esp_attr_value_t {
        attr_max_len: MAX_VALUE_LEN as u16,
        attr_len: CHAR_INIT_VALUE.len() as u16,
        attr_value: CHAR_INIT_VALUE.as_ptr() as *mut u8,
    };
    let mut control = esp_attr_control_t {
        auto_rsp: ESP_GATT_AUTO_RSP as u8,
    };
    unsafe {
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
            prop as esp_gatt_char_prop_t,
            &mut attr_value,
            &mut control,
        );
    }
}

/// Add the Client Characteristic Configuration descriptor (0x2902) so
/// centrals can subscribe to notifications on the preceding characteristic.
#[cfg(target_os = "espidf")]
unsafe fn add_cccd(svc_handle: u16) {
    use esp_idf_svc::sys::*;
    let mut descr_uuid: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    descr_uuid.len = 2;
    descr_uuid.uuid.uuid16 = 0x2902;
    unsafe {
        esp_ble_gatts_add_char_descr(
            svc_handle,
            &mut descr_uuid,
            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }
}

#[cfg(target_os = "espidf")]
fn char_prop(index: usize) -> u32 {
    use esp_idf_svc::sys::*;
    let base = ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_WRITE;
    if ATTRIBUTES[index].notify {
        base | ESP_GATT_CHAR_PROP_BIT_NOTIFY
    } else {
        base
    }
}

#[cfg(target_os = "espidf")]
fn start_advertising() {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    unsafe {
        esp_ble_gap_start_advertising(&mut adv_params);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    BLE_GATTS_IF.store(gatts_if as u32, AtomicOrdering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let svc_uuid = uuid128_to_esp(crate::app::attributes::SERVICE_UUID);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: svc_uuid,
                    inst_id: 0,
                },
                is_primary: true,
            };
            // 1 service + 5 × (decl + value) + 2 CCCDs.
            unsafe {
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, 16);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let p = unsafe { &(*param).create };
            let svc_handle = p.service_handle;
            BLE_SVC_HANDLE.store(svc_handle as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
            }
            BLE_CHAR_STEP.store(1, AtomicOrdering::Relaxed);
            unsafe {
                add_gatt_char(svc_handle, ATTRIBUTES[0].uuid, char_prop(0));
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let p = unsafe { &(*param).add_char };
            let handle = p.attr_handle;
            let step = BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) as usize;
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            if step == 0 || step > ATTRIBUTE_COUNT {
                return;
            }
            let index = step - 1;
            BLE_CHAR_HANDLES[index].store(handle as u32, AtomicOrdering::Relaxed);
            log::info!(
                "BLE GATTS: '{}' characteristic (handle={})",
                ATTRIBUTES[index].name,
                handle
            );
            if ATTRIBUTES[index].notify {
                unsafe {
                    add_cccd(svc_handle);
                }
            }
            if step < ATTRIBUTE_COUNT {
                BLE_CHAR_STEP.store(step as u32 + 1, AtomicOrdering::Relaxed);
                unsafe {
                    add_gatt_char(svc_handle, ATTRIBUTES[step].uuid, char_prop(step));
                }
            } else {
                BLE_CHAR_STEP.store(0, AtomicOrdering::Relaxed);
                log::info!("BLE GATTS: all {} characteristics registered", ATTRIBUTE_COUNT);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = unsafe { &(*param).connect };
            BLE_CONN.store(p.conn_id as u32 + 1, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: client connected (conn_id={})", p.conn_id);
            crate::events::push_event(crate::events::Event::BleConnected);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONN.store(0, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: client disconnected");
            crate::events::push_event(crate::events::Event::BleDisconnected);
            // Keep the device discoverable for the next client.
            start_advertising();
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            if p.is_prep {
                // Prepared (long) writes are not used by our clients.
                return;
            }
            if p.value.is_null() {
                return;
            }
            let handle = p.handle as u32;
            let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };

            let Some(index) = BLE_CHAR_HANDLES
                .iter()
                .position(|h| h.load(AtomicOrdering::Relaxed) == handle)
            else {
                return; // CCCD or foreign attribute.
            };

            let mut payload = heapless::Vec::new();
            if payload.extend_from_slice(data).is_err() {
                log::warn!(
                    "BLE GATTS: oversize write to '{}' dropped ({} bytes)",
                    ATTRIBUTES[index].name,
                    data.len()
                );
                return;
            }
            let pending = PendingWrite {
                uuid: ATTRIBUTES[index].uuid,
                data: payload,
            };
            if let Ok(mut queue) = BLE_WRITE_QUEUE.lock() {
                if queue.push_back(pending).is_err() {
                    log::warn!("BLE GATTS: pending-write queue full, write dropped");
                    return;
                }
            }
            crate::events::push_event(crate::events::Event::AttributeWritten);
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    state: BleState,
    adv_name: heapless::String<24>,
    /// Simulation: the transport-exposed readable value per attribute.
    #[cfg(not(target_os = "espidf"))]
    sim_mirror: [AttrValue; ATTRIBUTE_COUNT],
    /// Simulation: notifications issued since the last drain.
    #[cfg(not(target_os = "espidf"))]
    sim_notifications: Vec<(AttributeId, AttrValue)>,
}

impl BleAdapter {
    pub fn new(adv_name: heapless::String<24>) -> Self {
        Self {
            state: BleState::Idle,
            adv_name,
            #[cfg(not(target_os = "espidf"))]
            sim_mirror: core::array::from_fn(|_| AttrValue::new()),
            #[cfg(not(target_os = "espidf"))]
            sim_notifications: Vec::new(),
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, BleState::Advertising | BleState::Connected)
    }

    /// Bring up the stack and start advertising the service.
    pub fn start(&mut self) {
        info!("BLE: starting advertising as '{}'", self.adv_name);
        self.platform_start();
        if self.state != BleState::Failed {
            self.state = BleState::Advertising;
        }
    }

    pub fn stop(&mut self) {
        self.platform_stop();
        self.state = BleState::Idle;
        info!("BLE: stopped");
    }

    pub fn on_central_connected(&mut self) {
        self.state = BleState::Connected;
    }

    pub fn on_central_disconnected(&mut self) {
        if self.state != BleState::Idle {
            self.state = BleState::Advertising;
        }
    }

    // ── Simulation helpers ────────────────────────────────────

    /// The value a client read would currently return.
    #[cfg(not(target_os = "espidf"))]
    pub fn mirror_value(&self, id: AttributeId) -> &str {
        self.sim_mirror[id.index()].as_str()
    }

    /// Drain the notifications issued so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn take_notifications(&mut self) -> Vec<(AttributeId, AttrValue)> {
        core::mem::take(&mut self.sim_notifications)
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) {
        use esp_idf_svc::sys::*;
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK {
                log::error!("BLE: bt_controller_init failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK {
                log::error!("BLE: bt_controller_enable failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            let ret = esp_bluedroid_init();
            if ret != ESP_OK {
                log::error!("BLE: bluedroid_init failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            let ret = esp_bluedroid_enable();
            if ret != ESP_OK {
                log::error!("BLE: bluedroid_enable failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            // Register GAP and GATTS callbacks. The static handlers build
            // the GATT table and post events to the main-loop queue.
            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);

            // Set device name for advertising.
            let mut name_buf = [0u8; 25];
            let nb = self.adv_name.as_bytes();
            name_buf[..nb.len()].copy_from_slice(nb);
            esp_ble_gap_set_device_name(name_buf.as_ptr() as *const _);

            start_advertising();

            info!(
                "BLE(espidf): Bluedroid stack initialized, advertising as '{}'",
                self.adv_name
            );
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) {
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.adv_name,
            crate::app::attributes::SERVICE_UUID
        );
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        use esp_idf_svc::sys::*;
        unsafe {
            esp_ble_gap_stop_advertising();
            esp_bluedroid_disable();
            esp_bluedroid_deinit();
            esp_bt_controller_disable();
            esp_bt_controller_deinit();
        }
        info!("BLE(espidf): stack shut down");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("BLE(sim): stopped");
    }
}

// ───────────────────────────────────────────────────────────────
// MirrorPort implementation
// ───────────────────────────────────────────────────────────────

impl MirrorPort for BleAdapter {
    fn set_value(&mut self, id: AttributeId, value: &str) {
        #[cfg(target_os = "espidf")]
        {
            use esp_idf_svc::sys::*;
            let handle = BLE_CHAR_HANDLES[id.index()].load(AtomicOrdering::Relaxed);
            if handle != 0 {
                unsafe {
                    esp_ble_gatts_set_attr_value(
                        handle as u16,
                        value.len() as u16,
                        value.as_ptr(),
                    );
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let slot = &mut self.sim_mirror[id.index()];
            slot.clear();
            let _ = slot.push_str(value);
        }
    }

    fn notify(&mut self, id: AttributeId, value: &str) {
        #[cfg(target_os = "espidf")]
        {
            use esp_idf_svc::sys::*;
            let handle = BLE_CHAR_HANDLES[id.index()].load(AtomicOrdering::Relaxed);
            let conn = BLE_CONN.load(AtomicOrdering::Relaxed);
            if handle != 0 && conn != 0 {
                unsafe {
                    esp_ble_gatts_send_indicate(
                        BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as u8,
                        (conn - 1) as u16,
                        handle as u16,
                        value.len() as u16,
                        value.as_ptr() as *mut u8,
                        false,
                    );
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let mut v = AttrValue::new();
            let _ = v.push_str(value);
            self.sim_notifications.push((id, v));
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_adapter() -> BleAdapter {
        let mut name = heapless::String::<24>::new();
        name.push_str("blestore-test").ok();
        BleAdapter::new(name)
    }

    #[test]
    fn start_stop_lifecycle() {
        let mut adapter = make_adapter();
        assert_eq!(adapter.state(), BleState::Idle);
        assert!(!adapter.is_active());
        adapter.start();
        assert_eq!(adapter.state(), BleState::Advertising);
        assert!(adapter.is_active());
        adapter.stop();
        assert_eq!(adapter.state(), BleState::Idle);
    }

    #[test]
    fn connection_state_callbacks() {
        let mut adapter = make_adapter();
        adapter.start();
        adapter.on_central_connected();
        assert_eq!(adapter.state(), BleState::Connected);
        adapter.on_central_disconnected();
        assert_eq!(adapter.state(), BleState::Advertising);
    }

    #[test]
    fn mirror_value_round_trip() {
        let mut adapter = make_adapter();
        adapter.set_value(AttributeId::IpAddress, "10.0.0.7");
        assert_eq!(adapter.mirror_value(AttributeId::IpAddress), "10.0.0.7");
        // Other slots untouched.
        assert_eq!(adapter.mirror_value(AttributeId::ValueA), "");
    }

    #[test]
    fn set_value_overwrites() {
        let mut adapter = make_adapter();
        adapter.set_value(AttributeId::Name, "first");
        adapter.set_value(AttributeId::Name, "second");
        assert_eq!(adapter.mirror_value(AttributeId::Name), "second");
    }

    #[test]
    fn notifications_are_recorded_and_drained() {
        let mut adapter = make_adapter();
        adapter.notify(AttributeId::Name, "lab-node");
        let notes = adapter.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, AttributeId::Name);
        assert_eq!(notes[0].1.as_str(), "lab-node");
        assert!(adapter.take_notifications().is_empty());
    }

    #[test]
    fn no_pending_writes_on_host() {
        assert!(take_pending_write().is_none());
    }
}
