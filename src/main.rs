//! Blestore Firmware — Main Entry Point
//!
//! BLE characteristic store with NVS-backed persistence.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BleAdapter        LogEventSink       NvsAdapter               │
//! │  (MirrorPort)      (EventSink)        (Storage+Config)         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │         CharacteristicStore (pure logic)               │    │
//! │  │  attribute table · write policy · persistence sync     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Event queue (BT task → main loop, lock-free SPSC)             │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
pub mod config;
mod events;

pub mod app;
mod adapters;
pub mod diagnostics;

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use adapters::ble::BleAdapter;
use adapters::device_id;
use adapters::log_sink::LogEventSink;
use adapters::nvs::NvsAdapter;
use app::events::AppEvent;
use app::ports::{ConfigPort, EventSink};
use app::store::CharacteristicStore;
use diagnostics::CrashLog;
use events::Event;

/// Log every cached attribute value, one line per attribute.
fn log_dump(store: &CharacteristicStore) {
    info!("── Stored values ────────────────────");
    for (name, value) in store.dump_all() {
        info!("  {:<12} = '{}'", name, value);
    }
    info!("─────────────────────────────────────");
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Blestore v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();

    // ── 2. NVS + config ───────────────────────────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running without persistence", e);
            // Writes will fail and be absorbed; values live in RAM only
            // this session. On next reboot NVS should self-heal.
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            config::DeviceConfig::default()
        }
    };

    // ── 3. Crash log — surface last words of the previous boot ─
    let mut crash_log = CrashLog::new();
    crash_log.init(&nvs);
    let crashes = crash_log.read_all(&nvs);
    if !crashes.is_empty() {
        warn!("{} crash entr(ies) from previous sessions:", crashes.len());
        for entry in &crashes {
            warn!("  [t+{}s] {}", entry.uptime_secs, entry.reason);
        }
        crash_log.clear(&mut nvs);
    }

    // ── 4. Device identity ────────────────────────────────────
    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    let adv_name = if config.adv_name.is_empty() {
        device_id::adv_name(&mac)
    } else {
        config.adv_name.clone()
    };
    info!("Device ID: {} (advertising as '{}')", dev_id, adv_name);

    // ── 5. BLE transport ──────────────────────────────────────
    let mut ble = BleAdapter::new(adv_name);
    ble.start();

    // ── 6. Characteristic store ───────────────────────────────
    let mut sink = LogEventSink::new();
    let mut store = CharacteristicStore::new();
    store.load_all(&nvs, &mut ble);
    sink.emit(&AppEvent::Loaded {
        attributes: app::attributes::ATTRIBUTE_COUNT,
    });

    if config.dump_on_boot {
        log_dump(&store);
    }

    info!("System ready. Entering event loop.");

    // ── 7. Event loop ─────────────────────────────────────────
    //
    // All writes funnel through this single consumer, so the store never
    // sees concurrent dispatch.
    loop {
        std::thread::sleep(std::time::Duration::from_millis(50));

        events::drain_events(|event| match event {
            Event::AttributeWritten => {
                while let Some(pending) = adapters::ble::take_pending_write() {
                    store.handle_write(
                        pending.uuid,
                        &pending.data,
                        &mut nvs,
                        &mut ble,
                        &mut sink,
                    );
                }
            }

            Event::BleConnected => {
                ble.on_central_connected();
                sink.emit(&AppEvent::ClientConnected);
            }

            Event::BleDisconnected => {
                ble.on_central_disconnected();
                sink.emit(&AppEvent::ClientDisconnected);
                log_dump(&store);
            }
        });
    }
}
