//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A future MQTT or RPC adapter would implement the same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Loaded { attributes } => {
                info!("LOAD  | {} attributes restored from NVS", attributes);
            }
            AppEvent::AttributeChanged { name, value } => {
                info!("ATTR  | {} = '{}'", name, value);
            }
            AppEvent::ClientConnected => {
                info!("CONN  | central connected");
            }
            AppEvent::ClientDisconnected => {
                info!("CONN  | central disconnected, advertising restarts");
            }
        }
    }
}
