//! Callback-to-main-loop event system.
//!
//! Events are produced by the Bluedroid GATTS/GAP callbacks (which run in
//! the BT task) and consumed by the main loop, which processes them one at
//! a time. Write payloads travel separately through the BLE adapter's
//! pending-write queue; the event only signals that there is work to do.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ GATTS write  │────▶│              │     │              │
//! │ GAP connect  │────▶│  Event Queue │────▶│  Main Loop   │
//! │ GAP disconn. │────▶│  (lock-free) │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 32;

/// System event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    /// A BLE central connected.
    BleConnected = 0,
    /// The BLE central disconnected.
    BleDisconnected = 1,
    /// A client wrote to one of the registered characteristics;
    /// the payload is waiting in the BLE adapter's pending-write queue.
    AttributeWritten = 10,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// BT-task callbacks write (produce), main loop reads (consume).
// Uses atomic head/tail indices. The buffer is intentionally kept in a
// static so C callback functions can access it.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: producer (push_event) runs in the single BT task, consumer
// (drain_events) in the main-loop task. The acquire/release pairs on
// head/tail enforce the SPSC discipline; no slot is read while writable.
static mut EVENT_BUFFER: [u8; EVENT_QUEUE_CAP] = [0; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from the BT-task callback context (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        return false; // Queue full — drop event.
    }

    // SAFETY: single producer; the slot at `head` is not visible to the
    // consumer until the Release store below.
    unsafe {
        EVENT_BUFFER[head as usize] = event as u8;
    }

    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    let raw = unsafe { EVENT_BUFFER[tail as usize] };
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback, in FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0 => Some(Event::BleConnected),
        1 => Some(Event::BleDisconnected),
        10 => Some(Event::AttributeWritten),
        _ => None,
    }
}
