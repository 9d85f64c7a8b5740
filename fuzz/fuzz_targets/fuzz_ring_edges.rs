#![no_main]
use libfuzzer_sys::fuzz_target;
use sorter_core::{PositionTracker, RingBuilder};
use std::time::{Duration, Instant};

// Each byte is one edge: bit 0 picks the sensor, bit 1 the direction,
// bit 2 emits a cart-passed pulse to the tracker instead.
fuzz_target!(|data: &[u8]| {
    let mut ring = RingBuilder::new();
    let mut tracker = PositionTracker::new();
    let mut t = Instant::now();
    for &b in data {
        t += Duration::from_millis(1);
        if b & 0b100 != 0 {
            tracker.on_cart_passed_origin(&ring, t);
        } else {
            ring.on_edge(b & 1 != 0, b & 0b10 != 0, t);
        }
        if let Some(snap) = ring.current_snapshot() {
            let len = snap.ring_length().value();
            assert!(len >= 1);
            assert_eq!(snap.cart_ids().len(), len as usize);
        }
        if let (Some(idx), Some(len)) = (tracker.current_index(), tracker.ring_length()) {
            assert!(idx.value() < len.value());
        }
    }
});
