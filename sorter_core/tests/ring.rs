use std::sync::Arc;
use std::time::{Duration, Instant};

use sorter_core::{CartId, RingBuilder, RingPhase};

struct Feed {
    ring: RingBuilder,
    t: Instant,
}

impl Feed {
    fn new() -> Self {
        Self {
            ring: RingBuilder::new(),
            t: Instant::now(),
        }
    }

    fn edge(&mut self, first: bool, rising: bool) {
        self.t += Duration::from_millis(10);
        self.ring.on_edge(first, rising, self.t);
    }

    fn zero_cart(&mut self) {
        self.edge(true, true);
        self.edge(false, true);
        self.edge(true, false);
        self.edge(false, false);
    }

    fn regular_cart(&mut self) {
        self.edge(true, true);
        self.edge(true, false);
    }
}

#[test]
fn five_cart_ring_is_discovered() {
    let mut f = Feed::new();
    f.zero_cart();
    for _ in 0..4 {
        f.regular_cart();
    }
    f.zero_cart();

    let snap = f.ring.current_snapshot().expect("snapshot after second zero cart");
    assert_eq!(snap.ring_length().value(), 5);
    let ids: Vec<u32> = snap.cart_ids().iter().map(|c| c.value()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(snap.zero_cart_id(), CartId::from_u32(0));
    assert_eq!(snap.zero_index().value(), 0);
    assert!(snap.built_at() > snap.began_at());
}

#[test]
fn no_snapshot_before_second_zero_cart() {
    let mut f = Feed::new();
    assert_eq!(f.ring.phase(), RingPhase::Waiting);
    f.zero_cart();
    assert_eq!(f.ring.phase(), RingPhase::Counting);
    for _ in 0..3 {
        f.regular_cart();
        assert!(f.ring.current_snapshot().is_none());
    }
    // Second zero cart half-way through its passage.
    f.edge(true, true);
    f.edge(false, true);
    f.edge(true, false);
    assert!(f.ring.current_snapshot().is_none());
    f.edge(false, false);
    assert_eq!(f.ring.phase(), RingPhase::Completed);
}

#[test]
fn carts_before_first_zero_cart_are_ignored() {
    let mut f = Feed::new();
    f.regular_cart();
    f.regular_cart();
    assert_eq!(f.ring.carts_counted(), 0);
    f.zero_cart();
    f.regular_cart();
    f.regular_cart();
    f.zero_cart();
    let snap = f.ring.current_snapshot().unwrap();
    assert_eq!(snap.ring_length().value(), 3);
}

#[test]
fn snapshot_is_frozen_after_completion() {
    let mut f = Feed::new();
    f.zero_cart();
    f.regular_cart();
    f.zero_cart();
    let before = f.ring.current_snapshot().unwrap();

    for _ in 0..5 {
        f.regular_cart();
    }
    f.zero_cart();
    f.edge(false, true);

    let after = f.ring.current_snapshot().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.ring_length().value(), 2);
}

#[test]
fn ring_of_only_the_zero_cart() {
    let mut f = Feed::new();
    f.zero_cart();
    f.zero_cart();
    let snap = f.ring.current_snapshot().unwrap();
    assert_eq!(snap.ring_length().value(), 1);
    assert_eq!(snap.cart_ids(), &[CartId::from_u32(0)]);
}

#[test]
fn second_sensor_blip_is_not_a_cart() {
    let mut f = Feed::new();
    f.zero_cart();
    f.regular_cart();
    // Spurious flicker on the second sensor alone.
    f.edge(false, true);
    f.edge(false, false);
    f.regular_cart();
    f.zero_cart();
    assert_eq!(f.ring.current_snapshot().unwrap().ring_length().value(), 3);
}
