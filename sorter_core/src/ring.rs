//! Ring discovery from the two origin sensors.
//!
//! The zero cart is wide enough to block both sensors during its passage; every
//! other cart only ever blocks the first one. `RingBuilder` tells them apart purely
//! from latched sensor state, so it depends on edge order, never on durations:
//!
//! ```text
//! zero cart:    S1 ↑  S2 ↑  S1 ↓  S2 ↓     (both blocked at some point)
//! regular cart: S1 ↑  S1 ↓                 (S2 stays clear)
//! ```
//!
//! Discovery begins at the first zero cart and completes at the second one, at
//! which point an immutable [`RingSnapshot`] is frozen. Edges must be delivered
//! once, in chronological order, from a single thread; the builder is `!Sync` to
//! keep that contract visible.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::ids::{CartId, CartIndex, RingLength};

/// One level change on an origin sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginEdge {
    /// `true` for the first sensor, `false` for the second.
    pub is_first_sensor: bool,
    /// `true` when the sensor became blocked.
    pub is_rising_edge: bool,
    pub at: Instant,
}

/// Result of a completed discovery. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingSnapshot {
    ring_length: RingLength,
    zero_cart_id: CartId,
    zero_index: CartIndex,
    cart_ids: Vec<CartId>,
    began_at: Instant,
    built_at: Instant,
}

impl RingSnapshot {
    pub fn ring_length(&self) -> RingLength {
        self.ring_length
    }

    pub fn zero_cart_id(&self) -> CartId {
        self.zero_cart_id
    }

    pub fn zero_index(&self) -> CartIndex {
        self.zero_index
    }

    /// Cart identities in detection order; index 0 is the zero cart.
    pub fn cart_ids(&self) -> &[CartId] {
        &self.cart_ids
    }

    /// Identity of the cart at a ring position.
    pub fn cart_id_at(&self, index: CartIndex) -> Option<CartId> {
        self.cart_ids.get(index.value() as usize).copied()
    }

    /// When the first zero cart finished passing.
    pub fn began_at(&self) -> Instant {
        self.began_at
    }

    /// When the second zero cart finished passing.
    pub fn built_at(&self) -> Instant {
        self.built_at
    }
}

/// Anything that can hand out the current ring snapshot.
pub trait SnapshotSource {
    fn current_snapshot(&self) -> Option<Arc<RingSnapshot>>;
}

impl SnapshotSource for Option<Arc<RingSnapshot>> {
    fn current_snapshot(&self) -> Option<Arc<RingSnapshot>> {
        self.clone()
    }
}

/// Coarse discovery phase, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingPhase {
    /// Waiting for the first zero cart.
    Waiting,
    /// First zero cart seen, counting regular carts.
    Counting,
    Completed,
    Invalid,
}

#[derive(Debug, Default)]
struct Discovery {
    first_blocked: bool,
    second_blocked: bool,
    // Set while both sensors were blocked during the current passage.
    both_latched: bool,
    cart_count: u32,
    // Some once the first zero cart has passed.
    begun_at: Option<Instant>,
    cart_ids: Vec<CartId>,
}

#[derive(Debug)]
enum RingState {
    Building(Discovery),
    Completed(Arc<RingSnapshot>),
    Invalid,
}

/// Edge-triggered ring discovery state machine.
#[derive(Debug)]
pub struct RingBuilder {
    state: RingState,
    _unsync: PhantomData<Cell<()>>,
}

impl Default for RingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RingBuilder {
    pub fn new() -> Self {
        Self {
            state: RingState::Building(Discovery::default()),
            _unsync: PhantomData,
        }
    }

    /// Feed one origin sensor edge. Ignored once discovery has completed or failed.
    pub fn on_edge(&mut self, is_first_sensor: bool, is_rising_edge: bool, at: Instant) {
        let RingState::Building(d) = &mut self.state else {
            return;
        };

        if is_first_sensor {
            d.first_blocked = is_rising_edge;
        } else {
            d.second_blocked = is_rising_edge;
        }

        if d.first_blocked && d.second_blocked {
            d.both_latched = true;
        }

        if !d.first_blocked && !d.second_blocked && d.both_latched {
            d.both_latched = false;
            let Some(began_at) = d.begun_at else {
                d.cart_count = 1;
                d.cart_ids = vec![CartId::from_u32(0)];
                d.begun_at = Some(at);
                tracing::info!("zero cart passed, ring discovery begun");
                return;
            };
            let cart_count = d.cart_count;
            let cart_ids = std::mem::take(&mut d.cart_ids);
            self.state = finish(cart_count, cart_ids, began_at, at);
            return;
        }

        if is_first_sensor
            && !is_rising_edge
            && !d.second_blocked
            && !d.both_latched
            && d.begun_at.is_some()
        {
            d.cart_ids.push(CartId::from_u32(d.cart_count));
            d.cart_count = d.cart_count.saturating_add(1);
            tracing::trace!(cart_count = d.cart_count, "regular cart passed");
        }
    }

    /// Convenience wrapper around [`RingBuilder::on_edge`].
    pub fn apply(&mut self, edge: OriginEdge) {
        self.on_edge(edge.is_first_sensor, edge.is_rising_edge, edge.at);
    }

    pub fn phase(&self) -> RingPhase {
        match &self.state {
            RingState::Building(d) if d.begun_at.is_some() => RingPhase::Counting,
            RingState::Building(_) => RingPhase::Waiting,
            RingState::Completed(_) => RingPhase::Completed,
            RingState::Invalid => RingPhase::Invalid,
        }
    }

    /// Carts counted so far in the current discovery (0 before it begins).
    pub fn carts_counted(&self) -> u32 {
        match &self.state {
            RingState::Building(d) => d.cart_count,
            RingState::Completed(s) => s.ring_length.value(),
            RingState::Invalid => 0,
        }
    }

    /// The frozen snapshot; `None` until the second zero cart has passed, and
    /// forever `None` if discovery failed.
    pub fn current_snapshot(&self) -> Option<Arc<RingSnapshot>> {
        match &self.state {
            RingState::Completed(s) => Some(Arc::clone(s)),
            _ => None,
        }
    }
}

impl SnapshotSource for RingBuilder {
    fn current_snapshot(&self) -> Option<Arc<RingSnapshot>> {
        RingBuilder::current_snapshot(self)
    }
}

// Edge handling always pushes one id per counted cart, so the guard below only
// trips if that bookkeeping is broken.
fn finish(cart_count: u32, cart_ids: Vec<CartId>, began_at: Instant, at: Instant) -> RingState {
    if cart_count == 0 || cart_ids.len() != cart_count as usize {
        tracing::warn!(
            cart_count,
            ids = cart_ids.len(),
            "ring discovery invalid; no snapshot produced"
        );
        return RingState::Invalid;
    }
    let snapshot = RingSnapshot {
        ring_length: RingLength::from_u32(cart_count),
        zero_cart_id: CartId::from_u32(0),
        zero_index: CartIndex::from_u32(0),
        cart_ids,
        began_at,
        built_at: at,
    };
    tracing::info!(ring_length = cart_count, "ring discovered");
    RingState::Completed(Arc::new(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

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
    fn regular_carts_before_first_zero_are_ignored() {
        let mut f = Feed::new();
        f.regular_cart();
        f.regular_cart();
        assert_eq!(f.ring.phase(), RingPhase::Waiting);
        assert_eq!(f.ring.carts_counted(), 0);
    }

    #[test]
    fn first_zero_cart_begins_counting() {
        let mut f = Feed::new();
        f.zero_cart();
        assert_eq!(f.ring.phase(), RingPhase::Counting);
        assert_eq!(f.ring.carts_counted(), 1);
        assert!(f.ring.current_snapshot().is_none());
    }

    #[test]
    fn zero_cart_unblock_order_does_not_matter() {
        let mut f = Feed::new();
        // S2 releases before S1
        f.edge(true, true);
        f.edge(false, true);
        f.edge(false, false);
        f.edge(true, false);
        assert_eq!(f.ring.phase(), RingPhase::Counting);
        assert_eq!(f.ring.carts_counted(), 1);
    }

    #[test]
    fn snapshot_records_timestamps() {
        let mut f = Feed::new();
        f.zero_cart();
        let began = f.t;
        f.regular_cart();
        f.zero_cart();
        let snap = f.ring.current_snapshot().expect("snapshot");
        assert_eq!(snap.began_at(), began);
        assert_eq!(snap.built_at(), f.t);
        assert_eq!(snap.ring_length().value(), 2);
        assert_eq!(snap.cart_id_at(CartIndex::from_u32(1)), Some(CartId::from_u32(1)));
        assert_eq!(snap.cart_id_at(CartIndex::from_u32(2)), None);
    }

    #[test]
    fn inconsistent_count_ends_in_invalid_phase() {
        let t = Instant::now();
        for (count, ids) in [(0, vec![]), (3, vec![CartId::from_u32(0)])] {
            let mut ring = RingBuilder {
                state: finish(count, ids, t, t),
                _unsync: PhantomData,
            };
            assert_eq!(ring.phase(), RingPhase::Invalid);
            assert_eq!(ring.carts_counted(), 0);
            assert!(ring.current_snapshot().is_none());
            // Further edges are ignored.
            ring.on_edge(true, true, t);
            ring.on_edge(false, true, t);
            assert_eq!(ring.phase(), RingPhase::Invalid);
        }
    }
}
