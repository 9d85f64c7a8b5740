//! Live position of the ring relative to the origin.
//!
//! Tracking starts on the first "cart passed origin" pulse after a ring snapshot
//! exists. Pulses before that are expected and ignored. Like `RingBuilder`, the
//! tracker assumes a single serialized delivery path and is `!Sync`.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::ids::{CartId, CartIndex, RingLength};
use crate::ring::{RingSnapshot, SnapshotSource};

/// Published after every tracked passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartPassed {
    pub cart_index: CartIndex,
    pub cart_id: CartId,
    pub at: Instant,
}

pub trait CartPassedListener {
    fn on_cart_passed(&mut self, event: &CartPassed);
}

impl<F: FnMut(&CartPassed)> CartPassedListener for F {
    fn on_cart_passed(&mut self, event: &CartPassed) {
        self(event);
    }
}

pub struct PositionTracker {
    snapshot: Option<Arc<RingSnapshot>>,
    current: Option<CartIndex>,
    ring_length: Option<RingLength>,
    listeners: Vec<Box<dyn CartPassedListener + Send>>,
    _unsync: PhantomData<Cell<()>>,
}

impl core::fmt::Debug for PositionTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PositionTracker")
            .field("current", &self.current)
            .field("ring_length", &self.ring_length)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionTracker {
    pub fn new() -> Self {
        Self {
            snapshot: None,
            current: None,
            ring_length: None,
            listeners: Vec::new(),
            _unsync: PhantomData,
        }
    }

    /// Register a listener for [`CartPassed`] events.
    pub fn subscribe(&mut self, listener: impl CartPassedListener + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Handle one confirmed cart passage at the origin.
    pub fn on_cart_passed_origin(&mut self, ring: &impl SnapshotSource, at: Instant) {
        let (index, snapshot) = match (self.current, self.ring_length, &self.snapshot) {
            (Some(cur), Some(len), Some(snap)) if len.value() > 0 => {
                let next = (cur.value() + 1) % len.value();
                (CartIndex::from_u32(next), Arc::clone(snap))
            }
            _ => {
                let Some(snap) = ring.current_snapshot() else {
                    return;
                };
                self.ring_length = Some(snap.ring_length());
                self.snapshot = Some(Arc::clone(&snap));
                tracing::info!(
                    ring_length = snap.ring_length().value(),
                    "position tracking started"
                );
                (snap.zero_index(), snap)
            }
        };
        self.current = Some(index);

        let cart_id = snapshot
            .cart_id_at(index)
            .unwrap_or_else(|| CartId::from_u32(index.value()));
        let event = CartPassed {
            cart_index: index,
            cart_id,
            at,
        };
        for l in &mut self.listeners {
            l.on_cart_passed(&event);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.current.is_some()
    }

    /// Index of the cart currently at the origin.
    pub fn current_index(&self) -> Option<CartIndex> {
        self.current
    }

    /// Ring length cached at initialization.
    pub fn ring_length(&self) -> Option<RingLength> {
        self.ring_length
    }

    /// `(current + offset) mod ring_length`, normalized into `[0, ring_length)`
    /// for any offset sign. `None` until tracking has started or for an empty ring.
    pub fn calculate_cart_index_at_offset(
        &self,
        offset: i64,
        ring_length: RingLength,
    ) -> Option<CartIndex> {
        let cur = self.current?;
        let n = i128::from(ring_length.value());
        if n == 0 {
            return None;
        }
        let idx = (i128::from(cur.value()) + i128::from(offset)).rem_euclid(n);
        u32::try_from(idx).ok().map(CartIndex::from_u32)
    }

    /// Identity of the cart at `offset` positions from the origin, using the
    /// cached ring length.
    pub fn cart_at_offset(&self, offset: i64) -> Option<CartId> {
        let len = self.ring_length?;
        let idx = self.calculate_cart_index_at_offset(offset, len)?;
        self.snapshot.as_ref()?.cart_id_at(idx)
    }
}
