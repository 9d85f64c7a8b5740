//! Simulated cart ring passing the two origin sensors.
//!
//! Each cart takes `polls_per_cart` polls to pass. Cart 0 is the zero cart and
//! blocks both sensors in turn; every other cart blocks only the first one.

use sorter_traits::{OriginSensors, PortError};

use crate::error::HwError;

/// Smallest passage that still shows every zero-cart level.
pub const MIN_POLLS_PER_CART: u32 = 4;

#[derive(Debug, Clone)]
pub struct SimulatedRing {
    cart_count: u32,
    polls_per_cart: u32,
    cart: u32,
    poll: u32,
    polls: u64,
    stalled: bool,
}

impl SimulatedRing {
    /// The ring starts with cart 1 arriving, so discovery sees a full zero-cart
    /// passage first.
    pub fn new(cart_count: u32, polls_per_cart: u32) -> Result<Self, HwError> {
        if cart_count == 0 {
            return Err(HwError::Gpio("simulated ring needs at least one cart".into()));
        }
        if polls_per_cart < MIN_POLLS_PER_CART {
            return Err(HwError::Gpio(format!(
                "polls_per_cart must be >= {MIN_POLLS_PER_CART}"
            )));
        }
        Ok(Self {
            cart_count,
            polls_per_cart,
            cart: 1 % cart_count,
            poll: 0,
            polls: 0,
            stalled: false,
        })
    }

    pub fn cart_count(&self) -> u32 {
        self.cart_count
    }

    /// Cart currently passing the origin.
    pub fn cart_at_origin(&self) -> u32 {
        self.cart
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Freeze the ring in place; levels stop changing.
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Polls for one full rotation.
    pub fn polls_per_rotation(&self) -> u64 {
        u64::from(self.cart_count) * u64::from(self.polls_per_cart)
    }

    fn levels(&self) -> (bool, bool) {
        let p = self.poll;
        let last = self.polls_per_cart - 1;
        if self.cart == 0 {
            // S1 only, both, S2 only, clear
            match p {
                0 => (true, false),
                p if p == last => (false, false),
                p if p == last - 1 => (false, true),
                _ => (true, true),
            }
        } else {
            (p < self.polls_per_cart / 2, false)
        }
    }

    fn advance(&mut self) {
        self.poll += 1;
        if self.poll == self.polls_per_cart {
            self.poll = 0;
            self.cart = (self.cart + 1) % self.cart_count;
        }
    }
}

impl OriginSensors for SimulatedRing {
    fn read_levels(&mut self) -> Result<(bool, bool), PortError> {
        let levels = self.levels();
        self.polls += 1;
        if !self.stalled {
            self.advance();
        }
        Ok(levels)
    }
}
