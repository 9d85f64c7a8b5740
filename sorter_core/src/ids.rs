//! Non-negative integer value objects for the cart ring.
//!
//! `CartId` names a physical cart, `CartIndex` a position on the ring and
//! `RingLength` the number of carts. They share a representation but are kept
//! apart so identity and position cannot be mixed up by accident.

use std::fmt;

use crate::error::SorterError;

macro_rules! ring_value {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Validate and wrap a signed value; negative or oversized input is rejected.
            pub fn new(value: i64) -> Result<Self, SorterError> {
                if value < 0 {
                    return Err(SorterError::Validation(format!(
                        concat!($label, " must be non-negative, got {}"),
                        value
                    )));
                }
                u32::try_from(value).map(Self).map_err(|_| {
                    SorterError::Validation(format!(
                        concat!($label, " out of range: {}"),
                        value
                    ))
                })
            }

            #[inline]
            pub const fn from_u32(value: u32) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> u32 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = SorterError;
            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for u32 {
            fn from(v: $name) -> u32 {
                v.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ring_value!(
    /// Identity of a physical cart. The zero cart is `CartId(0)`.
    CartId,
    "cart id"
);
ring_value!(
    /// Position within the ring, `0..RingLength`.
    CartIndex,
    "cart index"
);
ring_value!(
    /// Number of carts on the ring.
    RingLength,
    "ring length"
);
