#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core sorter line logic (hardware-agnostic).
//!
//! All hardware interaction goes through the ports in `sorter_traits`
//! (`SpeedFeedback`, `LineDrive`, `OriginSensors`).
//!
//! ## Architecture
//!
//! - **Ring discovery**: `RingBuilder` counts carts between two zero-cart
//!   passages and freezes a `RingSnapshot` (`ring` module)
//! - **Position**: `PositionTracker` follows the cart at the origin and answers
//!   offset queries (`tracker` module)
//! - **Speed**: `SpeedEstimator` smooths feedback and judges stability;
//!   `SpeedController` runs the PID (`estimator`, `controller` modules)
//! - **Origin polling**: edge detection and a background sampler (`monitor` module)
//! - **Scheduling**: `run_control_loop` paces the control tick (`runner` module)
//!
//! ## Concurrency
//!
//! `RingBuilder` and `PositionTracker` are `!Sync`: they expect a single serialized
//! delivery path for edges and pulses. `SpeedEstimator` and `SpeedController` lock
//! internally and are shared freely.
//!
//! ## Fixed-Point Arithmetic
//!
//! Every speed, gain and accumulator is a `sorter_traits::Fixed` (six decimals,
//! round half away from zero), so outputs are reproducible exactly.

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod estimator;
pub mod fixed_point;
pub mod hw_error;
pub mod ids;
pub mod mocks;
pub mod monitor;
pub mod ring;
pub mod runner;
pub mod status;
pub mod tracker;
pub mod util;

pub use builder::{ControllerBuilder, Missing, Set};
pub use config::{ControlCfg, OriginCfg, StabilityCfg};
pub use controller::{ControllerSnapshot, SpeedController};
pub use error::{BuildError, Report, Result, SorterError};
pub use estimator::{EstimatorSnapshot, SpeedEstimator};
pub use ids::{CartId, CartIndex, RingLength};
pub use monitor::{OriginEvent, OriginMonitor, OriginPipeline, OriginSampler};
pub use ring::{OriginEdge, RingBuilder, RingPhase, RingSnapshot, SnapshotSource};
pub use runner::{LoopStats, StopReason, run_control_loop};
pub use status::TickStatus;
pub use tracker::{CartPassed, CartPassedListener, PositionTracker};

pub use sorter_traits::{CancelToken, Clock, Fixed, LineStatus, ManualClock, MonotonicClock};
