//! Core components against the simulated backends from `sorter_hardware`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sorter_core::{
    CancelToken, ControlCfg, ControllerBuilder, Fixed, ManualClock, OriginMonitor,
    OriginPipeline, SorterError, SpeedEstimator, StabilityCfg, TickStatus,
};
use sorter_hardware::{SimulatedLine, SimulatedRing};
use sorter_traits::OriginSensors;

fn fx(s: &str) -> Fixed {
    s.parse().unwrap()
}

#[test]
fn controller_brings_line_to_target() {
    let line = SimulatedLine::new(fx("0.5"));
    let controller = ControllerBuilder::new()
        .with_feedback(line.clone())
        .with_drive(line.clone())
        .with_control(ControlCfg::default())
        .build()
        .unwrap();
    let clock = ManualClock::new();
    let estimator = SpeedEstimator::with_clock(
        line.clone(),
        &StabilityCfg {
            stable_hold: Duration::from_millis(500),
            ..StabilityCfg::default()
        },
        Arc::new(clock.clone()),
    );

    assert!(controller.start(&CancelToken::new()));
    let mut stable_at = None;
    for tick in 0..150u32 {
        assert!(matches!(
            controller.execute_control_tick(),
            TickStatus::Commanded { .. }
        ));
        clock.advance(Duration::from_millis(100));
        if estimator.is_speed_stable().unwrap() && stable_at.is_none() {
            stable_at = Some(tick);
        }
    }
    let diff = (line.actual_speed() - fx("2")).abs();
    assert!(diff <= fx("0.05"), "line settled at {}", line.actual_speed());
    assert!(stable_at.is_some());
    assert_eq!(line.writes(), 150);
}

#[test]
fn simulated_timeout_maps_to_typed_error() {
    let line = SimulatedLine::default();
    let controller = ControllerBuilder::new()
        .with_feedback(line.clone())
        .with_drive(line.clone())
        .build()
        .unwrap();
    controller.start(&CancelToken::new());
    line.set_timeouts(true);
    assert_eq!(
        controller.execute_control_tick(),
        TickStatus::Failed(SorterError::Timeout)
    );
    assert!(controller.is_running());
}

#[test]
fn simulated_fault_stops_controller() {
    let line = SimulatedLine::default();
    let controller = ControllerBuilder::new()
        .with_feedback(line.clone())
        .with_drive(line.clone())
        .build()
        .unwrap();
    controller.start(&CancelToken::new());
    line.inject_fault(9);
    assert_eq!(
        controller.execute_control_tick(),
        TickStatus::Faulted { code: 9 }
    );
    assert!(!controller.is_running());
    // Drive refuses to restart while the fault is latched.
    assert!(!controller.start(&CancelToken::new()));
}

#[test]
fn simulated_ring_is_discovered_and_tracked() {
    let mut ring = SimulatedRing::new(6, 5).unwrap();
    let mut monitor = OriginMonitor::new();
    let mut pipeline = OriginPipeline::new();

    let polls = (2 * 6 + 2) * 5;
    let mut t = Instant::now();
    for _ in 0..polls {
        let (first, second) = ring.read_levels().unwrap();
        t += Duration::from_millis(10);
        monitor.poll(first, second, t, |ev| pipeline.handle(ev));
    }

    let snap = pipeline.ring().current_snapshot().unwrap();
    assert_eq!(snap.ring_length().value(), 6);
    assert_eq!(pipeline.tracker().current_index().unwrap().value(), 2);
    assert_eq!(pipeline.tracker().cart_at_offset(-2).unwrap().value(), 0);
}
