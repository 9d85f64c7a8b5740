use std::sync::atomic::AtomicBool;
use std::time::Duration;

use sorter_core::mocks::{RecordingDrive, ScriptedFeedback};
use sorter_core::{
    CancelToken, Clock, ControlCfg, ControllerBuilder, Fixed, ManualClock, StopReason,
    TickStatus, run_control_loop,
};

fn controller(fb: ScriptedFeedback) -> sorter_core::SpeedController<ScriptedFeedback, RecordingDrive> {
    ControllerBuilder::new()
        .with_feedback(fb)
        .with_drive(RecordingDrive::default())
        .with_control(ControlCfg::default())
        .build()
        .unwrap()
}

#[test]
fn loop_ticks_once_per_period_until_deadline() {
    let c = controller(ScriptedFeedback::constant(Fixed::from_int(2)));
    assert!(c.start(&CancelToken::new()));
    let clock = ManualClock::new();
    let shutdown = AtomicBool::new(false);

    let stats = run_control_loop(&c, &clock, &shutdown, Some(Duration::from_secs(1)), |_| {});
    assert_eq!(stats.stop_reason, StopReason::Deadline);
    assert_eq!(stats.ticks, 10);
    assert_eq!(stats.commanded, 10);
    assert_eq!(stats.last_output, Some(Fixed::from_int(2)));
    assert_eq!(clock.ms_since(clock.origin()), 1000);
}

#[test]
fn fault_ends_the_loop() {
    let fb = ScriptedFeedback::constant(Fixed::from_int(2));
    let c = controller(fb);
    c.start(&CancelToken::new());
    let clock = ManualClock::new();
    let shutdown = AtomicBool::new(false);

    let mut ticks = 0;
    let stats = run_control_loop(&c, &clock, &shutdown, None, |status| {
        ticks += 1;
        if ticks == 3 {
            c.feedback().set_fault(Some(4));
        }
        assert!(!matches!(status, TickStatus::Idle));
    });
    assert_eq!(stats.stop_reason, StopReason::Fault { code: 4 });
    assert_eq!(stats.ticks, 4);
    assert_eq!(stats.faults, 1);
    assert!(!c.is_running());
}

#[test]
fn shutdown_flag_and_idle_controller_stop_immediately() {
    let c = controller(ScriptedFeedback::constant(Fixed::ONE));
    let clock = ManualClock::new();

    let stats = run_control_loop(&c, &clock, &AtomicBool::new(false), None, |_| {});
    assert_eq!(stats.stop_reason, StopReason::NotRunning);
    assert_eq!(stats.ticks, 0);

    c.start(&CancelToken::new());
    let stats = run_control_loop(&c, &clock, &AtomicBool::new(true), None, |_| {});
    assert_eq!(stats.stop_reason, StopReason::Shutdown);
    assert_eq!(stats.ticks, 0);
}
