use rstest::rstest;
use sorter_hardware::SimulatedLine;
use sorter_hardware::SimulatedRing;
use sorter_hardware::error::HwError;
use sorter_traits::{CancelToken, Fixed, LineDrive, LineStatus, OriginSensors, SpeedFeedback};

#[rstest]
#[case(3, 4)]
#[case(5, 6)]
#[case(60, 8)]
fn one_rotation_has_one_double_block(#[case] carts: u32, #[case] polls: u32) {
    let mut ring = SimulatedRing::new(carts, polls).unwrap();
    let mut double_blocks = 0;
    let mut first_rises = 0;
    let mut prev = (false, false);
    for _ in 0..ring.polls_per_rotation() {
        let now = ring.read_levels().unwrap();
        if now.0 && now.1 && !(prev.0 && prev.1) {
            double_blocks += 1;
        }
        if now.0 && !prev.0 {
            first_rises += 1;
        }
        prev = now;
    }
    assert_eq!(double_blocks, 1);
    assert_eq!(first_rises, carts);
    assert_eq!(ring.cart_at_origin(), 1 % carts);
}

#[test]
fn stalled_ring_holds_levels() {
    let mut ring = SimulatedRing::new(4, 4).unwrap();
    ring.read_levels().unwrap();
    ring.set_stalled(true);
    let a = ring.read_levels().unwrap();
    let b = ring.read_levels().unwrap();
    assert_eq!(a, b);
    assert_eq!(ring.polls(), 3);
}

#[test]
fn fault_rejects_commands_with_typed_error() {
    let line = SimulatedLine::default();
    let mut drive = line.clone();
    drive.start(&CancelToken::new()).unwrap();
    line.inject_fault(12);

    assert_eq!(line.fault_code().unwrap(), Some(12));
    assert_eq!(line.current_status().unwrap(), LineStatus::Fault);
    let err = drive.set_target_speed(Fixed::ONE).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HwError>(),
        Some(HwError::DriveFault(12))
    ));

    line.clear_fault();
    assert!(drive.start(&CancelToken::new()).is_ok());
}

#[test]
fn cancelled_start_is_refused() {
    let mut line = SimulatedLine::default();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = line.start(&cancel).unwrap_err();
    assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Cancelled)));
    assert_eq!(line.current_status().unwrap(), LineStatus::Stopped);
}

#[test]
fn timeouts_surface_as_hw_timeout() {
    let line = SimulatedLine::default();
    line.set_timeouts(true);
    let err = line.current_speed().unwrap_err();
    assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Timeout)));
}
