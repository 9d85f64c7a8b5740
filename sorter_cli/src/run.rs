//! Line assembly and execution: config mapping, backend selection, control loop.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use sorter_core::error::Result as CoreResult;
use sorter_core::{
    CancelToken, CartPassed, ControlCfg, ControllerBuilder, Fixed, LoopStats, MonotonicClock,
    OriginCfg, OriginMonitor, OriginPipeline, OriginSampler, SorterError, SpeedEstimator,
    StabilityCfg, StopReason, TickStatus, run_control_loop,
};
use sorter_hardware::{SimulatedLine, SimulatedRing};
use sorter_traits::OriginSensors;

/// Test hook: inject this drive fault code after the first control tick.
const FAULT_ENV: &str = "SORTER_TEST_FAULT_CODE";

#[derive(Debug, Clone, Default)]
pub struct RunOpts {
    pub duration: Option<Duration>,
    pub carts: Option<u32>,
    pub target_speed: Option<Fixed>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub ring_length: Option<u32>,
    pub cart_at_origin: Option<u32>,
    pub speed: Option<Fixed>,
    pub stable: bool,
    pub stats: LoopStats,
    pub carts_passed: u64,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "ring_length": self.ring_length,
            "cart_at_origin": self.cart_at_origin,
            "speed": self.speed.map(|s| s.to_string()),
            "stable": self.stable,
            "ticks": self.stats.ticks,
            "last_output": self.stats.last_output.map(|s| s.to_string()),
            "carts_passed": self.carts_passed,
            "stop_reason": format!("{:?}", self.stats.stop_reason),
        })
    }

    pub fn to_text(&self) -> String {
        let ring = self
            .ring_length
            .map_or_else(|| "not discovered".to_string(), |n| format!("{n} carts"));
        let origin = self
            .cart_at_origin
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        let speed = self.speed.map_or_else(|| "-".to_string(), |s| s.to_string());
        let output = self
            .stats
            .last_output
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        format!(
            "ring: {ring}\ncart at origin: {origin}\nspeed: {speed} ({})\nticks: {}  last output: {output}",
            if self.stable { "stable" } else { "settling" },
            self.stats.ticks,
        )
    }
}

fn cart_count(cfg: &sorter_config::Config, opts: &RunOpts) -> u32 {
    opts.carts.unwrap_or(cfg.simulation.cart_count)
}

/// Origin sensors: GPIO when built with `hardware` and both pins are set,
/// otherwise the simulated ring.
fn origin_sensors(
    cfg: &sorter_config::Config,
    carts: u32,
) -> CoreResult<Box<dyn OriginSensors + Send>> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        if let (Some(first), Some(second)) =
            (cfg.origin.first_sensor_pin, cfg.origin.second_sensor_pin)
        {
            let sensors = sorter_hardware::gpio::GpioOriginSensors::new(
                first,
                second,
                cfg.origin.active_low,
            )
            .map_err(|e| eyre::Report::new(SorterError::Hardware(e.to_string())))?;
            return Ok(Box::new(sensors));
        }
    }
    let ring = SimulatedRing::new(carts, cfg.simulation.polls_per_cart)
        .map_err(|e| eyre::Report::new(SorterError::Validation(e.to_string())))?;
    tracing::info!(carts, "using simulated origin sensors");
    Ok(Box::new(ring))
}

fn check_target(control: &ControlCfg, target: Fixed) -> CoreResult<()> {
    if target < control.min_output || target > control.max_output {
        return Err(eyre::Report::new(SorterError::Validation(format!(
            "target speed {target} outside [{}, {}]",
            control.min_output, control.max_output
        ))));
    }
    Ok(())
}

pub fn run_line(
    cfg: &sorter_config::Config,
    opts: &RunOpts,
    shutdown: Arc<AtomicBool>,
) -> CoreResult<RunReport> {
    let control = ControlCfg::from(cfg);
    let stability = StabilityCfg::from(cfg);
    let origin = OriginCfg::from(&cfg.origin);
    let carts = cart_count(cfg, opts);

    let line = SimulatedLine::new(cfg.simulation.response);
    let controller = ControllerBuilder::new()
        .with_feedback(line.clone())
        .with_drive(line.clone())
        .with_control(control.clone())
        .build()?;
    let estimator = SpeedEstimator::new(line.clone(), &stability);

    if let Some(target) = opts.target_speed {
        check_target(&control, target)?;
        controller.set_target_speed(target);
        estimator.set_target_speed(target);
    }

    let sampler = OriginSampler::spawn(origin_sensors(cfg, carts)?, &origin, MonotonicClock::new());
    let mut pipeline = OriginPipeline::new();
    let passed = Arc::new(std::sync::atomic::AtomicU64::new(0));
    {
        let passed = Arc::clone(&passed);
        pipeline.tracker_mut().subscribe(move |e: &CartPassed| {
            passed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            tracing::debug!(cart_index = e.cart_index.value(), cart_id = e.cart_id.value(), "cart passed origin");
        });
    }

    let cancel = CancelToken::from_flag(Arc::clone(&shutdown));
    if !controller.start(&cancel) {
        return Err(eyre::Report::new(SorterError::State(
            "drive refused to start".into(),
        )));
    }

    let inject_fault = std::env::var(FAULT_ENV)
        .ok()
        .and_then(|v| v.parse::<i32>().ok());
    let mut stable = false;
    let mut speed = None;
    let mut ring_logged = false;
    let started = Instant::now();

    let stats = run_control_loop(
        &controller,
        &MonotonicClock::new(),
        &shutdown,
        opts.duration,
        |status| {
            pipeline.pump(&sampler);
            if !ring_logged && let Some(snap) = pipeline.ring().current_snapshot() {
                ring_logged = true;
                tracing::info!(
                    ring_length = snap.ring_length().value(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "ring ready"
                );
            }
            if let TickStatus::Commanded { .. } = status {
                match estimator.is_speed_stable() {
                    Ok(s) => stable = s,
                    Err(e) => tracing::warn!(error = %e, "speed estimate failed"),
                }
                speed = estimator.snapshot().last_smoothed;
            }
            if let Some(code) = inject_fault.filter(|_| status != &TickStatus::Idle) {
                line.inject_fault(code);
            }
        },
    );

    if controller.is_running() {
        controller.stop(&cancel);
    }
    pipeline.pump(&sampler);
    drop(sampler);

    if let StopReason::Fault { code } = stats.stop_reason {
        return Err(eyre::Report::new(SorterError::HardwareFault { code }));
    }

    let snapshot = pipeline.ring().current_snapshot();
    let cart_at_origin = pipeline.tracker().cart_at_offset(0).map(|c| c.value());
    Ok(RunReport {
        ring_length: snapshot.map(|s| s.ring_length().value()),
        cart_at_origin,
        speed,
        stable,
        stats,
        carts_passed: passed.load(std::sync::atomic::Ordering::Relaxed),
    })
}

/// Validate the assembly and run one offline discovery on the simulated ring.
pub fn self_check(cfg: &sorter_config::Config) -> CoreResult<u32> {
    let line = SimulatedLine::new(cfg.simulation.response);
    let _controller = ControllerBuilder::new()
        .with_feedback(line.clone())
        .with_drive(line)
        .with_control(ControlCfg::from(cfg))
        .build()?;

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let mut sensors = origin_sensors(cfg, cfg.simulation.cart_count)?;
        let levels = sensors
            .read_levels()
            .map_err(|e| eyre::Report::new(SorterError::Hardware(e.to_string())))?;
        tracing::info!(?levels, "origin sensors readable");
    }

    let mut ring = SimulatedRing::new(cfg.simulation.cart_count, cfg.simulation.polls_per_cart)
        .map_err(|e| eyre::Report::new(SorterError::Validation(e.to_string())))?;
    let mut monitor = OriginMonitor::new();
    let mut pipeline = OriginPipeline::new();
    let mut t = Instant::now();
    let step = Duration::from_millis(cfg.origin.poll_ms);
    for _ in 0..ring.polls_per_rotation().saturating_mul(3) {
        let (first, second) = ring
            .read_levels()
            .map_err(|e| eyre::Report::new(SorterError::Hardware(e.to_string())))?;
        t += step;
        monitor.poll(first, second, t, |ev| pipeline.handle(ev));
        if pipeline.ring().current_snapshot().is_some() {
            break;
        }
    }

    let Some(snap) = pipeline.ring().current_snapshot() else {
        return Err(eyre::Report::new(SorterError::State(
            "ring discovery did not complete".into(),
        )));
    };
    let len = snap.ring_length().value();
    if len != cfg.simulation.cart_count {
        return Err(eyre::Report::new(SorterError::State(format!(
            "discovered {len} carts, expected {}",
            cfg.simulation.cart_count
        ))));
    }
    Ok(len)
}

/// Static health summary; does not move the line.
pub fn health(cfg: &sorter_config::Config) -> serde_json::Value {
    let line = SimulatedLine::new(cfg.simulation.response);
    let estimator = SpeedEstimator::new(line, &StabilityCfg::from(cfg));
    serde_json::json!({
        "status": "ok",
        "target_speed": cfg.line.target_speed.to_string(),
        "loop_period_ms": cfg.line.loop_period_ms,
        "smoothing_window": estimator.window_len(),
        "origin_poll_ms": cfg.origin.poll_ms,
    })
}
