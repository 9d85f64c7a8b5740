//! Origin sensor polling: edge detection, a background sampler, and the single
//! consumer that keeps ring discovery and position tracking in order.
//!
//! Safety: each `OriginSampler` owns exactly one thread, shut down and joined when
//! the sampler is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use sorter_traits::{Clock, OriginSensors};

use crate::config::OriginCfg;
use crate::ring::{OriginEdge, RingBuilder};
use crate::tracker::PositionTracker;

/// Channel depth between the sampler thread and its consumer.
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginEvent {
    Edge(OriginEdge),
    /// Both sensors clear again after at least one was blocked.
    CartPassed(Instant),
}

/// Turns sensor levels into edges and cart-passed pulses.
#[derive(Debug, Default, Clone)]
pub struct OriginMonitor {
    first: bool,
    second: bool,
    occupied: bool,
}

impl OriginMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare one poll with the previous one. Within a poll the first sensor's
    /// edge is emitted before the second's, and the pulse comes last.
    pub fn poll(&mut self, first: bool, second: bool, at: Instant, mut emit: impl FnMut(OriginEvent)) {
        if first != self.first {
            self.first = first;
            emit(OriginEvent::Edge(OriginEdge {
                is_first_sensor: true,
                is_rising_edge: first,
                at,
            }));
        }
        if second != self.second {
            self.second = second;
            emit(OriginEvent::Edge(OriginEdge {
                is_first_sensor: false,
                is_rising_edge: second,
                at,
            }));
        }
        if first || second {
            self.occupied = true;
        } else if self.occupied {
            self.occupied = false;
            emit(OriginEvent::CartPassed(at));
        }
    }

    /// Last observed levels `(first, second)`.
    pub fn levels(&self) -> (bool, bool) {
        (self.first, self.second)
    }
}

/// Polls origin sensors on a dedicated thread at a fixed cadence.
pub struct OriginSampler {
    rx: xch::Receiver<OriginEvent>,
    polls: Arc<AtomicU64>,
    read_errors: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl OriginSampler {
    pub fn spawn<S, C>(mut sensors: S, cfg: &OriginCfg, clock: C) -> Self
    where
        S: OriginSensors + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(EVENT_BUFFER);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let polls = Arc::new(AtomicU64::new(0));
        let polls_clone = Arc::clone(&polls);
        let read_errors = Arc::new(AtomicU64::new(0));
        let read_errors_clone = Arc::clone(&read_errors);
        let period = cfg.poll_period.max(Duration::from_millis(1));

        let join_handle = std::thread::spawn(move || {
            let mut monitor = OriginMonitor::new();
            let mut batch = Vec::with_capacity(3);
            'poll: loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("origin sampler received shutdown signal");
                    break;
                }

                match sensors.read_levels() {
                    Ok((first, second)) => {
                        polls_clone.fetch_add(1, Ordering::Relaxed);
                        monitor.poll(first, second, clock.now(), |ev| batch.push(ev));
                        for ev in batch.drain(..) {
                            if !forward(&tx, ev, period, &shutdown_clone) {
                                break 'poll;
                            }
                        }
                    }
                    Err(e) => {
                        read_errors_clone.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!(error = %e, "origin sensor read failed");
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("origin sampler thread exiting cleanly");
        });

        Self {
            rx,
            polls,
            read_errors,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Events produced since the last call, in order.
    pub fn drain(&self) -> impl Iterator<Item = OriginEvent> + '_ {
        self.rx.try_iter()
    }

    /// Block up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<OriginEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    pub fn read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }
}

/// Send with periodic shutdown checks so a full channel cannot wedge `Drop`.
/// Returns `false` when the thread should exit.
fn forward(
    tx: &xch::Sender<OriginEvent>,
    mut ev: OriginEvent,
    period: Duration,
    shutdown: &AtomicBool,
) -> bool {
    loop {
        match tx.send_timeout(ev, period) {
            Ok(()) => return true,
            Err(xch::SendTimeoutError::Timeout(back)) => {
                if shutdown.load(Ordering::Relaxed) {
                    return false;
                }
                ev = back;
            }
            Err(xch::SendTimeoutError::Disconnected(_)) => {
                tracing::debug!("origin event consumer disconnected, exiting thread");
                return false;
            }
        }
    }
}

impl Drop for OriginSampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("origin sampler thread joined"),
                Err(e) => tracing::warn!(?e, "origin sampler thread panicked during shutdown"),
            }
        }
    }
}

/// Single serialized consumer of origin events: edges go to the ring builder,
/// pulses to the position tracker, in arrival order.
#[derive(Debug, Default)]
pub struct OriginPipeline {
    ring: RingBuilder,
    tracker: PositionTracker,
}

impl OriginPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: OriginEvent) {
        match event {
            OriginEvent::Edge(edge) => self.ring.apply(edge),
            OriginEvent::CartPassed(at) => self.tracker.on_cart_passed_origin(&self.ring, at),
        }
    }

    /// Consume everything the sampler has queued. Returns the number of events.
    pub fn pump(&mut self, sampler: &OriginSampler) -> usize {
        let mut n = 0;
        for ev in sampler.drain() {
            self.handle(ev);
            n += 1;
        }
        n
    }

    pub fn ring(&self) -> &RingBuilder {
        &self.ring
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut PositionTracker {
        &mut self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(m: &mut OriginMonitor, first: bool, second: bool) -> Vec<OriginEvent> {
        let mut out = Vec::new();
        m.poll(first, second, Instant::now(), |e| out.push(e));
        out
    }

    #[test]
    fn unchanged_levels_emit_nothing() {
        let mut m = OriginMonitor::new();
        assert!(collect(&mut m, false, false).is_empty());
    }

    #[test]
    fn first_sensor_edge_precedes_second() {
        let mut m = OriginMonitor::new();
        let ev = collect(&mut m, true, true);
        assert_eq!(ev.len(), 2);
        assert!(matches!(ev[0], OriginEvent::Edge(e) if e.is_first_sensor && e.is_rising_edge));
        assert!(matches!(ev[1], OriginEvent::Edge(e) if !e.is_first_sensor && e.is_rising_edge));
    }

    #[test]
    fn pulse_follows_falling_edges() {
        let mut m = OriginMonitor::new();
        collect(&mut m, true, false);
        let ev = collect(&mut m, false, false);
        assert_eq!(ev.len(), 2);
        assert!(matches!(ev[0], OriginEvent::Edge(e) if !e.is_rising_edge));
        assert!(matches!(ev[1], OriginEvent::CartPassed(_)));
    }
}
