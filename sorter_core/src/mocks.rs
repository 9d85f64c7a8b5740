//! Test and helper mocks for sorter_core

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use sorter_traits::{CancelToken, Fixed, LineDrive, LineStatus, PortError, SpeedFeedback};

#[derive(Debug, Default)]
struct Script {
    speeds: VecDeque<Fixed>,
    last: Fixed,
    fault: Option<i32>,
    fail_reads: bool,
}

/// Feedback that replays a list of speeds, then repeats the last one.
#[derive(Debug, Default)]
pub struct ScriptedFeedback {
    script: Mutex<Script>,
    reads: AtomicUsize,
}

impl ScriptedFeedback {
    pub fn new(speeds: impl IntoIterator<Item = Fixed>) -> Self {
        Self {
            script: Mutex::new(Script {
                speeds: speeds.into_iter().collect(),
                ..Script::default()
            }),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn constant(speed: Fixed) -> Self {
        Self::new([speed])
    }

    /// Speed reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn push(&self, speed: Fixed) {
        self.lock().speeds.push_back(speed);
    }

    pub fn set_fault(&self, code: Option<i32>) {
        self.lock().fault = code;
    }

    /// Make every subsequent read fail until cleared.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpeedFeedback for ScriptedFeedback {
    fn current_speed(&self) -> Result<Fixed, PortError> {
        let mut s = self.lock();
        if s.fail_reads {
            return Err(Box::new(std::io::Error::other("scripted feedback failure")));
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        if let Some(v) = s.speeds.pop_front() {
            s.last = v;
        }
        Ok(s.last)
    }

    fn current_status(&self) -> Result<LineStatus, PortError> {
        Ok(if self.lock().fault.is_some() {
            LineStatus::Fault
        } else {
            LineStatus::Running
        })
    }

    fn fault_code(&self) -> Result<Option<i32>, PortError> {
        Ok(self.lock().fault)
    }
}

/// Drive that records every call and can be told to fail.
#[derive(Debug, Default, Clone)]
pub struct RecordingDrive {
    pub commands: Vec<Fixed>,
    pub starts: u32,
    pub stops: u32,
    pub emergency_stops: u32,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub fail_write: bool,
}

fn refused(what: &str) -> PortError {
    Box::new(std::io::Error::other(format!("drive refused {what}")))
}

impl LineDrive for RecordingDrive {
    fn set_target_speed(&mut self, speed: Fixed) -> Result<(), PortError> {
        if self.fail_write {
            return Err(refused("speed command"));
        }
        self.commands.push(speed);
        Ok(())
    }

    fn start(&mut self, _cancel: &CancelToken) -> Result<(), PortError> {
        self.starts += 1;
        if self.fail_start {
            return Err(refused("start"));
        }
        Ok(())
    }

    fn stop(&mut self, _cancel: &CancelToken) -> Result<(), PortError> {
        self.stops += 1;
        if self.fail_stop {
            return Err(refused("stop"));
        }
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), PortError> {
        self.emergency_stops += 1;
        Ok(())
    }
}
