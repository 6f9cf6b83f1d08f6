//! Step counter sources.
//!
//! Hardware step counters report a cumulative count since the device booted.
//! Every source here converts those readings into a count relative to the
//! moment tracking started, via [`StepDeltaTracker`].

use crate::runtime::{FixedTicker, PeriodicTask};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a step source reports to its callback
#[derive(Debug, Clone, PartialEq)]
pub enum StepReading {
    /// Session-relative step count after a sensor reading
    Steps(i64),
    /// The sensor stopped delivering readings; no further callbacks follow
    Fault(String),
}

pub type StepCallback = Box<dyn FnMut(StepReading) + Send>;

pub trait StepSource {
    fn is_available(&self) -> bool;

    /// Begin tracking. The first reading after this call becomes the baseline.
    fn start(&mut self, on_steps: StepCallback);

    /// Stop tracking and return the final step count since `start`.
    /// No callback is invoked after this returns.
    fn stop(&mut self) -> i64;
}

impl<S: StepSource + ?Sized> StepSource for Box<S> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn start(&mut self, on_steps: StepCallback) {
        (**self).start(on_steps)
    }

    fn stop(&mut self) -> i64 {
        (**self).stop()
    }
}

/// Converts cumulative since-boot readings into a count since tracking began.
///
/// A reading lower than the previous one means the counter restarted (device
/// reboot). Steps counted so far are carried over and the new segment is
/// measured from zero, so the result never decreases.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StepDeltaTracker {
    baseline: Option<u64>,
    last_raw: u64,
    carried: i64,
    current: i64,
}

impl StepDeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, raw: u64) -> i64 {
        let baseline = match self.baseline {
            None => {
                log::debug!("step baseline set: {raw}");
                self.baseline = Some(raw);
                raw
            }
            Some(_) if raw < self.last_raw => {
                log::warn!(
                    "step counter went backwards ({} -> {raw}), assuming reboot",
                    self.last_raw
                );
                self.carried = self.current;
                self.baseline = Some(0);
                0
            }
            Some(b) => b,
        };

        self.last_raw = raw;
        self.current = self.carried + (raw - baseline) as i64;
        self.current
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }
}

/// Source for devices without a step counter
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStepCounter;

impl StepSource for NoStepCounter {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&mut self, _on_steps: StepCallback) {
        log::error!("step counter sensor not available on this device");
    }

    fn stop(&mut self) -> i64 {
        0
    }
}

#[derive(Default)]
struct SimulatedInner {
    since_boot: u64,
    tracker: Option<StepDeltaTracker>,
    callback: Option<StepCallback>,
}

impl SimulatedInner {
    fn deliver(&mut self) {
        let raw = self.since_boot;
        if let Some(tracker) = self.tracker.as_mut() {
            let delta = tracker.record(raw);
            if let Some(cb) = self.callback.as_mut() {
                cb(StepReading::Steps(delta));
            }
        }
    }
}

/// In-process step counter. Steps are fed through a [`SimulatedSensor`] handle,
/// from key presses or a [`Pacer`].
#[derive(Clone)]
pub struct SimulatedStepCounter {
    inner: Arc<Mutex<SimulatedInner>>,
}

impl SimulatedStepCounter {
    pub fn new() -> Self {
        Self::with_boot_count(0)
    }

    /// Counter that already holds `steps` from before tracking started
    pub fn with_boot_count(steps: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimulatedInner {
                since_boot: steps,
                ..SimulatedInner::default()
            })),
        }
    }

    pub fn sensor(&self) -> SimulatedSensor {
        SimulatedSensor {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for SimulatedStepCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl StepSource for SimulatedStepCounter {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&mut self, on_steps: StepCallback) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.tracker = Some(StepDeltaTracker::new());
            inner.callback = Some(on_steps);
            // hardware counters report their current value on registration
            inner.deliver();
        }
        log::debug!("simulated step tracking started");
    }

    fn stop(&mut self) -> i64 {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        inner.callback = None;
        let final_steps = inner.tracker.take().map(|t| t.current()).unwrap_or(0);
        log::debug!("simulated step tracking stopped. final steps: {final_steps}");
        final_steps
    }
}

/// Handle used to drive a [`SimulatedStepCounter`]
#[derive(Clone)]
pub struct SimulatedSensor {
    inner: Arc<Mutex<SimulatedInner>>,
}

impl SimulatedSensor {
    pub fn take_steps(&self, n: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.since_boot += n;
            inner.deliver();
        }
    }

    /// Reset the since-boot count to zero, as a device reboot would
    pub fn reboot(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.since_boot = 0;
            inner.deliver();
        }
    }

    /// Report a sensor failure to the tracking callback, then go quiet
    pub fn fail(&self, reason: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(mut cb) = inner.callback.take() {
                cb(StepReading::Fault(reason.to_string()));
            }
        }
    }

    pub fn since_boot(&self) -> u64 {
        self.inner.lock().map(|i| i.since_boot).unwrap_or(0)
    }
}

/// Feeds a simulated sensor at a fixed cadence until dropped
#[derive(Debug)]
pub struct Pacer {
    task: PeriodicTask,
}

impl Pacer {
    pub fn start(sensor: SimulatedSensor, steps_per_minute: u32) -> Self {
        let interval = pacer_interval(steps_per_minute);
        let task = PeriodicTask::spawn(FixedTicker::new(interval), move || {
            sensor.take_steps(1);
            true
        });
        Self { task }
    }

    pub fn stop(mut self) {
        self.task.cancel();
    }
}

/// Time between simulated steps, never below one millisecond
fn pacer_interval(steps_per_minute: u32) -> Duration {
    let spm = u64::from(steps_per_minute.max(1));
    Duration::from_millis((60_000 / spm).max(1))
}

/// Where Linux exposes IIO step counters
pub const IIO_DEVICES_DIR: &str = "/sys/bus/iio/devices";

struct FileTracking {
    tracker: Arc<Mutex<StepDeltaTracker>>,
    task: PeriodicTask,
}

/// Consecutive unreadable polls before the counter is reported as failed
pub const MAX_FAILED_READS: u32 = 3;

/// Step counter backed by a file holding a cumulative count, such as the
/// `in_steps_input` attribute of a Linux IIO pedometer. The file is polled
/// on a background thread.
pub struct FileStepCounter {
    path: Option<PathBuf>,
    poll: Duration,
    tracking: Option<FileTracking>,
}

impl FileStepCounter {
    pub fn new<P: AsRef<Path>>(path: P, poll: Duration) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            poll,
            tracking: None,
        }
    }

    /// First IIO device under `root` exposing a step counter
    pub fn discover(root: &Path, poll: Duration) -> Self {
        let path = find_step_counter(root);
        match &path {
            Some(p) => log::info!("using step counter at {}", p.display()),
            None => log::info!("no step counter found under {}", root.display()),
        }
        Self {
            path,
            poll,
            tracking: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn find_step_counter(root: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("in_steps_input"))
        .filter(|p| p.is_file())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn read_count(path: &Path) -> Option<u64> {
    match fs::read_to_string(path) {
        Ok(s) => match s.trim().parse::<u64>() {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("unreadable step count in {}: {e}", path.display());
                None
            }
        },
        Err(e) => {
            log::warn!("failed to read {}: {e}", path.display());
            None
        }
    }
}

fn enable_counter(path: &Path) {
    // IIO pedometers only count once in_steps_en is set
    if let Some(dir) = path.parent() {
        let en = dir.join("in_steps_en");
        if en.exists() {
            if let Err(e) = fs::write(&en, "1") {
                log::warn!("could not enable {}: {e}", en.display());
            }
        }
    }
}

impl StepSource for FileStepCounter {
    fn is_available(&self) -> bool {
        self.path.as_ref().is_some_and(|p| p.is_file())
    }

    fn start(&mut self, mut on_steps: StepCallback) {
        let Some(path) = self.path.clone() else {
            log::error!("step counter sensor not available on this device");
            return;
        };
        if let Some(mut previous) = self.tracking.take() {
            previous.task.cancel();
        }
        enable_counter(&path);

        let tracker = Arc::new(Mutex::new(StepDeltaTracker::new()));
        if let Some(raw) = read_count(&path) {
            if let Ok(mut t) = tracker.lock() {
                on_steps(StepReading::Steps(t.record(raw)));
            }
        }

        let shared = Arc::clone(&tracker);
        let mut failed_reads = 0;
        let task = PeriodicTask::spawn(FixedTicker::new(self.poll), move || {
            let Some(raw) = read_count(&path) else {
                failed_reads += 1;
                let reason = if !path.exists() {
                    format!("Step counter {} disappeared", path.display())
                } else if failed_reads >= MAX_FAILED_READS {
                    format!("Step counter {} cannot be read", path.display())
                } else {
                    return true;
                };
                log::error!("{reason}");
                on_steps(StepReading::Fault(reason));
                return false;
            };
            failed_reads = 0;

            if let Ok(mut t) = shared.lock() {
                let before = t.current();
                let first = !t.has_baseline();
                let now = t.record(raw);
                if first || now != before {
                    on_steps(StepReading::Steps(now));
                }
            }
            true
        });

        self.tracking = Some(FileTracking { tracker, task });
        log::debug!("file step tracking started");
    }

    fn stop(&mut self) -> i64 {
        let Some(mut tracking) = self.tracking.take() else {
            return 0;
        };
        tracking.task.cancel();

        let Ok(mut tracker) = tracking.tracker.lock() else {
            return 0;
        };
        // pick up steps taken since the last poll
        if let Some(raw) = self.path.as_deref().and_then(read_count) {
            tracker.record(raw);
        }
        let final_steps = tracker.current();
        log::debug!("file step tracking stopped. final steps: {final_steps}");
        final_steps
    }
}
