use crate::clock::{elapsed_seconds, Clock, SystemClock};
use crate::format::format_elapsed_time;
use crate::runtime::{FixedTicker, PeriodicTask};
use crate::step_source::{StepCallback, StepReading, StepSource};
use crate::store::{StoreError, WalkStore};
use crate::stride::HeightCm;
use crate::walk::{Walk, WalkId};
use chrono::{DateTime, Local};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const ELAPSED_TICK: Duration = Duration::from_secs(1);

/// Supplies the user height; read once per session start
pub trait HeightSource {
    fn height(&self) -> HeightCm;
}

impl HeightSource for HeightCm {
    fn height(&self) -> HeightCm {
        *self
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Step counter sensor not available on this device")]
    SensorUnavailable,

    #[error("Step counter stopped working: {0}")]
    SensorFault(String),

    #[error("No active walk to stop")]
    NoActiveWalk,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Storage failure: {0}")]
    StoreFailure(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidArgument(msg) => SessionError::InvalidArgument(msg),
            other => SessionError::StoreFailure(other),
        }
    }
}

/// Live figures of the walk in progress
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveWalk {
    pub walk_id: WalkId,
    pub start_time: DateTime<Local>,
    pub elapsed_seconds: i64,
    pub steps: u64,
    pub distance_meters: f64,
}

impl ActiveWalk {
    pub fn formatted_time(&self) -> String {
        format_elapsed_time(self.elapsed_seconds)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Active(ActiveWalk),
    Error { message: String },
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SessionEvent {
    Steps(i64),
    Tick,
    SensorFault(String),
}

/// Walk lifecycle: Idle → Active → Idle, with Error reachable from any
/// failure and left only through [`WalkSession::start`].
///
/// Step readings and timer ticks arrive from other threads but are only
/// queued there; [`WalkSession::pump`] applies them in order on the owning
/// thread.
pub struct WalkSession<S: StepSource = Box<dyn StepSource>> {
    store: Rc<dyn WalkStore>,
    steps: S,
    heights: Box<dyn HeightSource>,
    clock: Arc<dyn Clock>,
    tick: Duration,
    height: HeightCm,
    state: SessionState,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    timer: Option<PeriodicTask>,
    /// Walk this session could not finalize; closed on the next start
    unsaved_walk: Option<WalkId>,
}

impl<S: StepSource> WalkSession<S> {
    pub fn new<H>(store: Rc<dyn WalkStore>, steps: S, heights: H) -> Self
    where
        H: HeightSource + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            store,
            steps,
            heights: Box::new(heights),
            clock: Arc::new(SystemClock),
            tick: ELAPSED_TICK,
            height: HeightCm::default(),
            state: SessionState::Idle,
            events_tx,
            events_rx,
            timer: None,
            unsaved_walk: None,
        }
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Height captured at the last start
    pub fn height(&self) -> HeightCm {
        self.height
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| t.is_running())
    }

    pub fn start(&mut self) -> &SessionState {
        if self.state.is_active() {
            log::warn!("start ignored: a walk is already in progress");
            return &self.state;
        }

        self.state = match self.try_start() {
            Ok(active) => {
                log::info!(
                    "walk #{} started, stride {:.3} m",
                    active.walk_id,
                    self.height.stride_length_meters()
                );
                SessionState::Active(active)
            }
            Err(e) => {
                log::error!("failed to start walk: {e}");
                SessionState::Error {
                    message: e.to_string(),
                }
            }
        };
        &self.state
    }

    fn try_start(&mut self) -> Result<ActiveWalk, SessionError> {
        self.height = self.heights.height();

        if !self.steps.is_available() {
            return Err(SessionError::SensorUnavailable);
        }

        let walk = match self.store.start_walk() {
            Err(StoreError::WalkAlreadyActive(id)) if self.unsaved_walk == Some(id) => {
                log::warn!("closing walk #{id} left open by an earlier failure");
                self.store.close_orphaned_walk()?;
                self.store.start_walk()?
            }
            result => result?,
        };
        self.unsaved_walk = None;
        self.discard_pending();

        let tx = self.events_tx.clone();
        let on_steps: StepCallback = Box::new(move |reading| {
            let event = match reading {
                StepReading::Steps(steps) => SessionEvent::Steps(steps),
                StepReading::Fault(reason) => SessionEvent::SensorFault(reason),
            };
            let _ = tx.send(event);
        });
        self.steps.start(on_steps);

        let tx = self.events_tx.clone();
        self.timer = Some(PeriodicTask::spawn(FixedTicker::new(self.tick), move || {
            tx.send(SessionEvent::Tick).is_ok()
        }));

        Ok(ActiveWalk {
            walk_id: walk.id,
            start_time: walk.start_time,
            elapsed_seconds: elapsed_seconds(walk.start_time, self.clock.now()),
            steps: 0,
            distance_meters: 0.0,
        })
    }

    /// Finish the walk in progress and persist its totals.
    /// Returns `None` when there was nothing to stop or saving failed.
    pub fn stop(&mut self) -> Option<Walk> {
        let walk_id = match &self.state {
            SessionState::Active(active) => active.walk_id,
            _ => {
                log::info!("stop ignored: no walk in progress");
                return None;
            }
        };

        self.cancel_timer();
        let final_steps = self.steps.stop();
        self.discard_pending();

        match self.finish(final_steps) {
            Ok(walk) => {
                if walk.id != walk_id {
                    log::warn!("stopped walk #{} but session tracked #{walk_id}", walk.id);
                }
                self.state = SessionState::Idle;
                Some(walk)
            }
            Err(SessionError::NoActiveWalk) => {
                log::warn!("walk #{walk_id} was no longer active at stop");
                self.state = SessionState::Idle;
                None
            }
            Err(e) => {
                log::error!("failed to stop walk #{walk_id}: {e}");
                self.unsaved_walk = Some(walk_id);
                self.state = SessionState::Error {
                    message: e.to_string(),
                };
                None
            }
        }
    }

    fn finish(&self, final_steps: i64) -> Result<Walk, SessionError> {
        let distance = final_steps as f64 * self.height.stride_length_meters();
        self.store
            .stop_walk(final_steps, distance)?
            .ok_or(SessionError::NoActiveWalk)
    }

    /// Apply a step count relative to the session start
    pub fn on_step_update(&mut self, steps: i64) -> bool {
        let height = self.height;
        match &mut self.state {
            SessionState::Active(active) => {
                let steps = steps.max(0) as u64;
                let changed = steps != active.steps;
                active.steps = steps;
                active.distance_meters = height.distance_meters(steps);
                changed
            }
            _ => false,
        }
    }

    /// Recompute elapsed time from the wall clock
    pub fn on_tick(&mut self) -> bool {
        let now = self.clock.now();
        match &mut self.state {
            SessionState::Active(active) => {
                let elapsed = elapsed_seconds(active.start_time, now);
                let changed = elapsed != active.elapsed_seconds;
                active.elapsed_seconds = elapsed;
                changed
            }
            _ => false,
        }
    }

    /// End the walk in progress after the step source failed, keeping the
    /// steps counted so far, and move to `Error`.
    pub fn on_sensor_fault(&mut self, reason: String) -> bool {
        let walk_id = match &self.state {
            SessionState::Active(active) => active.walk_id,
            _ => return false,
        };

        self.cancel_timer();
        let final_steps = self.steps.stop();
        self.discard_pending();

        let error = match self.finish(final_steps) {
            Ok(walk) => {
                log::error!(
                    "walk #{} ended by sensor fault after {} steps: {reason}",
                    walk.id,
                    walk.total_steps
                );
                SessionError::SensorFault(reason)
            }
            Err(SessionError::NoActiveWalk) => SessionError::SensorFault(reason),
            Err(e) => {
                log::error!("failed to save walk #{walk_id} after sensor fault: {e}");
                self.unsaved_walk = Some(walk_id);
                e
            }
        };
        self.state = SessionState::Error {
            message: error.to_string(),
        };
        true
    }

    /// Apply queued step readings and ticks in arrival order.
    /// Returns whether the state changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            changed |= match event {
                SessionEvent::Steps(steps) => self.on_step_update(steps),
                SessionEvent::Tick => self.on_tick(),
                SessionEvent::SensorFault(reason) => self.on_sensor_fault(reason),
            };
        }
        changed
    }

    fn discard_pending(&mut self) {
        let dropped = self.events_rx.try_iter().count();
        if dropped > 0 {
            log::debug!("discarded {dropped} stale session events");
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

impl<S: StepSource> Drop for WalkSession<S> {
    fn drop(&mut self) {
        self.cancel_timer();
        if self.state.is_active() {
            self.steps.stop();
        }
    }
}
