//! Frame clock.
//!
//! The host calls [`Ticker::on_frame`] from its refresh callback (see
//! [`crate::platform::insert_ticker`] for a calloop driver). Each frame the
//! elapsed time since the previous honored frame is capped at
//! [`TickerConfig::max_delta`] and every listener receives that same delta.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Weight of the newest sample in the measured frame rate.
const FPS_SMOOTHING: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickerConfig {
    /// Target frames per second. Zero is treated as one.
    pub fps: u32,
    /// Upper bound on the delta handed to listeners.
    pub max_delta: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            max_delta: Duration::from_millis(100),
        }
    }
}

impl TickerConfig {
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn max_delta(mut self, max_delta: Duration) -> Self {
        self.max_delta = max_delta;
        self
    }

    /// Time between scheduled frames at the target rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    Stopped,
    Running,
    Paused,
}

enum Schedule {
    EveryFrame,
    Once,
    After { remaining: Duration },
    Every { period: Duration, elapsed: Duration },
}

impl Schedule {
    /// Advance by `delta`. Returns (fire, keep).
    fn advance(&mut self, delta: Duration) -> (bool, bool) {
        match self {
            Schedule::EveryFrame => (true, true),
            Schedule::Once => (true, false),
            Schedule::After { remaining } => {
                *remaining = remaining.saturating_sub(delta);
                if remaining.is_zero() {
                    (true, false)
                } else {
                    (false, true)
                }
            }
            Schedule::Every { period, elapsed } => {
                if period.is_zero() {
                    return (true, true);
                }
                *elapsed += delta;
                if *elapsed >= *period {
                    // At most one firing per frame
                    let rem = elapsed.as_nanos() % period.as_nanos();
                    *elapsed = Duration::from_nanos(rem as u64);
                    (true, true)
                } else {
                    (false, true)
                }
            }
        }
    }
}

struct Listener {
    id: ListenerId,
    schedule: Schedule,
    callback: Box<dyn FnMut(Duration)>,
}

/// Requests a stop from inside a listener.
///
/// The ticker is mutably borrowed while listeners run, so they cannot call
/// [`Ticker::stop`] directly. A requested stop takes effect before the next
/// listener is invoked.
#[derive(Clone)]
pub struct StopHandle {
    requested: Rc<Cell<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.requested.set(true);
    }
}

pub struct Ticker {
    config: TickerConfig,
    state: TickerState,
    last_tick: Option<Instant>,
    listeners: Vec<Listener>,
    next_id: u64,
    stop_requested: Rc<Cell<bool>>,
    measured_fps: f64,
    frames: u64,
}

impl Ticker {
    pub fn new(config: TickerConfig) -> Self {
        Self {
            config,
            state: TickerState::Stopped,
            last_tick: None,
            listeners: Vec::new(),
            next_id: 0,
            stop_requested: Rc::new(Cell::new(false)),
            measured_fps: 0.0,
            frames: 0,
        }
    }

    pub fn config(&self) -> &TickerConfig {
        &self.config
    }

    pub fn state(&self) -> TickerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TickerState::Running
    }

    /// Frames dispatched since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Smoothed frame rate from the uncapped frame intervals.
    pub fn measured_fps(&self) -> f64 {
        self.measured_fps
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            requested: self.stop_requested.clone(),
        }
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Start with `now` as the previous frame time. Has no effect unless
    /// stopped.
    pub fn start_at(&mut self, now: Instant) {
        if self.state != TickerState::Stopped {
            return;
        }
        self.stop_requested.set(false);
        self.state = TickerState::Running;
        self.last_tick = Some(now);
        log::debug!("ticker started at {} fps", self.config.fps);
    }

    /// No listener fires after this returns, until the next `start`.
    pub fn stop(&mut self) {
        if self.state != TickerState::Stopped {
            log::debug!("ticker stopped after {} frames", self.frames);
        }
        self.state = TickerState::Stopped;
        self.last_tick = None;
    }

    pub fn pause(&mut self) {
        if self.state == TickerState::Running {
            self.state = TickerState::Paused;
        }
    }

    pub fn resume(&mut self) {
        self.resume_at(Instant::now());
    }

    /// Resume a paused ticker. Time spent paused is not counted.
    pub fn resume_at(&mut self, now: Instant) {
        if self.state == TickerState::Paused {
            self.state = TickerState::Running;
            self.last_tick = Some(now);
        }
    }

    fn push(&mut self, schedule: Schedule, callback: Box<dyn FnMut(Duration)>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            schedule,
            callback,
        });
        id
    }

    /// Call `f` on every frame.
    pub fn add_listener<F>(&mut self, f: F) -> ListenerId
    where
        F: FnMut(Duration) + 'static,
    {
        self.push(Schedule::EveryFrame, Box::new(f))
    }

    /// Returns false if `id` was not registered (or already fired).
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Call `f` once on the next frame.
    pub fn next_tick<F>(&mut self, f: F) -> ListenerId
    where
        F: FnMut(Duration) + 'static,
    {
        self.push(Schedule::Once, Box::new(f))
    }

    /// Call `f` once, on the first frame at which `after` of ticker time
    /// has elapsed.
    pub fn timeout<F>(&mut self, after: Duration, f: F) -> ListenerId
    where
        F: FnMut(Duration) + 'static,
    {
        self.push(Schedule::After { remaining: after }, Box::new(f))
    }

    /// Call `f` on frames where another `every` of ticker time has elapsed.
    pub fn interval<F>(&mut self, every: Duration, f: F) -> ListenerId
    where
        F: FnMut(Duration) + 'static,
    {
        self.push(
            Schedule::Every {
                period: every,
                elapsed: Duration::ZERO,
            },
            Box::new(f),
        )
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Handle one raw frame callback from the host.
    ///
    /// Returns the delta dispatched to listeners, or `None` when the ticker
    /// is stopped or paused.
    pub fn on_frame(&mut self, now: Instant) -> Option<Duration> {
        if self.stop_requested.get() {
            self.stop_requested.set(false);
            self.stop();
        }
        match self.state {
            TickerState::Stopped => return None,
            TickerState::Paused => {
                self.last_tick = Some(now);
                return None;
            }
            TickerState::Running => {}
        }

        let raw = self
            .last_tick
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_tick = Some(now);
        let delta = raw.min(self.config.max_delta);

        if !raw.is_zero() {
            let instant_fps = 1.0 / raw.as_secs_f64();
            self.measured_fps = if self.frames == 0 {
                instant_fps
            } else {
                self.measured_fps * (1.0 - FPS_SMOOTHING) + instant_fps * FPS_SMOOTHING
            };
        }
        self.frames += 1;

        let stop = self.stop_requested.clone();
        self.listeners.retain_mut(|listener| {
            if stop.get() {
                return true;
            }
            let (fire, keep) = listener.schedule.advance(delta);
            if fire {
                (listener.callback)(delta);
            }
            keep
        });

        if self.stop_requested.get() {
            self.stop_requested.set(false);
            self.stop();
        }
        log::trace!("ticker frame {}: delta {:?} (raw {:?})", self.frames, delta, raw);
        Some(delta)
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(TickerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder(ticker: &mut Ticker) -> Rc<RefCell<Vec<Duration>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        ticker.add_listener(move |delta| sink.borrow_mut().push(delta));
        seen
    }

    #[test]
    fn test_long_gap_is_capped() {
        let mut ticker = Ticker::new(TickerConfig::default().max_delta(Duration::from_millis(100)));
        let seen = recorder(&mut ticker);
        let t0 = Instant::now();
        ticker.start_at(t0);

        let delta = ticker.on_frame(t0 + Duration::from_millis(5000));
        assert_eq!(delta, Some(Duration::from_millis(100)));
        assert_eq!(*seen.borrow(), vec![Duration::from_millis(100)]);
    }

    #[test]
    fn test_short_gap_passes_through() {
        let mut ticker = Ticker::default();
        let t0 = Instant::now();
        ticker.start_at(t0);
        assert_eq!(
            ticker.on_frame(t0 + Duration::from_millis(16)),
            Some(Duration::from_millis(16))
        );
    }

    #[test]
    fn test_listeners_share_delta() {
        let mut ticker = Ticker::default();
        let a = recorder(&mut ticker);
        let b = recorder(&mut ticker);
        let t0 = Instant::now();
        ticker.start_at(t0);
        ticker.on_frame(t0 + Duration::from_millis(20));
        ticker.on_frame(t0 + Duration::from_millis(37));
        assert_eq!(*a.borrow(), *b.borrow());
        assert_eq!(a.borrow().len(), 2);
    }

    #[test]
    fn test_stopped_and_paused_fire_nothing() {
        let mut ticker = Ticker::default();
        let seen = recorder(&mut ticker);
        let t0 = Instant::now();
        assert_eq!(ticker.on_frame(t0), None);

        ticker.start_at(t0);
        ticker.pause();
        assert_eq!(ticker.on_frame(t0 + Duration::from_secs(3)), None);
        ticker.resume_at(t0 + Duration::from_secs(3));
        assert_eq!(
            ticker.on_frame(t0 + Duration::from_millis(3010)),
            Some(Duration::from_millis(10))
        );

        ticker.stop();
        assert_eq!(ticker.on_frame(t0 + Duration::from_secs(4)), None);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_stop_from_listener_skips_the_rest() {
        let mut ticker = Ticker::default();
        let handle = ticker.stop_handle();
        ticker.add_listener(move |_| handle.stop());
        let later = recorder(&mut ticker);

        let t0 = Instant::now();
        ticker.start_at(t0);
        ticker.on_frame(t0 + Duration::from_millis(16));
        assert_eq!(ticker.state(), TickerState::Stopped);
        assert!(later.borrow().is_empty());
        assert_eq!(ticker.listener_count(), 2);
    }

    #[test]
    fn test_next_tick_and_timeout_fire_once() {
        let mut ticker = Ticker::default();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        ticker.next_tick(move |_| c.set(c.get() + 1));
        let c = count.clone();
        ticker.timeout(Duration::from_millis(30), move |_| c.set(c.get() + 10));

        let t0 = Instant::now();
        ticker.start_at(t0);
        ticker.on_frame(t0 + Duration::from_millis(16));
        assert_eq!(count.get(), 1);
        ticker.on_frame(t0 + Duration::from_millis(32));
        assert_eq!(count.get(), 11);
        ticker.on_frame(t0 + Duration::from_millis(48));
        assert_eq!(count.get(), 11);
        assert_eq!(ticker.listener_count(), 0);
    }

    #[test]
    fn test_interval_fires_each_period() {
        let mut ticker = Ticker::default();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let id = ticker.interval(Duration::from_millis(25), move |_| c.set(c.get() + 1));

        let t0 = Instant::now();
        ticker.start_at(t0);
        for i in 1..=10 {
            ticker.on_frame(t0 + Duration::from_millis(10 * i));
        }
        assert_eq!(count.get(), 4);
        assert!(ticker.remove_listener(id));
        assert!(!ticker.remove_listener(id));
    }

    #[test]
    fn test_measured_fps() {
        let mut ticker = Ticker::default();
        let t0 = Instant::now();
        ticker.start_at(t0);
        for i in 1..=5 {
            ticker.on_frame(t0 + Duration::from_millis(20 * i));
        }
        approx::assert_relative_eq!(ticker.measured_fps(), 50.0, epsilon = 1e-6);
        assert_eq!(ticker.frames(), 5);
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(
            TickerConfig::default().fps(50).frame_interval(),
            Duration::from_millis(20)
        );
        assert_eq!(
            TickerConfig::default().fps(0).frame_interval(),
            Duration::from_secs(1)
        );
    }
}
