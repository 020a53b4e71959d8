//! Frame timing and FPS reporting.

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Measures how long a recurring operation takes.
///
/// Recorded timings are averaged when the timer is displayed using `{}`
/// ([`std::fmt::Display`]). [`FpsCounter::tick_with`] resets attached timers after logging them,
/// so every log line describes a single interval.
pub struct Timer {
    name: &'static str,
    total: Duration,
    count: u32,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total: Duration::ZERO,
            count: 0,
        }
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is recorded.
    pub fn start(&mut self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    /// Records a measurement that was taken elsewhere.
    pub fn record(&mut self, duration: Duration) {
        self.total += duration;
        self.count += 1;
    }

    /// Returns the number of measurements since the last reset.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the average of the measurements since the last reset.
    pub fn average(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(self.total / self.count)
        }
    }

    pub fn reset(&mut self) {
        self.total = Duration::ZERO;
        self.count = 0;
    }
}

/// Displays the number of measurements and their average.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let avg_ms = self.average().unwrap_or_default().as_secs_f32() * 1000.0;
        write!(f, "{}: {}x{avg_ms:.01}ms", self.name, self.count)
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a mut Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.timer.record(elapsed);
    }
}

/// Logs frames per second, together with any attached [`Timer`]s.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
    interval: Duration,
    last_fps: Option<u32>,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
            interval: Duration::from_secs(1),
            last_fps: None,
        }
    }

    /// Sets how often the frame rate is computed and logged. Defaults to once per second.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the frame rate computed at the end of the last full interval.
    pub fn fps(&self) -> Option<u32> {
        self.last_fps
    }

    /// Advances the frame counter by 1 and logs FPS if the interval has passed.
    ///
    /// Returns the new frame rate when one was computed.
    pub fn tick(&mut self) -> Option<u32> {
        self.tick_with(&mut [])
    }

    /// Like [`FpsCounter::tick`], but also logs and resets `timers` when the interval has passed.
    pub fn tick_with(&mut self, timers: &mut [&mut Timer]) -> Option<u32> {
        self.frames += 1;
        let elapsed = self.start.elapsed();
        if elapsed < self.interval {
            return None;
        }

        let fps = (self.frames as f32 / elapsed.as_secs_f32()).round() as u32;
        let extra = timers
            .iter()
            .map(|timer| timer.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if extra.is_empty() {
            log::debug!("{}: {} FPS", self.name, fps);
        } else {
            log::debug!("{}: {} FPS ({})", self.name, fps, extra);
        }
        for timer in timers.iter_mut() {
            timer.reset();
        }

        self.last_fps = Some(fps);
        self.frames = 0;
        self.start = Instant::now();
        Some(fps)
    }
}
