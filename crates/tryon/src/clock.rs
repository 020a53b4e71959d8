//! The animated clock face shown on the watch screen.

use std::{
    fmt,
    time::{Duration, Instant},
};

use chrono::Timelike;

use crate::image::{
    draw::{self, FontSize},
    Color, Image,
};

/// Width and height of the clock face bitmap, in pixels.
pub const FACE_SIZE: u32 = 256;

/// Number of line segments each wave is drawn with.
const WAVE_DIVISIONS: u32 = 200;

/// Baseline of the time text, in pixels from the top.
const TEXT_BASELINE: i32 = 100;
/// Left edge of the `HH:MM` text.
const TIME_X: i32 = 68;
/// Left edge of the seconds text.
const SECONDS_X: i32 = 122;

/// A wall clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl ClockTime {
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    /// Reads the local wall clock.
    pub fn now() -> Self {
        let now = chrono::Local::now();
        Self::new(now.hour(), now.minute(), now.second())
    }

    /// Returns the zero-padded text fields shown on the clock face.
    pub fn label(&self) -> ClockLabel {
        ClockLabel {
            hours: format!("{:02}", self.hours),
            minutes: format!("{:02}", self.minutes),
            seconds: format!("{:02}", self.seconds),
        }
    }
}

/// The text displayed by the clock face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockLabel {
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
}

impl ClockLabel {
    /// Returns the large `HH:MM` part of the label.
    pub fn hours_minutes(&self) -> String {
        format!("{}:{}", self.hours, self.minutes)
    }
}

impl fmt::Display for ClockLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.hours, self.minutes, self.seconds)
    }
}

/// An animated sine wave drawn below the time.
#[derive(Debug, Clone, Copy)]
struct Wave {
    baseline: f32,
    amplitude: f32,
    phase_offset: f32,
    color: Color,
}

const WAVES: [Wave; 2] = [
    Wave {
        baseline: 140.0,
        amplitude: 10.0,
        phase_offset: 0.0,
        color: Color::WHITE,
    },
    Wave {
        baseline: 150.0,
        amplitude: 5.0,
        phase_offset: 1.0,
        color: Color::PURPLE,
    },
];

/// Vertical offset of a wave at horizontal pixel position `x`.
///
/// The wave scrolls with time: its phase advances by 3 radians per second.
pub fn wave_offset(x: f32, amplitude: f32, phase_offset: f32, elapsed: Duration) -> f32 {
    amplitude * (x / 10.0 + elapsed.as_secs_f32() * 3.0 + phase_offset).sin()
}

/// Renders the watch screen: current time plus two scrolling waves.
///
/// The bitmap is redrawn from scratch on every [`ClockFace::update`].
pub struct ClockFace {
    image: Image,
    started: Instant,
}

impl ClockFace {
    pub fn new() -> Self {
        Self {
            image: Image::new(FACE_SIZE, FACE_SIZE),
            started: Instant::now(),
        }
    }

    /// Redraws the face with the local time and the time elapsed since the face was created.
    pub fn update(&mut self) -> &Image {
        let elapsed = self.started.elapsed();
        self.render(ClockTime::now(), elapsed)
    }

    /// Redraws the face for a given time reading and animation time.
    pub fn render(&mut self, time: ClockTime, elapsed: Duration) -> &Image {
        self.image.clear(Color::NULL);

        let label = time.label();
        let hours_minutes = label.hours_minutes();
        draw::text(&mut self.image, TIME_X, TEXT_BASELINE, &hours_minutes)
            .color(Color::WHITE)
            .font(FontSize::Large)
            .align_left()
            .align_baseline();
        draw::text(&mut self.image, SECONDS_X, TEXT_BASELINE, &label.seconds)
            .color(Color::WHITE)
            .font(FontSize::Small)
            .align_left()
            .align_baseline();

        let width = self.image.width() as f32;
        for wave in WAVES {
            let points = (0..=WAVE_DIVISIONS).map(|i| {
                let x = i as f32 / WAVE_DIVISIONS as f32 * width;
                let y = wave.baseline + wave_offset(x, wave.amplitude, wave.phase_offset, elapsed);
                (x.round() as i32, y.round() as i32)
            });
            draw::polyline(&mut self.image, points).color(wave.color);
        }

        &self.image
    }

    /// Returns the most recently rendered face.
    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }
}

impl Default for ClockFace {
    fn default() -> Self {
        Self::new()
    }
}
