//! Frame-rate pacing.
//!
//! The sensor delivers frames at its configured rate; the display side may
//! run slower (a JPEG decode plus a four-segment LCD push does not always
//! fit a 30 fps budget). [`FramePacer`] decides per incoming frame whether
//! to present it or drop it so presented frames stay close to the target
//! rate, and measures the achieved rate over one-second windows.

use bk_platform::camera::Fps;
use embassy_time::{Duration, Instant};

/// Length of the measurement window.
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Per-frame verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PaceDecision {
    /// Show this frame
    Present,
    /// Skip this frame
    Drop,
}

/// Target-rate gate with a rolling rate measurement.
#[derive(Debug, Clone)]
pub struct FramePacer {
    target: Fps,
    interval: Duration,
    slack: Duration,
    next_due: Option<Instant>,
    window_start: Option<Instant>,
    window_frames: u32,
    measured_fps: u32,
    presented: u32,
    dropped: u32,
}

impl FramePacer {
    /// Pacer presenting at most `target` frames per second.
    ///
    /// Frames up to a quarter interval early still count as on time, which
    /// absorbs sensor jitter when the sensor runs at the target rate.
    #[allow(clippy::arithmetic_side_effects)] // Safety: division by a non-zero constant
    pub fn new(target: Fps) -> Self {
        let interval = target.frame_interval();
        Self {
            target,
            interval,
            slack: Duration::from_ticks(interval.as_ticks() / 4),
            next_due: None,
            window_start: None,
            window_frames: 0,
            measured_fps: 0,
            presented: 0,
            dropped: 0,
        }
    }

    /// Target rate.
    pub fn target(&self) -> Fps {
        self.target
    }

    /// Decide for a frame that arrived at `now`.
    pub fn on_frame(&mut self, now: Instant) -> PaceDecision {
        let on_time = match self.next_due {
            None => true,
            Some(due) => later(now, self.slack) >= due,
        };
        if !on_time {
            self.dropped = self.dropped.saturating_add(1);
            return PaceDecision::Drop;
        }

        let next = later(self.next_due.unwrap_or(now), self.interval);
        // Fell more than one interval behind: re-anchor instead of bursting.
        self.next_due = Some(if next <= now {
            later(now, self.interval)
        } else {
            next
        });
        self.presented = self.presented.saturating_add(1);
        self.count_in_window(now);
        PaceDecision::Present
    }

    fn count_in_window(&mut self, now: Instant) {
        let start = *self.window_start.get_or_insert(now);
        if now.saturating_duration_since(start) >= FPS_WINDOW {
            self.measured_fps = self.window_frames;
            self.window_frames = 0;
            self.window_start = Some(now);
        }
        self.window_frames = self.window_frames.saturating_add(1);
    }

    /// Presented frames in the last complete window.
    pub fn measured_fps(&self) -> u32 {
        self.measured_fps
    }

    /// Frames presented since creation or [`FramePacer::reset`].
    pub fn presented(&self) -> u32 {
        self.presented
    }

    /// Frames dropped since creation or [`FramePacer::reset`].
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Forget timing history and counters.
    pub fn reset(&mut self) {
        *self = Self::new(self.target);
    }
}

fn later(t: Instant, d: Duration) -> Instant {
    t.checked_add(d).unwrap_or(Instant::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_first_frame_presents() {
        let mut pacer = FramePacer::new(Fps::Fps10);
        assert_eq!(pacer.on_frame(at(5)), PaceDecision::Present);
    }

    #[test]
    fn test_halves_rate_from_double_speed_sensor() {
        let mut pacer = FramePacer::new(Fps::Fps10);
        let decisions: heapless::Vec<PaceDecision, 8> =
            (0..8).map(|i| pacer.on_frame(at(i * 50))).collect();
        assert_eq!(
            decisions.as_slice(),
            &[
                PaceDecision::Present,
                PaceDecision::Drop,
                PaceDecision::Present,
                PaceDecision::Drop,
                PaceDecision::Present,
                PaceDecision::Drop,
                PaceDecision::Present,
                PaceDecision::Drop,
            ]
        );
        assert_eq!(pacer.presented(), 4);
        assert_eq!(pacer.dropped(), 4);
    }

    #[test]
    fn test_matching_rate_with_jitter_keeps_every_frame() {
        let mut pacer = FramePacer::new(Fps::Fps25);
        for t in [0, 37, 80, 118, 156, 200] {
            assert_eq!(pacer.on_frame(at(t)), PaceDecision::Present, "frame at {t} ms");
        }
    }

    #[test]
    fn test_measures_rate_per_window() {
        let mut pacer = FramePacer::new(Fps::Fps20);
        for i in 0..=40 {
            pacer.on_frame(at(i * 50));
        }
        assert_eq!(pacer.measured_fps(), 20);
    }

    #[test]
    fn test_stall_reanchors() {
        let mut pacer = FramePacer::new(Fps::Fps10);
        pacer.on_frame(at(0));
        assert_eq!(pacer.on_frame(at(1_000)), PaceDecision::Present);
        assert_eq!(pacer.on_frame(at(1_050)), PaceDecision::Drop);
        assert_eq!(pacer.on_frame(at(1_100)), PaceDecision::Present);
    }
}
