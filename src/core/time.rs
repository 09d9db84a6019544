//! Frame timing utilities

use std::time::{Duration, Instant};

/// Snapshot of the current frame handed to per-frame updates.
///
/// `index` is a monotonically increasing sequence number; shared systems
/// compare it against the last index they processed to run at most once
/// per frame no matter how many surfaces call into them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub index: u64,
    pub delta_secs: f32,
    pub elapsed_secs: f32,
}

impl FrameInfo {
    /// Frame info for a fixed step, mostly useful for tests and offline runs.
    pub fn fixed(index: u64, delta_secs: f32) -> Self {
        Self {
            index,
            delta_secs,
            elapsed_secs: index as f32 * delta_secs,
        }
    }
}

/// Tracks frame timing and calculates FPS
pub struct FrameTimer {
    start: Instant,
    last_frame: Instant,
    delta: Duration,
    frame_count: u64,
    fps_timer: Instant,
    fps: f32,
    fps_frame_count: u32,
}

impl FrameTimer {
    /// Create a new frame timer
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta: Duration::ZERO,
            frame_count: 0,
            fps_timer: now,
            fps: 0.0,
            fps_frame_count: 0,
        }
    }

    /// Call once per frame to update timing. Returns the new frame's info.
    pub fn tick(&mut self) -> FrameInfo {
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.frame_count += 1;
        self.fps_frame_count += 1;

        // Update FPS every second
        let fps_elapsed = now - self.fps_timer;
        if fps_elapsed >= Duration::from_secs(1) {
            self.fps = self.fps_frame_count as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = 0;
            self.fps_timer = now;
        }

        self.frame()
    }

    /// Info for the most recently ticked frame
    pub fn frame(&self) -> FrameInfo {
        FrameInfo {
            index: self.frame_count,
            delta_secs: self.delta.as_secs_f32(),
            elapsed_secs: (self.last_frame - self.start).as_secs_f32(),
        }
    }

    /// Get delta time in seconds
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Get current FPS (updated every second)
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Get total frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_advances_index() {
        let mut timer = FrameTimer::new();
        let a = timer.tick();
        let b = timer.tick();
        assert_eq!(a.index, 1);
        assert_eq!(b.index, 2);
        assert!(b.elapsed_secs >= a.elapsed_secs);
    }

    #[test]
    fn test_fixed_frame() {
        let f = FrameInfo::fixed(10, 0.5);
        assert_eq!(f.index, 10);
        assert_eq!(f.elapsed_secs, 5.0);
    }
}
