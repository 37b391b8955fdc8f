// render_loop.rs — 帧调度与重绘抑制

use std::time::{Duration, Instant};

use crate::projection::ViewParams;

/// Remembers the parameters of the last drawn frame so unchanged frames can be skipped.
#[derive(Debug, Default, Clone)]
pub struct RedrawCache {
    last: Option<ViewParams>,
}

impl RedrawCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needs_redraw(&self, view: &ViewParams) -> bool {
        self.last.as_ref() != Some(view)
    }

    pub fn check_and_mark(&mut self, view: ViewParams) -> bool {
        if self.needs_redraw(&view) {
            self.last = Some(view);
            true
        } else {
            false
        }
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

/// Fixed-interval tick scheduler. Never catches up on missed ticks.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Duration,
    next: Instant,
}

impl FrameScheduler {
    pub fn new(interval_ms: f64, now: Instant) -> Self {
        Self {
            interval: Duration::from_secs_f64(interval_ms.max(1.0) / 1000.0),
            next: now,
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// `true` at most once per interval; the following deadline is re-anchored to `now`
    /// when the loop has fallen behind.
    pub fn tick_due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.interval;
        if self.next <= now {
            self.next = now + self.interval;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_view_is_skipped() {
        let mut cache = RedrawCache::new();
        let view = ViewParams::new(0.0, 0.0, 2.0, 0.5);
        assert!(cache.check_and_mark(view));
        assert!(!cache.check_and_mark(view));

        let turned = ViewParams { yaw: 1.0, ..view };
        assert!(cache.check_and_mark(turned));

        let resized = ViewParams { aspect_ratio: 0.75, ..turned };
        assert!(cache.check_and_mark(resized));

        cache.invalidate();
        assert!(cache.check_and_mark(resized));
    }

    #[test]
    fn scheduler_fires_once_per_interval() {
        let t0 = Instant::now();
        let mut s = FrameScheduler::new(10.0, t0);
        assert!(s.tick_due(t0));
        assert!(!s.tick_due(t0 + Duration::from_millis(5)));
        assert!(s.tick_due(t0 + Duration::from_millis(10)));
        // 落后很多时不补帧
        assert!(s.tick_due(t0 + Duration::from_millis(100)));
        assert!(!s.tick_due(t0 + Duration::from_millis(105)));
    }
}
