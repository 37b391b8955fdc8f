// animation.rs — animate_to 过渡（ease-in-out cubic）

use crate::camera::Pose;

pub fn ease_in_out_cubic(p: f64) -> f64 {
    if p < 0.5 {
        4.0 * p * p * p
    } else {
        1.0 - (-2.0 * p + 2.0).powi(3) / 2.0
    }
}

// 时钟回拨时进度不倒退
#[derive(Debug, Clone)]
pub struct AnimationRequest {
    from: Pose,
    target: Pose,
    duration_ms: f64,
    start_ms: f64,
    progress: f64,
}

impl AnimationRequest {
    pub fn new(from: Pose, target: Pose, duration_ms: f64, start_ms: f64) -> Self {
        Self {
            from,
            target,
            duration_ms: if duration_ms.is_finite() { duration_ms.max(0.0) } else { 0.0 },
            start_ms,
            progress: 0.0,
        }
    }

    pub fn target(&self) -> Pose {
        self.target
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn advance(&mut self, now_ms: f64) -> Pose {
        let p = if self.duration_ms <= 0.0 {
            1.0
        } else {
            ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0)
        };
        self.progress = self.progress.max(p);
        self.pose_at(self.progress)
    }

    fn pose_at(&self, progress: f64) -> Pose {
        if progress >= 1.0 {
            return self.target;
        }
        let t = ease_in_out_cubic(progress) as f32;
        let lerp = |a: f32, b: f32| a + (b - a) * t;
        Pose {
            yaw: lerp(self.from.yaw, self.target.yaw),
            pitch: lerp(self.from.pitch, self.target.pitch),
            zoom: lerp(self.from.zoom, self.target.zoom),
        }
    }
}
