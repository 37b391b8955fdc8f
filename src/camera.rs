// camera.rs — 相机状态与逐帧积分（惯性 / 阻尼 / 限位）

use crate::config::ViewerConfig;

// 每个分量取 -1 / 0 / 1
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeldAxes {
    pub yaw: f32,
    pub pitch: f32,
    pub zoom: f32,
}

impl HeldAxes {
    pub fn is_zero(&self) -> bool {
        self.yaw == 0.0 && self.pitch == 0.0 && self.zoom == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub yaw: f32,
    pub pitch: f32,
    pub zoom: f32,
}

/// Yaw/pitch/zoom plus their velocities.
///
/// `pitch` stays within `±pitch_limit` and `zoom` within `[min_zoom, max_zoom]`
/// after every mutation. Yaw is unbounded.
#[derive(Debug, Clone)]
pub struct CameraState {
    yaw: f32,
    pitch: f32,
    zoom: f32,

    pub yaw_velocity: f32,
    pub pitch_velocity: f32,
    pub zoom_velocity: f32,

    // 上一帧叠加到速度上的增量
    pub yaw_accel: f32,
    pub pitch_accel: f32,
    pub zoom_accel: f32,

    held: HeldAxes,
    config: ViewerConfig,
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(&ViewerConfig::default())
    }
}

impl CameraState {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            zoom: config.default_zoom.clamp(config.min_zoom, config.max_zoom),
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            zoom_velocity: 0.0,
            yaw_accel: 0.0,
            pitch_accel: 0.0,
            zoom_accel: 0.0,
            held: HeldAxes::default(),
            config: config.clone(),
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pose(&self) -> Pose {
        Pose {
            yaw: self.yaw,
            pitch: self.pitch,
            zoom: self.zoom,
        }
    }

    // 非有限值直接忽略，保证限位不被 NaN 打破
    pub fn set_yaw(&mut self, yaw: f32) {
        if yaw.is_finite() {
            self.yaw = yaw;
        }
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        if pitch.is_finite() {
            let limit = self.config.pitch_limit;
            self.pitch = pitch.clamp(-limit, limit);
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(self.config.min_zoom, self.config.max_zoom);
        }
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.set_yaw(pose.yaw);
        self.set_pitch(pose.pitch);
        self.set_zoom(pose.zoom);
    }

    pub fn clamp_pose(&self, pose: Pose) -> Pose {
        let limit = self.config.pitch_limit;
        Pose {
            yaw: pose.yaw,
            pitch: pose.pitch.clamp(-limit, limit),
            zoom: pose.zoom.clamp(self.config.min_zoom, self.config.max_zoom),
        }
    }

    // 拖拽：直接改位置，不动速度
    pub fn rotate_by(&mut self, d_yaw: f32, d_pitch: f32) {
        self.set_yaw(self.yaw + d_yaw);
        self.set_pitch(self.pitch + d_pitch);
    }

    pub fn zoom_factor(&self) -> f32 {
        1.0 / self.zoom
    }

    pub fn set_held_axes(&mut self, held: HeldAxes) {
        self.held = held;
    }

    pub fn stop(&mut self) {
        self.yaw_velocity = 0.0;
        self.pitch_velocity = 0.0;
        self.zoom_velocity = 0.0;
    }

    pub fn stop_rotation(&mut self) {
        self.yaw_velocity = 0.0;
        self.pitch_velocity = 0.0;
    }

    pub fn is_moving(&self) -> bool {
        self.yaw_velocity != 0.0 || self.pitch_velocity != 0.0 || self.zoom_velocity != 0.0
    }

    // 每帧一步，不按真实时间缩放
    pub fn integrate(&mut self) {
        let c = &self.config;
        let (damping, zoom_damping) = (c.damping, c.zoom_damping);
        let (eps, zoom_eps) = (c.velocity_epsilon, c.zoom_velocity_epsilon);
        let (key_step, zoom_key_step) = (c.key_step, c.zoom_key_step);

        // 1. 位置
        self.set_yaw(self.yaw + self.yaw_velocity);
        self.set_pitch(self.pitch + self.pitch_velocity);

        // 2. 角速度阻尼
        self.yaw_velocity = snap(self.yaw_velocity * damping, eps);
        self.pitch_velocity = snap(self.pitch_velocity * damping, eps);

        // 3. 缩放
        self.set_zoom(self.zoom + self.zoom_velocity);
        self.zoom_velocity = snap(self.zoom_velocity * zoom_damping, zoom_eps);

        // 4 + 5. 按键加速度
        let zoom_factor = self.zoom_factor();
        self.yaw_accel = self.held.yaw * key_step * zoom_factor;
        self.pitch_accel = self.held.pitch * key_step * zoom_factor;
        self.zoom_accel = self.held.zoom * zoom_key_step;

        self.yaw_velocity += self.yaw_accel;
        self.pitch_velocity += self.pitch_accel;
        self.zoom_velocity += self.zoom_accel;
    }
}

#[inline]
fn snap(v: f32, eps: f32) -> f32 {
    if v.abs() < eps || !v.is_finite() {
        0.0
    } else {
        v
    }
}
