// input.rs — 指针 / 触摸 / 滚轮 / 键盘 → 相机增量
//
// 平台层（winit 或其它宿主）把原始事件转发到这里，本模块不关心事件来源。
// 约定：向右/向下拖动增加 yaw/pitch；←/A、↑/W 与之同向；+/= 放大（zoom 增大）；
// 滚轮向上（DOM deltaY < 0）放大；双指张开放大。

use glam::Vec2;
use std::collections::{HashSet, VecDeque};

use crate::camera::{CameraState, HeldAxes};
use crate::config::ViewerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    A,
    D,
    W,
    S,
    Plus,
    Equals,
    Minus,
    Underscore,
}

impl Key {
    /// Parse a DOM-style key name (`"ArrowLeft"`, `"a"`, `"+"`), case-insensitive.
    pub fn from_name(name: &str) -> Option<Key> {
        let key = match name.to_ascii_lowercase().as_str() {
            "arrowleft" | "left" => Key::ArrowLeft,
            "arrowright" | "right" => Key::ArrowRight,
            "arrowup" | "up" => Key::ArrowUp,
            "arrowdown" | "down" => Key::ArrowDown,
            "a" => Key::A,
            "d" => Key::D,
            "w" => Key::W,
            "s" => Key::S,
            "+" => Key::Plus,
            "=" => Key::Equals,
            "-" => Key::Minus,
            "_" => Key::Underscore,
            _ => return None,
        };
        Some(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub pos: Vec2,
    pub time_ms: f64,
}

#[derive(Debug, Clone)]
pub struct InteractionHistory {
    samples: VecDeque<PointerSample>,
    capacity: usize,
}

impl InteractionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, pos: Vec2, time_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(PointerSample { pos, time_ms });
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &PointerSample> {
        self.samples.iter()
    }

    /// Velocity (units / s) between the oldest and newest sample.
    pub fn release_velocity(&self) -> Option<Vec2> {
        if self.samples.len() < 2 {
            return None;
        }
        let first = self.samples.front()?;
        let last = self.samples.back()?;
        let dt = (last.time_ms - first.time_ms) / 1000.0;
        if !(dt > 0.0) {
            return None;
        }
        Some((last.pos - first.pos) / dt as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TouchMode {
    None,
    Single,
    Pinch { last_distance: f32 },
}

pub struct InputRouter {
    dragging: bool,
    last_pos: Vec2,
    history: InteractionHistory,
    touch: TouchMode,
    pressed: HashSet<Key>,
    config: ViewerConfig,
}

impl InputRouter {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            dragging: false,
            last_pos: Vec2::ZERO,
            history: InteractionHistory::new(config.history_capacity),
            touch: TouchMode::None,
            pressed: HashSet::new(),
            config: config.clone(),
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn history(&self) -> &InteractionHistory {
        &self.history
    }

    // ---- pointer ----

    pub fn on_pointer_down(&mut self, x: f32, y: f32, time_ms: f64, camera: &mut CameraState) {
        self.dragging = true;
        self.last_pos = Vec2::new(x, y);
        camera.stop_rotation();
        self.history.clear();
        self.history.push(self.last_pos, time_ms);
    }

    pub fn on_pointer_move(&mut self, x: f32, y: f32, time_ms: f64, camera: &mut CameraState) {
        if !self.dragging {
            return;
        }
        let pos = Vec2::new(x, y);
        let delta = pos - self.last_pos;
        let scale = self.config.drag_sensitivity * camera.zoom_factor();
        camera.rotate_by(delta.x * scale, delta.y * scale);

        self.last_pos = pos;
        self.history.push(pos, time_ms);
    }

    // 松手：足够快则转为惯性
    pub fn on_pointer_up(&mut self, camera: &mut CameraState) {
        if !self.dragging && self.history.is_empty() {
            return;
        }
        self.dragging = false;

        if let Some(v) = self.history.release_velocity() {
            if v.length() > self.config.flick_threshold {
                let scale = self.config.flick_scale * camera.zoom_factor();
                camera.yaw_velocity = v.x * scale;
                camera.pitch_velocity = v.y * scale;
                log::debug!("flick {:.0} units/s", v.length());
            }
        }
        self.history.clear();
    }

    pub fn on_pointer_leave(&mut self, camera: &mut CameraState) {
        self.on_pointer_up(camera);
    }

    // ---- wheel ----

    /// `delta_y` in pixels, DOM sign (positive scrolls down).
    pub fn on_wheel(&mut self, delta_y: f32, camera: &mut CameraState) {
        if delta_y.is_finite() {
            camera.zoom_velocity -= delta_y * self.config.wheel_sensitivity;
        }
    }

    pub fn on_wheel_lines(&mut self, lines_y: f32, camera: &mut CameraState) {
        self.on_wheel(lines_y * self.config.wheel_line_pixels, camera);
    }

    // ---- touch ----

    // touches: 当前按下的所有手指，按落下顺序
    pub fn on_touch_start(&mut self, touches: &[Vec2], time_ms: f64, camera: &mut CameraState) {
        self.retarget_touches(touches, time_ms, camera);
    }

    pub fn on_touch_move(&mut self, touches: &[Vec2], time_ms: f64, camera: &mut CameraState) {
        match (self.touch, touches) {
            (TouchMode::Single, [p]) => self.on_pointer_move(p.x, p.y, time_ms, camera),
            (TouchMode::Pinch { last_distance }, [a, b, ..]) => {
                let distance = a.distance(*b);
                let delta = distance - last_distance;
                let response =
                    delta.signum() * delta.abs().powf(self.config.pinch_exponent);
                if delta != 0.0 {
                    camera.zoom_velocity += response * self.config.pinch_sensitivity;
                }
                self.touch = TouchMode::Pinch {
                    last_distance: distance,
                };
            }
            // 手指数量和当前模式对不上时重新建立基准
            _ => self.retarget_touches(touches, time_ms, camera),
        }
    }

    pub fn on_touch_end(&mut self, remaining: &[Vec2], time_ms: f64, camera: &mut CameraState) {
        if remaining.is_empty() {
            self.on_pointer_up(camera);
            self.touch = TouchMode::None;
        } else {
            self.retarget_touches(remaining, time_ms, camera);
        }
    }

    fn retarget_touches(&mut self, touches: &[Vec2], time_ms: f64, camera: &mut CameraState) {
        // 1 指 ↔ 2 指切换时清空拖动状态，避免画面跳变
        self.dragging = false;
        self.history.clear();
        match touches {
            [] => self.touch = TouchMode::None,
            [p] => {
                self.touch = TouchMode::Single;
                self.on_pointer_down(p.x, p.y, time_ms, camera);
            }
            [a, b, ..] => {
                self.touch = TouchMode::Pinch {
                    last_distance: a.distance(*b),
                };
            }
        }
    }

    // ---- keyboard ----

    pub fn on_key_down(&mut self, key: Key) {
        self.pressed.insert(key);
    }

    pub fn on_key_up(&mut self, key: Key) {
        self.pressed.remove(&key);
    }

    // 窗口失焦时调用
    pub fn release_all_keys(&mut self) {
        self.pressed.clear();
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    pub fn held_axes(&self) -> HeldAxes {
        let axis = |pos: [Key; 2], neg: [Key; 2]| {
            let p = pos.iter().any(|k| self.pressed.contains(k)) as i32;
            let n = neg.iter().any(|k| self.pressed.contains(k)) as i32;
            (p - n) as f32
        };
        HeldAxes {
            yaw: axis([Key::ArrowLeft, Key::A], [Key::ArrowRight, Key::D]),
            pitch: axis([Key::ArrowUp, Key::W], [Key::ArrowDown, Key::S]),
            zoom: axis([Key::Plus, Key::Equals], [Key::Minus, Key::Underscore]),
        }
    }
}
