// panorama.rs — 查看器：相机 + 输入 + 动画 + 纹理流 的逐帧编排

use glam::Vec2;

use crate::animation::AnimationRequest;
use crate::camera::{CameraState, Pose};
use crate::config::ViewerConfig;
use crate::input::{InputRouter, Key};
use crate::projection::ViewParams;
use crate::render_loop::RedrawCache;
use crate::streamer::{
    parse_source_list, SourceLoader, StreamEvent, TextureSink, TextureStreamer, ThreadedLoader,
};

// 当前由谁写 yaw/pitch/zoom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Idle,
    UserDriven,
    Animating,
}

#[derive(Debug, Default)]
pub struct FrameOutcome {
    pub redraw: bool,
    pub events: Vec<StreamEvent>,
}

pub struct PanoramaViewer<L: SourceLoader = ThreadedLoader> {
    config: ViewerConfig,
    camera: CameraState,
    input: InputRouter,
    animation: Option<AnimationRequest>,
    streamer: TextureStreamer<L>,
    cache: RedrawCache,
    aspect_ratio: f32,
}

impl PanoramaViewer<ThreadedLoader> {
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_loader(config, ThreadedLoader)
    }
}

impl<L: SourceLoader> PanoramaViewer<L> {
    pub fn with_loader(config: ViewerConfig, loader: L) -> Self {
        Self {
            camera: CameraState::new(&config),
            input: InputRouter::new(&config),
            animation: None,
            streamer: TextureStreamer::new(loader),
            cache: RedrawCache::new(),
            aspect_ratio: 1.0,
            config,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    pub fn input(&self) -> &InputRouter {
        &self.input
    }

    pub fn streamer(&self) -> &TextureStreamer<L> {
        &self.streamer
    }

    // ---- sources ----

    // 空格分隔，低分辨率在前
    pub fn set_sources(&mut self, src: &str) {
        self.set_source_list(parse_source_list(src));
    }

    pub fn set_source_list(&mut self, sources: Vec<String>) {
        if sources.is_empty() {
            log::warn!("empty source list");
        }
        self.streamer.start(sources);
    }

    pub fn sources(&self) -> &[String] {
        self.streamer.sources()
    }

    pub fn is_ready(&self) -> bool {
        self.streamer.is_ready()
    }

    // ---- view parameters ----

    pub fn yaw(&self) -> f32 {
        self.camera.yaw()
    }

    pub fn pitch(&self) -> f32 {
        self.camera.pitch()
    }

    pub fn zoom(&self) -> f32 {
        self.camera.zoom()
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.camera.set_yaw(yaw);
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.camera.set_pitch(pitch);
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.camera.set_zoom(zoom);
    }

    /// String-valued attribute write. Unparseable numbers fall back to 0 / 0 / default zoom.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        let number = |fallback: f32| {
            value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(fallback)
        };
        match name {
            "src" => self.set_sources(value),
            "yaw" => self.set_yaw(number(0.0)),
            "pitch" => self.set_pitch(number(0.0)),
            "zoom" => self.set_zoom(number(self.config.default_zoom)),
            _ => return false,
        }
        true
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "src" => Some(self.sources().join(" ")),
            "yaw" => Some(self.yaw().to_string()),
            "pitch" => Some(self.pitch().to_string()),
            "zoom" => Some(self.zoom().to_string()),
            _ => None,
        }
    }

    // 投影用的 aspect 是 高/宽
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = height as f32 / width as f32;
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn view_params(&self) -> ViewParams {
        ViewParams::new(
            self.camera.yaw(),
            self.camera.pitch(),
            self.camera.zoom(),
            self.aspect_ratio,
        )
    }

    pub fn mode(&self) -> ViewMode {
        if self.animation.is_some() {
            ViewMode::Animating
        } else if self.input.is_dragging()
            || self.camera.is_moving()
            || !self.input.held_axes().is_zero()
        {
            ViewMode::UserDriven
        } else {
            ViewMode::Idle
        }
    }

    // ---- animation ----

    /// Ease to the given pose over `duration_ms` (config default when `None`).
    /// Replaces any running animation, starting from the current pose.
    pub fn animate_to(
        &mut self,
        yaw: f32,
        pitch: f32,
        zoom: f32,
        duration_ms: Option<f64>,
        now_ms: f64,
    ) {
        let target = self.camera.clamp_pose(Pose { yaw, pitch, zoom });
        let duration = duration_ms.unwrap_or(self.config.animation_duration_ms);
        if self.animation.is_some() {
            log::debug!("replacing running animation");
        }
        self.camera.stop();
        self.animation = Some(AnimationRequest::new(
            self.camera.pose(),
            target,
            duration,
            now_ms,
        ));
    }

    pub fn animation(&self) -> Option<&AnimationRequest> {
        self.animation.as_ref()
    }

    // ---- input forwarding ----

    pub fn on_pointer_down(&mut self, x: f32, y: f32, now_ms: f64) {
        self.input.on_pointer_down(x, y, now_ms, &mut self.camera);
    }

    pub fn on_pointer_move(&mut self, x: f32, y: f32, now_ms: f64) {
        self.input.on_pointer_move(x, y, now_ms, &mut self.camera);
    }

    pub fn on_pointer_up(&mut self) {
        self.input.on_pointer_up(&mut self.camera);
    }

    pub fn on_pointer_leave(&mut self) {
        self.input.on_pointer_leave(&mut self.camera);
    }

    pub fn on_wheel(&mut self, delta_y_pixels: f32) {
        self.input.on_wheel(delta_y_pixels, &mut self.camera);
    }

    pub fn on_wheel_lines(&mut self, lines_y: f32) {
        self.input.on_wheel_lines(lines_y, &mut self.camera);
    }

    pub fn on_touch_start(&mut self, touches: &[Vec2], now_ms: f64) {
        self.input.on_touch_start(touches, now_ms, &mut self.camera);
    }

    pub fn on_touch_move(&mut self, touches: &[Vec2], now_ms: f64) {
        self.input.on_touch_move(touches, now_ms, &mut self.camera);
    }

    pub fn on_touch_end(&mut self, remaining: &[Vec2], now_ms: f64) {
        self.input.on_touch_end(remaining, now_ms, &mut self.camera);
    }

    pub fn on_key_down(&mut self, key: Key) {
        self.input.on_key_down(key);
    }

    pub fn on_key_up(&mut self, key: Key) {
        self.input.on_key_up(key);
    }

    pub fn release_all_keys(&mut self) {
        self.input.release_all_keys();
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    // ---- frame ----

    // 顺序：纹理切换 (动画中跳过) → 动画或物理 → 重绘判断
    pub fn frame(&mut self, now_ms: f64, sink: &mut dyn TextureSink) -> FrameOutcome {
        let allow_swap = self.mode() != ViewMode::Animating;
        let events = self.streamer.poll(allow_swap, sink);
        if events
            .iter()
            .any(|e| matches!(e, StreamEvent::Loaded { .. }))
        {
            // 纹理变了但视角可能没变
            self.cache.invalidate();
        }

        match self.animation.as_mut() {
            Some(anim) => {
                let pose = anim.advance(now_ms);
                let finished = anim.is_finished();
                self.camera.set_pose(pose);
                if finished {
                    self.animation = None;
                }
            }
            None => {
                self.camera.set_held_axes(self.input.held_axes());
                self.camera.integrate();
            }
        }

        let redraw = self.streamer.is_ready() && self.cache.check_and_mark(self.view_params());
        FrameOutcome { redraw, events }
    }
}
