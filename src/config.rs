// config.rs — 可调参数（阻尼 / 灵敏度 / 限位等）
//
// 参数来源:
// - CLI: --config <path>
// - Env: PANORAMA_CONFIG
// - 默认值: ViewerConfig::default()
//
// JSON 中缺失的字段使用默认值。

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, ViewerError};

pub const CONFIG_ENV: &str = "PANORAMA_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub damping: f32,
    pub zoom_damping: f32,
    // 低于阈值的速度直接归零
    pub velocity_epsilon: f32,
    pub zoom_velocity_epsilon: f32,

    pub drag_sensitivity: f32,
    // 松手速度 (px/s) 超过此值才算甩动
    pub flick_threshold: f32,
    pub flick_scale: f32,
    pub wheel_sensitivity: f32,
    // 按行滚动的滚轮，一行折算的像素
    pub wheel_line_pixels: f32,
    pub pinch_exponent: f32,
    pub pinch_sensitivity: f32,
    pub key_step: f32,
    pub zoom_key_step: f32,
    pub history_capacity: usize,

    pub pitch_limit: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub default_zoom: f32,

    pub animation_duration_ms: f64,
    pub frame_interval_ms: f64,
    // 上传前把非 2 的幂尺寸重采样
    pub force_power_of_two: bool,
    pub show_status_bar: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            damping: 0.95,
            zoom_damping: 0.5,
            velocity_epsilon: 0.001,
            zoom_velocity_epsilon: 0.05,

            drag_sensitivity: 0.3,
            flick_threshold: 500.0,
            flick_scale: 0.002,
            wheel_sensitivity: 0.001,
            wheel_line_pixels: 100.0,
            pinch_exponent: 0.8,
            pinch_sensitivity: 0.01,
            key_step: 0.1,
            zoom_key_step: 0.06,
            history_capacity: 5,

            pitch_limit: 89.0,
            min_zoom: 0.6,
            max_zoom: 10.0,
            default_zoom: 2.0,

            animation_duration_ms: 1000.0,
            frame_interval_ms: 1000.0 / 60.0,
            force_power_of_two: false,
            show_status_bar: true,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: ViewerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Explicit path wins, then `PANORAMA_CONFIG`, then defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load(p);
        }
        match std::env::var(CONFIG_ENV) {
            Ok(v) if !v.trim().is_empty() => Self::load(&PathBuf::from(v)),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f32| {
            if (0.0..1.0).contains(&v) {
                Ok(())
            } else {
                Err(ViewerError::InvalidArgument(format!(
                    "{name} must be in [0, 1), got {v}"
                )))
            }
        };
        unit("damping", self.damping)?;
        unit("zoom_damping", self.zoom_damping)?;

        if !(self.velocity_epsilon > 0.0 && self.zoom_velocity_epsilon > 0.0) {
            return Err(ViewerError::InvalidArgument(
                "velocity epsilons must be positive".into(),
            ));
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom) {
            return Err(ViewerError::InvalidArgument(format!(
                "zoom range [{}, {}] is empty",
                self.min_zoom, self.max_zoom
            )));
        }
        if !(0.0..90.0).contains(&self.pitch_limit) {
            return Err(ViewerError::InvalidArgument(format!(
                "pitch_limit must be in [0, 90), got {}",
                self.pitch_limit
            )));
        }
        if self.history_capacity < 2 {
            return Err(ViewerError::InvalidArgument(
                "history_capacity must hold at least 2 samples".into(),
            ));
        }
        if !(self.frame_interval_ms > 0.0) {
            return Err(ViewerError::InvalidArgument(
                "frame_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let c = ViewerConfig::from_json_str(r#"{ "damping": 0.9 }"#).unwrap();
        assert_eq!(c.damping, 0.9);
        assert_eq!(c.zoom_damping, ViewerConfig::default().zoom_damping);
        assert_eq!(c.history_capacity, 5);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ViewerConfig::from_json_str(r#"{ "damping": 1.5 }"#),
            Err(ViewerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ViewerConfig::from_json_str(r#"{ "min_zoom": 5, "max_zoom": 1 }"#),
            Err(ViewerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ViewerConfig::from_json_str("not json"),
            Err(ViewerError::Config(_))
        ));
    }

    // 唯一读写 PANORAMA_CONFIG 的测试，避免并行测试互相干扰
    #[test]
    fn resolve_prefers_explicit_path_then_env() {
        let dir = std::env::temp_dir().join(format!("panorama_viewer_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let explicit = dir.join("explicit.json");
        let from_env = dir.join("env.json");
        std::fs::write(&explicit, r#"{ "damping": 0.9 }"#).unwrap();
        std::fs::write(&from_env, r#"{ "damping": 0.8 }"#).unwrap();

        std::env::set_var(CONFIG_ENV, &from_env);
        assert_eq!(ViewerConfig::resolve(Some(explicit.as_path())).unwrap().damping, 0.9);
        assert_eq!(ViewerConfig::resolve(None).unwrap().damping, 0.8);

        std::env::set_var(CONFIG_ENV, "  ");
        assert_eq!(ViewerConfig::resolve(None).unwrap(), ViewerConfig::default());

        std::env::remove_var(CONFIG_ENV);
        assert_eq!(ViewerConfig::resolve(None).unwrap(), ViewerConfig::default());
        assert!(matches!(
            ViewerConfig::resolve(Some(dir.join("missing.json").as_path())),
            Err(ViewerError::Io(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
