// projection.rs — 屏幕点 → 球面方向（小行星 ↔ 透视 混合投影）
//
// 与 shader_equirect.wgsl 的 fs_main 一一对应，CPU 侧用于软件渲染与回归测试。

use glam::{Vec2, Vec3};

use crate::equirect;
use crate::math::{mix, smoothstep, view_rotation};

// 小行星 → 透视 的过渡区间
pub const TRANSITION_START: f32 = 1.6;
pub const TRANSITION_END: f32 = 2.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub yaw: f32,
    pub pitch: f32,
    pub zoom: f32,
    /// `height / width` of the output surface.
    pub aspect_ratio: f32,
}

impl ViewParams {
    pub fn new(yaw: f32, pitch: f32, zoom: f32, aspect_ratio: f32) -> Self {
        Self {
            yaw,
            pitch,
            zoom,
            aspect_ratio,
        }
    }
}

/// Maps a `[0,1]²` surface UV (origin bottom-left) to NDC and applies aspect correction.
pub fn surface_uv_to_ndc(uv: Vec2, aspect_ratio: f32) -> Vec2 {
    let mut ndc = (uv - Vec2::splat(0.5)) * 2.0;
    if aspect_ratio > 1.0 {
        // 竖屏
        ndc.x /= aspect_ratio;
    } else {
        ndc.y *= aspect_ratio;
    }
    ndc
}

// 0 = 小行星，1 = 透视
#[inline]
pub fn blend_factor(zoom: f32) -> f32 {
    smoothstep(TRANSITION_START, TRANSITION_END, zoom)
}

pub fn stereographic_direction(ndc: Vec2, zoom: f32) -> Vec3 {
    let r2 = ndc.dot(ndc);
    let scale = zoom * (2.0 / (r2 + 1.0));
    Vec3::new(ndc.x * scale, ndc.y * scale, scale - 1.0)
}

pub fn perspective_direction(ndc: Vec2, zoom: f32) -> Vec3 {
    Vec3::new(ndc.x, ndc.y, zoom - 1.0)
}

pub fn local_direction(ndc: Vec2, zoom: f32) -> Vec3 {
    let blend = blend_factor(zoom);
    mix(
        stereographic_direction(ndc, zoom),
        perspective_direction(ndc, zoom),
        blend,
    )
    .normalize_or_zero()
}

pub fn world_direction(ndc: Vec2, view: &ViewParams) -> Vec3 {
    view_rotation(view.yaw, view.pitch) * local_direction(ndc, view.zoom)
}

/// Full per-pixel mapping: surface UV → equirectangular texture coordinate.
pub fn surface_uv_to_texture_uv(uv: Vec2, view: &ViewParams) -> Vec2 {
    let ndc = surface_uv_to_ndc(uv, view.aspect_ratio);
    equirect::direction_to_uv(world_direction(ndc, view))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_jump_across(zoom: f32) -> f32 {
        let eps = 1e-4;
        let mut worst = 0.0f32;
        for iy in -4..=4 {
            for ix in -4..=4 {
                let ndc = Vec2::new(ix as f32 / 4.0, iy as f32 / 4.0);
                let a = local_direction(ndc, zoom - eps);
                let b = local_direction(ndc, zoom + eps);
                worst = worst.max((a - b).length());
            }
        }
        worst
    }

    #[test]
    fn continuous_across_blend_window() {
        assert!(max_jump_across(TRANSITION_START) < 1e-3);
        assert!(max_jump_across(TRANSITION_END) < 1e-3);
        assert!(max_jump_across(2.0) < 1e-3);
    }

    #[test]
    fn pure_modes_outside_window() {
        let ndc = Vec2::new(0.3, -0.2);
        let stereo = stereographic_direction(ndc, 1.0).normalize();
        assert!((local_direction(ndc, 1.0) - stereo).length() < 1e-6);

        let persp = perspective_direction(ndc, 5.0).normalize();
        assert!((local_direction(ndc, 5.0) - persp).length() < 1e-6);
    }

    #[test]
    fn centre_looks_forward() {
        // 中心点始终朝 +Z
        for zoom in [0.6, 1.0, 2.0, 4.0, 10.0] {
            let d = local_direction(Vec2::ZERO, zoom);
            assert!((d - Vec3::Z).length() < 1e-6, "zoom {zoom}: {d:?}");
        }
    }

    #[test]
    fn aspect_correction() {
        // 横屏: 高/宽 < 1，纵向被压缩
        let ndc = surface_uv_to_ndc(Vec2::new(1.0, 1.0), 0.5);
        assert_eq!(ndc, Vec2::new(1.0, 0.5));
        // 竖屏
        let ndc = surface_uv_to_ndc(Vec2::new(1.0, 1.0), 2.0);
        assert_eq!(ndc, Vec2::new(0.5, 1.0));
    }
}
