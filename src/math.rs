// math.rs — 向量 / 旋转 / 插值小工具

use glam::{Mat3, Vec3};

/// GLSL/WGSL `smoothstep`: 0 below `edge0`, 1 above `edge1`, cubic Hermite in between.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn mix(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a * (1.0 - t) + b * t
}

// 与 shader 中列主序的
// mat3(cy, 0, -sy, 0, 1, 0, sy, 0, cy) 一致
pub fn rot_y(angle_rad: f32) -> Mat3 {
    let (s, c) = angle_rad.sin_cos();
    Mat3::from_cols(
        Vec3::new(c, 0.0, -s),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(s, 0.0, c),
    )
}

// mat3(1, 0, 0, 0, cp, -sp, 0, sp, cp)
pub fn rot_x(angle_rad: f32) -> Mat3 {
    let (s, c) = angle_rad.sin_cos();
    Mat3::from_cols(
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, c, -s),
        Vec3::new(0.0, s, c),
    )
}

// 角度制
pub fn view_rotation(yaw_deg: f32, pitch_deg: f32) -> Mat3 {
    rot_y(yaw_deg.to_radians()) * rot_x(pitch_deg.to_radians())
}

/// Nearest power of two in log space (`1 << round(log2 n)`), at least 1.
pub fn nearest_power_of_two(n: f32) -> u32 {
    if !(n > 1.0) {
        return 1;
    }
    let exp = n.log2().round().min(31.0) as u32;
    1u32 << exp
}

pub fn next_power_of_two(n: u32) -> u32 {
    n.max(1).next_power_of_two()
}

pub fn is_power_of_two(n: u32) -> bool {
    n != 0 && n & (n - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothstep_edges() {
        assert_eq!(smoothstep(1.6, 2.4, 1.0), 0.0);
        assert_eq!(smoothstep(1.6, 2.4, 3.0), 1.0);
        assert!((smoothstep(1.6, 2.4, 2.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rotations_match_shader_layout() {
        // rot_y(90°) sends +X to -Z with the shader's column layout.
        let v = rot_y(std::f32::consts::FRAC_PI_2) * Vec3::X;
        assert!((v - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);

        let v = rot_x(std::f32::consts::FRAC_PI_2) * Vec3::Y;
        assert!((v - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn power_of_two_helpers() {
        assert_eq!(nearest_power_of_two(1000.0), 1024);
        assert_eq!(nearest_power_of_two(700.0), 512);
        assert_eq!(nearest_power_of_two(0.5), 1);
        assert_eq!(next_power_of_two(513), 1024);
        assert_eq!(next_power_of_two(512), 512);
        assert!(is_power_of_two(256));
        assert!(!is_power_of_two(300));
    }
}
