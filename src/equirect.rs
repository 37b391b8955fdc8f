// equirect.rs — 球面方向 ↔ 等距柱状纹理坐标，以及 CPU 端取样
//
// 实时路径 (shader / 软件渲染) 与离线立方体面转换共用这里的函数。

use glam::{Vec2, Vec3};
use image::{Rgba, RgbaImage};
use std::f32::consts::PI;

pub fn direction_to_lon_lat(dir: Vec3) -> (f32, f32) {
    let longitude = dir.z.atan2(dir.x);
    let latitude = dir.y.clamp(-1.0, 1.0).asin();
    (longitude, latitude)
}

/// Equirectangular texture coordinate, `u` wraps horizontally, `v = 0` is the zenith.
pub fn direction_to_uv(dir: Vec3) -> Vec2 {
    let (longitude, latitude) = direction_to_lon_lat(dir);
    Vec2::new(0.5 - longitude / (2.0 * PI), 0.5 - latitude / PI)
}

pub fn direction_to_uv_clamped(dir: Vec3) -> Vec2 {
    direction_to_uv(dir).clamp(Vec2::ZERO, Vec2::ONE)
}

// 水平环绕，垂直钳制
#[inline]
fn texel_index(width: u32, height: u32, x: i64, y: i64) -> (u32, u32) {
    let x = x.rem_euclid(width as i64) as u32;
    let y = y.clamp(0, height as i64 - 1) as u32;
    (x, y)
}

pub fn sample_nearest(img: &RgbaImage, u: f64, v: f64) -> Rgba<u8> {
    let (x, y) = texel_index(img.width(), img.height(), u.floor() as i64, v.floor() as i64);
    *img.get_pixel(x, y)
}

/// Bilinear fetch at a normalised `[0,1]²` coordinate, texel centres at `+0.5`
/// like a GPU linear sampler.
pub fn sample_uv_bilinear(img: &RgbaImage, uv: Vec2) -> Rgba<u8> {
    sample_bilinear(
        img,
        uv.x as f64 * img.width() as f64 - 0.5,
        uv.y as f64 * img.height() as f64 - 0.5,
    )
}

// gamma 2.0 近似
#[inline]
pub fn srgb_to_linear(c: u8) -> f64 {
    let v = c as f64 * (1.0 / 255.0);
    v * v
}

#[inline]
pub fn linear_to_srgb(v: f64) -> u8 {
    (v.max(0.0).sqrt() * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Bilinear fetch at pixel coordinates `(u, v)`.
/// Neighbours are blended in linear light, premultiplied by alpha, then
/// un-premultiplied and re-encoded.
pub fn sample_bilinear(img: &RgbaImage, u: f64, v: f64) -> Rgba<u8> {
    let (w, h) = (img.width(), img.height());
    let ui = u.floor();
    let vi = v.floor();
    let mu = u - ui;
    let nu = v - vi;
    let (ui, vi) = (ui as i64, vi as i64);

    let taps = [
        (texel_index(w, h, ui, vi), (1.0 - mu) * (1.0 - nu)),
        (texel_index(w, h, ui + 1, vi), mu * (1.0 - nu)),
        (texel_index(w, h, ui, vi + 1), (1.0 - mu) * nu),
        (texel_index(w, h, ui + 1, vi + 1), mu * nu),
    ];

    let mut acc = [0.0f64; 4];
    for ((x, y), weight) in taps {
        let p = img.get_pixel(x, y).0;
        let alpha = p[3] as f64 * (1.0 / 255.0);
        acc[0] += srgb_to_linear(p[0]) * alpha * weight;
        acc[1] += srgb_to_linear(p[1]) * alpha * weight;
        acc[2] += srgb_to_linear(p[2]) * alpha * weight;
        acc[3] += alpha * weight;
    }

    let alpha = acc[3];
    if alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let ia = 1.0 / alpha;
    Rgba([
        linear_to_srgb(acc[0] * ia),
        linear_to_srgb(acc[1] * ia),
        linear_to_srgb(acc[2] * ia),
        (alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
