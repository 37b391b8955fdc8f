// cubemap.rs — 等距柱状全景 → 六个立方体面（逐像素射线 + gamma 正确的双线性采样）

use glam::DVec3;
use image::RgbaImage;
use rayon::prelude::*;
use std::f64::consts::PI;
use std::str::FromStr;

use crate::equirect::{sample_bilinear, sample_nearest};
use crate::error::{Result, ViewerError};
use crate::math::nearest_power_of_two;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PosX, // right
    NegX, // left
    PosY, // top
    NegY, // bottom
    PosZ, // front
    NegZ, // back
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            CubeFace::PosX => "right",
            CubeFace::NegX => "left",
            CubeFace::PosY => "top",
            CubeFace::NegY => "bottom",
            CubeFace::PosZ => "front",
            CubeFace::NegZ => "back",
        }
    }

    // (a, b) ∈ [0,2)²，总有一个分量固定为 ±1
    pub fn ray(self, a: f64, b: f64) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::new(1.0 - a, 1.0, 1.0 - b),
            CubeFace::NegX => DVec3::new(a - 1.0, -1.0, 1.0 - b),
            CubeFace::PosY => DVec3::new(b - 1.0, a - 1.0, 1.0),
            CubeFace::NegY => DVec3::new(1.0 - b, a - 1.0, -1.0),
            CubeFace::PosZ => DVec3::new(1.0, a - 1.0, 1.0 - b),
            CubeFace::NegZ => DVec3::new(-1.0, 1.0 - a, 1.0 - b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

impl FromStr for Interpolation {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Interpolation::Nearest),
            "bilinear" => Ok(Interpolation::Bilinear),
            other => Err(ViewerError::InvalidArgument(format!(
                "unknown interpolation '{other}' (expected nearest|bilinear)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertOptions {
    pub flip_theta: bool,
    pub interpolation: Interpolation,
}

/// Default face edge: nearest power of two to a quarter of the source width.
pub fn default_face_size(source_width: u32) -> u32 {
    nearest_power_of_two(source_width as f32 / 4.0)
}

pub fn ray_to_source_coords(ray: DVec3, source_width: u32, flip_theta: bool) -> (f64, f64) {
    let theta_flip = if flip_theta { -1.0 } else { 1.0 };
    let theta = theta_flip * ray.y.atan2(ray.x);
    let rad = (ray.x * ray.x + ray.y * ray.y).sqrt();
    let phi = ray.z.atan2(rad);

    let quarter = source_width as f64 / 4.0;
    let u = 2.0 * quarter * (theta + PI) / PI;
    let v = 2.0 * quarter * (PI / 2.0 - phi) / PI;
    (u, v)
}

pub fn transform_single_face(
    input: &RgbaImage,
    face: CubeFace,
    output: &mut RgbaImage,
    options: &ConvertOptions,
) {
    let (face_w, face_h) = output.dimensions();
    let inv_w2 = 2.0 / face_w as f64;
    let inv_h2 = 2.0 / face_h as f64;
    let src_w = input.width();

    for (i, j, px) in output.enumerate_pixels_mut() {
        let a = inv_w2 * i as f64;
        let b = inv_h2 * j as f64;
        let (u, v) = ray_to_source_coords(face.ray(a, b), src_w, options.flip_theta);
        *px = match options.interpolation {
            Interpolation::Nearest => sample_nearest(input, u, v),
            Interpolation::Bilinear => sample_bilinear(input, u, v),
        };
    }
}

/// Fill caller-provided face rasters, in [`CubeFace::ALL`] order.
pub fn transform_to_cube_faces(
    input: &RgbaImage,
    faces: &mut [RgbaImage],
    options: &ConvertOptions,
) -> Result<()> {
    if faces.len() != 6 {
        return Err(ViewerError::InvalidArgument(format!(
            "expected 6 cube face targets, got {}",
            faces.len()
        )));
    }
    if input.width() == 0 || input.height() == 0 {
        return Err(ViewerError::InvalidArgument("source image is empty".into()));
    }
    if faces.iter().any(|f| f.width() == 0 || f.height() == 0) {
        return Err(ViewerError::InvalidArgument("cube face target is empty".into()));
    }

    faces
        .par_iter_mut()
        .zip(CubeFace::ALL.par_iter())
        .for_each(|(out, face)| transform_single_face(input, *face, out, options));
    Ok(())
}

pub fn convert(
    input: &RgbaImage,
    face_size: Option<u32>,
    options: &ConvertOptions,
) -> Result<[RgbaImage; 6]> {
    let face_size = match face_size {
        Some(0) => {
            return Err(ViewerError::InvalidArgument(
                "face size must be a positive number".into(),
            ))
        }
        // 面边长不超过源图宽度
        Some(n) if n > input.width().max(1) => {
            return Err(ViewerError::InvalidArgument(format!(
                "face size {n} exceeds source width {}",
                input.width()
            )))
        }
        Some(n) => n,
        None => default_face_size(input.width()),
    };
    log::debug!(
        "converting {}x{} to six {}px faces ({:?})",
        input.width(),
        input.height(),
        face_size,
        options
    );

    let mut faces: [RgbaImage; 6] = std::array::from_fn(|_| RgbaImage::new(face_size, face_size));
    transform_to_cube_faces(input, &mut faces, options)?;
    Ok(faces)
}

pub const MAX_FACE_SIZE: u32 = 16384;

/// Parse a user-supplied face size ("512"). Accepts whole numbers in `1..=MAX_FACE_SIZE`.
pub fn parse_face_size(text: &str) -> Result<u32> {
    let value: u32 = text.trim().parse().map_err(|_| {
        ViewerError::InvalidArgument(format!("face size '{text}' is not a whole number"))
    })?;
    if value == 0 || value > MAX_FACE_SIZE {
        return Err(ViewerError::InvalidArgument(format!(
            "face size must be in 1..={MAX_FACE_SIZE}, got {value}"
        )));
    }
    Ok(value)
}
