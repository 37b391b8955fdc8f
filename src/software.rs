// software.rs — CPU 逐像素渲染（与 shader 相同公式，用于截图和回归测试）

use glam::Vec2;
use image::RgbaImage;
use rayon::prelude::*;

use crate::equirect::{direction_to_uv_clamped, sample_uv_bilinear};
use crate::projection::{surface_uv_to_ndc, world_direction, ViewParams};

/// Render `texture` as seen with `yaw/pitch/zoom` into a `width × height` image.
///
/// The aspect ratio is taken from the output size; `view.aspect_ratio` is ignored.
/// Filtering is bilinear with texel centres at `+0.5`, as the GPU sampler does.
pub fn render_view(texture: &RgbaImage, view: &ViewParams, width: u32, height: u32) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    if width == 0 || height == 0 || texture.width() == 0 || texture.height() == 0 {
        return out;
    }
    let view = ViewParams {
        aspect_ratio: height as f32 / width as f32,
        ..*view
    };
    let row_bytes = width as usize * 4;

    out.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            // 表面 UV 原点在左下角，图像行 0 在顶部
            let sv = 1.0 - (y as f32 + 0.5) / height as f32;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let su = (x as f32 + 0.5) / width as f32;
                let ndc = surface_uv_to_ndc(Vec2::new(su, sv), view.aspect_ratio);
                let uv = direction_to_uv_clamped(world_direction(ndc, &view));
                px.copy_from_slice(&sample_uv_bilinear(texture, uv).0);
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    // 8 条经度色带，偏移半条使 u = 0.25 / 0.5 落在色带中间
    fn banded(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            let band = (((x + width / 16) * 8 / width) % 8) as u8;
            Rgba([band * 30, 255 - band * 30, 7, 255])
        })
    }

    #[test]
    fn centre_pixel_matches_forward_direction() {
        let tex = banded(256, 128);
        let view = ViewParams::new(0.0, 0.0, 5.0, 1.0);
        let img = render_view(&tex, &view, 33, 33);
        // 正前方 +Z → u = 0.25
        let expected = *tex.get_pixel(64, 64);
        assert_eq!(*img.get_pixel(16, 16), expected);
    }

    #[test]
    fn yaw_turns_the_view() {
        let tex = banded(256, 128);
        let a = render_view(&tex, &ViewParams::new(0.0, 0.0, 5.0, 1.0), 33, 33);
        let b = render_view(&tex, &ViewParams::new(90.0, 0.0, 5.0, 1.0), 33, 33);
        assert_ne!(a.get_pixel(16, 16), b.get_pixel(16, 16));
    }

    #[test]
    fn empty_output_is_fine() {
        let tex = banded(16, 8);
        let img = render_view(&tex, &ViewParams::new(0.0, 0.0, 2.0, 1.0), 0, 10);
        assert_eq!(img.dimensions(), (0, 10));
    }
}
