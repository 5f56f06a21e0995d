//! Page bitmaps: hit overlays, dark mode, PNG encoding

use crate::engine::{HitRect, PageSize, RenderedBitmap, Rotation};
use crate::error::Result;
use image::{ImageFormat, Rgba, RgbaImage};

const HIT_COLOR: [u8; 3] = [255, 230, 0];
const CURRENT_HIT_COLOR: [u8; 3] = [255, 140, 0];
const HIT_ALPHA: f32 = 0.4;

/// Pixel-space rectangle, half-open: `[x0, x1) x [y0, y1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// Map a rectangle from page space (points, bottom-left origin, unrotated)
/// to pixels of a bitmap rendered with the given clockwise rotation.
pub fn page_rect_to_pixels(
    rect: &HitRect,
    page: PageSize,
    rotation: Rotation,
    image_width: u32,
    image_height: u32,
) -> Option<PixelRect> {
    let (rotated_w, rotated_h) = match rotation {
        Rotation::Degrees90 | Rotation::Degrees270 => (page.height, page.width),
        _ => (page.width, page.height),
    };
    if rotated_w <= 0.0 || rotated_h <= 0.0 {
        return None;
    }
    let sx = image_width as f32 / rotated_w;
    let sy = image_height as f32 / rotated_h;

    let map = |x: f32, y: f32| -> (f32, f32) {
        // Top-left origin in unrotated page space first
        let (u, v) = (x, page.height - y);
        match rotation {
            Rotation::None => (u, v),
            Rotation::Degrees90 => (page.height - v, u),
            Rotation::Degrees180 => (page.width - u, page.height - v),
            Rotation::Degrees270 => (v, page.width - u),
        }
    };

    let (ax, ay) = map(rect.left, rect.bottom);
    let (bx, by) = map(rect.right, rect.top);

    let clamp_x = |v: f32| (v * sx).round().clamp(0.0, image_width as f32) as u32;
    let clamp_y = |v: f32| (v * sy).round().clamp(0.0, image_height as f32) as u32;

    let pixels = PixelRect {
        x0: clamp_x(ax.min(bx)),
        y0: clamp_y(ay.min(by)),
        x1: clamp_x(ax.max(bx)),
        y1: clamp_y(ay.max(by)),
    };

    if pixels.x0 >= pixels.x1 || pixels.y0 >= pixels.y1 {
        None
    } else {
        Some(pixels)
    }
}

fn blend(image: &mut RgbaImage, area: PixelRect, color: [u8; 3]) {
    for y in area.y0..area.y1 {
        for x in area.x0..area.x1 {
            let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
            let mix = |base: u8, over: u8| {
                (base as f32 * (1.0 - HIT_ALPHA) + over as f32 * HIT_ALPHA).round() as u8
            };
            image.put_pixel(
                x,
                y,
                Rgba([mix(r, color[0]), mix(g, color[1]), mix(b, color[2]), a]),
            );
        }
    }
}

/// Tint the search hits of a rendered page; `current` is drawn in a
/// stronger color.
pub fn draw_hits(bitmap: &mut RenderedBitmap, hits: &[HitRect], current: Option<&HitRect>) {
    let (width, height) = bitmap.image.dimensions();
    for hit in hits {
        let color = if Some(hit) == current {
            CURRENT_HIT_COLOR
        } else {
            HIT_COLOR
        };
        if let Some(area) =
            page_rect_to_pixels(hit, bitmap.page_size, bitmap.rotation, width, height)
        {
            blend(&mut bitmap.image, area, color);
        }
    }
}

/// Invert colors for dark mode, keeping alpha
pub fn apply_dark_mode(image: &mut RgbaImage) {
    image::imageops::invert(image);
}

/// Encode a bitmap as PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image.write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}
