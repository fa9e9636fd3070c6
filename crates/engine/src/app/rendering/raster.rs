//! Clipped RGBA8 pixel primitives over a `pixels` frame buffer.

/// Source-over blend of `color` onto the frame; alpha 255 overwrites.
pub(crate) fn blend_pixel(frame: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let alpha = color[3];
    if alpha == 0 {
        return;
    }
    let Some(pixel_offset) = (y as usize)
        .checked_mul(width as usize)
        .and_then(|row| row.checked_add(x as usize))
    else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(dst) = frame.get_mut(byte_offset..byte_offset + 4) else {
        return;
    };

    if alpha == 255 {
        dst.copy_from_slice(&color);
        return;
    }
    let src_weight = alpha as u16;
    let dst_weight = 255 - src_weight;
    for channel in 0..3 {
        dst[channel] =
            ((color[channel] as u16 * src_weight + dst[channel] as u16 * dst_weight) / 255) as u8;
    }
    dst[3] = 255;
}

pub(crate) fn clear(frame: &mut [u8], color: [u8; 4]) {
    for pixel in frame.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn fill_rect(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: [u8; 4],
) {
    let start_x = x.max(0);
    let start_y = y.max(0);
    let end_x = x.saturating_add(rect_width).min(width as i32);
    let end_y = y.saturating_add(rect_height).min(height as i32);
    for py in start_y..end_y {
        for px in start_x..end_x {
            blend_pixel(frame, width, height, px, py, color);
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn rect_outline(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: [u8; 4],
) {
    if rect_width <= 1 || rect_height <= 1 {
        return;
    }
    fill_rect(frame, width, height, x, y, rect_width, 1, color);
    fill_rect(frame, width, height, x, y + rect_height - 1, rect_width, 1, color);
    fill_rect(frame, width, height, x, y + 1, 1, rect_height - 2, color);
    fill_rect(frame, width, height, x + rect_width - 1, y + 1, 1, rect_height - 2, color);
}

/// Fills every pixel whose center lies within `radius` of `(cx, cy)`.
pub(crate) fn fill_circle(
    frame: &mut [u8],
    width: u32,
    height: u32,
    cx: i32,
    cy: i32,
    radius: f32,
    color: [u8; 4],
) {
    annulus(frame, width, height, cx, cy, 0.0, radius, color);
}

/// Ring centered on `radius` with the given line width.
#[allow(clippy::too_many_arguments)]
pub(crate) fn stroke_circle(
    frame: &mut [u8],
    width: u32,
    height: u32,
    cx: i32,
    cy: i32,
    radius: f32,
    line_width: f32,
    color: [u8; 4],
) {
    let half = (line_width.max(1.0)) * 0.5;
    annulus(
        frame,
        width,
        height,
        cx,
        cy,
        (radius - half).max(0.0),
        radius + half,
        color,
    );
}

#[allow(clippy::too_many_arguments)]
fn annulus(
    frame: &mut [u8],
    width: u32,
    height: u32,
    cx: i32,
    cy: i32,
    inner: f32,
    outer: f32,
    color: [u8; 4],
) {
    if !outer.is_finite() || outer <= 0.0 || width == 0 || height == 0 {
        return;
    }
    let reach = outer.ceil() as i32;
    let inner_sq = inner * inner;
    let outer_sq = outer * outer;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let dist_sq = (dx * dx + dy * dy) as f32;
            if dist_sq > outer_sq || (inner > 0.0 && dist_sq < inner_sq) {
                continue;
            }
            blend_pixel(frame, width, height, cx + dx, cy + dy, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    #[test]
    fn half_alpha_blends_toward_source() {
        let mut frame = vec![0u8; 4];
        clear(&mut frame, [0, 0, 0, 255]);
        blend_pixel(&mut frame, 1, 1, 0, 0, [255, 0, 0, 128]);
        assert_eq!(pixel(&frame, 1, 0, 0), [128, 0, 0, 255]);
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut frame = vec![0u8; 2 * 2 * 4];
        blend_pixel(&mut frame, 2, 2, -1, 0, [255; 4]);
        blend_pixel(&mut frame, 2, 2, 2, 0, [255; 4]);
        fill_rect(&mut frame, 2, 2, -10, -10, 5, 5, [255; 4]);
        assert!(frame.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn stroke_leaves_center_untouched() {
        let mut frame = vec![0u8; 64 * 64 * 4];
        stroke_circle(&mut frame, 64, 64, 32, 32, 20.0, 2.0, [255; 4]);
        assert_eq!(pixel(&frame, 64, 32, 32), [0; 4]);
        assert_eq!(pixel(&frame, 64, 52, 32), [255; 4]);

        fill_circle(&mut frame, 64, 64, 32, 32, 5.0, [9, 9, 9, 255]);
        assert_eq!(pixel(&frame, 64, 32, 32), [9, 9, 9, 255]);
    }

    #[test]
    fn outline_draws_only_the_border() {
        let mut frame = vec![0u8; 8 * 8 * 4];
        rect_outline(&mut frame, 8, 8, 1, 1, 6, 6, [255; 4]);
        assert_eq!(pixel(&frame, 8, 1, 1), [255; 4]);
        assert_eq!(pixel(&frame, 8, 6, 6), [255; 4]);
        assert_eq!(pixel(&frame, 8, 3, 3), [0; 4]);
    }
}
