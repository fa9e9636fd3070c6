use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::app::graphics::{alpha_to_u8, Color, Shape};
use crate::app::tools::{draw_console, draw_overlay, ConsoleState, OverlayData};
use crate::app::{Camera2D, LabelDesc, SceneWorld, SpriteDesc, Tilemap, Vec2, VisualNode};
use crate::asset_keys::sprite_image_path;

use super::font::{draw_text_stroked, line_advance, text_width_px};
use super::raster::{blend_pixel, clear, fill_circle, fill_rect, stroke_circle};
use super::{world_to_screen_px, Viewport};

const CLEAR_COLOR: [u8; 4] = [18, 20, 26, 255];
const FLOOR_COLOR_A: Color = Color::from_hex(0x3b3f4a);
const FLOOR_COLOR_B: Color = Color::from_hex(0x363a44);
const WALL_COLOR: Color = Color::from_hex(0x1f2330);
const PLACEHOLDER_COLOR: Color = Color::from_hex(0xdcdcf0);
const PLACEHOLDER_RADIUS_WORLD: f32 = 10.0;
const LABEL_TEXT_SCALE: i32 = 2;

#[derive(Debug)]
struct LoadedSprite {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    assets_dir: PathBuf,
    sprite_cache: HashMap<String, Option<LoadedSprite>>,
    warned_missing_sprite_keys: HashSet<String>,
    draw_order: Vec<usize>,
}

impl Renderer {
    pub fn new(window: Arc<Window>, assets_dir: PathBuf) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            assets_dir,
            sprite_cache: HashMap::new(),
            warned_missing_sprite_keys: HashSet::new(),
            draw_order: Vec::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub(crate) fn render_frame(
        &mut self,
        world: &SceneWorld,
        overlay: &OverlayData,
        console: &ConsoleState,
    ) -> Result<(), Error> {
        let Viewport { width, height } = self.viewport;
        let frame = self.pixels.frame_mut();
        clear(frame, CLEAR_COLOR);

        if let Some(tilemap) = world.tilemap() {
            draw_tilemap(frame, self.viewport, world.camera(), tilemap);
        }

        collect_draw_order(world.nodes(), &mut self.draw_order);
        for &index in &self.draw_order {
            let node = &world.nodes()[index];
            draw_node(
                frame,
                self.viewport,
                world.camera(),
                node,
                &mut self.sprite_cache,
                &mut self.warned_missing_sprite_keys,
                &self.assets_dir,
            );
        }

        draw_overlay(frame, width, height, overlay);
        draw_console(frame, width, height, console);
        self.pixels.render()
    }
}

/// Back to front: ascending depth, then spawn order.
fn collect_draw_order(nodes: &[VisualNode], out: &mut Vec<usize>) {
    out.clear();
    out.extend(0..nodes.len());
    out.sort_by(|&a, &b| {
        nodes[a]
            .depth
            .total_cmp(&nodes[b].depth)
            .then(nodes[a].spawn_order().cmp(&nodes[b].spawn_order()))
    });
}

fn draw_tilemap(frame: &mut [u8], viewport: Viewport, camera: &Camera2D, tilemap: &Tilemap) {
    let tile_w = tilemap.tile_width() as f32;
    let tile_h = tilemap.tile_height() as f32;
    for y in 0..tilemap.height() {
        for x in 0..tilemap.width() {
            let Some(gid) = tilemap.tile_at(x, y) else {
                continue;
            };
            if gid == 0 {
                continue;
            }
            let top_left = Vec2::new(x as f32 * tile_w, y as f32 * tile_h);
            let bottom_right = Vec2::new(top_left.x + tile_w, top_left.y + tile_h);
            let (left, top) = world_to_screen_px(top_left, camera, viewport);
            let (right, bottom) = world_to_screen_px(bottom_right, camera, viewport);
            if right < 0 || bottom < 0 || left >= viewport.width as i32 || top >= viewport.height as i32
            {
                continue;
            }
            let color = if tilemap.is_colliding_gid(gid) {
                WALL_COLOR
            } else if (x + y) % 2 == 0 {
                FLOOR_COLOR_A
            } else {
                FLOOR_COLOR_B
            };
            fill_rect(
                frame,
                viewport.width,
                viewport.height,
                left,
                top,
                right - left,
                bottom - top,
                color.to_rgba(1.0),
            );
        }
    }
}

fn draw_node(
    frame: &mut [u8],
    viewport: Viewport,
    camera: &Camera2D,
    node: &VisualNode,
    sprite_cache: &mut HashMap<String, Option<LoadedSprite>>,
    warned_missing_sprite_keys: &mut HashSet<String>,
    assets_dir: &Path,
) {
    let zoom = camera.effective_zoom();
    let (cx, cy) = world_to_screen_px(node.position, camera, viewport);

    if let Some(graphics) = node.graphics.as_ref() {
        for shape in graphics.shapes() {
            draw_shape(frame, viewport, cx, cy, *shape, zoom);
        }
    }

    if let Some(sprite) = node.sprite.as_ref() {
        let loaded = sprite_candidate_keys(sprite)
            .into_iter()
            .find(|key| {
                resolve_cached_sprite(sprite_cache, warned_missing_sprite_keys, assets_dir, key)
                    .is_some()
            })
            .and_then(|key| sprite_cache.get(key))
            .and_then(Option::as_ref);
        match loaded {
            Some(loaded) => {
                draw_sprite_centered_scaled(frame, viewport, cx, cy, loaded, sprite, zoom);
            }
            None => {
                let color = sprite
                    .tint
                    .map_or(PLACEHOLDER_COLOR, |tint| PLACEHOLDER_COLOR.multiply(tint));
                fill_circle(
                    frame,
                    viewport.width,
                    viewport.height,
                    cx,
                    cy,
                    PLACEHOLDER_RADIUS_WORLD * sprite.scale * zoom,
                    color.to_rgba(sprite.alpha),
                );
            }
        }
    }

    if let Some(label) = node.label.as_ref() {
        draw_label(frame, viewport, camera, node.position, label);
    }
}

fn sprite_candidate_keys(sprite: &SpriteDesc) -> Vec<&str> {
    let mut keys = Vec::with_capacity(2);
    if let Some(animation) = sprite.animation.as_deref() {
        keys.push(animation);
    }
    keys.push(sprite.texture_key.as_str());
    keys
}

fn draw_shape(frame: &mut [u8], viewport: Viewport, cx: i32, cy: i32, shape: Shape, zoom: f32) {
    match shape {
        Shape::FillCircle {
            radius,
            color,
            alpha,
        } => fill_circle(
            frame,
            viewport.width,
            viewport.height,
            cx,
            cy,
            radius * zoom,
            color.to_rgba(alpha),
        ),
        Shape::StrokeCircle {
            radius,
            line_width,
            color,
            alpha,
        } => stroke_circle(
            frame,
            viewport.width,
            viewport.height,
            cx,
            cy,
            radius * zoom,
            line_width * zoom,
            color.to_rgba(alpha),
        ),
    }
}

fn draw_label(
    frame: &mut [u8],
    viewport: Viewport,
    camera: &Camera2D,
    anchor: Vec2,
    label: &LabelDesc,
) {
    let origin = Vec2::new(anchor.x + label.offset.x, anchor.y + label.offset.y);
    let (x, y) = world_to_screen_px(origin, camera, viewport);
    let left = x - text_width_px(&label.text, LABEL_TEXT_SCALE) / 2;
    let top = y - line_advance(LABEL_TEXT_SCALE) / 2;
    let stroke = label.stroke.unwrap_or(label.color).to_rgba(1.0);
    draw_text_stroked(
        frame,
        viewport.width,
        viewport.height,
        left,
        top,
        &label.text,
        LABEL_TEXT_SCALE,
        label.color.to_rgba(1.0),
        stroke,
    );
}

fn resolve_cached_sprite<'a>(
    cache: &'a mut HashMap<String, Option<LoadedSprite>>,
    warned_missing_sprite_keys: &mut HashSet<String>,
    assets_dir: &Path,
    key: &str,
) -> Option<&'a LoadedSprite> {
    if !cache.contains_key(key) {
        let sprite = match sprite_image_path(assets_dir, key) {
            Ok(path) => match load_sprite_rgba(&path) {
                Ok(sprite) => Some(sprite),
                Err(reason) => {
                    warn_sprite_load_once(warned_missing_sprite_keys, key, Some(&path), &reason);
                    None
                }
            },
            Err(error) => {
                warn_sprite_load_once(
                    warned_missing_sprite_keys,
                    key,
                    None,
                    &format!("invalid_key:{error}"),
                );
                None
            }
        };
        cache.insert(key.to_string(), sprite);
    }
    cache.get(key).and_then(Option::as_ref)
}

fn load_sprite_rgba(path: &Path) -> Result<LoadedSprite, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedSprite {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

fn warn_sprite_load_once(
    warned_keys: &mut HashSet<String>,
    key: &str,
    resolved_path: Option<&Path>,
    reason: &str,
) {
    if !warned_keys.insert(key.to_string()) {
        return;
    }
    let path_display = resolved_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unresolved>".to_string());
    warn!(
        sprite_key = key,
        path = %path_display,
        reason = reason,
        "renderer_sprite_load_failed_using_placeholder"
    );
}

fn normalized_sprite_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

fn scaled_sprite_dimensions(sprite: &LoadedSprite, scale: f32) -> (u32, u32) {
    let scale = normalized_sprite_scale(scale);
    let width = (sprite.width as f32 * scale).round().max(1.0) as u32;
    let height = (sprite.height as f32 * scale).round().max(1.0) as u32;
    (width, height)
}

/// Nearest-neighbour blit with per-node alpha and multiplicative tint.
fn draw_sprite_centered_scaled(
    frame: &mut [u8],
    viewport: Viewport,
    center_x: i32,
    center_y: i32,
    sprite: &LoadedSprite,
    desc: &SpriteDesc,
    zoom: f32,
) {
    let Viewport { width, height } = viewport;
    if sprite.width == 0 || sprite.height == 0 || width == 0 || height == 0 {
        return;
    }
    let expected_rgba_len = sprite.width as usize * sprite.height as usize * 4;
    if sprite.rgba.len() < expected_rgba_len {
        return;
    }
    let node_alpha = alpha_to_u8(desc.alpha) as u16;
    if node_alpha == 0 {
        return;
    }

    let scale = normalized_sprite_scale(desc.scale * zoom);
    let inv_scale = scale.recip();
    let (scaled_w, scaled_h) = scaled_sprite_dimensions(sprite, scale);
    let left = center_x - (scaled_w as i32 / 2);
    let top = center_y - (scaled_h as i32 / 2);
    let draw_left = left.max(0);
    let draw_top = top.max(0);
    let draw_right = (left + scaled_w as i32).min(width as i32);
    let draw_bottom = (top + scaled_h as i32).min(height as i32);

    let sprite_width = sprite.width as usize;
    for out_y in draw_top..draw_bottom {
        let src_y = (((out_y - top) as f32) * inv_scale).floor() as u32;
        let src_row_offset = src_y.min(sprite.height - 1) as usize * sprite_width * 4;

        for out_x in draw_left..draw_right {
            let src_x = (((out_x - left) as f32) * inv_scale).floor() as u32;
            let src_offset = src_row_offset + src_x.min(sprite.width - 1) as usize * 4;
            let src_alpha = sprite.rgba[src_offset + 3] as u16;
            if src_alpha == 0 {
                continue;
            }
            let mut texel = Color {
                r: sprite.rgba[src_offset],
                g: sprite.rgba[src_offset + 1],
                b: sprite.rgba[src_offset + 2],
            };
            if let Some(tint) = desc.tint {
                texel = texel.multiply(tint);
            }
            let alpha = (src_alpha * node_alpha / 255) as u8;
            blend_pixel(
                frame,
                width,
                height,
                out_x,
                out_y,
                [texel.r, texel.g, texel.b, alpha],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{NodeDesc, SceneWorld};
    use tempfile::TempDir;

    fn solid_sprite(width: u32, height: u32, rgba: [u8; 4]) -> LoadedSprite {
        LoadedSprite {
            width,
            height,
            rgba: rgba.repeat((width * height) as usize),
        }
    }

    #[test]
    fn draw_order_sorts_by_depth_then_spawn_order() {
        let mut world = SceneWorld::default();
        for depth in [300.0, 100.0, 100.0, 10_000.0] {
            world.spawn_node(NodeDesc {
                depth,
                ..NodeDesc::default()
            });
        }
        world.apply_pending();

        let mut order = Vec::new();
        collect_draw_order(world.nodes(), &mut order);
        assert_eq!(order, vec![1, 2, 0, 3]);
    }

    #[test]
    fn animation_key_is_tried_before_texture_key() {
        let sprite = SpriteDesc::new("adam").playing("adam_idle_down");
        assert_eq!(sprite_candidate_keys(&sprite), vec!["adam_idle_down", "adam"]);
        assert_eq!(sprite_candidate_keys(&SpriteDesc::new("ash")), vec!["ash"]);
    }

    #[test]
    fn missing_sprite_is_cached_as_absent_and_warned_once() {
        let temp = TempDir::new().expect("temp");
        let mut cache = HashMap::new();
        let mut warned = HashSet::new();

        assert!(resolve_cached_sprite(&mut cache, &mut warned, temp.path(), "lucy").is_none());
        assert!(resolve_cached_sprite(&mut cache, &mut warned, temp.path(), "lucy").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(warned.len(), 1);
    }

    #[test]
    fn tinted_half_alpha_sprite_blends_into_frame() {
        let mut frame = vec![0u8; 4 * 4 * 4];
        clear(&mut frame, [0, 0, 0, 255]);
        let sprite = solid_sprite(2, 2, [255, 255, 255, 255]);
        let mut desc = SpriteDesc::new("nancy");
        desc.alpha = 0.6;
        desc.tint = Some(Color::from_hex(0xff4444));

        let viewport = Viewport {
            width: 4,
            height: 4,
        };
        draw_sprite_centered_scaled(&mut frame, viewport, 2, 2, &sprite, &desc, 1.0);

        let offset = (2 * 4 + 2) * 4;
        assert_eq!(frame[offset], 153);
        assert_eq!(frame[offset + 1], 40);
        assert_eq!(frame[offset + 3], 255);
    }

    #[test]
    fn scaled_dimensions_follow_zoom() {
        let sprite = solid_sprite(16, 32, [255; 4]);
        assert_eq!(scaled_sprite_dimensions(&sprite, 1.5), (24, 48));
        assert_eq!(scaled_sprite_dimensions(&sprite, f32::NAN), (16, 32));
    }
}
