mod font;
mod raster;
mod renderer;
mod transform;

pub(crate) use font::{draw_text_clipped, glyph_advance, line_advance};
pub(crate) use raster::{fill_rect, rect_outline};
pub use renderer::Renderer;
pub use transform::{screen_to_world_px, world_to_screen, world_to_screen_px, Viewport};
