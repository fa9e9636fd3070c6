use crate::app::{Camera2D, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn from_window_size(window_size: (u32, u32)) -> Self {
        Self {
            width: window_size.0,
            height: window_size.1,
        }
    }

    fn center(self) -> Vec2 {
        Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5)
    }
}

/// Camera position lands on the viewport center; both axes grow right/down.
pub fn world_to_screen(world: Vec2, camera: &Camera2D, viewport: Viewport) -> Vec2 {
    let zoom = camera.effective_zoom();
    let center = viewport.center();
    Vec2::new(
        (world.x - camera.position.x) * zoom + center.x,
        (world.y - camera.position.y) * zoom + center.y,
    )
}

pub fn world_to_screen_px(world: Vec2, camera: &Camera2D, viewport: Viewport) -> (i32, i32) {
    let screen = world_to_screen(world, camera, viewport);
    (screen.x.round() as i32, screen.y.round() as i32)
}

pub fn screen_to_world_px(screen_px: Vec2, camera: &Camera2D, viewport: Viewport) -> Vec2 {
    let zoom = camera.effective_zoom();
    let center = viewport.center();
    Vec2::new(
        (screen_px.x - center.x) / zoom + camera.position.x,
        (screen_px.y - center.y) / zoom + camera.position.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Viewport = Viewport {
        width: 800,
        height: 600,
    };

    #[test]
    fn camera_position_maps_to_viewport_center() {
        let camera = Camera2D {
            position: Vec2::new(705.0, 500.0),
            zoom: 1.5,
        };
        assert_eq!(
            world_to_screen_px(Vec2::new(705.0, 500.0), &camera, VIEWPORT),
            (400, 300)
        );
    }

    #[test]
    fn zoom_scales_offsets_from_camera() {
        let camera = Camera2D {
            position: Vec2::new(100.0, 100.0),
            zoom: 2.0,
        };
        assert_eq!(
            world_to_screen_px(Vec2::new(110.0, 95.0), &camera, VIEWPORT),
            (420, 290)
        );
    }

    #[test]
    fn screen_to_world_inverts_world_to_screen() {
        let camera = Camera2D {
            position: Vec2::new(320.0, 240.0),
            zoom: 1.5,
        };
        let world = Vec2::new(333.0, 198.0);
        let screen = world_to_screen(world, &camera, VIEWPORT);
        let back = screen_to_world_px(screen, &camera, VIEWPORT);
        assert!((back.x - world.x).abs() < 0.001);
        assert!((back.y - world.y).abs() < 0.001);
    }
}
