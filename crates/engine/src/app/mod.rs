mod graphics;
mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;
mod tools;

pub use graphics::{Color, Graphics, Shape};
pub use input::{InputAction, KeyBindings};
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use metrics::LoopMetricsSnapshot;
pub use rendering::{screen_to_world_px, world_to_screen, world_to_screen_px, Renderer, Viewport};
pub use scene::{
    Camera2D, ConsoleLineResult, HitArea, InputSnapshot, LabelDesc, NodeDesc, NodeId, Scene,
    SceneCommand, SceneWorld, SpriteDesc, Tilemap, TilemapError, Vec2, VisualNode,
    CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN,
};
pub use tools::HudLine;
