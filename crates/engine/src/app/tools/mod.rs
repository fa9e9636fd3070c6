mod console;
mod overlay;

pub(crate) use console::{draw_console, ConsoleState};
pub use overlay::HudLine;
pub(crate) use overlay::{draw_overlay, OverlayData, PerfLines};
