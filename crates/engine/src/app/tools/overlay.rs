use crate::app::graphics::Color;
use crate::app::rendering::{draw_text_clipped, fill_rect, glyph_advance, line_advance, rect_outline};
use crate::app::LoopMetricsSnapshot;

const TEXT_SCALE: i32 = 2;
const OVERLAY_PADDING: i32 = 6 * TEXT_SCALE;
const OVERLAY_PANEL_INSET_X: i32 = 4 * TEXT_SCALE;
const OVERLAY_PANEL_INSET_Y: i32 = 3 * TEXT_SCALE;
const OVERLAY_TEXT_PRIMARY_COLOR: Color = Color::from_hex(0xf4f8fc);
const OVERLAY_TEXT_DIM_COLOR: Color = Color::from_hex(0xb0c6dc);
const OVERLAY_PANEL_BG_COLOR: [u8; 4] = [10, 12, 16, 210];
const OVERLAY_PANEL_BORDER_COLOR: [u8; 4] = [92, 106, 126, 255];

/// One row of the HUD panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HudLine {
    pub text: String,
    pub color: Color,
}

impl HudLine {
    pub fn primary(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: OVERLAY_TEXT_PRIMARY_COLOR,
        }
    }

    pub fn dim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: OVERLAY_TEXT_DIM_COLOR,
        }
    }

    pub fn colored(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }

    pub fn blank() -> Self {
        Self::primary(String::new())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct OverlayData {
    pub perf: Option<PerfLines>,
    pub scene_lines: Vec<HudLine>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PerfLines {
    pub metrics: LoopMetricsSnapshot,
    pub render_fps_cap: Option<u32>,
    pub node_count: usize,
}

pub(crate) fn draw_overlay(frame: &mut [u8], width: u32, height: u32, data: &OverlayData) {
    if width == 0 || height == 0 {
        return;
    }

    let lines = build_overlay_lines(data);
    if lines.is_empty() {
        return;
    }

    let longest_line_chars = lines
        .iter()
        .map(|line| line.text.chars().count() as i32)
        .max()
        .unwrap_or(0);
    let row_height = line_advance(TEXT_SCALE);
    let panel_width = longest_line_chars * glyph_advance(TEXT_SCALE) + OVERLAY_PANEL_INSET_X * 2;
    let panel_height = lines.len() as i32 * row_height + OVERLAY_PANEL_INSET_Y * 2;
    let panel_left = OVERLAY_PADDING - OVERLAY_PANEL_INSET_X;
    let panel_top = OVERLAY_PADDING - OVERLAY_PANEL_INSET_Y;
    fill_rect(
        frame,
        width,
        height,
        panel_left,
        panel_top,
        panel_width,
        panel_height,
        OVERLAY_PANEL_BG_COLOR,
    );
    rect_outline(
        frame,
        width,
        height,
        panel_left,
        panel_top,
        panel_width,
        panel_height,
        OVERLAY_PANEL_BORDER_COLOR,
    );

    let mut y = OVERLAY_PADDING;
    for line in &lines {
        draw_text_clipped(
            frame,
            width,
            height,
            OVERLAY_PADDING,
            y,
            &line.text,
            TEXT_SCALE,
            line.color.to_rgba(1.0),
        );
        y += row_height;
    }
}

fn build_overlay_lines(data: &OverlayData) -> Vec<HudLine> {
    let mut lines = Vec::new();
    if let Some(perf) = data.perf {
        lines.push(HudLine::primary(format_fps_line(
            perf.metrics.fps,
            perf.metrics.tps,
            perf.render_fps_cap,
        )));
        lines.push(HudLine::dim(format!(
            "frame {:.2} ms  nodes {}",
            perf.metrics.frame_time_ms, perf.node_count
        )));
        if !data.scene_lines.is_empty() {
            lines.push(HudLine::blank());
        }
    }
    lines.extend(data.scene_lines.iter().cloned());
    lines
}

fn format_fps_line(fps: f32, tps: f32, cap: Option<u32>) -> String {
    let cap_text = match cap {
        Some(value) => value.to_string(),
        None => "inf".to_string(),
    };
    format!("[{fps:.0} / {cap_text}] tps {tps:.0}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_perf_and_no_scene_lines_draws_nothing() {
        let mut frame = vec![0u8; 64 * 64 * 4];
        draw_overlay(&mut frame, 64, 64, &OverlayData::default());
        assert!(frame.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn perf_section_precedes_scene_lines_with_spacer() {
        let data = OverlayData {
            perf: Some(PerfLines {
                metrics: LoopMetricsSnapshot {
                    fps: 59.6,
                    tps: 60.0,
                    frame_time_ms: 16.7,
                },
                render_fps_cap: None,
                node_count: 3,
            }),
            scene_lines: vec![HudLine::primary("Ada - Researcher")],
        };
        let lines = build_overlay_lines(&data);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].text, "[60 / inf] tps 60");
        assert_eq!(lines[1].text, "frame 16.70 ms  nodes 3");
        assert_eq!(lines[2].text, "");
        assert_eq!(lines[3].text, "Ada - Researcher");
    }

    #[test]
    fn draw_overlay_writes_backing_plate_pixels() {
        let data = OverlayData {
            perf: None,
            scene_lines: vec![HudLine::dim("placing agent")],
        };
        let mut frame = vec![0u8; 320 * 180 * 4];
        draw_overlay(&mut frame, 320, 180, &data);
        assert!(frame.chunks_exact(4).any(|px| px != [0, 0, 0, 0]));
    }
}
