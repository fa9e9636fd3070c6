use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowBuilder;

use super::input::ActionStates;
use super::metrics::MetricsAccumulator;
use super::tools::{ConsoleState, OverlayData, PerfLines};
use super::{
    ConsoleLineResult, InputAction, InputSnapshot, KeyBindings, Renderer, Scene, SceneCommand,
    SceneWorld, Vec2,
};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
    pub assets_dir: PathBuf,
    pub key_bindings: KeyBindings,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Pixel Office".to_string(),
            window_width: 1280,
            window_height: 720,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(5),
            max_render_fps: None,
            assets_dir: PathBuf::from("assets"),
            key_bindings: KeyBindings::with_defaults(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, mut scene: Box<dyn Scene>) -> Result<(), AppError> {
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window), config.assets_dir.clone())
        .map_err(AppError::CreateRenderer)?;
    let initial_size = window.inner_size();

    event_loop.set_control_flow(ControlFlow::Poll);

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(5));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);

    let mut world = SceneWorld::default();
    let mut console = ConsoleState::default();
    let mut input_collector = InputCollector::new(
        config.key_bindings.clone(),
        initial_size.width,
        initial_size.height,
    );
    scene.load(&mut world);
    world.apply_pending();
    info!(node_count = world.node_count(), "scene_loaded");

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        render_fps_cap = %format_render_cap(effective_render_cap),
        key_binding_count = config.key_bindings.len(),
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics = MetricsAccumulator::new(metrics_log_interval, Instant::now());
    let mut last_applied_title: Option<String> = None;
    let mut overlay_visible = false;
    let mut pending_lines = Vec::new();

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    input_collector.set_window_size(new_size.width, new_size.height);
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    input_collector.set_window_size(size.width, size.height);
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.set_cursor_position_px(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => {
                    input_collector.clear_cursor_position();
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event, &mut console);
                }
                WindowEvent::RedrawRequested => {
                    if input_collector.take_overlay_toggle_pressed() {
                        overlay_visible = !overlay_visible;
                        info!(overlay_visible, "overlay_toggled");
                    }

                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    accumulator =
                        accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

                    let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                    let mut quit_requested = false;
                    for _ in 0..step_plan.ticks_to_run {
                        let input_snapshot = input_collector.snapshot_for_tick();
                        let command = scene.update(fixed_dt_seconds, &input_snapshot, &mut world);
                        world.apply_pending();
                        metrics.record_tick();
                        if command == SceneCommand::Quit {
                            quit_requested = true;
                            break;
                        }
                    }
                    accumulator = step_plan.remaining_accumulator;
                    if step_plan.dropped_backlog > Duration::ZERO {
                        warn!(
                            dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame, "sim_clamp_triggered"
                        );
                    }

                    console.drain_pending_lines_into(&mut pending_lines);
                    for line in pending_lines.drain(..) {
                        let result = scene.execute_console_line(&line, &mut world);
                        world.apply_pending();
                        apply_console_result(&mut console, &line, result);
                    }

                    if quit_requested {
                        info!(reason = "scene_command", "shutdown_requested");
                        window_target.exit();
                        return;
                    }

                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    let overlay = OverlayData {
                        perf: overlay_visible.then(|| PerfLines {
                            metrics: metrics.latest(),
                            render_fps_cap: effective_render_cap,
                            node_count: world.node_count(),
                        }),
                        scene_lines: scene.hud_lines(&world),
                    };
                    if let Err(error) = renderer.render_frame(&world, &overlay, &console) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();

                    let next_title = scene.debug_title(&world);
                    if next_title != last_applied_title {
                        window.set_title(next_title.as_deref().unwrap_or(&config.window_title));
                        last_applied_title = next_title;
                    }

                    metrics.record_frame(raw_frame_dt);
                    if let Some(snapshot) = metrics.maybe_snapshot(now) {
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            node_count = world.node_count(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                scene.unload(&mut world);
                world.apply_pending();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn apply_console_result(console: &mut ConsoleState, line: &str, result: ConsoleLineResult) {
    match result {
        ConsoleLineResult::Success(lines) => {
            for output in lines {
                console.append_output_line(output);
            }
        }
        ConsoleLineResult::Error(message) => {
            console.append_output_line(format!("error: {message}"));
        }
        ConsoleLineResult::ClearOutput => console.clear_output_lines(),
        ConsoleLineResult::Unsupported => {
            console.append_output_line(format!("error: no console handler for '{line}'"));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyRoute {
    Console,
    Consumed,
    Scene,
}

#[derive(Debug, Default)]
struct InputCollector {
    bindings: KeyBindings,
    action_states: ActionStates,
    console_toggle_is_down: bool,
    overlay_toggle_pressed_edge: bool,
    cursor_position_px: Option<Vec2>,
    pointer_moved_edge: bool,
    left_mouse_is_down: bool,
    left_click_pressed_edge: bool,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    fn new(bindings: KeyBindings, window_width: u32, window_height: u32) -> Self {
        Self {
            bindings,
            window_width,
            window_height,
            ..Self::default()
        }
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent, console: &mut ConsoleState) {
        let route = self.route_physical_key(key_event.physical_key, key_event.state, console);
        if route == KeyRoute::Console {
            console.handle_key_event(key_event);
        }
    }

    /// While the console is open every key except the toggle goes to the line
    /// editor and scene actions stay released.
    fn route_physical_key(
        &mut self,
        key: PhysicalKey,
        state: ElementState,
        console: &mut ConsoleState,
    ) -> KeyRoute {
        let is_pressed = state == ElementState::Pressed;
        let action = match key {
            PhysicalKey::Code(code) => self.bindings.action_for(code),
            PhysicalKey::Unidentified(_) => None,
        };

        if action == Some(InputAction::ToggleConsole) {
            if is_pressed && !self.console_toggle_is_down {
                console.toggle_open();
                self.action_states.release_all();
                info!(console_open = console.is_open(), "console_toggled");
            }
            self.console_toggle_is_down = is_pressed;
            return KeyRoute::Consumed;
        }

        if console.is_open() {
            return KeyRoute::Console;
        }

        let Some(action) = action else {
            return KeyRoute::Consumed;
        };
        if action == InputAction::ToggleOverlay && is_pressed && !self.action_states.is_down(action)
        {
            self.overlay_toggle_pressed_edge = true;
        }
        self.action_states.set(action, is_pressed);
        KeyRoute::Scene
    }

    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(
            self.action_states,
            self.cursor_position_px,
            self.pointer_moved_edge,
            self.left_click_pressed_edge,
            self.window_width,
            self.window_height,
        );
        self.action_states.clear_pressed_edges();
        self.pointer_moved_edge = false;
        self.left_click_pressed_edge = false;
        snapshot
    }

    fn take_overlay_toggle_pressed(&mut self) -> bool {
        std::mem::take(&mut self.overlay_toggle_pressed_edge)
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    fn set_cursor_position_px(&mut self, x: f32, y: f32) {
        self.cursor_position_px = Some(Vec2 { x, y });
        self.pointer_moved_edge = true;
    }

    fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        if button != MouseButton::Left {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.left_mouse_is_down {
                    self.left_click_pressed_edge = true;
                }
                self.left_mouse_is_down = true;
            }
            ElementState::Released => self.left_mouse_is_down = false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use winit::keyboard::KeyCode;

    use super::*;

    fn collector() -> InputCollector {
        InputCollector::new(KeyBindings::with_defaults(), 1280, 720)
    }

    fn press(input: &mut InputCollector, console: &mut ConsoleState, code: KeyCode) -> KeyRoute {
        input.route_physical_key(PhysicalKey::Code(code), ElementState::Pressed, console)
    }

    fn release(input: &mut InputCollector, console: &mut ConsoleState, code: KeyCode) -> KeyRoute {
        input.route_physical_key(PhysicalKey::Code(code), ElementState::Released, console)
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let result = plan_sim_steps(Duration::from_millis(48), Duration::from_millis(16), 5);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let result = plan_sim_steps(Duration::from_millis(120), Duration::from_millis(16), 3);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn escape_press_edge_lasts_one_tick() {
        let mut input = collector();
        let mut console = ConsoleState::default();

        assert_eq!(press(&mut input, &mut console, KeyCode::Escape), KeyRoute::Scene);
        let first = input.snapshot_for_tick();
        press(&mut input, &mut console, KeyCode::Escape);
        let held = input.snapshot_for_tick();
        release(&mut input, &mut console, KeyCode::Escape);
        press(&mut input, &mut console, KeyCode::Escape);
        let again = input.snapshot_for_tick();

        assert!(first.just_pressed(InputAction::Cancel));
        assert!(!held.just_pressed(InputAction::Cancel));
        assert!(held.is_down(InputAction::Cancel));
        assert!(again.just_pressed(InputAction::Cancel));
    }

    #[test]
    fn wasd_and_arrow_keys_map_to_actions() {
        let mut input = collector();
        let mut console = ConsoleState::default();
        press(&mut input, &mut console, KeyCode::KeyW);
        press(&mut input, &mut console, KeyCode::ArrowLeft);

        let snapshot = input.snapshot_for_tick();
        assert!(snapshot.is_down(InputAction::MoveUp));
        assert!(snapshot.is_down(InputAction::MoveLeft));
        assert!(!snapshot.is_down(InputAction::MoveRight));
    }

    #[test]
    fn open_console_captures_keys_and_releases_actions() {
        let mut input = collector();
        let mut console = ConsoleState::default();
        press(&mut input, &mut console, KeyCode::KeyD);

        assert_eq!(
            press(&mut input, &mut console, KeyCode::Backquote),
            KeyRoute::Consumed
        );
        assert!(console.is_open());
        assert_eq!(press(&mut input, &mut console, KeyCode::KeyW), KeyRoute::Console);

        let snapshot = input.snapshot_for_tick();
        assert!(!snapshot.is_down(InputAction::MoveRight));
        assert!(!snapshot.is_down(InputAction::MoveUp));

        release(&mut input, &mut console, KeyCode::Backquote);
        press(&mut input, &mut console, KeyCode::Backquote);
        assert!(!console.is_open());
        assert_eq!(press(&mut input, &mut console, KeyCode::KeyW), KeyRoute::Scene);
    }

    #[test]
    fn held_console_toggle_does_not_flap() {
        let mut input = collector();
        let mut console = ConsoleState::default();
        press(&mut input, &mut console, KeyCode::Backquote);
        press(&mut input, &mut console, KeyCode::Backquote);
        assert!(console.is_open());
    }

    #[test]
    fn f3_toggle_is_edge_triggered() {
        let mut input = collector();
        let mut console = ConsoleState::default();

        press(&mut input, &mut console, KeyCode::F3);
        assert!(input.take_overlay_toggle_pressed());
        press(&mut input, &mut console, KeyCode::F3);
        assert!(!input.take_overlay_toggle_pressed());
        release(&mut input, &mut console, KeyCode::F3);
        press(&mut input, &mut console, KeyCode::F3);
        assert!(input.take_overlay_toggle_pressed());
    }

    #[test]
    fn left_click_and_pointer_move_are_single_tick_edges() {
        let mut input = collector();
        input.set_cursor_position_px(100.0, 200.0);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        let first = input.snapshot_for_tick();
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        let second = input.snapshot_for_tick();

        assert!(first.left_click_pressed());
        assert!(first.pointer_moved());
        assert!(!second.left_click_pressed());
        assert!(!second.pointer_moved());
        assert_eq!(second.cursor_position_px(), Some(Vec2::new(100.0, 200.0)));
        assert_eq!(second.window_size(), (1280, 720));
    }

    #[test]
    fn right_click_is_ignored() {
        let mut input = collector();
        input.handle_mouse_input(MouseButton::Right, ElementState::Pressed);
        assert!(!input.snapshot_for_tick().left_click_pressed());
    }

    #[test]
    fn console_results_map_to_output_lines() {
        let mut console = ConsoleState::default();
        apply_console_result(
            &mut console,
            "agents",
            ConsoleLineResult::Success(vec!["Ada".to_string()]),
        );
        apply_console_result(
            &mut console,
            "bogus",
            ConsoleLineResult::Error("unknown command 'bogus'. try: help".to_string()),
        );
        let lines: Vec<&str> = console.output_lines().collect();
        assert_eq!(lines, vec!["Ada", "error: unknown command 'bogus'. try: help"]);

        apply_console_result(&mut console, "clear", ConsoleLineResult::ClearOutput);
        assert_eq!(console.output_lines().count(), 0);
    }

    #[test]
    fn render_cap_helpers() {
        assert_eq!(target_frame_duration(None), None);
        assert_eq!(normalize_render_fps_cap(Some(0)), None);
        assert_eq!(
            compute_cap_sleep(Duration::from_millis(20), target_frame_duration(Some(60))),
            Duration::ZERO
        );
        assert!(compute_cap_sleep(Duration::from_millis(5), target_frame_duration(Some(60))) > Duration::ZERO);
        assert_eq!(format_render_cap(Some(144)), "144");
    }
}
