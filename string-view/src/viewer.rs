//! Interactive closed-string viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns a [`StringSimulation`] and
//! implements [`eframe::App`] to render the loops as projected polylines and
//! control the simulation through an egui UI.

use eframe::App;
use glam::{Mat3, Vec2, Vec3};
use rand::{Rng, rng};
use string_core::{DaughterResolution, SeedShape, SimConfig, SimError, StringSimulation};

/// Line colors indexed by a loop's color id, cycling past the end.
const PALETTE: [egui::Color32; 8] = [
    egui::Color32::from_rgb(102, 194, 255),
    egui::Color32::from_rgb(255, 140, 102),
    egui::Color32::from_rgb(140, 230, 120),
    egui::Color32::from_rgb(230, 120, 230),
    egui::Color32::from_rgb(250, 220, 90),
    egui::Color32::from_rgb(120, 230, 220),
    egui::Color32::from_rgb(200, 160, 255),
    egui::Color32::from_rgb(255, 110, 150),
];

/// Tension slider range.
const TENSION_RANGE: std::ops::RangeInclusive<f64> = 0.05..=10.0;

/// Seed point-count range offered in the config panel.
const SEED_POINTS_RANGE: std::ops::RangeInclusive<usize> = 8..=256;

/// Largest `ω_max · dt` the viewer lets a sub-step reach. Velocity Verlet
/// is stable below 2.
const MAX_COURANT: f64 = 1.5;

/// `ω_max · dt` of the highest wave mode of an `points`-point loop.
pub fn courant(points: usize, tension: f64, dt: f64) -> f64 {
    2.0 * tension.max(0.0).sqrt() * points as f64 / std::f64::consts::TAU * dt
}

/// Fewest sub-steps that keep a frame of `frame_dt` within [`MAX_COURANT`]
/// for loops of up to `points` points at up to `tension`.
pub fn required_substeps(points: usize, tension: f64, frame_dt: f64) -> usize {
    let c = courant(points, tension, frame_dt);
    ((c / MAX_COURANT).ceil() as usize).max(1)
}

/// Most points any loop can reach under `cfg`.
fn point_bound(cfg: &SimConfig) -> usize {
    let daughters = match cfg.daughter_resolution {
        DaughterResolution::Density { max_points, .. } => max_points,
        _ => cfg.seed_points,
    };
    let drift = cfg.drift_resample.map_or(0, |d| d.max_points);
    cfg.seed_points.max(daughters).max(drift)
}

/// One loop decoded from the flattened engine buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopView {
    pub color: u32,
    pub points: Vec<Vec3>,
}

/// Splits the `positions()` buffer into per-loop point lists.
///
/// The buffer is `[count, then per loop: n, color, x0, y0, z0, ...]`.
/// A truncated buffer yields the loops that were complete.
pub fn decode_positions(buf: &[f64]) -> Vec<LoopView> {
    let Some((&count, mut rest)) = buf.split_first() else {
        return Vec::new();
    };
    let mut loops = Vec::with_capacity(count as usize);
    for _ in 0..count as usize {
        let [n, color, tail @ ..] = rest else {
            break;
        };
        let n = *n as usize;
        if tail.len() < 3 * n {
            break;
        }
        let points = tail[..3 * n]
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32))
            .collect();
        loops.push(LoopView {
            color: *color as u32,
            points,
        });
        rest = &tail[3 * n..];
    }
    loops
}

/// Splits the `velocity_magnitudes()` buffer into per-loop speed lists.
pub fn decode_speeds(buf: &[f64]) -> Vec<Vec<f32>> {
    let Some((&count, mut rest)) = buf.split_first() else {
        return Vec::new();
    };
    let mut loops = Vec::with_capacity(count as usize);
    for _ in 0..count as usize {
        let [n, _color, tail @ ..] = rest else {
            break;
        };
        let n = *n as usize;
        if tail.len() < n {
            break;
        }
        loops.push(tail[..n].iter().map(|&s| s as f32).collect());
        rest = &tail[n..];
    }
    loops
}

/// Base line color for a loop color id.
pub fn palette_color(color: u32) -> egui::Color32 {
    PALETTE[color as usize % PALETTE.len()]
}

/// Blends `base` towards white by `t` in `[0, 1]`.
fn shade(base: egui::Color32, t: f32) -> egui::Color32 {
    let t = t.clamp(0.0, 1.0);
    let mix = |c: u8| (c as f32 + (255.0 - c as f32) * t).round() as u8;
    egui::Color32::from_rgb(mix(base.r()), mix(base.g()), mix(base.b()))
}

/// Main application state for the interactive viewer.
///
/// The typical per-frame update is:
/// 1. Handle UI interactions / input.
/// 2. If `running` is `true`, advance the simulation by the frame time.
/// 3. Render every loop as a closed polyline.
///
/// ### Fields
/// - `sim` - The engine being visualized.
/// - `cfg` - Parameters used for the next [`Viewer::reset`].
/// - `tension` - Live tension, pushed to the engine when changed.
///
/// - `rng` - Source of fresh seeds on reset.
///
/// - `running` - Whether the simulation is currently auto-advancing.
/// - `time_scale` - Multiplier applied to the frame time before stepping.
/// - `color_by_speed` - Brighten fast-moving segments.
///
/// - `zoom` - Zoom factor for view-to-screen mapping.
/// - `pan` - Screen-space pan offset in pixels.
/// - `yaw`, `pitch` - Camera rotation in radians.
///
/// - `last_error` - Last engine error, shown in the status bar.
pub struct Viewer {
    sim: StringSimulation,
    cfg: SimConfig,
    tension: f64,

    rng: rand::rngs::ThreadRng,

    running: bool,
    time_scale: f64,
    color_by_speed: bool,

    zoom: f32,
    pan: egui::Vec2,
    yaw: f32,
    pitch: f32,

    last_error: Option<String>,
}

impl Viewer {
    /// Creates a viewer seeded from `cfg`.
    ///
    /// ### Returns
    /// The viewer, or the engine's error if `cfg` is rejected.
    pub fn new(cfg: SimConfig) -> Result<Self, SimError> {
        let sim = StringSimulation::with_config(cfg.clone())?;
        Ok(Self {
            sim,
            tension: cfg.tension,
            cfg,
            rng: rng(),
            running: false,
            time_scale: 1.0,
            color_by_speed: true,
            zoom: 40.0,
            pan: egui::vec2(0.0, 0.0),
            yaw: 0.4,
            pitch: -0.5,
            last_error: None,
        })
    }

    fn report(&mut self, err: SimError) {
        log::error!("{err}");
        self.last_error = Some(err.to_string());
        self.running = false;
    }

    /// Restarts from a single seed loop with a fresh random seed.
    ///
    /// The current tension and parameter edits are kept; auto-running stops.
    /// The sub-step count is raised if needed so every tension the slider
    /// offers stays stable for the configured point counts.
    fn reset(&mut self) {
        self.cfg.seed = self.rng.random();
        self.cfg.tension = self.tension;
        let needed = required_substeps(
            point_bound(&self.cfg),
            *TENSION_RANGE.end(),
            self.cfg.max_frame_dt,
        );
        if self.cfg.substeps < needed {
            log::info!("raising substeps {} -> {needed} for stability", self.cfg.substeps);
            self.cfg.substeps = needed;
        }
        match StringSimulation::with_config(self.cfg.clone()) {
            Ok(sim) => {
                self.swap_sim(sim);
                self.last_error = None;
            }
            Err(err) => self.report(err),
        }
        self.running = false;
    }

    /// Installs `sim`, releasing the current simulation first.
    ///
    /// ### Returns
    /// The released previous simulation.
    fn swap_sim(&mut self, sim: StringSimulation) -> StringSimulation {
        if let Err(err) = self.sim.release() {
            log::error!("releasing previous simulation: {err}");
        }
        std::mem::replace(&mut self.sim, sim)
    }

    /// Advances the simulation by `dt` seconds of frame time.
    fn step_once(&mut self, dt: f64) {
        if let Err(err) = self.sim.step(dt * self.time_scale) {
            self.report(err);
        }
    }

    fn apply_tension(&mut self) {
        if let Err(err) = self.sim.set_tension(self.tension) {
            self.report(err);
        }
    }

    /// Camera rotation: yaw about the world z axis, then pitch about x.
    fn rotation(&self) -> Mat3 {
        Mat3::from_rotation_x(self.pitch) * Mat3::from_rotation_z(self.yaw)
    }

    /// Projects a world-space point onto the view plane.
    fn world_to_view(&self, p: Vec3) -> Vec2 {
        let r = self.rotation() * p;
        Vec2::new(r.x, r.y)
    }

    /// Converts a view-plane position to screen-space.
    ///
    /// View coordinates are scaled by `zoom`, offset by `pan`, and then
    /// centered inside the given `rect`. The y-axis is flipped so that
    /// positive y goes up on screen.
    ///
    /// ### Parameters
    /// - `p` - View-plane position.
    /// - `rect` - Screen-space rectangle representing the drawing area.
    fn view_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + p.x * self.zoom + self.pan.x,
            center.y - p.y * self.zoom + self.pan.y,
        )
    }

    /// Converts a screen-space position back to the view plane.
    ///
    /// This is the inverse of [`Viewer::view_to_screen`] (up to floating
    /// point rounding).
    fn screen_to_view(&self, p: egui::Pos2, rect: egui::Rect) -> Vec2 {
        let center = rect.center();
        let x = (p.x - center.x - self.pan.x) / self.zoom;
        let y = (center.y - p.y + self.pan.y) / self.zoom;
        Vec2::new(x, y)
    }

    fn world_to_screen(&self, p: Vec3, rect: egui::Rect) -> egui::Pos2 {
        self.view_to_screen(self.world_to_view(p), rect)
    }

    /// Builds the top panel UI (run controls, stepping, tension).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .button(if self.running { "⏸ Pause" } else { "▶ Run" })
                    .clicked()
                {
                    self.running = !self.running;
                }

                if ui.button("Step").clicked() {
                    self.step_once(1.0 / 60.0);
                }

                if ui.button("Reset").clicked() {
                    self.reset();
                }

                ui.separator();
                let tension = ui.add(
                    egui::Slider::new(&mut self.tension, TENSION_RANGE)
                        .logarithmic(true)
                        .text("Tension"),
                );
                if tension.changed() {
                    self.apply_tension();
                }

                ui.add(
                    egui::DragValue::new(&mut self.time_scale)
                        .prefix("time × ")
                        .range(0.1..=4.0)
                        .speed(0.05),
                );

                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 2.0..=200.0).text("Zoom"));
            });
        });
    }

    /// Builds the bottom status bar (loops, energy, splits, frame).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some(err) = &self.last_error {
                    ui.colored_label(egui::Color32::LIGHT_RED, err);
                    ui.separator();
                }
                if let Ok(frame) = self.sim.frame() {
                    ui.label(format!("frame = {frame}"));
                }
                if let Ok(splits) = self.sim.total_splits() {
                    ui.label(format!("splits = {splits}"));
                }
                ui.separator();
                if let Ok(energy) = self.sim.total_energy() {
                    ui.label(format!("energy = {energy:.4}"));
                }
                if let Ok(count) = self.sim.loop_count() {
                    ui.label(format!("loops = {count}"));
                }
            });
        });
    }

    /// Builds the right-hand panel for parameters applied on reset.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Seed");
                ui.label("Applied on reset");

                egui::ComboBox::from_label("shape")
                    .selected_text(format!("{:?}", self.cfg.seed_shape))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.cfg.seed_shape, SeedShape::Circle, "Circle");
                        ui.selectable_value(
                            &mut self.cfg.seed_shape,
                            SeedShape::Perturbed,
                            "Perturbed",
                        );
                    });
                ui.add(
                    egui::DragValue::new(&mut self.cfg.seed_points)
                        .prefix("points: ")
                        .range(SEED_POINTS_RANGE),
                );
                ui.add(
                    egui::DragValue::new(&mut self.cfg.seed_radius)
                        .prefix("radius: ")
                        .range(0.5..=20.0)
                        .speed(0.1),
                );
                ui.add(
                    egui::DragValue::new(&mut self.cfg.seed_noise)
                        .prefix("noise: ")
                        .range(0.0..=1.0)
                        .speed(0.01),
                );

                ui.separator();
                ui.heading("Dynamics");
                ui.add(
                    egui::DragValue::new(&mut self.cfg.damping)
                        .prefix("damping: ")
                        .range(0.0..=1.0)
                        .speed(0.005),
                );
                ui.add(
                    egui::DragValue::new(&mut self.cfg.substeps)
                        .prefix("substeps: ")
                        .range(1..=16),
                );
                ui.add(
                    egui::DragValue::new(&mut self.cfg.max_speed)
                        .prefix("max speed: ")
                        .range(1.0..=100.0)
                        .speed(0.5),
                );

                ui.separator();
                ui.heading("Splitting");
                ui.add(
                    egui::DragValue::new(&mut self.cfg.tolerance)
                        .prefix("tolerance: ")
                        .range(0.05..=3.0)
                        .speed(0.01),
                );
                ui.add(
                    egui::DragValue::new(&mut self.cfg.min_separation)
                        .prefix("min separation: ")
                        .range(2..=64),
                );
                egui::ComboBox::from_label("daughters")
                    .selected_text(match self.cfg.daughter_resolution {
                        DaughterResolution::MatchParent => "MatchParent",
                        DaughterResolution::Proportional => "Proportional",
                        DaughterResolution::Density { .. } => "Density",
                    })
                    .show_ui(ui, |ui| {
                        ui.selectable_value(
                            &mut self.cfg.daughter_resolution,
                            DaughterResolution::MatchParent,
                            "MatchParent",
                        );
                        ui.selectable_value(
                            &mut self.cfg.daughter_resolution,
                            DaughterResolution::Proportional,
                            "Proportional",
                        );
                        ui.selectable_value(
                            &mut self.cfg.daughter_resolution,
                            DaughterResolution::DENSITY,
                            "Density",
                        );
                    });

                ui.separator();
                ui.checkbox(&mut self.color_by_speed, "Brighten by speed");

                ui.separator();
                if ui.button("Reset cfg to default").clicked() {
                    self.cfg = SimConfig::default();
                }
            });
    }

    /// Draws every loop as a closed polyline.
    fn draw_loops(&self, painter: &egui::Painter, rect: egui::Rect) {
        let (Ok(positions), Ok(speeds)) = (self.sim.positions(), self.sim.velocity_magnitudes())
        else {
            return;
        };
        let loops = decode_positions(&positions);
        let speeds = decode_speeds(&speeds);
        let max_speed = self.cfg.max_speed as f32;

        for (k, lp) in loops.iter().enumerate() {
            let base = palette_color(lp.color);
            let pts: Vec<egui::Pos2> = lp
                .points
                .iter()
                .map(|&p| self.world_to_screen(p, rect))
                .collect();

            match speeds.get(k).filter(|_| self.color_by_speed) {
                Some(speed) => {
                    let n = pts.len();
                    for i in 0..n {
                        let j = (i + 1) % n;
                        let s = 0.5 * (speed[i] + speed[j]);
                        let color = shade(base, s / max_speed);
                        painter.line_segment([pts[i], pts[j]], egui::Stroke::new(2.0, color));
                    }
                }
                None => {
                    painter.add(egui::Shape::closed_line(pts, egui::Stroke::new(2.0, base)));
                }
            }
        }
    }

    /// Builds the central panel where loops are drawn and the camera moves.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            // Pan with the primary button, orbit with the secondary.
            if response.dragged_by(egui::PointerButton::Primary) {
                self.pan += response.drag_delta();
            }
            if response.dragged_by(egui::PointerButton::Secondary) {
                let delta = response.drag_delta();
                self.yaw += delta.x * 0.01;
                self.pitch = (self.pitch + delta.y * 0.01).clamp(-1.5, 1.5);
            }

            // Zoom around the mouse cursor.
            let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let pointer_screen = response.hover_pos().unwrap_or(rect.center());
                let view_before = self.screen_to_view(pointer_screen, rect);

                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(2.0, 200.0);

                let screen_after = self.view_to_screen(view_before, rect);
                self.pan += pointer_screen - screen_after;
            }

            self.draw_loops(&painter, rect);

            if self.running {
                let dt = ctx.input(|i| i.stable_dt) as f64;
                self.step_once(dt);
                ctx.request_repaint();
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rect() -> egui::Rect {
        egui::Rect::from_min_size(egui::Pos2::new(0.0, 0.0), egui::vec2(800.0, 600.0))
    }

    fn viewer() -> Viewer {
        Viewer::new(SimConfig::default()).unwrap()
    }

    #[test]
    fn view_to_screen_and_back_is_roundtrip() {
        let mut viewer = viewer();
        viewer.zoom = 2.0;
        viewer.pan = egui::vec2(15.0, -7.0);
        let rect = test_rect();

        let eps = 1e-4;
        for p in [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, -5.0),
            Vec2::new(-3.5, 8.25),
        ] {
            let back = viewer.screen_to_view(viewer.view_to_screen(p, rect), rect);
            assert!(
                (back - p).abs().max_element() < eps,
                "roundtrip mismatch: p={p:?}, back={back:?}"
            );
        }
    }

    #[test]
    fn unrotated_camera_looks_down_z() {
        let mut viewer = viewer();
        viewer.yaw = 0.0;
        viewer.pitch = 0.0;
        let v = viewer.world_to_view(Vec3::new(1.5, -2.0, 7.0));
        assert!((v - Vec2::new(1.5, -2.0)).abs().max_element() < 1e-6);
    }

    #[test]
    fn decode_positions_follows_buffer_layout() {
        let buf = [
            2.0, // count
            3.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, // loop 0
            3.0, 5.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, // loop 1
        ];
        let loops = decode_positions(&buf);

        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0].color, 0);
        assert_eq!(loops[0].points[1], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(loops[1].color, 5);
        assert_eq!(loops[1].points[2], Vec3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn decode_stops_at_truncated_loop() {
        let buf = [2.0, 1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 1.0];
        assert_eq!(decode_positions(&buf).len(), 1);
        assert!(decode_positions(&[]).is_empty());
    }

    #[test]
    fn decoded_engine_buffers_agree() {
        let viewer = viewer();
        let loops = decode_positions(&viewer.sim.positions().unwrap());
        let speeds = decode_speeds(&viewer.sim.velocity_magnitudes().unwrap());

        assert_eq!(loops.len(), 1);
        assert_eq!(speeds.len(), 1);
        assert_eq!(loops[0].points.len(), viewer.cfg.seed_points);
        assert_eq!(speeds[0].len(), viewer.cfg.seed_points);
    }

    #[test]
    fn palette_cycles() {
        assert_eq!(palette_color(0), palette_color(PALETTE.len() as u32));
        assert_ne!(palette_color(0), palette_color(1));
    }

    #[test]
    fn shade_reaches_white() {
        let base = egui::Color32::from_rgb(10, 20, 30);
        assert_eq!(shade(base, 0.0), base);
        assert_eq!(shade(base, 2.0), egui::Color32::WHITE);
    }

    #[test]
    fn step_once_advances_frame() {
        let mut viewer = viewer();
        viewer.step_once(1.0 / 60.0);
        assert_eq!(viewer.sim.frame().unwrap(), 1);
        assert!(viewer.last_error.is_none());
    }

    #[test]
    fn reset_restores_basic_state() {
        let mut viewer = viewer();
        for _ in 0..5 {
            viewer.step_once(1.0 / 60.0);
        }
        viewer.tension = 3.0;
        viewer.apply_tension();
        viewer.running = true;

        viewer.reset();

        assert_eq!(viewer.sim.frame().unwrap(), 0);
        assert_eq!(viewer.sim.loop_count().unwrap(), 1);
        assert_eq!(viewer.sim.tension().unwrap(), 3.0);
        assert!(!viewer.running);
    }

    #[test]
    fn reset_keeps_the_largest_offered_loop_stable() {
        let mut viewer = viewer();
        viewer.cfg.seed_points = *SEED_POINTS_RANGE.end();
        viewer.cfg.substeps = 1;

        viewer.reset();

        let cfg = viewer.sim.config().unwrap();
        let dt = cfg.max_frame_dt / cfg.substeps as f64;
        assert!(cfg.substeps > 1);
        assert!(courant(cfg.seed_points, *TENSION_RANGE.end(), dt) <= MAX_COURANT);
    }

    #[test]
    fn required_substeps_covers_density_daughters() {
        let cfg = SimConfig {
            seed_points: 32,
            daughter_resolution: DaughterResolution::DENSITY,
            ..SimConfig::default()
        };
        assert_eq!(point_bound(&cfg), 150);

        for points in [8, 64, 150, 256] {
            let n = required_substeps(points, 10.0, 1.0 / 30.0);
            assert!(courant(points, 10.0, 1.0 / 30.0 / n as f64) <= MAX_COURANT);
        }
        assert_eq!(required_substeps(64, 1.0, 1.0 / 30.0), 1);
    }

    #[test]
    fn swapping_releases_the_previous_simulation() {
        let mut viewer = viewer();
        viewer.step_once(1.0 / 60.0);

        let old = viewer.swap_sim(StringSimulation::new(1.0).unwrap());

        assert!(old.is_released());
        assert!(!viewer.sim.is_released());
        assert_eq!(viewer.sim.frame().unwrap(), 0);
    }

    #[test]
    fn invalid_edits_surface_as_errors() {
        let mut viewer = viewer();
        viewer.cfg.tolerance = 0.0;
        viewer.running = true;

        viewer.reset();

        assert!(viewer.last_error.is_some());
        assert!(!viewer.running);
        // The previous simulation is kept.
        assert_eq!(viewer.sim.loop_count().unwrap(), 1);
    }
}
