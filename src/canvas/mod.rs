//! Canvas editor: dropped images on a pannable, zoomable surface, with a
//! connection-drawing mode for wiring nodes together.

pub mod utils;

use std::collections::HashMap;
use std::path::Path;

use egui::{Color32, Pos2, Rect, Sense, Stroke, StrokeKind, Vec2};
use uuid::Uuid;

use crate::scene::Scene;

/// Multiplicative view-scale change per wheel notch.
const ZOOM_STEP: f32 = 1.2;
const ZOOM_MIN: f32 = 0.1;
const ZOOM_MAX: f32 = 8.0;

/// Connection-drawing state machine, carried by the editor object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LinkMode {
    /// Nodes are draggable; dragging empty canvas pans the view.
    Idle,
    /// Connection mode enabled: the next press over a node starts a link.
    Armed,
    /// A link is being drawn from `start`, anchored at a local offset.
    Drawing { start: Uuid, start_anchor: Vec2 },
}

pub struct CanvasEditor {
    pub pan: Vec2,
    pub zoom: f32,
    pub mode: LinkMode,
    pub dragging_node: Option<Uuid>,
    panning: bool,
    /// One-line state mirror shown in the bottom panel.
    pub status: String,
    textures: HashMap<Uuid, egui::TextureHandle>,
}

impl Default for CanvasEditor {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            mode: LinkMode::Idle,
            dragging_node: None,
            panning: false,
            status: "Drop images onto the canvas".into(),
            textures: HashMap::new(),
        }
    }
}

impl CanvasEditor {
    pub fn connection_mode(&self) -> bool {
        !matches!(self.mode, LinkMode::Idle)
    }

    pub fn nodes_draggable(&self) -> bool {
        matches!(self.mode, LinkMode::Idle)
    }

    /// Flip connection mode. Turning it off exits any in-progress drawing.
    pub fn toggle_connection_mode(&mut self) {
        if self.connection_mode() {
            self.mode = LinkMode::Idle;
            self.status = "Normal mode: drag images or the canvas".into();
        } else {
            self.mode = LinkMode::Armed;
            self.dragging_node = None;
            self.panning = false;
            self.status =
                "Connection mode: press an image and drag to another to link them".into();
        }
    }

    /// Primary press at a scene position.
    fn press_at(&mut self, scene: &Scene, scene_pos: Pos2) {
        match self.mode {
            LinkMode::Idle => {
                self.dragging_node = scene.node_at(scene_pos);
                self.panning = self.dragging_node.is_none();
            }
            LinkMode::Armed => {
                if let Some(id) = scene.node_at(scene_pos) {
                    let start_anchor = scene_pos - scene.nodes[&id].position;
                    self.mode = LinkMode::Drawing {
                        start: id,
                        start_anchor,
                    };
                }
            }
            LinkMode::Drawing { .. } => {}
        }
    }

    /// Primary release at a scene position. Returns whether a connection was
    /// committed.
    ///
    /// Releasing over the start node (or empty space) cancels instead of
    /// creating a self-loop.
    fn release_at(&mut self, scene: &mut Scene, scene_pos: Pos2) -> bool {
        self.dragging_node = None;
        self.panning = false;

        let LinkMode::Drawing {
            start,
            start_anchor,
        } = self.mode
        else {
            return false;
        };
        self.mode = LinkMode::Armed;

        match scene.node_at(scene_pos) {
            Some(end) if end != start => {
                let end_anchor = scene_pos - scene.nodes[&end].position;
                scene.connect(start, start_anchor, end, end_anchor);
                self.status = "Connection created".into();
                true
            }
            _ => {
                self.status = "Connection cancelled".into();
                false
            }
        }
    }

    fn to_screen(&self, pos: Pos2, canvas_origin: Pos2) -> Pos2 {
        canvas_origin + self.pan + pos.to_vec2() * self.zoom
    }

    fn from_screen(&self, screen_pos: Pos2, canvas_origin: Pos2) -> Pos2 {
        ((screen_pos - canvas_origin - self.pan) / self.zoom).to_pos2()
    }

    pub fn show(&mut self, ui: &mut egui::Ui, scene: &mut Scene) {
        let canvas_rect = ui.max_rect();
        let canvas_origin = canvas_rect.min;
        let pointer_in_bounds = ui.rect_contains_pointer(canvas_rect);
        let pointer_pos = ui.ctx().pointer_latest_pos();

        let mut input_primary_pressed = false;
        let mut input_primary_down = false;
        let mut input_primary_released = false;
        let mut pointer_delta = Vec2::ZERO;
        let mut scroll_y = 0.0;
        let mut dropped: Vec<std::path::PathBuf> = Vec::new();

        ui.input(|i| {
            input_primary_pressed = i.pointer.primary_pressed();
            input_primary_down = i.pointer.primary_down();
            input_primary_released = i.pointer.primary_released();
            pointer_delta = i.pointer.delta();
            scroll_y = i.raw_scroll_delta.y;
            for file in &i.raw.dropped_files {
                if let Some(path) = &file.path {
                    dropped.push(path.clone());
                }
            }
        });

        // Wheel zoom, fixed factor per notch.
        if pointer_in_bounds && scroll_y != 0.0 {
            let factor = if scroll_y > 0.0 {
                ZOOM_STEP
            } else {
                1.0 / ZOOM_STEP
            };
            self.zoom = (self.zoom * factor).clamp(ZOOM_MIN, ZOOM_MAX);
        }

        // Dropped files become nodes at the cursor (drops carry no position
        // of their own), falling back to the canvas center.
        if !dropped.is_empty() {
            let drop_screen = pointer_pos.unwrap_or_else(|| canvas_rect.center());
            let drop_scene = self.from_screen(drop_screen, canvas_origin);
            for path in dropped {
                self.handle_image_drop(ui.ctx(), scene, &path, drop_scene);
            }
        }

        let response = ui.interact(
            canvas_rect,
            ui.id().with("canvas"),
            Sense::click_and_drag(),
        );

        if input_primary_pressed && pointer_in_bounds {
            if let Some(p) = pointer_pos {
                let scene_pos = self.from_screen(p, canvas_origin);
                self.press_at(scene, scene_pos);
            }
        }

        if input_primary_down && matches!(self.mode, LinkMode::Idle) {
            if let Some(id) = self.dragging_node {
                scene.translate_node(id, pointer_delta / self.zoom);
            } else if self.panning {
                self.pan += pointer_delta;
            }
        }

        if input_primary_released {
            match pointer_pos {
                Some(p) => {
                    let scene_pos = self.from_screen(p, canvas_origin);
                    self.release_at(scene, scene_pos);
                }
                None => {
                    // Pointer left the window mid-gesture.
                    self.dragging_node = None;
                    self.panning = false;
                    if matches!(self.mode, LinkMode::Drawing { .. }) {
                        self.mode = LinkMode::Armed;
                        self.status = "Connection cancelled".into();
                    }
                }
            }
        }

        let painter = ui.painter_at(canvas_rect);
        painter.rect_filled(canvas_rect, 0.0, Color32::from_gray(32));

        // Committed connections: solid line plus arrowhead at the midpoint.
        for conn in &scene.connections {
            let start = self.to_screen(conn.geometry.start, canvas_origin);
            let end = self.to_screen(conn.geometry.end, canvas_origin);
            painter.line_segment([start, end], Stroke::new(4.0 * self.zoom, Color32::WHITE));

            let tip = self.to_screen(conn.geometry.arrow_pos, canvas_origin);
            let points = utils::arrow_points(tip, conn.geometry.arrow_deg, self.zoom);
            painter.add(egui::Shape::convex_polygon(
                points,
                Color32::WHITE,
                Stroke::NONE,
            ));
        }

        for id in &scene.order {
            let Some(node) = scene.nodes.get(id) else {
                continue;
            };
            let rect = Rect::from_min_size(
                self.to_screen(node.position, canvas_origin),
                node.size * self.zoom,
            );
            if let Some(tex) = self.textures.get(id) {
                painter.image(
                    tex.id(),
                    rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            } else {
                painter.rect_filled(rect, 2.0, Color32::from_gray(64));
            }
            if self.connection_mode() {
                painter.rect_stroke(
                    rect,
                    2.0,
                    Stroke::new(1.0, Color32::LIGHT_BLUE),
                    StrokeKind::Middle,
                );
            }
        }

        // Dashed preview line while a link is being drawn.
        if let LinkMode::Drawing {
            start,
            start_anchor,
        } = self.mode
        {
            if let (Some(node), Some(p)) = (scene.nodes.get(&start), pointer_pos) {
                let from = self.to_screen(node.map_to_scene(start_anchor), canvas_origin);
                utils::draw_dashed_line(
                    &painter,
                    from,
                    p,
                    8.0,
                    6.0,
                    Stroke::new(4.0 * self.zoom, Color32::WHITE),
                );
            }
        }

        response.context_menu(|ui| {
            let label = if self.connection_mode() {
                "Disable connection mode"
            } else {
                "Enable connection mode"
            };
            if ui.button(label).clicked() {
                self.toggle_connection_mode();
                ui.close();
            }
        });
    }

    /// Stage, decode and place a dropped image. Anything that fails along the
    /// way skips the drop with a warning; no node is created.
    fn handle_image_drop(
        &mut self,
        ctx: &egui::Context,
        scene: &mut Scene,
        source: &Path,
        at: Pos2,
    ) {
        let staged = match crate::config::stage_image(source) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("ignoring dropped file {}: {e}", source.display());
                return;
            }
        };
        let rgba = match image::open(&staged) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                log::warn!("could not decode {}: {e}", staged.display());
                return;
            }
        };

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size = Vec2::new(rgba.width() as f32, rgba.height() as f32);
        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            [rgba.width() as usize, rgba.height() as usize],
            rgba.as_raw(),
        );

        let id = scene.add_node(file_name.clone(), staged, at, size);
        let handle = ctx.load_texture(
            file_name.clone(),
            color_image,
            egui::TextureOptions::default(),
        );
        self.textures.insert(id, handle);
        self.status = format!("Loaded image: {file_name}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scene_with_two_nodes() -> (Scene, Uuid, Uuid) {
        let mut scene = Scene::default();
        let a = scene.add_node(
            "a.png".into(),
            PathBuf::from("detect/a.png"),
            Pos2::new(100.0, 100.0),
            Vec2::new(64.0, 64.0),
        );
        let b = scene.add_node(
            "b.png".into(),
            PathBuf::from("detect/b.png"),
            Pos2::new(300.0, 100.0),
            Vec2::new(64.0, 64.0),
        );
        (scene, a, b)
    }

    #[test]
    fn toggle_twice_restores_draggability() {
        let mut editor = CanvasEditor::default();
        assert!(editor.nodes_draggable());

        editor.toggle_connection_mode();
        assert!(!editor.nodes_draggable());
        assert!(editor.connection_mode());

        editor.toggle_connection_mode();
        assert!(editor.nodes_draggable());
        assert!(!editor.connection_mode());
    }

    #[test]
    fn drag_between_nodes_commits_a_connection() {
        let (mut scene, a, b) = scene_with_two_nodes();
        let mut editor = CanvasEditor::default();
        editor.toggle_connection_mode();

        editor.press_at(&scene, Pos2::new(110.0, 110.0));
        assert!(matches!(editor.mode, LinkMode::Drawing { start, .. } if start == a));

        let committed = editor.release_at(&mut scene, Pos2::new(310.0, 110.0));
        assert!(committed);
        assert_eq!(editor.mode, LinkMode::Armed);

        assert_eq!(scene.connections.len(), 1);
        let conn = &scene.connections[0];
        assert_eq!(conn.from, a);
        assert_eq!(conn.to, b);
        assert_eq!(conn.from_anchor, Vec2::new(10.0, 10.0));
        assert_eq!(conn.to_anchor, Vec2::new(10.0, 10.0));
        assert!(conn.geometry.arrow_deg.abs() < 1e-4);
    }

    #[test]
    fn release_over_start_node_cancels() {
        let (mut scene, _a, _b) = scene_with_two_nodes();
        let mut editor = CanvasEditor::default();
        editor.toggle_connection_mode();

        editor.press_at(&scene, Pos2::new(110.0, 110.0));
        let committed = editor.release_at(&mut scene, Pos2::new(150.0, 150.0));

        assert!(!committed, "self-loops are rejected");
        assert!(scene.connections.is_empty());
        assert_eq!(editor.mode, LinkMode::Armed);
    }

    #[test]
    fn release_over_empty_space_cancels() {
        let (mut scene, _a, _b) = scene_with_two_nodes();
        let mut editor = CanvasEditor::default();
        editor.toggle_connection_mode();

        editor.press_at(&scene, Pos2::new(110.0, 110.0));
        let committed = editor.release_at(&mut scene, Pos2::new(700.0, 700.0));

        assert!(!committed);
        assert!(scene.connections.is_empty());
    }

    #[test]
    fn press_over_empty_space_in_connection_mode_does_nothing() {
        let (scene, _a, _b) = scene_with_two_nodes();
        let mut editor = CanvasEditor::default();
        editor.toggle_connection_mode();

        editor.press_at(&scene, Pos2::new(700.0, 700.0));
        assert_eq!(editor.mode, LinkMode::Armed);
    }

    #[test]
    fn toggle_off_exits_in_progress_drawing() {
        let (scene, _a, _b) = scene_with_two_nodes();
        let mut editor = CanvasEditor::default();
        editor.toggle_connection_mode();
        editor.press_at(&scene, Pos2::new(110.0, 110.0));
        assert!(matches!(editor.mode, LinkMode::Drawing { .. }));

        editor.toggle_connection_mode();
        assert_eq!(editor.mode, LinkMode::Idle);
        assert!(editor.nodes_draggable());
    }

    #[test]
    fn idle_press_targets_node_for_dragging() {
        let (scene, a, _b) = scene_with_two_nodes();
        let mut editor = CanvasEditor::default();

        editor.press_at(&scene, Pos2::new(120.0, 120.0));
        assert_eq!(editor.dragging_node, Some(a));

        editor.press_at(&scene, Pos2::new(700.0, 700.0));
        assert_eq!(editor.dragging_node, None);
        assert!(editor.panning);
    }

    #[test]
    fn screen_transform_round_trips() {
        let mut editor = CanvasEditor::default();
        editor.pan = Vec2::new(40.0, -25.0);
        editor.zoom = 1.2 * 1.2;

        let origin = Pos2::new(10.0, 30.0);
        let scene_pos = Pos2::new(123.0, 456.0);
        let screen = editor.to_screen(scene_pos, origin);
        let back = editor.from_screen(screen, origin);
        assert!((back.x - scene_pos.x).abs() < 1e-3);
        assert!((back.y - scene_pos.y).abs() < 1e-3);
    }
}
