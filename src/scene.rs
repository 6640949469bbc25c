//! Scene model: dropped images as nodes, directed connections between them.
//!
//! Connections cache their rendered geometry (line endpoints, midpoint arrow
//! position and rotation). The cache is refreshed by the position-mutation
//! methods on [`Scene`], so it is never stale mid-drag.

use std::collections::HashMap;
use std::path::PathBuf;

use egui::{Pos2, Vec2};
use uuid::Uuid;

/// A placed image with a scene position.
#[derive(Clone, Debug)]
pub struct ImageNode {
    pub id: Uuid,
    /// Original file name, shown in the status line.
    pub file_name: String,
    /// Copy of the image inside the staging directory.
    pub staged_path: PathBuf,
    /// Top-left corner in scene coordinates.
    pub position: Pos2,
    /// Pixel dimensions of the decoded image.
    pub size: Vec2,
}

impl ImageNode {
    pub fn rect(&self) -> egui::Rect {
        egui::Rect::from_min_size(self.position, self.size)
    }

    /// Map a point in this node's local space to scene space.
    pub fn map_to_scene(&self, local: Vec2) -> Pos2 {
        self.position + local
    }
}

/// A directed visual link between two nodes' anchor points.
///
/// Anchors are offsets in each node's local space, so the link follows both
/// endpoints wherever they move. Duplicate and reverse links are permitted.
#[derive(Clone, Debug)]
pub struct Connection {
    pub from: Uuid,
    pub to: Uuid,
    pub from_anchor: Vec2,
    pub to_anchor: Vec2,
    pub geometry: LinkGeometry,
}

/// Rendered geometry of a connection, in scene coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkGeometry {
    pub start: Pos2,
    pub end: Pos2,
    /// Arrowhead sits at the midpoint of the line.
    pub arrow_pos: Pos2,
    /// Arrowhead rotation in degrees, `atan2(dy, dx)` from start to end.
    pub arrow_deg: f32,
}

#[derive(Default)]
pub struct Scene {
    pub nodes: HashMap<Uuid, ImageNode>,
    /// Insertion order; the last entry draws (and hit-tests) on top.
    pub order: Vec<Uuid>,
    pub connections: Vec<Connection>,
}

impl Scene {
    pub fn add_node(
        &mut self,
        file_name: String,
        staged_path: PathBuf,
        position: Pos2,
        size: Vec2,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.nodes.insert(
            id,
            ImageNode {
                id,
                file_name,
                staged_path,
                position,
                size,
            },
        );
        self.order.push(id);
        id
    }

    /// Topmost node containing `scene_pos`, if any.
    pub fn node_at(&self, scene_pos: Pos2) -> Option<Uuid> {
        self.order.iter().rev().copied().find(|id| {
            self.nodes
                .get(id)
                .is_some_and(|n| n.rect().contains(scene_pos))
        })
    }

    pub fn translate_node(&mut self, id: Uuid, delta: Vec2) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position += delta;
            self.refresh_connections_for(id);
        }
    }

    pub fn set_node_position(&mut self, id: Uuid, position: Pos2) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
            self.refresh_connections_for(id);
        }
    }

    /// Commit a directed connection. Anchors are local offsets on each node.
    ///
    /// No uniqueness is enforced; callers are expected to reject self-loops
    /// before committing.
    pub fn connect(&mut self, from: Uuid, from_anchor: Vec2, to: Uuid, to_anchor: Vec2) {
        let Some(geometry) = self.link_geometry(from, from_anchor, to, to_anchor) else {
            return;
        };
        self.connections.push(Connection {
            from,
            to,
            from_anchor,
            to_anchor,
            geometry,
        });
    }

    /// Recompute cached geometry for every connection touching `id`.
    fn refresh_connections_for(&mut self, id: Uuid) {
        let mut refreshed: Vec<(usize, LinkGeometry)> = Vec::new();
        for (i, conn) in self.connections.iter().enumerate() {
            if conn.from == id || conn.to == id {
                if let Some(g) =
                    self.link_geometry(conn.from, conn.from_anchor, conn.to, conn.to_anchor)
                {
                    refreshed.push((i, g));
                }
            }
        }
        for (i, g) in refreshed {
            self.connections[i].geometry = g;
        }
    }

    fn link_geometry(
        &self,
        from: Uuid,
        from_anchor: Vec2,
        to: Uuid,
        to_anchor: Vec2,
    ) -> Option<LinkGeometry> {
        let start = self.nodes.get(&from)?.map_to_scene(from_anchor);
        let end = self.nodes.get(&to)?.map_to_scene(to_anchor);
        Some(compute_link_geometry(start, end))
    }
}

/// Line from `start` to `end` with the arrowhead at the midpoint, rotated to
/// point along the line.
pub fn compute_link_geometry(start: Pos2, end: Pos2) -> LinkGeometry {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    LinkGeometry {
        start,
        end,
        arrow_pos: Pos2::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0),
        arrow_deg: dy.atan2(dx).to_degrees(),
    }
}
