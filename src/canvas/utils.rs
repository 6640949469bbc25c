//! Geometry helpers for the canvas: dashed preview lines and arrowheads.

use egui::{Pos2, Stroke, Vec2};

/// Draw a dashed line on a painter.
pub fn draw_dashed_line(
    painter: &egui::Painter,
    start: Pos2,
    end: Pos2,
    dash_length: f32,
    gap_length: f32,
    stroke: Stroke,
) {
    let dir = end - start;
    let total_length = dir.length();
    if total_length < 0.001 {
        return;
    }

    let unit = dir / total_length;
    let mut pos = 0.0;
    let mut drawing = true;

    while pos < total_length {
        let segment_length = if drawing { dash_length } else { gap_length };
        let segment_end = (pos + segment_length).min(total_length);

        if drawing {
            let p1 = start + unit * pos;
            let p2 = start + unit * segment_end;
            painter.line_segment([p1, p2], stroke);
        }

        pos = segment_end;
        drawing = !drawing;
    }
}

/// Arrowhead triangle local shape: tip at the origin, body extending toward
/// negative x, so a rotation of 0 degrees points right.
const ARROW_SHAPE: [Vec2; 3] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(-15.0, -8.0),
    Vec2::new(-15.0, 8.0),
];

/// Vertices of an arrowhead at `tip`, rotated by `angle_deg` and scaled.
pub fn arrow_points(tip: Pos2, angle_deg: f32, scale: f32) -> Vec<Pos2> {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    ARROW_SHAPE
        .iter()
        .map(|p| {
            let scaled = *p * scale;
            tip + Vec2::new(
                scaled.x * cos - scaled.y * sin,
                scaled.x * sin + scaled.y * cos,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrotated_arrow_points_right() {
        let pts = arrow_points(Pos2::new(10.0, 10.0), 0.0, 1.0);
        assert_eq!(pts[0], Pos2::new(10.0, 10.0));
        // Body extends to the left of the tip.
        assert!(pts[1].x < pts[0].x && pts[2].x < pts[0].x);
        assert!((pts[1].y - 2.0).abs() < 1e-3 || (pts[1].y - 18.0).abs() < 1e-3);
    }

    #[test]
    fn rotation_by_90_degrees_points_down() {
        // Screen y grows downward, so +90 degrees turns the arrow downward.
        let pts = arrow_points(Pos2::ZERO, 90.0, 1.0);
        assert!((pts[0].x).abs() < 1e-4 && (pts[0].y).abs() < 1e-4);
        assert!(pts[1].y < 0.0 || pts[2].y < 0.0, "body sits above the tip");
        for p in &pts[1..] {
            assert!((p.y - (-15.0)).abs() < 1e-3);
        }
    }

    #[test]
    fn scale_multiplies_the_shape() {
        let pts = arrow_points(Pos2::ZERO, 0.0, 2.0);
        assert!((pts[1].x - (-30.0)).abs() < 1e-3);
        assert!((pts[1].y.abs() - 16.0).abs() < 1e-3);
    }
}
