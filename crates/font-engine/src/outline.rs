//! Glyph outline extraction interfaces.

/// Receiver for outline path commands.
///
/// TrueType outlines produce quadratic segments, CFF/CFF2 outlines cubic
/// ones; both flavors close every contour explicitly.
#[allow(unused_variables)]
pub trait OutlineSink {
    /// Starts a new contour.
    fn move_to(&mut self, x: f32, y: f32);
    /// Draws a line to `(x, y)`.
    fn line_to(&mut self, x: f32, y: f32);
    /// Draws a quadratic Bézier to `(x, y)` with control point `(cx, cy)`.
    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32);
    /// Draws a cubic Bézier to `(x, y)`.
    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32);
    /// Closes the current contour.
    fn close(&mut self);
}

/// Single outline path command; see [`OutlineSink`] for semantics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlineCommand {
    /// Starts a new contour.
    MoveTo(f32, f32),
    /// Line segment.
    LineTo(f32, f32),
    /// Quadratic Bézier segment (control, then end point).
    QuadTo(f32, f32, f32, f32),
    /// Cubic Bézier segment (two controls, then end point).
    CurveTo(f32, f32, f32, f32, f32, f32),
    /// Closes the current contour.
    Close,
}

/// Glyph outline collected as a list of path commands.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    commands: Vec<OutlineCommand>,
}

impl Outline {
    /// Path commands of the outline, in drawing order.
    pub fn commands(&self) -> &[OutlineCommand] {
        &self.commands
    }

    /// Checks whether the outline has any contours.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Computes the control-box of the outline (including off-curve points).
    /// Returns `[x_min, y_min, x_max, y_max]`, or `None` for an empty outline.
    pub fn control_box(&self) -> Option<[f32; 4]> {
        let mut bbox: Option<[f32; 4]> = None;
        let mut add = |x: f32, y: f32| {
            let bbox = bbox.get_or_insert([x, y, x, y]);
            bbox[0] = bbox[0].min(x);
            bbox[1] = bbox[1].min(y);
            bbox[2] = bbox[2].max(x);
            bbox[3] = bbox[3].max(y);
        };
        for command in &self.commands {
            match *command {
                OutlineCommand::MoveTo(x, y) | OutlineCommand::LineTo(x, y) => add(x, y),
                OutlineCommand::QuadTo(cx, cy, x, y) => {
                    add(cx, cy);
                    add(x, y);
                }
                OutlineCommand::CurveTo(cx0, cy0, cx1, cy1, x, y) => {
                    add(cx0, cy0);
                    add(cx1, cy1);
                    add(x, y);
                }
                OutlineCommand::Close => {}
            }
        }
        bbox
    }
}

impl OutlineSink for Outline {
    fn move_to(&mut self, x: f32, y: f32) {
        self.commands.push(OutlineCommand::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.commands.push(OutlineCommand::LineTo(x, y));
    }

    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.commands.push(OutlineCommand::QuadTo(cx, cy, x, y));
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.commands.push(OutlineCommand::CurveTo(cx0, cy0, cx1, cy1, x, y));
    }

    fn close(&mut self) {
        self.commands.push(OutlineCommand::Close);
    }
}

/// Contour point in the quadratic (TrueType) outline model. Coordinates are
/// `f32` so that variation deltas can be applied without rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ContourPoint {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) on_curve: bool,
}

/// Emits quadratic contours to `sink`, inserting implicit on-curve midpoints
/// between consecutive off-curve points.
pub(crate) fn emit_quad_contours(
    points: &[ContourPoint],
    end_points: &[u16],
    sink: &mut impl OutlineSink,
) {
    let mut start = 0_usize;
    for &end in end_points {
        let end = usize::from(end) + 1;
        let Some(contour) = points.get(start..end) else {
            return;
        };
        emit_single_contour(contour, sink);
        start = end;
    }
}

fn emit_single_contour(contour: &[ContourPoint], sink: &mut impl OutlineSink) {
    let len = contour.len();
    if len == 0 {
        return;
    }
    if len == 1 {
        sink.move_to(contour[0].x, contour[0].y);
        sink.close();
        return;
    }

    // Start at the first on-curve point; an all-off-curve contour starts at
    // the implied midpoint of its first two points.
    let first_on_curve = contour.iter().position(|point| point.on_curve);
    let (start_x, start_y, seq_start, mut pending) = match first_on_curve {
        Some(idx) => (contour[idx].x, contour[idx].y, idx + 1, None),
        None => {
            let (first, second) = (contour[0], contour[1]);
            (
                midpoint(first.x, second.x),
                midpoint(first.y, second.y),
                2,
                Some((second.x, second.y)),
            )
        }
    };
    sink.move_to(start_x, start_y);

    for i in 0..len - 1 {
        let point = contour[(seq_start + i) % len];
        if point.on_curve {
            match pending.take() {
                Some((cx, cy)) => sink.quad_to(cx, cy, point.x, point.y),
                None => sink.line_to(point.x, point.y),
            }
        } else if let Some((cx, cy)) = pending.replace((point.x, point.y)) {
            sink.quad_to(cx, cy, midpoint(cx, point.x), midpoint(cy, point.y));
        }
    }
    // Close back to the start, through a trailing control point if any.
    if let Some((cx, cy)) = pending {
        sink.quad_to(cx, cy, start_x, start_y);
    }
    sink.close();
}

fn midpoint(a: f32, b: f32) -> f32 {
    (a + b) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f32, y: f32, on_curve: bool) -> ContourPoint {
        ContourPoint { x, y, on_curve }
    }

    #[test]
    fn polygon_contour() {
        let points = [
            point(0.0, 0.0, true),
            point(100.0, 0.0, true),
            point(100.0, 100.0, true),
        ];
        let mut outline = Outline::default();
        emit_quad_contours(&points, &[2], &mut outline);
        assert_eq!(
            outline.commands(),
            [
                OutlineCommand::MoveTo(0.0, 0.0),
                OutlineCommand::LineTo(100.0, 0.0),
                OutlineCommand::LineTo(100.0, 100.0),
                OutlineCommand::Close,
            ]
        );
    }

    #[test]
    fn implicit_midpoints_between_off_curve_points() {
        let points = [
            point(0.0, 0.0, true),
            point(50.0, 100.0, false),
            point(150.0, 100.0, false),
            point(200.0, 0.0, true),
        ];
        let mut outline = Outline::default();
        emit_quad_contours(&points, &[3], &mut outline);
        assert_eq!(
            outline.commands(),
            [
                OutlineCommand::MoveTo(0.0, 0.0),
                OutlineCommand::QuadTo(50.0, 100.0, 100.0, 100.0),
                OutlineCommand::QuadTo(150.0, 100.0, 200.0, 0.0),
                OutlineCommand::Close,
            ]
        );
    }

    #[test]
    fn contour_without_on_curve_points() {
        let points = [
            point(0.0, 100.0, false),
            point(100.0, 100.0, false),
            point(100.0, -100.0, false),
            point(0.0, -100.0, false),
        ];
        let mut outline = Outline::default();
        emit_quad_contours(&points, &[3], &mut outline);
        let commands = outline.commands();
        assert_eq!(commands[0], OutlineCommand::MoveTo(50.0, 100.0));
        assert_eq!(commands.len(), 6); // move + 4 quads + close
        assert_eq!(commands[5], OutlineCommand::Close);
        assert_eq!(outline.control_box(), Some([0.0, -100.0, 100.0, 100.0]));
    }
}
