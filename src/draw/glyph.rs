//! Checkbox and radio glyphs, and the diagonal "chosen" mark.
//!
//! Both glyphs are placed by the top-left corner of their bounding box so
//! callers can line them up with a text row.

use super::{circle_path, DrawCommand};

/// The shape of a choice glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphShape {
    /// Square, for checkbox-family fields.
    Square,
    /// Circle, for single-choice fields.
    Circle,
}

/// Draw a glyph with its bounding box at (`x`, `y`).
///
/// `side` is the square's side; `radius` the circle's radius. When `chosen`
/// two diagonals cross the box, inset for circles so the strokes stay
/// inside the outline.
pub fn choice_glyph(
    shape: GlyphShape,
    x: f64,
    y: f64,
    side: f64,
    radius: f64,
    chosen: bool,
) -> Vec<DrawCommand> {
    let mut out = Vec::with_capacity(3);
    match shape {
        GlyphShape::Square => {
            out.push(DrawCommand::rect(x, y, side, side));
            if chosen {
                out.extend(diagonals(x, y, side, 0.0));
            }
        }
        GlyphShape::Circle => {
            let d = radius * 2.0;
            out.push(circle_path(x + radius, y + radius, radius));
            if chosen {
                // Corners of the inscribed square sit r(1 - 1/√2) in from the box.
                let inset = radius * (1.0 - std::f64::consts::FRAC_1_SQRT_2);
                out.extend(diagonals(x, y, d, inset));
            }
        }
    }
    out
}

/// Width a glyph occupies on a text row.
pub fn glyph_width(shape: GlyphShape, side: f64, radius: f64) -> f64 {
    match shape {
        GlyphShape::Square => side,
        GlyphShape::Circle => radius * 2.0,
    }
}

fn diagonals(x: f64, y: f64, size: f64, inset: f64) -> [DrawCommand; 2] {
    let (x0, y0) = (x + inset, y + inset);
    let (x1, y1) = (x + size - inset, y + size - inset);
    [
        DrawCommand::line(x0, y0, x1, y1),
        DrawCommand::line(x0, y1, x1, y0),
    ]
}
