//! # Draw Commands
//!
//! The output of layout: an ordered list of drawing primitives per page.
//! Coordinates are millimetres from the top-left corner of the page; text
//! positions are baselines.
//!
//! Circles are not a primitive. They are emitted as a [`DrawCommand::Path`]
//! of four cubic Bézier arcs, which every backend (PDF included) can draw.

pub mod glyph;

use serde::Serialize;

use crate::image_loader::LoadedImage;
use crate::style::FontSpec;

/// Control-point distance of a quarter-circle Bézier arc, as a fraction of
/// the radius: 4/3 · (√2 − 1).
pub fn bezier_circle_factor() -> f64 {
    4.0 / 3.0 * (std::f64::consts::SQRT_2 - 1.0)
}

/// A single path segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PathOp {
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    CurveTo {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        x: f64,
        y: f64,
    },
    Close,
}

/// What to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DrawCommand {
    /// A text run with its baseline at `y`.
    Text {
        x: f64,
        y: f64,
        text: String,
        font: FontSpec,
    },
    /// An axis-aligned rectangle, stroked or filled.
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        filled: bool,
        /// Grey level 0.0 (black) – 1.0 (white) used for fills.
        gray: f64,
    },
    /// A straight stroked line.
    Line { x0: f64, y0: f64, x1: f64, y1: f64 },
    /// A stroked path (circles and arcs).
    Path { ops: Vec<PathOp> },
    /// A raster image scaled into the given box.
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        /// Identifier the image was fetched under.
        source: String,
        #[serde(skip)]
        image: LoadedImage,
    },
}

impl DrawCommand {
    pub fn text(x: f64, y: f64, text: impl Into<String>, font: &FontSpec) -> Self {
        DrawCommand::Text {
            x,
            y,
            text: text.into(),
            font: font.clone(),
        }
    }

    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        DrawCommand::Rect {
            x,
            y,
            width,
            height,
            filled: false,
            gray: 0.0,
        }
    }

    pub fn filled_rect(x: f64, y: f64, width: f64, height: f64, gray: f64) -> Self {
        DrawCommand::Rect {
            x,
            y,
            width,
            height,
            filled: true,
            gray,
        }
    }

    pub fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        DrawCommand::Line { x0, y0, x1, y1 }
    }

    /// Text content, for text commands.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DrawCommand::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// A circle of radius `r` around (`cx`, `cy`) as four Bézier arcs.
pub fn circle_path(cx: f64, cy: f64, r: f64) -> DrawCommand {
    let k = bezier_circle_factor() * r;
    DrawCommand::Path {
        ops: vec![
            PathOp::MoveTo { x: cx + r, y: cy },
            PathOp::CurveTo {
                x1: cx + r,
                y1: cy + k,
                x2: cx + k,
                y2: cy + r,
                x: cx,
                y: cy + r,
            },
            PathOp::CurveTo {
                x1: cx - k,
                y1: cy + r,
                x2: cx - r,
                y2: cy + k,
                x: cx - r,
                y: cy,
            },
            PathOp::CurveTo {
                x1: cx - r,
                y1: cy - k,
                x2: cx - k,
                y2: cy - r,
                x: cx,
                y: cy - r,
            },
            PathOp::CurveTo {
                x1: cx + k,
                y1: cy - r,
                x2: cx + r,
                y2: cy - k,
                x: cx + r,
                y: cy,
            },
            PathOp::Close,
        ],
    }
}

/// A laid-out page: its number and the commands drawn on it, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub number: usize,
    pub width: f64,
    pub height: f64,
    pub commands: Vec<DrawCommand>,
}

impl RenderedPage {
    /// All text runs on the page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| c.as_text())
    }
}

/// The full output of a render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    pub pages: Vec<RenderedPage>,
}

impl RenderedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// True when any page carries a text run containing `needle`.
    pub fn contains_text(&self, needle: &str) -> bool {
        self.pages
            .iter()
            .any(|p| p.texts().any(|t| t.contains(needle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_factor_matches_standard_constant() {
        assert!((bezier_circle_factor() - 0.5522847498).abs() < 1e-9);
    }

    #[test]
    fn circle_path_starts_and_ends_on_the_circle() {
        let DrawCommand::Path { ops } = circle_path(10.0, 20.0, 2.0) else {
            panic!("circle must be a path");
        };
        assert_eq!(ops.len(), 6);
        assert_eq!(ops[0], PathOp::MoveTo { x: 12.0, y: 20.0 });
        let curves = ops
            .iter()
            .filter(|op| matches!(op, PathOp::CurveTo { .. }))
            .count();
        assert_eq!(curves, 4);
        match ops[4] {
            PathOp::CurveTo { x, y, .. } => {
                assert_eq!((x, y), (12.0, 20.0));
            }
            _ => panic!("last arc should close the circle"),
        }
    }

    #[test]
    fn image_payload_is_not_serialized() {
        let cmd = DrawCommand::text(1.0, 2.0, "Name", &FontSpec::default());
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"text\":\"Name\""));
    }
}
