//! # Matrix Groups
//!
//! Contiguous fields sharing a grid name are drawn as one grid: a banner
//! row naming the choice columns, then one row per field with a label cell
//! and one glyph per column.
//!
//! Before a group starts its whole height is estimated in closed form so a
//! single page break can be taken up front. The estimate never undershoots
//! what the rows really use, so an accepted group is never split by the
//! per-row fallback.

use crate::draw::glyph::GlyphShape;
use crate::draw::DrawCommand;
use crate::model::{Choice, FieldSchema};
use crate::style::{FontSpec, Geometry};

use super::fields::draw_glyph;
use super::page_break::Pager;
use super::FieldEnv;

/// Where a field sits relative to the matrix group before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixBoundary {
    /// First field of a group; `closes_previous` when it directly follows
    /// another group.
    Starting { closes_previous: bool },
    Continuing,
    /// First field after a group.
    Ended,
    None,
}

impl MatrixBoundary {
    pub fn between(previous: Option<&str>, current: Option<&str>) -> Self {
        match (previous, current) {
            (None, None) => MatrixBoundary::None,
            (None, Some(_)) => MatrixBoundary::Starting {
                closes_previous: false,
            },
            (Some(p), Some(c)) if p == c => MatrixBoundary::Continuing,
            (Some(_), Some(_)) => MatrixBoundary::Starting {
                closes_previous: true,
            },
            (Some(_), None) => MatrixBoundary::Ended,
        }
    }

    /// A section header on a grid row splits the group there: the rows
    /// above are closed and a new group with its own banner starts.
    pub fn split_at_header(self, has_header: bool) -> Self {
        match self {
            MatrixBoundary::Continuing if has_header => MatrixBoundary::Starting {
                closes_previous: true,
            },
            other => other,
        }
    }

    /// Does this boundary close the group before it?
    pub fn closes_group(self) -> bool {
        matches!(
            self,
            MatrixBoundary::Ended
                | MatrixBoundary::Starting {
                    closes_previous: true
                }
        )
    }
}

/// Column layout shared by every row of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixGroup {
    pub name: String,
    pub choices: Vec<Choice>,
    /// Wrapped banner text per column.
    pub banner: Vec<Vec<String>>,
    pub banner_height: f64,
    pub column_width: f64,
}

impl MatrixGroup {
    /// Lay out the banner from the group's first field.
    pub(crate) fn new(pager: &Pager, env: &FieldEnv<'_>, first: &FieldSchema, name: &str) -> Self {
        let g = pager.geometry();
        let choices = first.display_choices(env.labels);
        let columns = choices.len().max(1);
        let column_width = (g.content_width() - g.matrix_label_width) / columns as f64;
        let font = banner_font(g);
        let banner: Vec<Vec<String>> = choices
            .iter()
            .map(|c| pager.wrap(&env.resolve(&c.label), &font, column_width - 2.0))
            .collect();
        let max_lines = banner.iter().map(Vec::len).max().unwrap_or(1).max(1);
        Self {
            name: name.to_string(),
            choices,
            banner,
            banner_height: g.banner_line_height * max_lines as f64,
            column_width,
        }
    }

    /// Banner height in text rows, rounded up.
    pub fn banner_rows(&self, g: &Geometry) -> usize {
        g.lines_for_height(self.banner_height)
    }

    fn column_x(&self, g: &Geometry, index: usize) -> f64 {
        g.margin_left + g.matrix_label_width + self.column_width * index as f64
    }
}

fn banner_font(g: &Geometry) -> FontSpec {
    g.furniture_font.clone()
}

/// Wrapped label lines of one matrix row.
pub(crate) fn row_label_lines(pager: &Pager, label: &str) -> Vec<String> {
    let g = pager.geometry();
    pager.wrap(label, &g.body_font, g.matrix_label_width - 2.0)
}

/// Closed-form height of a whole group in rows: header (plus two rows of
/// padding), the banner, and every row's label lines.
pub fn group_estimate(header_lines: Option<usize>, banner_rows: usize, row_lines: &[usize]) -> usize {
    header_lines.map_or(0, |h| h + 2) + banner_rows + row_lines.iter().sum::<usize>()
}

/// Draw the banner: an empty label cell, then one bordered cell per column.
pub(crate) fn draw_banner(pager: &mut Pager, group: &MatrixGroup) {
    let g = pager.geometry().clone();
    pager.break_if_needed(group.banner_rows(&g));
    let top = pager.canvas.y();
    let font = banner_font(&g);

    pager.canvas.push(DrawCommand::rect(
        g.margin_left,
        top,
        g.matrix_label_width,
        group.banner_height,
    ));

    for (i, lines) in group.banner.iter().enumerate() {
        let x = group.column_x(&g, i);
        pager.canvas.push(DrawCommand::rect(x, top, group.column_width, group.banner_height));
        for (j, line) in lines.iter().enumerate() {
            let w = pager.metrics().measure_width(line, &font);
            let baseline = top + g.banner_line_height * (j as f64 + 0.75);
            pager.canvas.push(DrawCommand::text(
                x + (group.column_width - w) / 2.0,
                baseline,
                line.as_str(),
                &font,
            ));
        }
    }
    pager.canvas.advance(group.banner_height);
}

/// Draw one row: bordered label cell plus one glyph per column.
pub(crate) fn draw_row(pager: &mut Pager, env: &FieldEnv<'_>, group: &MatrixGroup, field: &FieldSchema, label: &[String]) {
    let g = pager.geometry().clone();
    let lines = label.len().max(1);
    pager.break_if_needed(lines);

    let top = pager.canvas.y();
    let height = g.row_height * lines as f64;
    pager
        .canvas
        .push(DrawCommand::rect(g.margin_left, top, g.matrix_label_width, height));
    for (i, line) in label.iter().enumerate() {
        let baseline = top + g.row_height * (i as f64 + 0.75);
        pager
            .canvas
            .push(DrawCommand::text(g.margin_left + 1.0, baseline, line.as_str(), &g.body_font));
    }

    let shape = if field.is_checkbox_family() {
        GlyphShape::Square
    } else {
        GlyphShape::Circle
    };
    let glyph_w = match shape {
        GlyphShape::Square => g.checkbox_side(),
        GlyphShape::Circle => g.radio_radius * 2.0,
    };
    let value = env.value(&field.name);
    for (i, choice) in group.choices.iter().enumerate() {
        let x = group.column_x(&g, i);
        pager
            .canvas
            .push(DrawCommand::rect(x, top, group.column_width, height));
        let chosen = value.is_some_and(|v| v.is_chosen(&choice.code));
        let gx = x + (group.column_width - glyph_w) / 2.0;
        draw_glyph(pager, &g, shape, gx, top, chosen);
    }
    pager.canvas.advance(height);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_transitions() {
        assert_eq!(MatrixBoundary::between(None, None), MatrixBoundary::None);
        assert_eq!(
            MatrixBoundary::between(None, Some("g")),
            MatrixBoundary::Starting {
                closes_previous: false
            }
        );
        assert_eq!(MatrixBoundary::between(Some("g"), Some("g")), MatrixBoundary::Continuing);
        assert_eq!(
            MatrixBoundary::between(Some("g"), Some("h")),
            MatrixBoundary::Starting {
                closes_previous: true
            }
        );
        assert_eq!(MatrixBoundary::between(Some("g"), None), MatrixBoundary::Ended);
    }

    #[test]
    fn closes_group_only_after_a_group() {
        assert!(MatrixBoundary::Ended.closes_group());
        assert!(MatrixBoundary::between(Some("a"), Some("b")).closes_group());
        assert!(!MatrixBoundary::between(None, Some("b")).closes_group());
        assert!(!MatrixBoundary::Continuing.closes_group());
    }

    #[test]
    fn header_splits_a_continuing_group() {
        assert_eq!(
            MatrixBoundary::Continuing.split_at_header(true),
            MatrixBoundary::Starting {
                closes_previous: true
            }
        );
        assert_eq!(MatrixBoundary::Continuing.split_at_header(false), MatrixBoundary::Continuing);
        assert_eq!(MatrixBoundary::None.split_at_header(true), MatrixBoundary::None);
    }

    #[test]
    fn estimate_adds_header_padding() {
        assert_eq!(group_estimate(None, 2, &[1, 1, 2]), 6);
        assert_eq!(group_estimate(Some(1), 2, &[1, 1, 2]), 9);
    }
}
