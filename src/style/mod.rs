//! # Style and Geometry
//!
//! Fonts, page geometry and the localized strings the renderer prints.
//!
//! All layout coordinates are millimetres measured from the top-left corner
//! of the page. Font sizes stay in points, the way typesetters quote them;
//! [`PT_PER_MM`] bridges the two.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

/// Points per millimetre (72 / 25.4).
pub const PT_PER_MM: f64 = 72.0 / 25.4;

/// Font style variants of the standard families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub fn is_bold(self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, FontStyle::Italic | FontStyle::BoldItalic)
    }
}

/// The active font: family, style and size in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    pub family: String,
    #[serde(default)]
    pub style: FontStyle,
    pub size: f64,
}

impl FontSpec {
    pub fn new(family: &str, style: FontStyle, size: f64) -> Self {
        Self {
            family: family.to_string(),
            style,
            size,
        }
    }

    pub fn helvetica(size: f64) -> Self {
        Self::new("Helvetica", FontStyle::Normal, size)
    }

    pub fn with_style(&self, style: FontStyle) -> Self {
        Self {
            family: self.family.clone(),
            style,
            size: self.size,
        }
    }

    pub fn with_size(&self, size: f64) -> Self {
        Self {
            family: self.family.clone(),
            style: self.style,
            size,
        }
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::helvetica(10.0)
    }
}

/// Standard page sizes in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in millimetres.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Page geometry and the fixed layout constants of the renderer.
///
/// `row_height` is the height of one text line; every page-break estimate
/// is expressed in these lines. `bottom_margin` is the y coordinate below
/// which no content may start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Geometry {
    pub page_size: PageSize,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub bottom_margin: f64,
    pub row_height: f64,
    /// Question column width in two-column layouts.
    pub col_width_a: f64,
    /// Answer column width in two-column layouts.
    pub col_width_b: f64,
    /// Indent of stacked answers and of wrapped choice continuation lines.
    pub choice_indent: f64,
    pub matrix_label_width: f64,
    /// Height of one wrapped line inside a matrix banner cell.
    pub banner_line_height: f64,
    pub radio_radius: f64,
    pub signature_height: f64,
    /// Assumed average character width for free-text break estimates.
    pub average_char_width: f64,
    /// Resolution used to size images that carry no physical dimensions.
    pub image_dpi: f64,
    pub body_font: FontSpec,
    pub header_font: FontSpec,
    pub title_font: FontSpec,
    pub note_font: FontSpec,
    pub furniture_font: FontSpec,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margin_left: 10.0,
            margin_right: 10.0,
            margin_top: 10.0,
            bottom_margin: 280.0,
            row_height: 4.0,
            col_width_a: 105.0,
            col_width_b: 75.0,
            choice_indent: 5.0,
            matrix_label_width: 80.0,
            banner_line_height: 5.0,
            radio_radius: 1.6,
            signature_height: 15.0,
            average_char_width: 1.8,
            image_dpi: 96.0,
            body_font: FontSpec::helvetica(10.0),
            header_font: FontSpec::new("Helvetica", FontStyle::Bold, 10.0),
            title_font: FontSpec::new("Helvetica", FontStyle::Bold, 12.0),
            note_font: FontSpec::new("Helvetica", FontStyle::Italic, 8.0),
            furniture_font: FontSpec::helvetica(8.0),
        }
    }
}

impl Geometry {
    pub fn page_width(&self) -> f64 {
        self.page_size.dimensions().0
    }

    pub fn page_height(&self) -> f64 {
        self.page_size.dimensions().1
    }

    pub fn content_width(&self) -> f64 {
        self.page_width() - self.margin_left - self.margin_right
    }

    /// X coordinate of the answer column in two-column layouts.
    pub fn answer_x(&self) -> f64 {
        self.margin_left + self.content_width() - self.col_width_b
    }

    /// Reject geometry that would make line counts meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("rowHeight", self.row_height),
            ("bannerLineHeight", self.banner_line_height),
            ("averageCharWidth", self.average_char_width),
            ("imageDpi", self.image_dpi),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RenderError::Geometry(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.content_width() <= self.matrix_label_width {
            return Err(RenderError::Geometry(format!(
                "matrixLabelWidth {} leaves no room for choice columns",
                self.matrix_label_width
            )));
        }
        if self.bottom_margin <= self.margin_top + self.row_height {
            return Err(RenderError::Geometry(format!(
                "bottomMargin {} leaves no room below marginTop {}",
                self.bottom_margin, self.margin_top
            )));
        }
        Ok(())
    }

    /// Number of text lines needed to cover `height`, rounded up.
    pub fn lines_for_height(&self, height: f64) -> usize {
        if height <= 0.0 {
            0
        } else {
            (height / self.row_height).ceil() as usize
        }
    }

    /// Side of a checkbox glyph.
    pub fn checkbox_side(&self) -> f64 {
        self.row_height - 1.0
    }
}

/// Strings the renderer prints on its own behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Labels {
    pub page: String,
    pub confidential: String,
    pub record: String,
    pub locked_by: String,
    pub signed_by: String,
    pub on: String,
    pub yes: String,
    pub no: String,
    pub true_label: String,
    pub false_label: String,
    pub signature_unavailable: String,
    pub attachment: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            page: "Page".to_string(),
            confidential: "Confidential".to_string(),
            record: "Record ID".to_string(),
            locked_by: "Locked by".to_string(),
            signed_by: "E-signed by".to_string(),
            on: "on".to_string(),
            yes: "Yes".to_string(),
            no: "No".to_string(),
            true_label: "True".to_string(),
            false_label: "False".to_string(),
            signature_unavailable: "[signature on file]".to_string(),
            attachment: "Attachment:".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_columns_fill_content_width() {
        let g = Geometry::default();
        assert!((g.content_width() - 190.0).abs() < 1e-9);
        assert!((g.answer_x() - 125.0).abs() < 1e-9);
        assert!(g.col_width_a + g.col_width_b <= g.content_width());
    }

    #[test]
    fn lines_for_height_rounds_up() {
        let g = Geometry::default();
        assert_eq!(g.lines_for_height(0.0), 0);
        assert_eq!(g.lines_for_height(4.0), 1);
        assert_eq!(g.lines_for_height(5.0), 2);
    }

    #[test]
    fn default_geometry_is_valid() {
        assert!(Geometry::default().validate().is_ok());
    }

    #[test]
    fn zero_row_height_is_rejected() {
        let g: Geometry = serde_json::from_str(r#"{ "rowHeight": 0 }"#).unwrap();
        assert!(matches!(g.validate(), Err(RenderError::Geometry(_))));
        let g = Geometry {
            banner_line_height: -1.0,
            ..Geometry::default()
        };
        assert!(g.validate().is_err());
    }

    #[test]
    fn partial_geometry_json_keeps_defaults() {
        let g: Geometry = serde_json::from_str(r#"{ "rowHeight": 5.0 }"#).unwrap();
        assert_eq!(g.row_height, 5.0);
        assert_eq!(g.bottom_margin, 280.0);
        assert_eq!(g.page_size, PageSize::A4);
    }
}
