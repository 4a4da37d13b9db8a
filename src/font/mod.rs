//! # Font Management
//!
//! The renderer only uses the standard PDF fonts, which need no embedding.
//! Widths come from the built-in AFM tables in [`metrics`]; every family the
//! registry doesn't know falls back to Helvetica.

pub mod metrics;

pub use metrics::StandardFontMetrics;
use std::collections::HashMap;

use crate::style::FontStyle;

/// A font registry that maps font family + weight + style to a standard font.
pub struct FontRegistry {
    fonts: HashMap<FontKey, StandardFont>,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: &str, style: FontStyle) -> Self {
        Self {
            family: family.to_string(),
            bold: style.is_bold(),
            italic: style.is_italic(),
        }
    }
}

/// The standard PDF fonts the renderer draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    pub fn metrics(&self) -> StandardFontMetrics {
        match self {
            Self::Helvetica | Self::HelveticaOblique => StandardFontMetrics::HELVETICA,
            Self::HelveticaBold | Self::HelveticaBoldOblique => {
                StandardFontMetrics::HELVETICA_BOLD
            }
            Self::Courier | Self::CourierBold | Self::CourierOblique | Self::CourierBoldOblique => {
                StandardFontMetrics::COURIER
            }
        }
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut fonts = HashMap::new();

        let standard_mappings = [
            (("Helvetica", false, false), StandardFont::Helvetica),
            (("Helvetica", true, false), StandardFont::HelveticaBold),
            (("Helvetica", false, true), StandardFont::HelveticaOblique),
            (("Helvetica", true, true), StandardFont::HelveticaBoldOblique),
            (("Courier", false, false), StandardFont::Courier),
            (("Courier", true, false), StandardFont::CourierBold),
            (("Courier", false, true), StandardFont::CourierOblique),
            (("Courier", true, true), StandardFont::CourierBoldOblique),
        ];

        for ((family, bold, italic), font) in standard_mappings {
            fonts.insert(
                FontKey {
                    family: family.to_string(),
                    bold,
                    italic,
                },
                font,
            );
        }

        Self { fonts }
    }

    /// Look up a font, falling back to Helvetica in the same style.
    pub fn resolve(&self, family: &str, style: FontStyle) -> StandardFont {
        let key = FontKey::new(family, style);
        if let Some(font) = self.fonts.get(&key) {
            return *font;
        }
        match (style.is_bold(), style.is_italic()) {
            (false, false) => StandardFont::Helvetica,
            (true, false) => StandardFont::HelveticaBold,
            (false, true) => StandardFont::HelveticaOblique,
            (true, true) => StandardFont::HelveticaBoldOblique,
        }
    }

    /// Iterate over all registered fonts.
    pub fn iter(&self) -> impl Iterator<Item = (&FontKey, &StandardFont)> {
        self.fonts.iter()
    }
}

/// Shared font context used by layout and PDF serialization.
pub struct FontContext {
    registry: FontRegistry,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Get the advance width of a single character in points.
    pub fn char_width(&self, ch: char, family: &str, style: FontStyle, font_size: f64) -> f64 {
        self.registry
            .resolve(family, style)
            .metrics()
            .char_width(ch, font_size)
    }

    /// Measure the width of a string in points.
    pub fn measure_string(&self, text: &str, family: &str, style: FontStyle, font_size: f64) -> f64 {
        self.registry
            .resolve(family, style)
            .metrics()
            .measure_string(text, font_size)
    }

    /// Resolve a family and style to the standard font that will draw it.
    pub fn resolve(&self, family: &str, style: FontStyle) -> StandardFont {
        self.registry.resolve(family, style)
    }

    /// Access the underlying font registry.
    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_context_helvetica() {
        let ctx = FontContext::new();
        let w = ctx.char_width(' ', "Helvetica", FontStyle::Normal, 12.0);
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn test_font_context_bold_wider() {
        let ctx = FontContext::new();
        let regular = ctx.char_width('b', "Helvetica", FontStyle::Normal, 12.0);
        let bold = ctx.char_width('b', "Helvetica", FontStyle::Bold, 12.0);
        assert!(bold > regular, "Bold b should be wider than regular b");
    }

    #[test]
    fn test_font_context_measure_string() {
        let ctx = FontContext::new();
        let w = ctx.measure_string("Hello", "Helvetica", FontStyle::Normal, 12.0);
        assert!(w > 0.0);
    }

    #[test]
    fn test_font_context_fallback() {
        let ctx = FontContext::new();
        let w1 = ctx.char_width('A', "Helvetica", FontStyle::Normal, 12.0);
        let w2 = ctx.char_width('A', "UnknownFont", FontStyle::Normal, 12.0);
        assert!((w1 - w2).abs() < 0.001);
        assert_eq!(
            ctx.resolve("UnknownFont", FontStyle::BoldItalic),
            StandardFont::HelveticaBoldOblique
        );
    }

    #[test]
    fn test_courier_resolves() {
        let ctx = FontContext::new();
        assert_eq!(ctx.resolve("Courier", FontStyle::Bold).pdf_name(), "Courier-Bold");
    }
}
