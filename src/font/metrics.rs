//! Advance widths of the standard PDF fonts, in 1/1000 em.
//!
//! Tables cover printable ASCII (0x20..=0x7E). Anything else falls back to a
//! per-font default, or a full em for double-width scripts.

/// Helvetica / Helvetica-Oblique.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Helvetica-Bold / Helvetica-BoldOblique.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

/// Full em used for CJK and other double-width characters.
pub const WIDE_ADVANCE: u16 = 1000;

/// Width table for one standard font.
#[derive(Debug, Clone, Copy)]
pub struct StandardFontMetrics {
    widths: Option<&'static [u16; 95]>,
    /// Advance for every char when `widths` is None (monospaced fonts),
    /// otherwise the fallback for chars outside the table.
    default_advance: u16,
}

impl StandardFontMetrics {
    pub const HELVETICA: Self = Self {
        widths: Some(&HELVETICA),
        default_advance: 556,
    };

    pub const HELVETICA_BOLD: Self = Self {
        widths: Some(&HELVETICA_BOLD),
        default_advance: 611,
    };

    pub const COURIER: Self = Self {
        widths: None,
        default_advance: 600,
    };

    /// Advance width of `ch` in 1/1000 em.
    pub fn advance(&self, ch: char) -> u16 {
        if is_wide_char(ch) {
            return WIDE_ADVANCE;
        }
        let cp = ch as u32;
        match self.widths {
            Some(table) if (0x20..=0x7E).contains(&cp) => table[(cp - 0x20) as usize],
            _ => self.default_advance,
        }
    }

    /// Width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        self.advance(ch) as f64 * font_size / 1000.0
    }

    /// Width of a string in points.
    pub fn measure_string(&self, text: &str, font_size: f64) -> f64 {
        let units: u32 = text.chars().map(|c| self.advance(c) as u32).sum();
        units as f64 * font_size / 1000.0
    }
}

/// East Asian wide and fullwidth ranges.
pub fn is_wide_char(ch: char) -> bool {
    matches!(ch as u32,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_space_width() {
        let w = StandardFontMetrics::HELVETICA.char_width(' ', 12.0);
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn courier_is_monospaced() {
        let m = StandardFontMetrics::COURIER;
        assert_eq!(m.advance('i'), m.advance('W'));
    }

    #[test]
    fn cjk_is_full_em() {
        assert_eq!(StandardFontMetrics::HELVETICA.advance('漢'), WIDE_ADVANCE);
        assert!(is_wide_char('한'));
        assert!(!is_wide_char('é'));
    }
}
