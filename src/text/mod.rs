//! # Text Metrics
//!
//! Width measurement and line wrapping in layout units (millimetres).
//!
//! Wrapping is deliberately simple: the renderer only needs to know where a
//! line ends and how many lines a label or value will take, so it cuts at
//! spaces using a proportional estimate instead of running a full line
//! breaking algorithm. Pathological input (one token wider than the page,
//! thousands of lines) is bounded by an iteration cap.

pub mod markup;

use unicode_script::{Script, UnicodeScript};

use crate::font::FontContext;
use crate::style::{FontSpec, PT_PER_MM};

/// Proportional cutting gives way to plain greedy word packing after this
/// many cuts per paragraph.
pub const MAX_WRAP_ITERATIONS: usize = 50;

/// Measures and wraps text with the standard font metrics.
pub struct TextMetrics {
    fonts: FontContext,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMetrics {
    pub fn new() -> Self {
        Self {
            fonts: FontContext::new(),
        }
    }

    pub fn fonts(&self) -> &FontContext {
        &self.fonts
    }

    /// Width of `text` on a single line, in millimetres.
    pub fn measure_width(&self, text: &str, font: &FontSpec) -> f64 {
        self.fonts
            .measure_string(text, &font.family, font.style, font.size)
            / PT_PER_MM
    }

    fn char_width(&self, ch: char, font: &FontSpec) -> f64 {
        self.fonts.char_width(ch, &font.family, font.style, font.size) / PT_PER_MM
    }

    /// Split `text` into lines no wider than `max_width`.
    ///
    /// Explicit newlines always start a new line. Every returned line is
    /// trimmed, and at least one line (possibly empty) is returned.
    pub fn wrap_to_width(&self, text: &str, font: &FontSpec, max_width: f64) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            lines.extend(self.wrap_paragraph(paragraph.trim_end_matches('\r'), font, max_width));
        }
        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }

    /// Number of lines `text` wraps to.
    pub fn line_count(&self, text: &str, font: &FontSpec, max_width: f64) -> usize {
        self.wrap_to_width(text, font, max_width).len()
    }

    fn wrap_paragraph(&self, text: &str, font: &FontSpec, max_width: f64) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() || max_width <= 0.0 {
            return vec![text.to_string()];
        }
        if is_multibyte(text) {
            return self.chunk_fixed(text, font, max_width);
        }

        let mut lines = Vec::new();
        let mut remaining: Vec<char> = text.chars().collect();
        let mut iterations = 0;

        while !remaining.is_empty() {
            let widths: Vec<f64> = remaining.iter().map(|c| self.char_width(*c, font)).collect();
            let width: f64 = widths.iter().sum();
            if width <= max_width {
                lines.push(remaining.iter().collect::<String>());
                break;
            }

            iterations += 1;
            if iterations > MAX_WRAP_ITERATIONS {
                log::debug!(
                    "wrap switched to greedy packing after {} cuts; {} chars left",
                    MAX_WRAP_ITERATIONS,
                    remaining.len()
                );
                lines.extend(self.pack_words(&remaining, font, max_width));
                break;
            }

            let cut = find_cut(&remaining, &widths, max_width, width);
            let head: String = remaining[..cut].iter().collect();
            lines.push(head.trim().to_string());
            let rest = &remaining[cut..];
            let skip = rest.iter().take_while(|c| c.is_whitespace()).count();
            remaining = rest[skip..].to_vec();
        }

        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }

    /// Greedy word packing in a single pass. Only a word wider than the
    /// whole line is cut by character.
    fn pack_words(&self, chars: &[char], font: &FontSpec, max_width: f64) -> Vec<String> {
        let space = self.char_width(' ', font);
        let mut out = Vec::new();
        let mut line = String::new();
        let mut line_width = 0.0;

        for word in chars.split(|c| c.is_whitespace()).filter(|w| !w.is_empty()) {
            let widths: Vec<f64> = word.iter().map(|c| self.char_width(*c, font)).collect();
            let width: f64 = widths.iter().sum();

            if !line.is_empty() && line_width + space + width <= max_width {
                line.push(' ');
                line.extend(word.iter());
                line_width += space + width;
                continue;
            }
            if !line.is_empty() {
                out.push(std::mem::take(&mut line));
            }
            if width <= max_width {
                line.extend(word.iter());
                line_width = width;
                continue;
            }

            let mut pieces = chunk_by_width(word, &widths, max_width);
            if let Some(last) = pieces.pop() {
                out.extend(pieces);
                line_width = self.measure_width(&last, font);
                line = last;
            }
        }
        if !line.is_empty() {
            out.push(line);
        }
        out
    }

    /// Chunk double-width or non-Latin text by a fixed character count.
    /// Proportional estimates are unreliable for these scripts.
    fn chunk_fixed(&self, text: &str, font: &FontSpec, max_width: f64) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let widest = chars
            .iter()
            .map(|c| self.char_width(*c, font))
            .fold(0.0f64, f64::max);
        let per_line = if widest > 0.0 {
            ((max_width / widest).floor() as usize).max(1)
        } else {
            chars.len().max(1)
        };
        chars
            .chunks(per_line)
            .map(|chunk| chunk.iter().collect::<String>().trim().to_string())
            .collect()
    }

    /// Free-text estimate: characters times an assumed average width.
    pub fn estimate_lines_by_ratio(&self, text: &str, max_width: f64, average_char_width: f64) -> usize {
        if max_width <= 0.0 {
            return 1;
        }
        text.split('\n')
            .map(|p| {
                let chars = p.trim().chars().count() as f64;
                ((chars * average_char_width / max_width).ceil() as usize).max(1)
            })
            .sum::<usize>()
            .max(1)
    }
}

/// Pick the cut index for an over-wide line.
///
/// Estimates proportionally, clamps to the longest prefix that fits, then
/// searches backward for a space. Falls back to the first space anywhere,
/// then to a hard cut at the estimate.
fn find_cut(chars: &[char], widths: &[f64], max_width: f64, width: f64) -> usize {
    let len = chars.len();
    let proportional = ((max_width / width) * len as f64).floor() as usize;

    let mut fits = 0;
    let mut acc = 0.0;
    for w in widths {
        acc += w;
        if acc > max_width {
            break;
        }
        fits += 1;
    }

    let estimate = proportional.min(fits).max(1).min(len);
    let search_from = estimate.min(len - 1);
    for i in (1..=search_from).rev() {
        if chars[i] == ' ' {
            return i;
        }
    }

    match chars.iter().position(|c| *c == ' ') {
        Some(p) if p > 0 => p,
        _ => estimate,
    }
}

/// Greedy character chunking; every chunk fits unless a single char doesn't.
fn chunk_by_width(chars: &[char], widths: &[f64], max_width: f64) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut acc = 0.0;
    for (i, w) in widths.iter().enumerate() {
        if acc + w > max_width && i > start {
            out.push(chars[start..i].iter().collect::<String>().trim().to_string());
            start = i;
            acc = 0.0;
        }
        acc += w;
    }
    if start < chars.len() {
        out.push(chars[start..].iter().collect::<String>().trim().to_string());
    }
    out
}

/// True when `text` contains characters from a non-Latin script.
pub fn is_multibyte(text: &str) -> bool {
    text.chars().any(|c| {
        !matches!(
            c.script(),
            Script::Latin | Script::Common | Script::Inherited | Script::Unknown
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> FontSpec {
        FontSpec::helvetica(10.0)
    }

    #[test]
    fn test_single_line() {
        let tm = TextMetrics::new();
        let lines = tm.wrap_to_width("Hello", &body(), 100.0);
        assert_eq!(lines, vec!["Hello".to_string()]);
    }

    #[test]
    fn test_empty_string() {
        let tm = TextMetrics::new();
        let lines = tm.wrap_to_width("", &body(), 100.0);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].is_empty());
    }

    #[test]
    fn test_explicit_newline() {
        let tm = TextMetrics::new();
        let lines = tm.wrap_to_width("Hello\r\nWorld", &body(), 100.0);
        assert_eq!(lines, vec!["Hello".to_string(), "World".to_string()]);
    }

    #[test]
    fn test_break_at_space_fits() {
        let tm = TextMetrics::new();
        let text = "the quick brown fox jumps over the lazy dog and keeps on running far away";
        let lines = tm.wrap_to_width(text, &body(), 40.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(tm.measure_width(line, &body()) <= 40.0, "{line:?} too wide");
            assert_eq!(line.trim(), line);
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_unbreakable_token_terminates() {
        let tm = TextMetrics::new();
        let token = "W".repeat(400);
        let lines = tm.wrap_to_width(&token, &body(), 10.0);
        assert!(!lines.is_empty());
        let total: usize = lines.iter().map(|l| l.chars().count()).sum();
        assert_eq!(total, 400);
    }

    #[test]
    fn test_first_space_fallback_keeps_word_whole() {
        let tm = TextMetrics::new();
        let lines = tm.wrap_to_width("Pneumonoultramicroscopic disease", &body(), 20.0);
        assert_eq!(lines[0], "Pneumonoultramicroscopic");
        assert_eq!(lines[1], "disease");
    }

    #[test]
    fn test_long_text_hits_iteration_cap() {
        let tm = TextMetrics::new();
        let text = "word ".repeat(2000);
        let lines = tm.wrap_to_width(&text, &body(), 30.0);
        assert!(lines.len() > MAX_WRAP_ITERATIONS);
        for line in &lines {
            assert!(tm.measure_width(line, &body()) <= 30.0);
            assert!(line.split(' ').all(|w| w == "word"), "split word in {line:?}");
        }
        let words: usize = lines.iter().map(|l| l.split(' ').count()).sum();
        assert_eq!(words, 2000);
    }

    #[test]
    fn test_oversized_word_after_cap_is_cut_alone() {
        let tm = TextMetrics::new();
        let mut text = "word ".repeat(400);
        text.push_str(&"W".repeat(60));
        text.push_str(" tail");
        let lines = tm.wrap_to_width(&text, &body(), 30.0);
        for line in &lines {
            assert!(tm.measure_width(line, &body()) <= 30.0);
        }
        let joined: String = lines.concat();
        assert_eq!(joined.matches('W').count(), 60);
        assert!(lines.last().is_some_and(|l| l.ends_with("tail")));
        assert!(lines.iter().filter(|l| l.contains("word")).all(|l| l.split(' ').all(|w| w == "word")));
    }

    #[test]
    fn test_tiny_width_still_terminates() {
        let tm = TextMetrics::new();
        let lines = tm.wrap_to_width("a b c", &body(), 0.01);
        assert!(!lines.is_empty());
    }

    #[test]
    fn test_multibyte_chunks_by_count() {
        let tm = TextMetrics::new();
        let text = "漢字漢字漢字漢字漢字漢字漢字漢字漢字漢字";
        let lines = tm.wrap_to_width(text, &body(), 20.0);
        assert!(lines.len() > 1);
        let first = lines[0].chars().count();
        assert!(lines[..lines.len() - 1].iter().all(|l| l.chars().count() == first));
        for line in &lines {
            assert!(tm.measure_width(line, &body()) <= 20.0);
        }
    }

    #[test]
    fn test_is_multibyte() {
        assert!(!is_multibyte("Café, naïve – 100%"));
        assert!(is_multibyte("Привет"));
        assert!(is_multibyte("日本"));
    }

    #[test]
    fn test_ratio_estimate() {
        let tm = TextMetrics::new();
        assert_eq!(tm.estimate_lines_by_ratio("", 75.0, 1.8), 1);
        let text = "x".repeat(100);
        assert_eq!(tm.estimate_lines_by_ratio(&text, 75.0, 1.8), 3);
        assert_eq!(tm.estimate_lines_by_ratio("a\nb", 75.0, 1.8), 2);
    }
}
