//! # Page Breaks
//!
//! The break predictor and the page furniture. Every element asks
//! [`Pager::will_overflow`] with its own estimate of how many text lines it
//! needs; when the answer is yes a new page is started and the furniture is
//! replayed, whichever renderer asked.

use crate::draw::{DrawCommand, RenderedDocument};
use crate::image_loader::LoadedImage;
use crate::style::{FontSpec, Geometry};
use crate::text::TextMetrics;

use super::cursor::Canvas;

/// Fraction of a row between the row top and the text baseline.
const BASELINE: f64 = 0.75;
/// Fraction of a row between the row top and a blank rule.
const RULE: f64 = 0.9;

/// A footer image, fetched once per render.
#[derive(Debug, Clone)]
pub struct FooterImage {
    pub source: String,
    pub image: LoadedImage,
}

/// What is repeated on every page.
#[derive(Debug, Clone, Default)]
pub struct Furniture {
    pub footer: Option<FooterImage>,
    pub confidential: Option<String>,
    pub header_text: Option<String>,
    /// Record / event label. Set per record while rendering data.
    pub running_label: Option<String>,
    pub survey_mode: bool,
    /// Word printed before the page number.
    pub page_label: String,
}

/// The canvas together with the rules for moving through pages.
pub struct Pager {
    pub canvas: Canvas,
    geometry: Geometry,
    furniture: Furniture,
    metrics: TextMetrics,
}

impl Pager {
    pub fn new(geometry: Geometry, furniture: Furniture) -> Self {
        Self {
            canvas: Canvas::new(),
            geometry,
            furniture,
            metrics: TextMetrics::new(),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn metrics(&self) -> &TextMetrics {
        &self.metrics
    }

    pub fn set_running_label(&mut self, label: Option<String>) {
        self.furniture.running_label = label;
    }

    /// Would `lines` more rows run past the bottom margin?
    pub fn will_overflow(&self, lines: usize) -> bool {
        self.geometry.row_height * lines as f64 + self.canvas.y() > self.geometry.bottom_margin
    }

    /// Break before an element of `lines` rows if it would overflow.
    ///
    /// Never breaks at the top of a fresh page; an element taller than a
    /// page starts there and breaks line by line instead.
    pub fn break_if_needed(&mut self, lines: usize) -> bool {
        if self.canvas.page() == 0 {
            self.start_new_page();
            return true;
        }
        if self.canvas.at_page_top() || !self.will_overflow(lines) {
            return false;
        }
        self.start_new_page();
        true
    }

    /// Start a page and draw its furniture.
    pub fn start_new_page(&mut self) {
        let g = &self.geometry;
        self.canvas.begin_page(g.margin_left, g.margin_top);
        log::debug!("page {} started", self.canvas.page());

        let mut drew = false;

        // The footer sits below the bottom margin; drawing it now leaves the
        // cursor alone.
        if let Some(footer) = &self.furniture.footer {
            let (x, y, w, h) = footer_box(g, &footer.image);
            self.canvas.push(DrawCommand::Image {
                x,
                y,
                width: w,
                height: h,
                source: footer.source.clone(),
                image: footer.image.clone(),
            });
        }

        let font = g.furniture_font.clone();
        let width = g.content_width();
        let x = g.margin_left;

        if let Some(text) = self.furniture.confidential.clone() {
            self.write(x, &text, &font.with_style(crate::style::FontStyle::Bold));
            self.newline();
            drew = true;
        }

        if let Some(text) = self.furniture.header_text.clone() {
            for line in self.metrics.wrap_to_width(&text, &font, width) {
                self.write(x, &line, &font);
                self.newline();
            }
            drew = true;
        }

        if !self.furniture.survey_mode {
            if let Some(label) = self.furniture.running_label.clone() {
                self.write(x, &label, &font);
                self.newline();
                let page_line = format!("{} {}", self.furniture.page_label, self.canvas.page());
                self.write(x, &page_line, &font);
                self.newline();
                drew = true;
            }
        }

        if drew {
            self.newline();
        }
        self.canvas.mark_content_top();
    }

    /// Start a page if the next row would overflow.
    pub fn ensure_line(&mut self) {
        if self.canvas.page() == 0 || (!self.canvas.at_page_top() && self.will_overflow(1)) {
            self.start_new_page();
        }
    }

    /// Draw `text` on the current row.
    pub fn write(&mut self, x: f64, text: &str, font: &FontSpec) {
        let y = self.canvas.y() + self.geometry.row_height * BASELINE;
        self.canvas.push(DrawCommand::text(x, y, text, font));
    }

    /// Draw `text` right-aligned so it ends at `right`.
    pub fn write_right(&mut self, right: f64, text: &str, font: &FontSpec) {
        let w = self.metrics.measure_width(text, font);
        self.write(right - w, text, font);
    }

    pub fn newline(&mut self) {
        self.canvas.advance(self.geometry.row_height);
    }

    pub fn advance_lines(&mut self, lines: usize) {
        self.canvas.advance(self.geometry.row_height * lines as f64);
    }

    pub fn wrap(&self, text: &str, font: &FontSpec, width: f64) -> Vec<String> {
        self.metrics.wrap_to_width(text, font, width)
    }

    /// Wrap and draw `text`, breaking line by line if it runs off the page.
    pub fn write_block(&mut self, x: f64, width: f64, text: &str, font: &FontSpec) -> usize {
        let lines = self.wrap(text, font, width);
        for line in &lines {
            self.ensure_line();
            self.write(x, line, font);
            self.newline();
        }
        lines.len()
    }

    /// A blank answer line on the current row.
    pub fn rule(&mut self, x: f64, width: f64) {
        let y = self.canvas.y() + self.geometry.row_height * RULE;
        self.canvas.push(DrawCommand::line(x, y, x + width, y));
    }

    pub fn finish(self) -> RenderedDocument {
        let (w, h) = (self.geometry.page_width(), self.geometry.page_height());
        self.canvas.into_document(w, h)
    }
}

/// Footer box: natural size, shrunk into the band under the bottom margin.
fn footer_box(g: &Geometry, image: &LoadedImage) -> (f64, f64, f64, f64) {
    let gap = 1.5;
    let band = (g.page_height() - g.bottom_margin - 2.0 * gap).max(0.0);
    let (nw, nh) = image.natural_size_mm(g.image_dpi);
    let scale = if nw > 0.0 && nh > 0.0 {
        (band / nh).min(g.content_width() / nw).min(1.0)
    } else {
        0.0
    };
    (g.margin_left, g.bottom_margin + gap, nw * scale, nh * scale)
}
