//! # Field Content
//!
//! One function per [`FieldKind`]. Each builds the question lines and the
//! answer lines of a field, asks the pager to break if the estimate does
//! not fit, then draws the rows and ends with one blank line.
//!
//! Two-column layouts (`RV`, `RH`) draw the question on the left and the
//! answers at `answer_x`, row by row. Stacked layouts (`LV`, `LH`, notes,
//! descriptive text) draw the question across the page and the answers
//! indented underneath.

use crate::draw::glyph::{choice_glyph, glyph_width, GlyphShape};
use crate::draw::DrawCommand;
use crate::error::ImageError;
use crate::image_loader::{load_image_file, LoadedImage};
use crate::model::{Attachment, FieldKind, FieldSchema, FieldValue, FreeTextKind, LockStatus};
use crate::services::ImageStore;
use crate::style::{FontSpec, FontStyle, Geometry};

use super::page_break::Pager;
use super::FieldEnv;

/// Space between a glyph and its label.
const GLYPH_GAP: f64 = 1.5;
/// Space between choices packed on one line.
const INLINE_SPACING: f64 = 4.0;
/// Ticks in a slider strip.
pub const SLIDER_TICKS: usize = 50;
/// Room kept after a slider strip for its value.
const SLIDER_VALUE_ROOM: f64 = 12.0;

/// One choice packed into a horizontal run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InlineChoice {
    pub label: String,
    pub shape: GlyphShape,
    pub chosen: bool,
}

/// One row of the answer column.
#[derive(Debug, Clone)]
pub(crate) enum AnswerLine {
    Text(String),
    Note(String),
    Rule { hint: Option<&'static str> },
    /// A choice line; `continued` lines carry no glyph.
    Choice {
        label: String,
        shape: GlyphShape,
        chosen: bool,
        continued: bool,
    },
    Inline(Vec<InlineChoice>),
    SliderLabels { min: String, mid: String, max: String },
    SliderStrip {
        filled: Option<usize>,
        value: Option<String>,
    },
    Image {
        source: String,
        image: LoadedImage,
        width: f64,
        height: f64,
    },
    /// Reserved by a taller answer above.
    Spacer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Columns {
    Two,
    Stacked,
}

impl Columns {
    fn answer_x(self, g: &Geometry) -> f64 {
        match self {
            Columns::Two => g.answer_x(),
            Columns::Stacked => g.margin_left + g.choice_indent,
        }
    }

    fn answer_width(self, g: &Geometry) -> f64 {
        match self {
            Columns::Two => g.col_width_b,
            Columns::Stacked => g.content_width() - g.choice_indent,
        }
    }

    fn question_width(self, g: &Geometry) -> f64 {
        match self {
            Columns::Two => g.col_width_a,
            Columns::Stacked => g.content_width(),
        }
    }
}

/// Render one visible non-matrix field.
pub(crate) fn render_field(pager: &mut Pager, env: &FieldEnv<'_>, field: &FieldSchema, number: Option<&str>) {
    let question = env.question_text(field, number);
    match field.kind() {
        FieldKind::Choice { multiple } => render_choice(pager, env, field, &question, multiple),
        FieldKind::Descriptive => render_descriptive(pager, env, field, &question),
        FieldKind::FreeText(kind) => render_free_text(pager, env, field, &question, kind),
        FieldKind::Signature => render_signature(pager, env, field, &question),
        FieldKind::Slider => render_slider(pager, env, field, &question),
    }
    pager.newline();
}

fn columns_for(field: &FieldSchema) -> Columns {
    if field.alignment.is_two_column() {
        Columns::Two
    } else {
        Columns::Stacked
    }
}

fn render_choice(pager: &mut Pager, env: &FieldEnv<'_>, field: &FieldSchema, question: &str, multiple: bool) {
    let g = pager.geometry().clone();
    let columns = columns_for(field);
    let width = columns.answer_width(&g);
    let shape = if multiple {
        GlyphShape::Square
    } else {
        GlyphShape::Circle
    };
    let value = env.value(&field.name);
    let choices: Vec<InlineChoice> = field
        .display_choices(env.labels)
        .iter()
        .map(|c| InlineChoice {
            label: env.resolve(&c.label),
            shape,
            chosen: value.is_some_and(|v| v.is_chosen(&c.code)),
        })
        .collect();

    let mut answers = if choices.is_empty() {
        vec![AnswerLine::Rule { hint: None }]
    } else if field.alignment.is_horizontal() {
        pack_inline(pager, &g, choices, width)
    } else {
        choices
            .into_iter()
            .flat_map(|c| choice_lines(pager, &g, c, width))
            .collect()
    };
    answers.extend(note_lines(pager, env, field, width));

    let q_lines = pager.wrap(question, &g.body_font, columns.question_width(&g));
    draw_rows(pager, &q_lines, &answers, columns);
}

/// A vertical choice: first line with a glyph, continuation lines indented.
fn choice_lines(pager: &Pager, g: &Geometry, choice: InlineChoice, width: f64) -> Vec<AnswerLine> {
    let indent = glyph_width(choice.shape, g.checkbox_side(), g.radio_radius) + GLYPH_GAP;
    pager
        .wrap(&choice.label, &g.body_font, width - indent)
        .into_iter()
        .enumerate()
        .map(|(i, label)| AnswerLine::Choice {
            label,
            shape: choice.shape,
            chosen: choice.chosen,
            continued: i > 0,
        })
        .collect()
}

/// Greedily pack glyph + label runs into lines of `width`.
fn pack_inline(pager: &Pager, g: &Geometry, choices: Vec<InlineChoice>, width: f64) -> Vec<AnswerLine> {
    let mut lines = Vec::new();
    let mut run: Vec<InlineChoice> = Vec::new();
    let mut used = 0.0;

    for choice in choices {
        let w = glyph_width(choice.shape, g.checkbox_side(), g.radio_radius)
            + GLYPH_GAP
            + pager.metrics().measure_width(&choice.label, &g.body_font);
        if w > width {
            if !run.is_empty() {
                lines.push(AnswerLine::Inline(std::mem::take(&mut run)));
                used = 0.0;
            }
            lines.extend(choice_lines(pager, g, choice, width));
            continue;
        }
        if !run.is_empty() && used + INLINE_SPACING + w > width {
            lines.push(AnswerLine::Inline(std::mem::take(&mut run)));
            used = 0.0;
        }
        used += if run.is_empty() { w } else { INLINE_SPACING + w };
        run.push(choice);
    }
    if !run.is_empty() {
        lines.push(AnswerLine::Inline(run));
    }
    lines
}

fn render_free_text(
    pager: &mut Pager,
    env: &FieldEnv<'_>,
    field: &FieldSchema,
    question: &str,
    kind: FreeTextKind,
) {
    let g = pager.geometry().clone();
    let value = env.value(&field.name).and_then(FieldValue::as_scalar);

    if kind == FreeTextKind::Notes {
        let columns = Columns::Stacked;
        let width = columns.answer_width(&g);
        let mut answers: Vec<AnswerLine> = match value {
            Some(v) => pager
                .wrap(v, &g.body_font, width)
                .into_iter()
                .map(AnswerLine::Text)
                .collect(),
            None => vec![AnswerLine::Rule { hint: None }, AnswerLine::Rule { hint: None }],
        };
        answers.extend(note_lines(pager, env, field, width));
        let q_lines = pager.wrap(question, &g.body_font, columns.question_width(&g));

        // Long notes are estimated by character count, not by wrapping.
        let value_lines = match value {
            Some(v) => pager
                .metrics()
                .estimate_lines_by_ratio(v, width, g.average_char_width),
            None => 2,
        };
        pager.break_if_needed(q_lines.len() + value_lines);
        draw_rows_unchecked(pager, &q_lines, &answers, columns);
        return;
    }

    let columns = columns_for(field);
    let width = columns.answer_width(&g);
    let mut answers: Vec<AnswerLine> = match value {
        Some(v) => pager
            .wrap(v, &g.body_font, width)
            .into_iter()
            .map(AnswerLine::Text)
            .collect(),
        None => vec![AnswerLine::Rule {
            hint: field.format_hint(),
        }],
    };
    answers.extend(note_lines(pager, env, field, width));
    let q_lines = pager.wrap(question, &g.body_font, columns.question_width(&g));
    draw_rows(pager, &q_lines, &answers, columns);
}

fn render_signature(pager: &mut Pager, env: &FieldEnv<'_>, field: &FieldSchema, question: &str) {
    let g = pager.geometry().clone();
    let columns = columns_for(field);
    let width = columns.answer_width(&g);

    let mut answers = match env.value(&field.name).and_then(FieldValue::as_scalar) {
        None => vec![AnswerLine::Rule { hint: None }],
        Some(id) => match fetch_image(env.images, id) {
            Ok(image) => {
                let (nw, nh) = image.natural_size_mm(g.image_dpi);
                let (w, h) = fit_box(nw, nh, width, g.signature_height, true);
                let rows = g.lines_for_height(h).max(1);
                let mut lines = vec![AnswerLine::Image {
                    source: id.to_string(),
                    image,
                    width: w,
                    height: h,
                }];
                lines.extend(std::iter::repeat_with(|| AnswerLine::Spacer).take(rows - 1));
                lines
            }
            Err(e) => {
                log::warn!("signature of '{}' not drawn: {}", field.name, e);
                vec![AnswerLine::Text(env.labels.signature_unavailable.clone())]
            }
        },
    };
    answers.extend(note_lines(pager, env, field, width));
    let q_lines = pager.wrap(question, &g.body_font, columns.question_width(&g));
    draw_rows(pager, &q_lines, &answers, columns);
}

fn render_slider(pager: &mut Pager, env: &FieldEnv<'_>, field: &FieldSchema, question: &str) {
    let g = pager.geometry().clone();
    let columns = columns_for(field);
    let width = columns.answer_width(&g);
    let value = env
        .value(&field.name)
        .and_then(FieldValue::as_scalar)
        .and_then(|v| v.trim().parse::<f64>().ok());

    let labels = &field.slider_labels;
    let mut answers = vec![
        AnswerLine::SliderLabels {
            min: env.resolve(&labels.min),
            mid: env.resolve(&labels.mid),
            max: env.resolve(&labels.max),
        },
        AnswerLine::SliderStrip {
            filled: value.map(slider_tick),
            value: value.map(|v| format_slider_value(v.clamp(0.0, 100.0))),
        },
    ];
    answers.extend(note_lines(pager, env, field, width));
    let q_lines = pager.wrap(question, &g.body_font, columns.question_width(&g));
    draw_rows(pager, &q_lines, &answers, columns);
}

/// 1-based index of the filled tick for a stored 0–100 value.
///
/// A stored 0 fills the first tick so it never looks like a blank slider.
pub fn slider_tick(value: f64) -> usize {
    let v = value.clamp(0.0, 100.0).max(1.0);
    ((v / 100.0 * SLIDER_TICKS as f64).ceil() as usize).clamp(1, SLIDER_TICKS)
}

fn format_slider_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn render_descriptive(pager: &mut Pager, env: &FieldEnv<'_>, field: &FieldSchema, question: &str) {
    let g = pager.geometry().clone();
    let width = g.content_width();

    if !question.is_empty() {
        let lines = pager.wrap(question, &g.body_font, width);
        pager.break_if_needed(lines.len());
        pager.write_block(g.margin_left, width, question, &g.body_font);
    }

    if let Some(attachment) = &field.attachment {
        if attachment.inline_image {
            draw_inline_image(pager, env.images, &field.name, attachment);
        } else {
            let text = format!("{} {}", env.labels.attachment, attachment.name);
            pager.break_if_needed(1);
            pager.write_block(g.margin_left, width, &text, &g.body_font);
        }
    }

    if let Some(note) = field.note.as_deref().filter(|n| !n.trim().is_empty()) {
        let note = env.resolve(note);
        pager.write_block(g.margin_left, width, &note, &g.note_font);
    }
}

fn draw_inline_image(pager: &mut Pager, images: &dyn ImageStore, field: &str, attachment: &Attachment) {
    let image = match fetch_image(images, &attachment.id) {
        Ok(image) => image,
        Err(e) => {
            log::warn!("image of descriptive field '{}' skipped: {}", field, e);
            return;
        }
    };
    let g = pager.geometry().clone();
    let (nw, nh) = image.natural_size_mm(g.image_dpi);
    let (mut w, mut h) = fit_box(nw, nh, g.content_width(), f64::INFINITY, false);

    let rows = g.lines_for_height(h);
    if pager.canvas.page() == 0 || (!pager.canvas.at_page_top() && pager.will_overflow(rows)) {
        pager.start_new_page();
    }
    // First content on a fresh page: shrink to what is left of it.
    let remaining = g.bottom_margin - pager.canvas.y();
    if pager.canvas.at_page_top() && h > remaining && remaining > 0.0 {
        let scale = remaining / h;
        w *= scale;
        h = remaining;
    }

    let y = pager.canvas.y();
    pager.canvas.push(DrawCommand::Image {
        x: g.margin_left,
        y,
        width: w,
        height: h,
        source: attachment.id.clone(),
        image,
    });
    pager.advance_lines(g.lines_for_height(h));
}

/// Fetch, decode and release an image.
fn fetch_image(images: &dyn ImageStore, id: &str) -> Result<LoadedImage, ImageError> {
    let path = images.fetch_to_local(id)?;
    let loaded = load_image_file(&path);
    images.release(&path);
    loaded
}

/// Scale (`w`, `h`) down to fit `max_w` × `max_h`. With `to_height` the
/// image is scaled to exactly `max_h` first.
fn fit_box(w: f64, h: f64, max_w: f64, max_h: f64, to_height: bool) -> (f64, f64) {
    if w <= 0.0 || h <= 0.0 {
        return (0.0, 0.0);
    }
    let mut scale = if to_height { max_h / h } else { 1.0f64.min(max_h / h) };
    if w * scale > max_w {
        scale = max_w / w;
    }
    (w * scale, h * scale)
}

fn note_lines(pager: &Pager, env: &FieldEnv<'_>, field: &FieldSchema, width: f64) -> Vec<AnswerLine> {
    match field.note.as_deref().filter(|n| !n.trim().is_empty()) {
        Some(note) => {
            let note = env.resolve(note);
            pager
                .wrap(&note, &pager.geometry().note_font, width)
                .into_iter()
                .map(AnswerLine::Note)
                .collect()
        }
        None => Vec::new(),
    }
}

/// Rows a question/answer pair occupies.
pub(crate) fn estimate_rows(question: usize, answers: usize, columns: Columns) -> usize {
    match columns {
        Columns::Two => question.max(answers),
        Columns::Stacked => question + answers,
    }
}

/// Break if needed, then draw.
fn draw_rows(pager: &mut Pager, question: &[String], answers: &[AnswerLine], columns: Columns) {
    pager.break_if_needed(estimate_rows(question.len(), answers.len(), columns));
    draw_rows_unchecked(pager, question, answers, columns);
}

fn draw_rows_unchecked(pager: &mut Pager, question: &[String], answers: &[AnswerLine], columns: Columns) {
    let g = pager.geometry().clone();
    let qx = g.margin_left;
    let ax = columns.answer_x(&g);
    let aw = columns.answer_width(&g);

    match columns {
        Columns::Two => {
            let rows = question.len().max(answers.len());
            for r in 0..rows {
                pager.ensure_line();
                if let Some(q) = question.get(r) {
                    pager.write(qx, q, &g.body_font);
                }
                if let Some(a) = answers.get(r) {
                    draw_answer(pager, &g, a, ax, aw);
                }
                pager.newline();
            }
        }
        Columns::Stacked => {
            for q in question {
                pager.ensure_line();
                pager.write(qx, q, &g.body_font);
                pager.newline();
            }
            for a in answers {
                pager.ensure_line();
                draw_answer(pager, &g, a, ax, aw);
                pager.newline();
            }
        }
    }
}

fn draw_answer(pager: &mut Pager, g: &Geometry, line: &AnswerLine, x: f64, width: f64) {
    let top = pager.canvas.y();
    match line {
        AnswerLine::Text(s) => pager.write(x, s, &g.body_font),
        AnswerLine::Note(s) => pager.write(x, s, &g.note_font),
        AnswerLine::Rule { hint } => match hint {
            Some(hint) => {
                let hint_w = pager.metrics().measure_width(hint, &g.note_font);
                let rule_w = (width - hint_w - 2.0).max(width / 2.0);
                pager.rule(x, rule_w);
                pager.write(x + rule_w + 1.0, hint, &g.note_font);
            }
            None => pager.rule(x, width),
        },
        AnswerLine::Choice {
            label,
            shape,
            chosen,
            continued,
        } => {
            let gw = glyph_width(*shape, g.checkbox_side(), g.radio_radius);
            if !continued {
                draw_glyph(pager, g, *shape, x, top, *chosen);
            }
            pager.write(x + gw + GLYPH_GAP, label, &g.body_font);
        }
        AnswerLine::Inline(run) => {
            let mut cx = x;
            for choice in run {
                let gw = glyph_width(choice.shape, g.checkbox_side(), g.radio_radius);
                draw_glyph(pager, g, choice.shape, cx, top, choice.chosen);
                pager.write(cx + gw + GLYPH_GAP, &choice.label, &g.body_font);
                cx += gw
                    + GLYPH_GAP
                    + pager.metrics().measure_width(&choice.label, &g.body_font)
                    + INLINE_SPACING;
            }
        }
        AnswerLine::SliderLabels { min, mid, max } => {
            let strip = slider_strip_width(width);
            if !min.is_empty() {
                pager.write(x, min, &g.note_font);
            }
            if !mid.is_empty() {
                let w = pager.metrics().measure_width(mid, &g.note_font);
                pager.write(x + (strip - w) / 2.0, mid, &g.note_font);
            }
            if !max.is_empty() {
                pager.write_right(x + strip, max, &g.note_font);
            }
        }
        AnswerLine::SliderStrip { filled, value } => {
            let strip = slider_strip_width(width);
            let rh = g.row_height;
            let step = strip / SLIDER_TICKS as f64;
            let base = top + rh * 0.9;
            pager.canvas.push(DrawCommand::line(x, base, x + strip, base));
            for i in 0..SLIDER_TICKS {
                let tx = x + (i as f64 + 0.5) * step;
                pager
                    .canvas
                    .push(DrawCommand::line(tx, top + rh * 0.35, tx, base));
            }
            if let Some(tick) = filled {
                let tx = x + (*tick as f64 - 0.5) * step;
                pager.canvas.push(DrawCommand::filled_rect(
                    tx - step * 0.35,
                    top + rh * 0.2,
                    step * 0.7,
                    rh * 0.7,
                    0.0,
                ));
            }
            if let Some(v) = value {
                pager.write(x + strip + 2.0, v, &g.body_font);
            }
        }
        AnswerLine::Image {
            source,
            image,
            width: w,
            height: h,
        } => {
            pager.canvas.push(DrawCommand::Image {
                x,
                y: top,
                width: *w,
                height: *h,
                source: source.clone(),
                image: image.clone(),
            });
        }
        AnswerLine::Spacer => {}
    }
}

fn slider_strip_width(width: f64) -> f64 {
    (width - SLIDER_VALUE_ROOM).max(10.0)
}

/// A checkbox or radio glyph vertically centred on the row at `top`.
pub(crate) fn draw_glyph(pager: &mut Pager, g: &Geometry, shape: GlyphShape, x: f64, top: f64, chosen: bool) {
    let gw = glyph_width(shape, g.checkbox_side(), g.radio_radius);
    let y = top + (g.row_height - gw) / 2.0;
    let cmds = choice_glyph(shape, x, y, g.checkbox_side(), g.radio_radius, chosen);
    pager.canvas.extend(cmds);
}

// ─── Headers, titles, lock block ────────────────────────────────────

/// Rows a section header wraps to.
pub(crate) fn header_lines(pager: &Pager, text: &str) -> Vec<String> {
    let g = pager.geometry();
    pager.wrap(text, &g.header_font, g.content_width() - 2.0)
}

/// Shaded section header followed by a blank line.
pub(crate) fn draw_section_header(pager: &mut Pager, lines: &[String]) {
    let g = pager.geometry().clone();
    pager.ensure_line();
    let height = g.row_height * lines.len() as f64;
    pager.canvas.push(DrawCommand::filled_rect(
        g.margin_left,
        pager.canvas.y(),
        g.content_width(),
        height,
        0.85,
    ));
    for line in lines {
        pager.write(g.margin_left + 1.0, line, &g.header_font);
        pager.newline();
    }
    pager.newline();
}

/// Form title on its own line, then a blank line.
pub(crate) fn draw_form_title(pager: &mut Pager, title: &str) {
    let g = pager.geometry().clone();
    let font: FontSpec = g.title_font.clone();
    pager.write_block(g.margin_left, g.content_width(), title, &font);
    pager.newline();
}

/// Lock and e-signature lines printed after a form's last field.
pub(crate) fn draw_lock_block(pager: &mut Pager, env: &FieldEnv<'_>, status: &LockStatus) {
    let g = pager.geometry().clone();
    let labels = env.labels;
    let mut lines = Vec::new();
    if status.locked {
        lines.push(stamp_line(
            &labels.locked_by,
            status.locked_by.as_deref(),
            &labels.on,
            status.locked_at.as_deref(),
        ));
    }
    if status.signed_by.is_some() {
        lines.push(stamp_line(
            &labels.signed_by,
            status.signed_by.as_deref(),
            &labels.on,
            status.signed_at.as_deref(),
        ));
    }
    if lines.is_empty() {
        return;
    }
    let font = g.body_font.with_style(FontStyle::Italic);
    pager.break_if_needed(lines.len());
    for line in &lines {
        pager.write_block(g.margin_left, g.content_width(), line, &font);
    }
    pager.newline();
}

fn stamp_line(what: &str, who: Option<&str>, on: &str, when: Option<&str>) -> String {
    let mut line = what.to_string();
    if let Some(who) = who {
        line.push(' ');
        line.push_str(who);
    }
    if let Some(when) = when {
        line.push_str(&format!(" {} {}", on, when));
    }
    line
}
