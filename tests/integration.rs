//! Integration tests for the formprint rendering pipeline.
//!
//! These tests exercise the full path from a JSON export to draw commands
//! and PDF bytes. They verify:
//! - Export deserialization, including element type aliases
//! - Blank and filled documents lay out the right glyphs and rules
//! - Hidden sections and matrix groups leave no trace
//! - Page breaks happen once, at the right place
//! - Furniture, locks, piping and images show up where expected

use formprint::draw::glyph::{choice_glyph, GlyphShape};
use formprint::draw::{DrawCommand, PathOp, RenderedDocument};
use formprint::layout::matrix::group_estimate;
use formprint::model::*;
use formprint::services::ExportServices;
use formprint::style::*;
use formprint::text::TextMetrics;
use serde_json::json;

// ─── Helpers ────────────────────────────────────────────────────

fn render(export: serde_json::Value) -> RenderedDocument {
    formprint::render_json(&export.to_string()).unwrap()
}

fn field(name: &str, element_type: &str, label: &str) -> serde_json::Value {
    json!({
        "name": name,
        "formName": "demo",
        "elementType": element_type,
        "label": label
    })
}

fn one_record(values: serde_json::Value) -> serde_json::Value {
    json!([{ "record": "1", "events": [{ "instances": [{ "values": values }] }] }])
}

fn count(doc: &RenderedDocument, page: usize, pred: impl Fn(&DrawCommand) -> bool) -> usize {
    doc.pages[page].commands.iter().filter(|c| pred(*c)).count()
}

fn is_line(c: &DrawCommand) -> bool {
    matches!(c, DrawCommand::Line { .. })
}

fn is_circle(c: &DrawCommand) -> bool {
    matches!(c, DrawCommand::Path { ops } if matches!(ops.first(), Some(PathOp::MoveTo { .. })))
}

fn text_y(doc: &RenderedDocument, page: usize, needle: &str) -> Option<f64> {
    doc.pages[page].commands.iter().find_map(|c| match c {
        DrawCommand::Text { y, text, .. } if text == needle => Some(*y),
        _ => None,
    })
}

fn png_base64(width: u32, height: u32) -> String {
    use base64::Engine;
    let img = image::RgbImage::from_fn(width, height, |_, _| image::Rgb([10, 20, 30]));
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(encoder, img.as_raw(), width, height, image::ColorType::Rgb8)
        .unwrap();
    base64::engine::general_purpose::STANDARD.encode(buf)
}

// ─── Text wrapping ──────────────────────────────────────────────

#[test]
fn test_wrap_terminates_on_unbreakable_text() {
    let metrics = TextMetrics::new();
    let font = FontSpec::helvetica(10.0);
    let word = "x".repeat(400);
    let lines = metrics.wrap_to_width(&word, &font, 12.0);
    assert!(lines.len() > 1);
    assert_eq!(lines.concat(), word);
    for line in &lines {
        assert!(!line.is_empty());
    }
}

#[test]
fn test_wrap_on_zero_width_returns_single_line() {
    let metrics = TextMetrics::new();
    let lines = metrics.wrap_to_width("some words here", &FontSpec::default(), 0.0);
    assert_eq!(lines.len(), 1);
}

#[test]
fn test_wrap_keeps_explicit_newlines() {
    let metrics = TextMetrics::new();
    let lines = metrics.wrap_to_width("one\ntwo\n\nfour", &FontSpec::default(), 150.0);
    assert_eq!(lines, vec!["one", "two", "", "four"]);
}

// ─── Blank documents ────────────────────────────────────────────

#[test]
fn test_blank_document_draws_rules_and_empty_glyphs() {
    let doc = render(json!({
        "fields": [
            field("name", "text", "Name"),
            {
                "name": "sex",
                "formName": "demo",
                "elementType": "radio",
                "label": "Sex",
                "choices": [{ "code": "0", "label": "Female" }, { "code": "1", "label": "Male" }]
            }
        ]
    }));

    assert_eq!(doc.page_count(), 1);
    assert!(doc.contains_text("Name"));
    assert!(doc.contains_text("Female"));
    assert!(doc.contains_text("Male"));
    // The Name rule is the only line: neither circle is marked.
    assert_eq!(count(&doc, 0, is_line), 1);
    assert_eq!(count(&doc, 0, is_circle), 2);
    // No record, so no running label or page line.
    assert!(!doc.contains_text("Page 1"));
}

#[test]
fn test_blank_document_applies_branching() {
    let mut hidden = field("pregnant", "yesno", "Pregnant?");
    hidden["branchingLogic"] = json!("[sex] = '0'");
    let doc = render(json!({ "fields": [field("name", "text", "Name"), hidden] }));
    assert!(!doc.contains_text("Pregnant?"));
}

#[test]
fn test_blank_date_field_shows_format_hint() {
    let mut dob = field("dob", "text", "Date of birth");
    dob["validation"] = json!("date_ymd");
    let doc = render(json!({ "fields": [dob] }));
    assert!(doc.contains_text("(Y-M-D)"));
}

// ─── Section rollback ───────────────────────────────────────────

#[test]
fn test_suppressed_section_is_absent() {
    let mut age = field("age", "text", "Age");
    age["sectionHeader"] = json!("Demographics");
    age["branchingLogic"] = json!("[consent] = '1'");
    let mut weight = field("weight", "text", "Weight");
    weight["branchingLogic"] = json!("[consent] = '1'");
    let mut follow_up = field("follow_up", "textarea", "Follow-up notes");
    follow_up["sectionHeader"] = json!("Follow-up");

    let consent = field("consent", "yesno", "Consent given?");
    let values = json!({ "consent": "0", "follow_up": "None so far." });

    let with = render(json!({
        "fields": [consent, age, weight, follow_up],
        "records": one_record(values.clone())
    }));
    let without = render(json!({
        "fields": [consent, follow_up],
        "records": one_record(values)
    }));

    assert!(!with.contains_text("Demographics"));
    assert!(with.contains_text("Follow-up"));
    assert_eq!(with, without);
}

#[test]
fn test_section_rollback_across_page_break() {
    // The last filler ends near the bottom margin, so the hidden section's
    // header starts page 2. Rolling it back must drop that page again.
    let mut fields: Vec<serde_json::Value> =
        (0..31).map(|i| field(&format!("f{}", i), "text", &format!("Field {}", i))).collect();
    let mut hidden = field("hidden", "text", "Hidden");
    hidden["sectionHeader"] = json!("Never shown");
    hidden["branchingLogic"] = json!("false");
    let visible = fields.clone();
    fields.push(hidden);

    let with = render(json!({ "fields": fields, "records": one_record(json!({})) }));
    let without = render(json!({ "fields": visible, "records": one_record(json!({})) }));

    assert_eq!(without.page_count(), 1);
    assert_eq!(with.page_count(), 1);
    assert_eq!(with, without);
}

// ─── Matrix groups ──────────────────────────────────────────────

#[test]
fn test_matrix_marks_only_the_chosen_cell() {
    let row = |name: &str, label: &str| {
        json!({
            "name": name,
            "formName": "demo",
            "elementType": "radio",
            "label": label,
            "gridName": "agree",
            "choices": [{ "code": "1", "label": "No" }, { "code": "2", "label": "Yes" }]
        })
    };
    let doc = render(json!({
        "fields": [row("r1", "Row one"), row("r2", "Row two"), row("r3", "Row three")],
        "records": one_record(json!({ "r1": "2" }))
    }));

    assert_eq!(doc.page_count(), 1);
    assert_eq!(count(&doc, 0, is_circle), 6);

    let diagonals: Vec<(f64, f64, f64, f64)> = doc.pages[0]
        .commands
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Line { x0, y0, x1, y1 } => Some((*x0, *y0, *x1, *y1)),
            _ => None,
        })
        .collect();
    assert_eq!(diagonals.len(), 2);

    // Second column: right of the label cell plus one column.
    let g = Geometry::default();
    let column_width = (g.content_width() - g.matrix_label_width) / 2.0;
    let second_column = g.margin_left + g.matrix_label_width + column_width;
    let row_two_top = text_y(&doc, 0, "Row two").unwrap() - g.row_height * 0.75;
    for (x0, y0, x1, y1) in diagonals {
        assert!(x0 > second_column && x1 > second_column);
        assert!(y0.max(y1) <= row_two_top + 1e-9);
    }
}

#[test]
fn test_matrix_banner_drawn_once_per_group() {
    let row = |name: &str| {
        json!({
            "name": name,
            "formName": "demo",
            "elementType": "radio",
            "label": name,
            "gridName": "mood",
            "choices": [{ "code": "1", "label": "Poor" }, { "code": "2", "label": "Good" }]
        })
    };
    let doc = render(json!({ "fields": [row("a"), row("b"), row("c")] }));
    let banners = doc.pages[0].texts().filter(|t| *t == "Poor").count();
    assert_eq!(banners, 1);
}

#[test]
fn test_matrix_banner_has_label_cell_and_column_cells() {
    let row = |name: &str, label: &str| {
        json!({
            "name": name,
            "formName": "demo",
            "elementType": "radio",
            "label": label,
            "gridName": "agree",
            "choices": [{ "code": "1", "label": "No" }, { "code": "2", "label": "Yes" }]
        })
    };
    let doc = render(json!({
        "fields": [row("r1", "Row one"), row("r2", "Row two"), row("r3", "Row three")]
    }));

    let g = Geometry::default();
    let banner_top = text_y(&doc, 0, "No").unwrap() - g.banner_line_height * 0.75;
    let cells: Vec<(f64, f64)> = doc.pages[0]
        .commands
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Rect { x, y, width, height, .. }
                if (*y - banner_top).abs() < 1e-9 && (*height - g.banner_line_height).abs() < 1e-9 =>
            {
                Some((*x, *width))
            }
            _ => None,
        })
        .collect();
    assert_eq!(cells.len(), 3);
    assert_eq!(cells[0], (g.margin_left, g.matrix_label_width));
}

#[test]
fn test_header_inside_matrix_group_splits_it() {
    let row = |name: &str, header: Option<&str>| {
        let mut f = json!({
            "name": name,
            "formName": "demo",
            "elementType": "radio",
            "label": format!("Row {name}"),
            "gridName": "mood",
            "choices": [{ "code": "1", "label": "Poor" }, { "code": "2", "label": "Good" }]
        });
        if let Some(h) = header {
            f["sectionHeader"] = json!(h);
        }
        f
    };
    let doc = render(json!({
        "fields": [row("a", None), row("b", Some("Part Two")), row("c", None)]
    }));

    assert!(doc.contains_text("Part Two"));
    assert_eq!(doc.pages[0].texts().filter(|t| *t == "Poor").count(), 2);
    let header = text_y(&doc, 0, "Part Two").unwrap();
    assert!(text_y(&doc, 0, "Row a").unwrap() < header);
    assert!(header < text_y(&doc, 0, "Row b").unwrap());
    assert!(text_y(&doc, 0, "Row b").unwrap() < text_y(&doc, 0, "Row c").unwrap());
}

#[test]
fn test_group_estimate_is_monotonic() {
    let mut rows = Vec::new();
    let mut last = group_estimate(Some(1), 2, &rows);
    for lines in [1, 3, 1, 2] {
        rows.push(lines);
        let next = group_estimate(Some(1), 2, &rows);
        assert!(next > last);
        assert!(next >= group_estimate(None, 2, &rows));
        last = next;
    }
}

// ─── Page breaks ────────────────────────────────────────────────

#[test]
fn test_overflowing_text_field_breaks_once() {
    let mut fields: Vec<serde_json::Value> =
        (0..30).map(|i| field(&format!("f{}", i), "text", &format!("Field {}", i))).collect();
    fields.push(field("comments", "textarea", "Comments"));
    let long = "word ".repeat(80);

    let doc = render(json!({
        "fields": fields,
        "records": one_record(json!({ "comments": long.trim() }))
    }));

    assert_eq!(doc.page_count(), 2);
    assert!(doc.pages[0].texts().any(|t| t == "Page 1"));
    assert!(doc.pages[1].texts().any(|t| t == "Page 2"));
    assert!(doc.pages[0].texts().any(|t| t == "Field 29"));
    assert!(!doc.pages[0].texts().any(|t| t.starts_with("word")));

    let page_two: Vec<&str> = doc.pages[1].texts().collect();
    assert_eq!(page_two[..3], ["Record ID 1", "Page 2", "Comments"]);
}

#[test]
fn test_each_form_starts_a_page() {
    let mut second = field("b", "text", "B");
    second["formName"] = json!("followup");
    second["formLabel"] = json!("Follow-up");
    let doc = render(json!({ "fields": [field("a", "text", "A"), second] }));
    assert_eq!(doc.page_count(), 2);
    assert_eq!(doc.pages[1].texts().next(), Some("Follow-up"));
}

#[test]
fn test_no_page_starts_below_bottom_margin() {
    let fields: Vec<serde_json::Value> = (0..120)
        .map(|i| field(&format!("f{}", i), "text", &format!("Question number {}", i)))
        .collect();
    let doc = render(json!({ "fields": fields }));
    let bottom = Geometry::default().bottom_margin;
    for page in &doc.pages {
        for cmd in &page.commands {
            if let DrawCommand::Text { y, .. } = cmd {
                assert!(*y <= bottom);
            }
        }
    }
    assert!(doc.page_count() > 1);
}

// ─── Determinism ────────────────────────────────────────────────

#[test]
fn test_render_is_idempotent() {
    let export = json!({
        "fields": [field("a", "text", "A"), field("b", "checkbox", "B")],
        "records": one_record(json!({ "a": "x", "b": { "1": "1" } }))
    });
    assert_eq!(render(export.clone()), render(export));
}

#[test]
fn test_glyph_is_idempotent() {
    for shape in [GlyphShape::Square, GlyphShape::Circle] {
        let a = choice_glyph(shape, 12.0, 40.0, 3.0, 1.6, true);
        let b = choice_glyph(shape, 12.0, 40.0, 3.0, 1.6, true);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }
}

// ─── Furniture ──────────────────────────────────────────────────

#[test]
fn test_furniture_on_every_page() {
    let fields: Vec<serde_json::Value> =
        (0..60).map(|i| field(&format!("f{}", i), "text", &format!("Field {}", i))).collect();
    let doc = render(json!({
        "fields": fields,
        "records": one_record(json!({})),
        "options": { "confidential": true, "headerText": "Study ABC" }
    }));
    assert!(doc.page_count() >= 2);
    for (i, page) in doc.pages.iter().enumerate() {
        let texts: Vec<&str> = page.texts().take(4).collect();
        let page_line = format!("Page {}", i + 1);
        assert_eq!(texts, vec!["Confidential", "Study ABC", "Record ID 1", page_line.as_str()]);
    }
}

#[test]
fn test_survey_mode_hides_record_label() {
    let doc = render(json!({
        "fields": [field("a", "text", "A")],
        "records": one_record(json!({ "a": "yes" })),
        "options": { "surveyMode": true }
    }));
    assert!(!doc.contains_text("Record ID"));
    assert!(!doc.contains_text("Page 1"));
    assert!(doc.contains_text("yes"));
}

#[test]
fn test_event_filter_and_labels() {
    let doc = render(json!({
        "fields": [field("a", "text", "A")],
        "records": [{
            "record": "7",
            "events": [
                { "event": "v1", "label": "Visit 1", "instances": [{ "values": { "a": "first" } }] },
                { "event": "v2", "label": "Visit 2", "instances": [{ "values": { "a": "second" } }] }
            ]
        }],
        "options": { "event": "v2" }
    }));
    assert_eq!(doc.page_count(), 1);
    assert!(doc.contains_text("Record ID 7 (Visit 2)"));
    assert!(doc.contains_text("second"));
    assert!(!doc.contains_text("first"));
}

// ─── Content ────────────────────────────────────────────────────

#[test]
fn test_piping_and_html_labels() {
    let doc = render(json!({
        "fields": [
            field("name", "text", "Name"),
            field("greet", "descriptive", "<b>Hello</b> [name], welcome back")
        ],
        "records": one_record(json!({ "name": "Ada" }))
    }));
    assert!(doc.contains_text("Hello Ada, welcome back"));
}

#[test]
fn test_auto_number_and_explicit_numbers() {
    let mut explicit = field("b", "text", "Second");
    explicit["questionNumber"] = json!("2a");
    let doc = render(json!({
        "fields": [field("a", "text", "First"), explicit, field("c", "text", "Third")],
        "options": { "autoNumber": true }
    }));
    assert!(doc.contains_text("1) First"));
    assert!(doc.contains_text("2a) Second"));
    assert!(doc.contains_text("3) Third"));
}

#[test]
fn test_checkbox_values_mark_squares() {
    let doc = render(json!({
        "fields": [{
            "name": "colors",
            "formName": "demo",
            "elementType": "checkbox",
            "label": "Colors",
            "choices": [
                { "code": "1", "label": "Red" },
                { "code": "2", "label": "Green" },
                { "code": "3", "label": "Blue" }
            ]
        }],
        "records": one_record(json!({ "colors": { "1": "1", "2": "0", "3": "1" } }))
    }));
    // Two marked squares, two diagonals each.
    assert_eq!(count(&doc, 0, is_line), 4);
}

#[test]
fn test_slider_value_and_labels() {
    let doc = render(json!({
        "fields": [{
            "name": "pain",
            "formName": "demo",
            "elementType": "slider",
            "label": "Pain",
            "sliderLabels": { "min": "None", "mid": "Some", "max": "Worst" }
        }],
        "records": one_record(json!({ "pain": "37" }))
    }));
    assert!(doc.contains_text("None"));
    assert!(doc.contains_text("Worst"));
    assert!(doc.contains_text("37"));
    let filled = count(&doc, 0, |c| matches!(c, DrawCommand::Rect { filled: true, .. }));
    assert_eq!(filled, 1);
}

#[test]
fn test_lock_block_after_last_field() {
    let doc = render(json!({
        "fields": [field("a", "text", "A")],
        "records": one_record(json!({ "a": "x" })),
        "locks": [{
            "record": "1",
            "form": "demo",
            "locked": true,
            "lockedBy": "jdoe",
            "lockedAt": "2026-03-02 14:05",
            "signedBy": "dr_who",
            "signedAt": "2026-03-03 09:00"
        }]
    }));
    let texts: Vec<&str> = doc.pages[0].texts().collect();
    let n = texts.len();
    assert_eq!(texts[n - 2], "Locked by jdoe on 2026-03-02 14:05");
    assert_eq!(texts[n - 1], "E-signed by dr_who on 2026-03-03 09:00");
}

#[test]
fn test_notes_alias_parses_as_textarea() {
    let doc: ExportDocument = serde_json::from_value(json!({
        "fields": [field("n", "notes", "Notes")]
    }))
    .unwrap();
    assert_eq!(doc.fields[0].element_type, ElementType::Textarea);
}

// ─── Images ─────────────────────────────────────────────────────

#[test]
fn test_images_signature_and_attachments() {
    let export: ExportDocument = serde_json::from_value(json!({
        "fields": [
            {
                "name": "logo",
                "formName": "demo",
                "elementType": "descriptive",
                "label": "Study logo",
                "attachment": { "id": "logo", "name": "logo.png", "inlineImage": true }
            },
            {
                "name": "protocol",
                "formName": "demo",
                "elementType": "descriptive",
                "label": "Protocol",
                "attachment": { "id": "doc1", "name": "protocol.pdf" }
            },
            {
                "name": "sig",
                "formName": "demo",
                "elementType": "file",
                "validation": "signature",
                "label": "Signature"
            },
            {
                "name": "witness",
                "formName": "demo",
                "elementType": "file",
                "validation": "signature",
                "label": "Witness"
            }
        ],
        "records": one_record(json!({ "sig": "sig1", "witness": "missing" })),
        "images": { "logo": png_base64(96, 48), "sig1": png_base64(60, 20) }
    }))
    .unwrap();

    let services = ExportServices::from_export(&export);
    let doc = formprint::render_with(&export.options, &services.services()).unwrap();

    let images = count(&doc, 0, |c| matches!(c, DrawCommand::Image { .. }));
    assert_eq!(images, 2);
    assert!(doc.contains_text("Attachment: protocol.pdf"));
    assert!(doc.contains_text("[signature on file]"));
    assert_eq!(services.image_store().live_files(), 0);

    let sig_height = doc.pages[0].commands.iter().find_map(|c| match c {
        DrawCommand::Image { source, height, .. } if source == "sig1" => Some(*height),
        _ => None,
    });
    let expected = Geometry::default().signature_height;
    assert!((sig_height.unwrap() - expected).abs() < 1e-9);
}

#[test]
fn test_footer_image_on_every_page() {
    let fields: Vec<serde_json::Value> =
        (0..60).map(|i| field(&format!("f{}", i), "text", &format!("Field {}", i))).collect();
    let doc = render(json!({
        "fields": fields,
        "images": { "footer": png_base64(200, 20) },
        "options": { "footerImage": "footer" }
    }));
    assert!(doc.page_count() >= 2);
    let bottom = Geometry::default().bottom_margin;
    for page in &doc.pages {
        match &page.commands[0] {
            DrawCommand::Image { y, .. } => assert!(*y > bottom),
            other => panic!("expected footer image first, got {:?}", other),
        }
    }
}

// ─── Errors and output ──────────────────────────────────────────

#[test]
fn test_invalid_json_reports_hint() {
    let err = formprint::render_json("{ \"fields\": [ }").unwrap_err();
    assert!(matches!(err, formprint::RenderError::Parse { .. }));
    assert!(err.to_string().contains("Hint"));
}

#[test]
fn test_unknown_form_filter_is_schema_error() {
    let err = formprint::render_json(
        &json!({
            "fields": [field("a", "text", "A")],
            "options": { "forms": ["nope"] }
        })
        .to_string(),
    )
    .unwrap_err();
    assert!(matches!(err, formprint::RenderError::Schema(_)));
}

#[test]
fn test_zero_row_height_is_rejected() {
    let err = formprint::render_json(
        &json!({
            "fields": [field("sig", "file", "Signature")],
            "options": { "geometry": { "rowHeight": 0 } }
        })
        .to_string(),
    )
    .unwrap_err();
    assert!(matches!(err, formprint::RenderError::Geometry(_)));
}

#[test]
fn test_pdf_output_is_structurally_valid() {
    let export: ExportDocument = serde_json::from_value(json!({
        "fields": [field("a", "text", "Straße (Größe)")],
        "options": { "title": "Baseline" }
    }))
    .unwrap();
    let pdf = formprint::render_pdf(&export).unwrap();
    assert!(pdf.starts_with(b"%PDF-1.7"));
    assert!(pdf.ends_with(b"%%EOF\n"));
    let text = String::from_utf8_lossy(&pdf);
    assert!(text.contains("/Title (Baseline)"));
    assert!(text.contains("/Count 1"));
    assert!(text.contains("startxref"));
}

#[test]
fn test_commands_serialize_to_json() {
    let doc = render(json!({ "fields": [field("a", "text", "A")] }));
    let out = serde_json::to_value(&doc).unwrap();
    let commands = out["pages"][0]["commands"].as_array().unwrap();
    assert!(commands.iter().any(|c| c["type"] == "text" && c["text"] == "A"));
    assert!(commands.iter().any(|c| c["type"] == "line"));
}
