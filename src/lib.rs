//! # formprint
//!
//! Renders data-capture forms, blank or filled with captured records, to
//! paginated documents.
//!
//! A form is a flat, ordered list of fields. Fields carry section headers,
//! can be hidden by branching logic, and may join neighbouring fields into
//! matrix grids. Layout is a single forward pass per form instance: each
//! element estimates its height in text lines, starts a new page if it
//! would overflow, and draws. Section headers and matrix banners are
//! drawn speculatively and erased again when nothing under them turns out
//! to be visible.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON export or providers)
//!       ↓
//!   [services]   schema, data, branching, piping, images, locks
//!       ↓
//!   [layout]     forward pass, page breaks, rollback, matrix groups
//!       ↓
//!   [draw]       ordered draw commands per page (mm, top-left origin)
//!       ↓
//!   [pdf]        serialize to PDF bytes
//! ```

pub mod draw;
pub mod error;
pub mod font;
pub mod image_loader;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod services;
pub mod style;
pub mod text;

pub use draw::{DrawCommand, RenderedDocument, RenderedPage};
pub use error::{ImageError, RenderError, Result};
pub use layout::LayoutEngine;
pub use model::{ExportDocument, FieldSchema, RenderOptions};
pub use services::{ExportServices, Services};

use font::FontContext;
use pdf::{DocumentInfo, PdfWriter};

/// Lay out a self-contained export.
///
/// This is the primary entry point. Images embedded in the export are
/// materialised to temporary files for the duration of the call.
pub fn render(document: &ExportDocument) -> Result<RenderedDocument> {
    let services = ExportServices::from_export(document);
    render_with(&document.options, &services.services())
}

/// Lay out forms against caller-supplied providers.
pub fn render_with(options: &RenderOptions, services: &Services<'_>) -> Result<RenderedDocument> {
    LayoutEngine::new(options.clone()).render(services)
}

/// Parse a JSON export and lay it out.
pub fn render_json(json: &str) -> Result<RenderedDocument> {
    let document: ExportDocument = serde_json::from_str(json)?;
    render(&document)
}

/// Lay out an export and serialize it to PDF bytes.
pub fn render_pdf(document: &ExportDocument) -> Result<Vec<u8>> {
    let rendered = render(document)?;
    write_pdf(&rendered, &document.options)
}

/// Serialize an already rendered document to PDF bytes.
pub fn write_pdf(rendered: &RenderedDocument, options: &RenderOptions) -> Result<Vec<u8>> {
    let info = DocumentInfo {
        title: options.title.clone(),
    };
    PdfWriter::new().write(rendered, &info, &FontContext::new())
}
