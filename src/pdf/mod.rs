//! # PDF Serializer
//!
//! Takes the rendered pages from the layout engine and writes a valid PDF
//! file.
//!
//! This is a from-scratch PDF 1.7 writer. Layout works in millimetres with
//! the origin at the top-left corner; PDF user space is points with the
//! origin at the bottom-left, so every coordinate is scaled by
//! [`PT_PER_MM`] and flipped against the page height on the way out.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (fonts, pages, content streams, etc.)
//! 2 0 obj ... endobj
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! ## Fonts
//!
//! Only the standard Type1 fonts are used, referenced by name with
//! WinAnsiEncoding. Nothing is embedded. Characters outside WinAnsi are
//! written as `?`.

use std::collections::HashMap;
use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::draw::{DrawCommand, PathOp, RenderedDocument, RenderedPage};
use crate::error::RenderError;
use crate::font::{FontContext, StandardFont};
use crate::image_loader::LoadedImage;
use crate::style::PT_PER_MM;

/// Stroke width for rules, borders and glyph outlines, in points.
const STROKE_WIDTH: f64 = 0.5;

/// Document-level metadata for the info dictionary.
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    pub title: Option<String>,
}

pub struct PdfWriter;

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<PdfObject>,
    /// Standard fonts in use, as (font, object id). The position is the
    /// `/F{n}` resource index.
    font_objects: Vec<(StandardFont, usize)>,
    /// XObject ids for images, indexed as /Im0, /Im1, ...
    image_objects: Vec<usize>,
    /// Maps an image source id to its index in `image_objects`. Footer
    /// images repeat on every page and are written once.
    image_index_map: HashMap<String, usize>,
}

struct PdfObject {
    #[allow(dead_code)]
    id: usize,
    data: Vec<u8>,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write rendered pages to a PDF byte vector.
    pub fn write(
        &self,
        document: &RenderedDocument,
        info: &DocumentInfo,
        font_context: &FontContext,
    ) -> Result<Vec<u8>, RenderError> {
        if document.pages.is_empty() {
            return Err(RenderError::Pdf("document has no pages".to_string()));
        }

        let mut builder = PdfBuilder {
            objects: Vec::new(),
            font_objects: Vec::new(),
            image_objects: Vec::new(),
            image_index_map: HashMap::new(),
        };

        // Reserve object IDs:
        // 0 = placeholder (PDF objects are 1-indexed)
        // 1 = Catalog
        // 2 = Pages (page tree root)
        // 3+ = fonts, images, then page objects and content streams
        builder.objects.push(PdfObject { id: 0, data: vec![] });
        builder.objects.push(PdfObject { id: 1, data: vec![] });
        builder.objects.push(PdfObject { id: 2, data: vec![] });

        self.register_fonts(&mut builder, document, font_context);
        self.register_images(&mut builder, document);

        let mut page_obj_ids: Vec<usize> = Vec::new();
        let mut unmapped = 0usize;

        for page in &document.pages {
            let content =
                self.build_content_stream_for_page(page, &builder, font_context, &mut unmapped);
            let compressed = compress_to_vec_zlib(content.as_bytes(), 6);

            let content_obj_id = builder.objects.len();
            let mut content_data: Vec<u8> = Vec::new();
            let _ = write!(
                content_data,
                "<< /Length {} /Filter /FlateDecode >>\nstream\n",
                compressed.len()
            );
            content_data.extend_from_slice(&compressed);
            content_data.extend_from_slice(b"\nendstream");
            builder.objects.push(PdfObject {
                id: content_obj_id,
                data: content_data,
            });

            let page_obj_id = builder.objects.len();
            let font_resources = self.build_font_resource_dict(&builder.font_objects);
            let xobject_resources = self.build_xobject_resource_dict(page, &builder);
            let resources = if xobject_resources.is_empty() {
                format!("/Font << {} >>", font_resources)
            } else {
                format!(
                    "/Font << {} >> /XObject << {} >>",
                    font_resources, xobject_resources
                )
            };
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << {} >> >>",
                page.width * PT_PER_MM,
                page.height * PT_PER_MM,
                content_obj_id,
                resources
            );
            builder.objects.push(PdfObject {
                id: page_obj_id,
                data: page_dict.into_bytes(),
            });
            page_obj_ids.push(page_obj_id);
        }

        if unmapped > 0 {
            log::warn!(
                "{} character(s) outside WinAnsiEncoding were written as '?'",
                unmapped
            );
        }

        builder.objects[1].data = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();

        let kids: String = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2].data = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_obj_ids.len()
        )
        .into_bytes();

        let info_obj_id = builder.objects.len();
        let mut info_dict = String::from("<< ");
        if let Some(ref title) = info.title {
            let (encoded, _) = Self::encode_winansi(title);
            let _ = write!(info_dict, "/Title ({}) ", encoded);
        }
        let _ = write!(
            info_dict,
            "/Producer (formprint {}) /Creator (formprint) >>",
            env!("CARGO_PKG_VERSION")
        );
        builder.objects.push(PdfObject {
            id: info_obj_id,
            data: info_dict.into_bytes(),
        });

        log::debug!(
            "pdf: {} pages, {} fonts, {} images, {} objects",
            page_obj_ids.len(),
            builder.font_objects.len(),
            builder.image_objects.len(),
            builder.objects.len()
        );

        Ok(self.serialize(&builder, Some(info_obj_id)))
    }

    /// Register every standard font that some text run resolves to.
    /// Helvetica is always present so each page has a font resource.
    fn register_fonts(
        &self,
        builder: &mut PdfBuilder,
        document: &RenderedDocument,
        font_context: &FontContext,
    ) {
        let mut used = vec![StandardFont::Helvetica];
        for page in &document.pages {
            for cmd in &page.commands {
                if let DrawCommand::Text { font, .. } = cmd {
                    let resolved = font_context.resolve(&font.family, font.style);
                    if !used.contains(&resolved) {
                        used.push(resolved);
                    }
                }
            }
        }

        for font in used {
            let obj_id = builder.objects.len();
            let data = format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                font.pdf_name()
            );
            builder.objects.push(PdfObject {
                id: obj_id,
                data: data.into_bytes(),
            });
            builder.font_objects.push((font, obj_id));
        }
    }

    /// Write each distinct image once as an XObject.
    fn register_images(&self, builder: &mut PdfBuilder, document: &RenderedDocument) {
        for page in &document.pages {
            for cmd in &page.commands {
                if let DrawCommand::Image { source, image, .. } = cmd {
                    if builder.image_index_map.contains_key(source) {
                        continue;
                    }
                    let obj_id = Self::write_image_xobject(builder, image);
                    builder.image_index_map.insert(source.clone(), builder.image_objects.len());
                    builder.image_objects.push(obj_id);
                }
            }
        }
    }

    /// Build the PDF content stream for a single page.
    fn build_content_stream_for_page(
        &self,
        page: &RenderedPage,
        builder: &PdfBuilder,
        font_context: &FontContext,
        unmapped: &mut usize,
    ) -> String {
        let mut stream = String::new();
        let _ = writeln!(stream, "{:.2} w", STROKE_WIDTH);
        for cmd in &page.commands {
            self.write_command(&mut stream, cmd, page.height, builder, font_context, unmapped);
        }
        stream
    }

    /// Write a single draw command as PDF operators.
    fn write_command(
        &self,
        stream: &mut String,
        cmd: &DrawCommand,
        page_height: f64,
        builder: &PdfBuilder,
        font_context: &FontContext,
        unmapped: &mut usize,
    ) {
        let px = |x: f64| x * PT_PER_MM;
        let py = |y: f64| (page_height - y) * PT_PER_MM;

        match cmd {
            DrawCommand::Text { x, y, text, font } => {
                let resolved = font_context.resolve(&font.family, font.style);
                let idx = Self::font_index(resolved, &builder.font_objects);
                let (encoded, missing) = Self::encode_winansi(text);
                *unmapped += missing;
                let _ = write!(
                    stream,
                    "BT\n/F{} {:.1} Tf\n{:.2} {:.2} Td\n({}) Tj\nET\n",
                    idx,
                    font.size,
                    px(*x),
                    py(*y),
                    encoded
                );
            }

            DrawCommand::Rect {
                x,
                y,
                width,
                height,
                filled,
                gray,
            } => {
                let (rx, ry) = (px(*x), py(*y + *height));
                let (rw, rh) = (width * PT_PER_MM, height * PT_PER_MM);
                if *filled {
                    let _ = write!(
                        stream,
                        "q\n{:.3} g\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
                        gray, rx, ry, rw, rh
                    );
                } else {
                    let _ = write!(stream, "{:.2} {:.2} {:.2} {:.2} re\nS\n", rx, ry, rw, rh);
                }
            }

            DrawCommand::Line { x0, y0, x1, y1 } => {
                let _ = write!(
                    stream,
                    "{:.2} {:.2} m\n{:.2} {:.2} l\nS\n",
                    px(*x0),
                    py(*y0),
                    px(*x1),
                    py(*y1)
                );
            }

            DrawCommand::Path { ops } => {
                for op in ops {
                    match op {
                        PathOp::MoveTo { x, y } => {
                            let _ = writeln!(stream, "{:.2} {:.2} m", px(*x), py(*y));
                        }
                        PathOp::LineTo { x, y } => {
                            let _ = writeln!(stream, "{:.2} {:.2} l", px(*x), py(*y));
                        }
                        PathOp::CurveTo {
                            x1,
                            y1,
                            x2,
                            y2,
                            x,
                            y,
                        } => {
                            let _ = writeln!(
                                stream,
                                "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
                                px(*x1),
                                py(*y1),
                                px(*x2),
                                py(*y2),
                                px(*x),
                                py(*y)
                            );
                        }
                        PathOp::Close => stream.push_str("h\n"),
                    }
                }
                stream.push_str("S\n");
            }

            DrawCommand::Image {
                x,
                y,
                width,
                height,
                source,
                ..
            } => {
                let (w, h) = (width * PT_PER_MM, height * PT_PER_MM);
                if let Some(&img_idx) = builder.image_index_map.get(source) {
                    let _ = write!(
                        stream,
                        "q\n{:.4} 0 0 {:.4} {:.2} {:.2} cm\n/Im{} Do\nQ\n",
                        w,
                        h,
                        px(*x),
                        py(*y + *height),
                        img_idx
                    );
                } else {
                    // Grey placeholder if the image was never registered
                    let _ = write!(
                        stream,
                        "q\n0.9 g\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
                        px(*x),
                        py(*y + *height),
                        w,
                        h
                    );
                }
            }
        }
    }

    fn font_index(font: StandardFont, font_objects: &[(StandardFont, usize)]) -> usize {
        font_objects
            .iter()
            .position(|(f, _)| *f == font)
            .unwrap_or(0)
    }

    /// Write an image as a PDF XObject and return its object id. Decoded
    /// images with transparency get their SMask written first.
    fn write_image_xobject(builder: &mut PdfBuilder, image: &LoadedImage) -> usize {
        use crate::image_loader::{ImagePixelData, JpegColorSpace};

        match &image.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                let color_space_str = match color_space {
                    JpegColorSpace::DeviceRGB => "/DeviceRGB",
                    JpegColorSpace::DeviceGray => "/DeviceGray",
                };

                let obj_id = builder.objects.len();
                let mut obj_data: Vec<u8> = Vec::new();
                let _ = write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace {} \
                     /BitsPerComponent 8 \
                     /Filter /DCTDecode \
                     /Length {} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    color_space_str,
                    data.len()
                );
                obj_data.extend_from_slice(data);
                obj_data.extend_from_slice(b"\nendstream");
                builder.objects.push(PdfObject {
                    id: obj_id,
                    data: obj_data,
                });
                obj_id
            }

            ImagePixelData::Decoded { rgb, alpha } => {
                let smask_id = alpha.as_ref().map(|alpha_data| {
                    let compressed_alpha = compress_to_vec_zlib(alpha_data, 6);
                    let smask_obj_id = builder.objects.len();
                    let mut smask_data: Vec<u8> = Vec::new();
                    let _ = write!(
                        smask_data,
                        "<< /Type /XObject /Subtype /Image \
                         /Width {} /Height {} \
                         /ColorSpace /DeviceGray \
                         /BitsPerComponent 8 \
                         /Filter /FlateDecode \
                         /Length {} >>\nstream\n",
                        image.width_px,
                        image.height_px,
                        compressed_alpha.len()
                    );
                    smask_data.extend_from_slice(&compressed_alpha);
                    smask_data.extend_from_slice(b"\nendstream");
                    builder.objects.push(PdfObject {
                        id: smask_obj_id,
                        data: smask_data,
                    });
                    smask_obj_id
                });

                let compressed_rgb = compress_to_vec_zlib(rgb, 6);
                let obj_id = builder.objects.len();
                let mut obj_data: Vec<u8> = Vec::new();
                let smask_ref = smask_id
                    .map(|id| format!(" /SMask {} 0 R", id))
                    .unwrap_or_default();

                let _ = write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace /DeviceRGB \
                     /BitsPerComponent 8 \
                     /Filter /FlateDecode \
                     /Length {}{} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    compressed_rgb.len(),
                    smask_ref
                );
                obj_data.extend_from_slice(&compressed_rgb);
                obj_data.extend_from_slice(b"\nendstream");
                builder.objects.push(PdfObject {
                    id: obj_id,
                    data: obj_data,
                });
                obj_id
            }
        }
    }

    /// The `/Im{n}` entries for the images drawn on `page`.
    fn build_xobject_resource_dict(&self, page: &RenderedPage, builder: &PdfBuilder) -> String {
        let mut indices: Vec<usize> = page
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Image { source, .. } => builder.image_index_map.get(source).copied(),
                _ => None,
            })
            .collect();
        indices.sort_unstable();
        indices.dedup();

        indices
            .iter()
            .map(|&i| format!("/Im{} {} 0 R", i, builder.image_objects[i]))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn build_font_resource_dict(&self, font_objects: &[(StandardFont, usize)]) -> String {
        font_objects
            .iter()
            .enumerate()
            .map(|(i, (_, obj_id))| format!("/F{} {} 0 R", i, obj_id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Escape a string for a PDF literal.
    fn escape_pdf_string(s: &str) -> String {
        s.replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)")
    }

    /// Encode `text` as an escaped WinAnsi literal body. Returns the body
    /// and the number of characters replaced by `?`.
    fn encode_winansi(text: &str) -> (String, usize) {
        let mut out = String::new();
        let mut missing = 0;
        for ch in text.chars() {
            let b = match Self::unicode_to_winansi(ch) {
                Some(b) => b,
                None => {
                    missing += 1;
                    b'?'
                }
            };
            match b {
                b'\\' | b'(' | b')' => out.push_str(&Self::escape_pdf_string(&(b as char).to_string())),
                0x20..=0x7E => out.push(b as char),
                // Octal escape for bytes outside printable ASCII
                _ => {
                    let _ = write!(out, "\\{:03o}", b);
                }
            }
        }
        (out, missing)
    }

    /// Map a Unicode codepoint to a WinAnsiEncoding byte value.
    ///
    /// WinAnsiEncoding is based on Windows-1252. Most codepoints in
    /// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
    /// contains special mappings for smart quotes, bullets, dashes, etc.
    fn unicode_to_winansi(ch: char) -> Option<u8> {
        let cp = ch as u32;
        if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
            return Some(cp as u8);
        }
        match cp {
            0x20AC => Some(0x80), // Euro sign
            0x201A => Some(0x82), // Single low-9 quotation mark
            0x0192 => Some(0x83), // Latin small letter f with hook
            0x201E => Some(0x84), // Double low-9 quotation mark
            0x2026 => Some(0x85), // Horizontal ellipsis
            0x2020 => Some(0x86), // Dagger
            0x2021 => Some(0x87), // Double dagger
            0x02C6 => Some(0x88), // Modifier letter circumflex accent
            0x2030 => Some(0x89), // Per mille sign
            0x0160 => Some(0x8A), // Latin capital letter S with caron
            0x2039 => Some(0x8B), // Single left-pointing angle quotation
            0x0152 => Some(0x8C), // Latin capital ligature OE
            0x017D => Some(0x8E), // Latin capital letter Z with caron
            0x2018 => Some(0x91), // Left single quotation mark
            0x2019 => Some(0x92), // Right single quotation mark
            0x201C => Some(0x93), // Left double quotation mark
            0x201D => Some(0x94), // Right double quotation mark
            0x2022 => Some(0x95), // Bullet
            0x2013 => Some(0x96), // En dash
            0x2014 => Some(0x97), // Em dash
            0x02DC => Some(0x98), // Small tilde
            0x2122 => Some(0x99), // Trade mark sign
            0x0161 => Some(0x9A), // Latin small letter s with caron
            0x203A => Some(0x9B), // Single right-pointing angle quotation
            0x0153 => Some(0x9C), // Latin small ligature oe
            0x017E => Some(0x9E), // Latin small letter z with caron
            0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
            _ => None,
        }
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(&self, builder: &PdfBuilder, info_obj_id: Option<usize>) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let header = format!("{} 0 obj\n", i);
            output.extend_from_slice(header.as_bytes());
            output.extend_from_slice(&obj.data);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R",
            builder.objects.len()
        );
        if let Some(info_id) = info_obj_id {
            let _ = write!(output, " /Info {} 0 R", info_id);
        }
        let _ = write!(output, " >>\nstartxref\n{}\n%%EOF\n", xref_offset);

        output
    }
}
