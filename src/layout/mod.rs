//! # Layout Engine
//!
//! Turns a questionnaire schema plus record data into pages of draw
//! commands.
//!
//! The engine walks records × events × instances × forms. Each form starts
//! on a new page and is rendered by a single pass over its fields: headers
//! and matrix banners are drawn optimistically and erased afterwards if no
//! visible field followed them (see [`rollback`]), so no look-ahead over
//! branching logic is ever needed. The only look-ahead is the matrix group
//! height estimate, which reads labels but not visibility.
//!
//! All mutable state lives in the [`Pager`] of one render call and in a
//! [`RenderContext`] that is rebuilt for every form instance.

pub mod cursor;
pub mod fields;
pub mod matrix;
pub mod page_break;
pub mod rollback;

use std::collections::HashSet;

use crate::draw::RenderedDocument;
use crate::error::Result;
use crate::image_loader::load_image_file;
use crate::model::{EventData, FieldKind, FieldSchema, FieldValue, InstanceData, RenderOptions, Values};
use crate::services::{ImageStore, InstanceKey, Services, TextSubstitution};
use crate::style::Labels;
use crate::text::markup::strip_html;

use self::matrix::{MatrixBoundary, MatrixGroup};
use self::page_break::{FooterImage, Furniture, Pager};
use self::rollback::{Checkpoint, HeaderKind, RollbackCache};

/// Per form-instance state of the field loop.
#[derive(Debug, Default)]
pub struct RenderContext {
    pub fields_in_section: usize,
    pub fields_in_matrix: usize,
    pub prev_grid: Option<String>,
    pub prev_form: Option<String>,
    /// The first header of a form has no section before it to resolve.
    pub encountered_first_header: bool,
    /// Running question counter for auto-numbered forms.
    pub question_counter: usize,
    pub rollback: RollbackCache,
    matrix: Option<MatrixGroup>,
    closed_grids: HashSet<String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What field renderers need besides the pager.
pub(crate) struct FieldEnv<'a> {
    pub labels: &'a Labels,
    pub images: &'a dyn ImageStore,
    piping: &'a dyn TextSubstitution,
    key: InstanceKey<'a>,
    values: &'a Values,
}

impl<'a> FieldEnv<'a> {
    /// Plain text of a label with piped references resolved.
    pub fn resolve(&self, raw: &str) -> String {
        self.piping.resolve(&strip_html(raw), &self.key, self.values)
    }

    pub fn value(&self, name: &str) -> Option<&'a FieldValue> {
        self.values.get(name)
    }

    pub fn question_text(&self, field: &FieldSchema, number: Option<&str>) -> String {
        let label = self.resolve(&field.label);
        match number {
            Some(n) => format!("{}) {}", n, label),
            None => label,
        }
    }
}

/// The fields of one form, in schema order.
struct FormFields {
    name: String,
    title: String,
    fields: Vec<FieldSchema>,
}

fn group_by_form(fields: Vec<FieldSchema>) -> Vec<FormFields> {
    let mut forms: Vec<FormFields> = Vec::new();
    for field in fields {
        match forms.iter_mut().find(|f| f.name == field.form_name) {
            Some(form) => form.fields.push(field),
            None => forms.push(FormFields {
                name: field.form_name.clone(),
                title: field
                    .form_label
                    .clone()
                    .unwrap_or_else(|| field.form_name.clone()),
                fields: vec![field],
            }),
        }
    }
    forms
}

/// One pass over a form: which record, event and instance it renders.
struct FormPass<'a> {
    record: Option<&'a str>,
    event: Option<&'a EventData>,
    instance: Option<&'a InstanceData>,
}

/// Lays out documents with one set of options.
pub struct LayoutEngine {
    options: RenderOptions,
}

impl LayoutEngine {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render every selected record, or one blank copy of the forms when
    /// there is no data provider.
    ///
    /// Invalid geometry and schema or data provider failures abort the
    /// render; everything else is logged and rendered around.
    pub fn render(&self, services: &Services<'_>) -> Result<RenderedDocument> {
        self.options.geometry.validate()?;
        let fields = services.schema.fields(self.options.forms.as_deref())?;
        let forms = group_by_form(fields);
        log::debug!("rendering {} form(s)", forms.len());

        let mut pager = Pager::new(self.options.geometry.clone(), self.furniture(services.images));
        let empty = Values::new();

        match services.data {
            None => {
                for form in &forms {
                    let pass = FormPass {
                        record: None,
                        event: None,
                        instance: None,
                    };
                    self.render_form(&mut pager, services, form, &pass, &empty);
                }
            }
            Some(data) => {
                for record in data.records()? {
                    let record_data = data.values(&record, self.options.event.as_deref())?;
                    log::debug!(
                        "record '{}': {} event(s)",
                        record,
                        record_data.events.len()
                    );
                    if record_data.events.is_empty() {
                        pager.set_running_label(Some(self.running_label(&record, None, None)));
                        for form in &forms {
                            let pass = FormPass {
                                record: Some(&record),
                                event: None,
                                instance: None,
                            };
                            self.render_form(&mut pager, services, form, &pass, &empty);
                        }
                        continue;
                    }
                    for event in &record_data.events {
                        for form in &forms {
                            for instance in instances_for(event, &form.name) {
                                pager.set_running_label(Some(self.running_label(
                                    &record,
                                    Some(event),
                                    Some(instance),
                                )));
                                let pass = FormPass {
                                    record: Some(&record),
                                    event: Some(event),
                                    instance: Some(instance),
                                };
                                self.render_form(&mut pager, services, form, &pass, &instance.values);
                            }
                        }
                    }
                }
            }
        }

        Ok(pager.finish())
    }

    fn furniture(&self, images: &dyn ImageStore) -> Furniture {
        let opts = &self.options;
        let footer = opts.footer_image.as_deref().and_then(|id| {
            let loaded = images.fetch_to_local(id).and_then(|path| {
                let image = load_image_file(&path);
                images.release(&path);
                image
            });
            match loaded {
                Ok(image) => Some(FooterImage {
                    source: id.to_string(),
                    image,
                }),
                Err(e) => {
                    log::warn!("footer image '{}' skipped: {}", id, e);
                    None
                }
            }
        });
        Furniture {
            footer,
            confidential: opts.confidential.then(|| opts.labels.confidential.clone()),
            header_text: opts.header_text.clone().filter(|t| !t.trim().is_empty()),
            running_label: None,
            survey_mode: opts.survey_mode,
            page_label: opts.labels.page.clone(),
        }
    }

    fn running_label(&self, record: &str, event: Option<&EventData>, instance: Option<&InstanceData>) -> String {
        let mut label = format!("{} {}", self.options.labels.record, record);
        if let Some(event) = event {
            let name = event
                .label
                .as_deref()
                .unwrap_or(event.event.as_str());
            if !name.is_empty() {
                label.push_str(&format!(" ({})", name));
            }
        }
        if let Some(InstanceData {
            repeat_instrument: None,
            instance: Some(n),
            ..
        }) = instance
        {
            label.push_str(&format!(" #{}", n));
        }
        label
    }

    fn render_form(
        &self,
        pager: &mut Pager,
        services: &Services<'_>,
        form: &FormFields,
        pass: &FormPass<'_>,
        values: &Values,
    ) {
        let key = InstanceKey {
            record: pass.record,
            event: pass
                .event
                .map(|e| e.event.as_str())
                .filter(|e| !e.is_empty()),
            form: &form.name,
            instance: pass.instance.and_then(|i| i.instance),
        };
        let env = FieldEnv {
            labels: &self.options.labels,
            images: services.images,
            piping: services.piping,
            key,
            values,
        };

        pager.start_new_page();
        let title = match pass.instance {
            Some(InstanceData {
                repeat_instrument: Some(_),
                instance: Some(n),
                ..
            }) => format!("{} (#{})", form.title, n),
            _ => form.title.clone(),
        };
        fields::draw_form_title(pager, &env.resolve(&title));

        let mut ctx = RenderContext::new();
        ctx.prev_form = Some(form.name.clone());

        for (i, field) in form.fields.iter().enumerate() {
            let grid = field.grid();
            let boundary = MatrixBoundary::between(ctx.prev_grid.as_deref(), grid)
                .split_at_header(field.header().is_some());

            if boundary.closes_group() {
                self.close_group(pager, &mut ctx);
            }
            match boundary {
                MatrixBoundary::Starting { .. } => {
                    self.open_group(pager, &env, &mut ctx, &form.fields[i..]);
                }
                MatrixBoundary::Continuing => {}
                MatrixBoundary::Ended | MatrixBoundary::None => {
                    if let Some(header) = field.header() {
                        self.open_section(pager, &env, &mut ctx, header);
                    }
                }
            }
            ctx.prev_grid = grid.map(str::to_string);

            let number = self.next_number(&mut ctx.question_counter, field);
            if !services.branching.is_visible(field, values) {
                log::trace!("field '{}' hidden by branching logic", field.name);
                continue;
            }

            match &ctx.matrix {
                Some(group) if grid.is_some() => {
                    let label = env.question_text(field, number.as_deref());
                    let lines = matrix::row_label_lines(pager, &label);
                    matrix::draw_row(pager, &env, group, field, &lines);
                    ctx.fields_in_matrix += 1;
                }
                _ => fields::render_field(pager, &env, field, number.as_deref()),
            }
            ctx.fields_in_section += 1;
        }

        if ctx.prev_grid.is_some() {
            self.close_group(pager, &mut ctx);
        }
        ctx.rollback
            .checkpoint(HeaderKind::Section, ctx.fields_in_section, &mut pager.canvas);

        if let Some(status) = services.locks.status(&key) {
            fields::draw_lock_block(pager, &env, &status);
        }
    }

    /// Resolve the section before `header`, then draw and arm it.
    fn open_section(&self, pager: &mut Pager, env: &FieldEnv<'_>, ctx: &mut RenderContext, header: &str) {
        if ctx.encountered_first_header {
            ctx.rollback
                .checkpoint(HeaderKind::Section, ctx.fields_in_section, &mut pager.canvas);
        }
        ctx.encountered_first_header = true;
        ctx.fields_in_section = 0;

        // Armed before any break the header causes, so a rollback leaves
        // the page exactly as if the section never existed.
        ctx.rollback.arm(HeaderKind::Section, pager.canvas.snapshot());
        let lines = fields::header_lines(pager, &env.resolve(header));
        pager.break_if_needed(lines.len() + 2);
        fields::draw_section_header(pager, &lines);
    }

    /// Start the matrix group whose first field is `rest[0]`.
    fn open_group(&self, pager: &mut Pager, env: &FieldEnv<'_>, ctx: &mut RenderContext, rest: &[FieldSchema]) {
        let first = &rest[0];
        let Some(name) = first.grid() else {
            return;
        };
        let resumed = ctx.prev_grid.as_deref() == Some(name);
        if ctx.closed_grids.contains(name) && !resumed {
            log::warn!(
                "matrix group '{}' reopened at field '{}'; its fields are not contiguous",
                name,
                first.name
            );
            debug_assert!(false, "matrix group '{}' is not contiguous", name);
        }

        let group = MatrixGroup::new(pager, env, first, name);
        let mut counter = ctx.question_counter;
        let row_lines: Vec<usize> = rest
            .iter()
            .enumerate()
            .take_while(|(j, f)| f.grid() == Some(name) && (*j == 0 || f.header().is_none()))
            .map(|(_, f)| f)
            .map(|f| {
                let number = self.next_number(&mut counter, f);
                let label = env.question_text(f, number.as_deref());
                matrix::row_label_lines(pager, &label).len().max(1)
            })
            .collect();

        let header = first.header().map(|h| {
            if ctx.encountered_first_header {
                ctx.rollback
                    .checkpoint(HeaderKind::Section, ctx.fields_in_section, &mut pager.canvas);
            }
            ctx.encountered_first_header = true;
            ctx.fields_in_section = 0;
            ctx.rollback.arm(HeaderKind::Section, pager.canvas.snapshot());
            fields::header_lines(pager, &env.resolve(h))
        });

        let before_break = pager.canvas.snapshot();
        let estimate = matrix::group_estimate(
            header.as_ref().map(Vec::len),
            group.banner_rows(pager.geometry()),
            &row_lines,
        );
        log::debug!(
            "matrix group '{}': {} rows, estimate {} lines",
            name,
            row_lines.len(),
            estimate
        );
        pager.break_if_needed(estimate);

        match &header {
            Some(lines) => {
                fields::draw_section_header(pager, lines);
                ctx.rollback.arm(HeaderKind::Matrix, pager.canvas.snapshot());
            }
            None => ctx.rollback.arm(HeaderKind::Matrix, before_break),
        }
        matrix::draw_banner(pager, &group);

        ctx.fields_in_matrix = 0;
        ctx.matrix = Some(group);
    }

    fn close_group(&self, pager: &mut Pager, ctx: &mut RenderContext) {
        if let Some(group) = ctx.matrix.take() {
            ctx.closed_grids.insert(group.name);
        }
        let outcome = ctx
            .rollback
            .checkpoint(HeaderKind::Matrix, ctx.fields_in_matrix, &mut pager.canvas);
        if outcome == Checkpoint::Committed {
            pager.newline();
        }
        ctx.fields_in_matrix = 0;
    }

    /// The number printed before a question, advancing the counter for
    /// every field that can carry one, hidden or not.
    fn next_number(&self, counter: &mut usize, field: &FieldSchema) -> Option<String> {
        if field.kind() == FieldKind::Descriptive {
            return None;
        }
        *counter += 1;
        if let Some(n) = field.question_number.as_deref().filter(|n| !n.trim().is_empty()) {
            return Some(n.to_string());
        }
        self.options.auto_number.then(|| counter.to_string())
    }
}

/// Instances of `event` that hold data for `form`: its repeat instances if
/// it repeats, otherwise the non-repeating instance.
fn instances_for<'a>(event: &'a EventData, form: &str) -> Vec<&'a InstanceData> {
    let (repeating, single): (Vec<&InstanceData>, Vec<&InstanceData>) = event
        .instances
        .iter()
        .filter(|i| i.covers_form(form))
        .partition(|i| i.repeat_instrument.is_some());
    if repeating.is_empty() {
        single
    } else {
        repeating
    }
}
