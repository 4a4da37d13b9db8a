//! # Collaborator Services
//!
//! Everything the layout engine needs from the outside world, expressed as
//! traits: the schema, the record values, branching evaluation, piping,
//! image storage and lock status. The engine calls these synchronously and
//! never holds on to anything they return beyond the current render.
//!
//! The in-memory implementations here back the JSON export path; hosts with
//! a real data store implement the traits themselves.

pub mod branching;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::{ImageError, RenderError, Result};
use crate::image_loader::decode_base64_source;
use crate::model::{
    ExportDocument, FieldSchema, FieldValue, LockEntry, LockStatus, RecordData, Values,
};

pub use branching::ExpressionBranching;

/// Identifies one rendered form instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceKey<'a> {
    pub record: Option<&'a str>,
    pub event: Option<&'a str>,
    pub form: &'a str,
    pub instance: Option<u32>,
}

/// Supplies the ordered field list.
pub trait SchemaProvider {
    fn fields(&self, form_filter: Option<&[String]>) -> Result<Vec<FieldSchema>>;
}

/// Supplies captured record values.
pub trait DataProvider {
    /// Record ids in render order.
    fn records(&self) -> Result<Vec<String>>;

    /// All data of one record, optionally restricted to one event.
    fn values(&self, record: &str, event_filter: Option<&str>) -> Result<RecordData>;
}

/// Decides whether a field is shown. Must fail open.
pub trait BranchingEvaluator {
    fn is_visible(&self, field: &FieldSchema, values: &Values) -> bool;
}

/// Resolves piped references in labels. Input is already plain text.
pub trait TextSubstitution {
    fn resolve(&self, label: &str, key: &InstanceKey<'_>, values: &Values) -> String;
}

/// Materialises stored files on the local filesystem.
pub trait ImageStore {
    fn fetch_to_local(&self, id: &str) -> std::result::Result<PathBuf, ImageError>;

    /// Called once the engine is done with a path from `fetch_to_local`.
    fn release(&self, path: &Path);
}

/// Reports lock and e-signature state.
pub trait LockStatusProvider {
    fn status(&self, key: &InstanceKey<'_>) -> Option<LockStatus>;
}

/// The collaborators of one render call.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub schema: &'a dyn SchemaProvider,
    /// `None` renders a single blank copy of every form.
    pub data: Option<&'a dyn DataProvider>,
    pub branching: &'a dyn BranchingEvaluator,
    pub piping: &'a dyn TextSubstitution,
    pub images: &'a dyn ImageStore,
    pub locks: &'a dyn LockStatusProvider,
}

// ─── Schema and data ────────────────────────────────────────────────

/// A schema held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchema {
    fields: Vec<FieldSchema>,
}

impl InMemorySchema {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }
}

impl SchemaProvider for InMemorySchema {
    fn fields(&self, form_filter: Option<&[String]>) -> Result<Vec<FieldSchema>> {
        let fields: Vec<FieldSchema> = match form_filter {
            Some(forms) => self
                .fields
                .iter()
                .filter(|f| forms.iter().any(|form| *form == f.form_name))
                .cloned()
                .collect(),
            None => self.fields.clone(),
        };
        if fields.is_empty() && !self.fields.is_empty() {
            return Err(RenderError::Schema(format!(
                "no fields belong to the requested forms {:?}",
                form_filter.unwrap_or_default()
            )));
        }
        Ok(fields)
    }
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryData {
    records: Vec<RecordData>,
    only: Option<Vec<String>>,
}

impl InMemoryData {
    pub fn new(records: Vec<RecordData>) -> Self {
        Self {
            records,
            only: None,
        }
    }

    /// Restrict `records()` to the given ids.
    pub fn with_record_filter(mut self, ids: Option<Vec<String>>) -> Self {
        self.only = ids;
        self
    }
}

impl DataProvider for InMemoryData {
    fn records(&self) -> Result<Vec<String>> {
        Ok(self
            .records
            .iter()
            .map(|r| r.record.clone())
            .filter(|id| self.only.as_ref().map_or(true, |only| only.contains(id)))
            .collect())
    }

    fn values(&self, record: &str, event_filter: Option<&str>) -> Result<RecordData> {
        let data = self
            .records
            .iter()
            .find(|r| r.record == record)
            .ok_or_else(|| RenderError::Data {
                record: record.to_string(),
                reason: "record not found".to_string(),
            })?;
        let mut data = data.clone();
        if let Some(event) = event_filter {
            data.events.retain(|e| e.event == event);
        }
        Ok(data)
    }
}

// ─── Piping ─────────────────────────────────────────────────────────

/// Leaves labels untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPiping;

impl TextSubstitution for NoPiping {
    fn resolve(&self, label: &str, _key: &InstanceKey<'_>, _values: &Values) -> String {
        label.to_string()
    }
}

/// Replaces `[field]` references with the stored value, or a blank line
/// when there is none.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldPiping;

const PIPING_BLANK: &str = "______";

impl TextSubstitution for FieldPiping {
    fn resolve(&self, label: &str, _key: &InstanceKey<'_>, values: &Values) -> String {
        let mut out = String::with_capacity(label.len());
        let mut rest = label;
        while let Some(open) = rest.find('[') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find(']') {
                Some(close) if is_field_name(&after[..close]) => {
                    let name = &after[..close];
                    match values.get(name) {
                        Some(FieldValue::Scalar(v)) if !v.trim().is_empty() => out.push_str(v),
                        _ => out.push_str(PIPING_BLANK),
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('[');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn is_field_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ─── Images ─────────────────────────────────────────────────────────

/// Serves files from a directory; ids are relative paths.
#[derive(Debug, Clone)]
pub struct DirectoryImageStore {
    root: PathBuf,
}

impl DirectoryImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageStore for DirectoryImageStore {
    fn fetch_to_local(&self, id: &str) -> std::result::Result<PathBuf, ImageError> {
        let relative = Path::new(id);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ImageError::Fetch {
                id: id.to_string(),
                reason: "id must be a relative path inside the image directory".to_string(),
            });
        }
        let path = self.root.join(relative);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ImageError::NotFound(id.to_string()))
        }
    }

    fn release(&self, _path: &Path) {}
}

/// Serves base64 images embedded in an export by writing each one to a
/// temporary file. The file is deleted on release, or when the store drops.
#[derive(Debug, Default)]
pub struct InlineImageStore {
    images: BTreeMap<String, String>,
    live: RefCell<Vec<tempfile::TempPath>>,
}

impl InlineImageStore {
    pub fn new(images: BTreeMap<String, String>) -> Self {
        Self {
            images,
            live: RefCell::new(Vec::new()),
        }
    }

    /// Number of temporary files not yet released.
    pub fn live_files(&self) -> usize {
        self.live.borrow().len()
    }
}

impl ImageStore for InlineImageStore {
    fn fetch_to_local(&self, id: &str) -> std::result::Result<PathBuf, ImageError> {
        let src = self
            .images
            .get(id)
            .ok_or_else(|| ImageError::NotFound(id.to_string()))?;
        let bytes = decode_base64_source(src)?;
        let mut file = tempfile::Builder::new().prefix("formprint-").tempfile()?;
        file.write_all(&bytes)?;
        let temp = file.into_temp_path();
        let path = temp.to_path_buf();
        self.live.borrow_mut().push(temp);
        Ok(path)
    }

    fn release(&self, path: &Path) {
        let mut live = self.live.borrow_mut();
        if let Some(pos) = live.iter().position(|t| &**t == path) {
            let temp = live.remove(pos);
            if let Err(e) = temp.close() {
                log::warn!("could not delete temporary image {}: {}", path.display(), e);
            }
        }
    }
}

// ─── Locks ──────────────────────────────────────────────────────────

/// Nothing is ever locked.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocks;

impl LockStatusProvider for NoLocks {
    fn status(&self, _key: &InstanceKey<'_>) -> Option<LockStatus> {
        None
    }
}

/// Lock entries held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocks {
    entries: Vec<LockEntry>,
}

impl InMemoryLocks {
    pub fn new(entries: Vec<LockEntry>) -> Self {
        Self { entries }
    }
}

impl LockStatusProvider for InMemoryLocks {
    fn status(&self, key: &InstanceKey<'_>) -> Option<LockStatus> {
        let record = key.record?;
        self.entries
            .iter()
            .find(|e| {
                e.record == record
                    && e.form == key.form
                    && e.event.as_deref().map_or(true, |ev| Some(ev) == key.event)
                    && e.instance.unwrap_or(1) == key.instance.unwrap_or(1)
            })
            .map(|e| e.status.clone())
            .filter(|s| !s.is_empty())
    }
}

// ─── Export bundle ──────────────────────────────────────────────────

/// Default collaborators for a self-contained [`ExportDocument`].
pub struct ExportServices {
    schema: InMemorySchema,
    data: Option<InMemoryData>,
    branching: ExpressionBranching,
    piping: FieldPiping,
    images: InlineImageStore,
    locks: InMemoryLocks,
}

impl ExportServices {
    pub fn from_export(doc: &ExportDocument) -> Self {
        let data = if doc.records.is_empty() {
            None
        } else {
            Some(
                InMemoryData::new(doc.records.clone())
                    .with_record_filter(doc.options.records.clone()),
            )
        };
        Self {
            schema: InMemorySchema::new(doc.fields.clone()),
            data,
            branching: ExpressionBranching,
            piping: FieldPiping,
            images: InlineImageStore::new(doc.images.clone()),
            locks: InMemoryLocks::new(doc.locks.clone()),
        }
    }

    pub fn services(&self) -> Services<'_> {
        Services {
            schema: &self.schema,
            data: self.data.as_ref().map(|d| d as &dyn DataProvider),
            branching: &self.branching,
            piping: &self.piping,
            images: &self.images,
            locks: &self.locks,
        }
    }

    pub fn image_store(&self) -> &InlineImageStore {
        &self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::tests::png_bytes;
    use crate::model::{ElementType, EventData, InstanceData};

    fn key(record: Option<&'static str>) -> InstanceKey<'static> {
        InstanceKey {
            record,
            event: Some("baseline"),
            form: "demo",
            instance: None,
        }
    }

    #[test]
    fn schema_filters_by_form() {
        let schema = InMemorySchema::new(vec![
            FieldSchema::new("a", "one", ElementType::Text, "A"),
            FieldSchema::new("b", "two", ElementType::Text, "B"),
        ]);
        let only_two = schema.fields(Some(&["two".to_string()])).unwrap();
        assert_eq!(only_two.len(), 1);
        assert_eq!(only_two[0].name, "b");
        assert!(matches!(
            schema.fields(Some(&["three".to_string()])),
            Err(RenderError::Schema(_))
        ));
    }

    #[test]
    fn data_filters_by_event_and_reports_missing_record() {
        let record = RecordData {
            record: "1".to_string(),
            events: vec![
                EventData {
                    event: "baseline".to_string(),
                    label: None,
                    instances: vec![InstanceData::default()],
                },
                EventData {
                    event: "followup".to_string(),
                    label: None,
                    instances: vec![InstanceData::default()],
                },
            ],
        };
        let data = InMemoryData::new(vec![record]);
        assert_eq!(data.records().unwrap(), vec!["1".to_string()]);
        assert_eq!(data.values("1", Some("followup")).unwrap().events.len(), 1);
        assert!(matches!(
            data.values("2", None),
            Err(RenderError::Data { .. })
        ));
    }

    #[test]
    fn field_piping_replaces_references() {
        let mut values = Values::new();
        values.insert("name".to_string(), FieldValue::Scalar("Ada".to_string()));
        let out = FieldPiping.resolve("Hello [name], born [dob]? [not a ref]", &key(None), &values);
        assert_eq!(out, "Hello Ada, born ______? [not a ref]");
    }

    #[test]
    fn inline_store_writes_and_releases_temp_files() {
        use base64::Engine;
        let mut images = BTreeMap::new();
        images.insert(
            "logo".to_string(),
            base64::engine::general_purpose::STANDARD.encode(png_bytes(2, 2)),
        );
        let store = InlineImageStore::new(images);
        let path = store.fetch_to_local("logo").unwrap();
        assert!(path.is_file());
        assert_eq!(store.live_files(), 1);
        store.release(&path);
        assert!(!path.exists());
        assert_eq!(store.live_files(), 0);
        assert!(matches!(
            store.fetch_to_local("nope"),
            Err(ImageError::NotFound(_))
        ));
    }

    #[test]
    fn directory_store_rejects_escaping_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sig.png"), png_bytes(1, 1)).unwrap();
        let store = DirectoryImageStore::new(dir.path());
        assert!(store.fetch_to_local("sig.png").is_ok());
        assert!(matches!(
            store.fetch_to_local("../etc/passwd"),
            Err(ImageError::Fetch { .. })
        ));
        assert!(matches!(
            store.fetch_to_local("missing.png"),
            Err(ImageError::NotFound(_))
        ));
    }

    #[test]
    fn locks_match_record_form_and_instance() {
        let locks = InMemoryLocks::new(vec![LockEntry {
            record: "1".to_string(),
            event: None,
            form: "demo".to_string(),
            instance: None,
            status: LockStatus {
                locked: true,
                locked_by: Some("alice".to_string()),
                ..LockStatus::default()
            },
        }]);
        assert!(locks.status(&key(Some("1"))).is_some());
        assert!(locks.status(&key(Some("2"))).is_none());
        assert!(locks.status(&key(None)).is_none());
        assert!(NoLocks.status(&key(Some("1"))).is_none());
    }
}
