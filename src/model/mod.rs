//! # Export Model
//!
//! The input representation for the renderer: the questionnaire schema, the
//! record values captured against it, and the options that control
//! furniture and geometry. Everything deserializes from the JSON export the
//! CLI reads, but the layout engine only ever sees these types through the
//! provider traits in [`crate::services`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::style::{Geometry, Labels};

/// A complete export ready for rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Every renderable field, in schema order.
    pub fields: Vec<FieldSchema>,

    /// Captured records. Empty renders a single blank copy of the forms.
    #[serde(default)]
    pub records: Vec<RecordData>,

    /// Images referenced by descriptive attachments, signatures and the
    /// footer, keyed by id. Values are base64 or `data:` URIs.
    #[serde(default)]
    pub images: BTreeMap<String, String>,

    /// Lock and e-signature state per form instance.
    #[serde(default)]
    pub locks: Vec<LockEntry>,

    #[serde(default)]
    pub options: RenderOptions,
}

/// Options that shape the output but not its content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub geometry: Geometry,
    pub labels: Labels,
    /// Document title written to the PDF info dictionary.
    pub title: Option<String>,
    /// Print the confidentiality banner on every page.
    pub confidential: bool,
    /// Extra text printed at the top of every page.
    pub header_text: Option<String>,
    /// Image id drawn at the bottom of every page.
    pub footer_image: Option<String>,
    /// Self-service survey responses carry no record label or page line.
    pub survey_mode: bool,
    /// Prefix labels with a running question number per form.
    pub auto_number: bool,
    /// Only render these forms.
    pub forms: Option<Vec<String>>,
    /// Only render these records.
    pub records: Option<Vec<String>>,
    /// Only render this event.
    pub event: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            labels: Labels::default(),
            title: None,
            confidential: false,
            header_text: None,
            footer_image: None,
            survey_mode: false,
            auto_number: false,
            forms: None,
            records: None,
            event: None,
        }
    }
}

/// The raw element type of a field as it appears in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Text,
    #[serde(alias = "notes")]
    Textarea,
    Calc,
    File,
    Descriptive,
    Radio,
    #[serde(alias = "dropdown")]
    Select,
    Checkbox,
    Yesno,
    Truefalse,
    Advcheckbox,
    Sql,
    Slider,
}

/// Where the question and its answers sit relative to each other.
///
/// `RV` and `RH` put the question on the left and the answers in the right
/// column. `LV` and `LH` stack the answers indented under the question.
/// The `H` variants pack choices side by side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    RV,
    RH,
    LV,
    LH,
}

impl Alignment {
    pub fn is_two_column(self) -> bool {
        matches!(self, Alignment::RV | Alignment::RH)
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Alignment::RH | Alignment::LH)
    }
}

/// One coded choice of a choice-family field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub code: String,
    pub label: String,
}

impl Choice {
    pub fn new(code: &str, label: &str) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
        }
    }
}

/// Labels printed at the left, middle and right of a slider strip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliderLabels {
    #[serde(default)]
    pub min: String,
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub max: String,
}

/// A file attached to a descriptive field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Id the image store knows the file under.
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Draw the file inline as an image rather than naming it.
    #[serde(default)]
    pub inline_image: bool,
}

/// One renderable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    pub form_name: String,
    /// Display name of the form, printed as the form title.
    #[serde(default)]
    pub form_label: Option<String>,
    pub element_type: ElementType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub note: Option<String>,
    /// Section header text printed before this field.
    #[serde(default)]
    pub section_header: Option<String>,
    /// Matrix group this field belongs to. Members of a group are
    /// contiguous in schema order.
    #[serde(default)]
    pub grid_name: Option<String>,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub validation: Option<String>,
    #[serde(default)]
    pub question_number: Option<String>,
    #[serde(default)]
    pub branching_logic: Option<String>,
    #[serde(default)]
    pub slider_labels: SliderLabels,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

/// Free-text flavours, which differ only in how they are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeTextKind {
    Text,
    Notes,
    Calc,
    File,
}

/// What the renderer does with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Choice { multiple: bool },
    Descriptive,
    FreeText(FreeTextKind),
    Signature,
    Slider,
}

impl FieldSchema {
    /// A minimal field; the builder methods below fill in the rest.
    pub fn new(name: &str, form_name: &str, element_type: ElementType, label: &str) -> Self {
        Self {
            name: name.to_string(),
            form_name: form_name.to_string(),
            form_label: None,
            element_type,
            label: label.to_string(),
            choices: Vec::new(),
            note: None,
            section_header: None,
            grid_name: None,
            alignment: Alignment::RV,
            validation: None,
            question_number: None,
            branching_logic: None,
            slider_labels: SliderLabels::default(),
            attachment: None,
        }
    }

    pub fn with_choices(mut self, choices: &[(&str, &str)]) -> Self {
        self.choices = choices.iter().map(|(c, l)| Choice::new(c, l)).collect();
        self
    }

    pub fn with_header(mut self, header: &str) -> Self {
        self.section_header = Some(header.to_string());
        self
    }

    pub fn with_grid(mut self, grid: &str) -> Self {
        self.grid_name = Some(grid.to_string());
        self
    }

    pub fn with_branching(mut self, logic: &str) -> Self {
        self.branching_logic = Some(logic.to_string());
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_validation(mut self, validation: &str) -> Self {
        self.validation = Some(validation.to_string());
        self
    }

    pub fn kind(&self) -> FieldKind {
        match self.element_type {
            ElementType::Radio
            | ElementType::Select
            | ElementType::Yesno
            | ElementType::Truefalse
            | ElementType::Sql => FieldKind::Choice { multiple: false },
            ElementType::Checkbox | ElementType::Advcheckbox => {
                FieldKind::Choice { multiple: true }
            }
            ElementType::Descriptive => FieldKind::Descriptive,
            ElementType::Text => FieldKind::FreeText(FreeTextKind::Text),
            ElementType::Textarea => FieldKind::FreeText(FreeTextKind::Notes),
            ElementType::Calc => FieldKind::FreeText(FreeTextKind::Calc),
            ElementType::File if self.validation.as_deref() == Some("signature") => {
                FieldKind::Signature
            }
            ElementType::File => FieldKind::FreeText(FreeTextKind::File),
            ElementType::Slider => FieldKind::Slider,
        }
    }

    /// Checkbox-family fields store one flag per choice and draw squares.
    pub fn is_checkbox_family(&self) -> bool {
        matches!(self.kind(), FieldKind::Choice { multiple: true })
    }

    /// The choices to draw. Yes/no and true/false fields carry none in the
    /// schema and get the fixed pair here.
    pub fn display_choices(&self, labels: &Labels) -> Vec<Choice> {
        match self.element_type {
            ElementType::Yesno => vec![Choice::new("1", &labels.yes), Choice::new("0", &labels.no)],
            ElementType::Truefalse => vec![
                Choice::new("1", &labels.true_label),
                Choice::new("0", &labels.false_label),
            ],
            ElementType::Advcheckbox if self.choices.is_empty() => {
                vec![Choice::new("1", "")]
            }
            _ => self.choices.clone(),
        }
    }

    /// The matrix group name, if non-empty.
    pub fn grid(&self) -> Option<&str> {
        self.grid_name.as_deref().filter(|g| !g.trim().is_empty())
    }

    /// The section header text, if non-empty.
    pub fn header(&self) -> Option<&str> {
        self.section_header.as_deref().filter(|h| !h.trim().is_empty())
    }

    /// Format hint printed next to a blank date or time field.
    pub fn format_hint(&self) -> Option<&'static str> {
        let validation = self.validation.as_deref()?;
        let hint = match validation {
            "date_ymd" => "(Y-M-D)",
            "date_mdy" => "(M-D-Y)",
            "date_dmy" => "(D-M-Y)",
            "datetime_ymd" | "datetime_seconds_ymd" => "(Y-M-D H:M)",
            "datetime_mdy" | "datetime_seconds_mdy" => "(M-D-Y H:M)",
            "datetime_dmy" | "datetime_seconds_dmy" => "(D-M-Y H:M)",
            "time" => "(H:M)",
            "time_mm_ss" => "(M:S)",
            _ => return None,
        };
        Some(hint)
    }
}

/// A stored answer.
///
/// Checkbox-family fields map each choice code to `"1"` or `"0"`; every
/// other field stores a single string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    Checkbox(BTreeMap<String, String>),
}

impl FieldValue {
    /// The stored string, if present and not blank.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }

    /// Whether `code` counts as chosen.
    pub fn is_chosen(&self, code: &str) -> bool {
        match self {
            FieldValue::Scalar(s) => s == code,
            FieldValue::Checkbox(map) => map.get(code).is_some_and(|v| v == "1"),
        }
    }
}

/// Field name → value for one form instance.
pub type Values = BTreeMap<String, FieldValue>;

/// All captured data for one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordData {
    pub record: String,
    #[serde(default)]
    pub events: Vec<EventData>,
}

/// Data captured in one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    /// Unique event name; empty for projects without events.
    #[serde(default)]
    pub event: String,
    /// Display name used in the running label.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub instances: Vec<InstanceData>,
}

/// One repeat instance (or the single non-repeating instance).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceData {
    /// Form that repeats; `None` for non-repeating data and repeating events.
    #[serde(default)]
    pub repeat_instrument: Option<String>,
    #[serde(default)]
    pub instance: Option<u32>,
    #[serde(default)]
    pub values: Values,
}

impl InstanceData {
    /// Whether this instance holds data for `form`.
    pub fn covers_form(&self, form: &str) -> bool {
        match &self.repeat_instrument {
            Some(instrument) => instrument == form,
            None => true,
        }
    }
}

/// Lock and e-signature state of one form instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub locked_by: Option<String>,
    #[serde(default)]
    pub locked_at: Option<String>,
    #[serde(default)]
    pub signed_by: Option<String>,
    #[serde(default)]
    pub signed_at: Option<String>,
}

impl LockStatus {
    pub fn is_empty(&self) -> bool {
        !self.locked && self.signed_by.is_none()
    }
}

/// A lock status bound to the form instance it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    pub record: String,
    #[serde(default)]
    pub event: Option<String>,
    pub form: String,
    #[serde(default)]
    pub instance: Option<u32>,
    #[serde(flatten)]
    pub status: LockStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_element_type() {
        let f = FieldSchema::new("sig", "f", ElementType::File, "Sign");
        assert_eq!(f.kind(), FieldKind::FreeText(FreeTextKind::File));
        let f = f.with_validation("signature");
        assert_eq!(f.kind(), FieldKind::Signature);
        let cb = FieldSchema::new("c", "f", ElementType::Checkbox, "C");
        assert!(cb.is_checkbox_family());
        let yn = FieldSchema::new("y", "f", ElementType::Yesno, "Y");
        assert_eq!(yn.kind(), FieldKind::Choice { multiple: false });
    }

    #[test]
    fn yesno_synthesizes_choices() {
        let yn = FieldSchema::new("y", "f", ElementType::Yesno, "Y");
        let choices = yn.display_choices(&Labels::default());
        assert_eq!(choices, vec![Choice::new("1", "Yes"), Choice::new("0", "No")]);
    }

    #[test]
    fn blank_grid_and_header_are_none() {
        let mut f = FieldSchema::new("a", "f", ElementType::Text, "A");
        f.grid_name = Some("  ".to_string());
        f.section_header = Some(String::new());
        assert_eq!(f.grid(), None);
        assert_eq!(f.header(), None);
    }

    #[test]
    fn values_deserialize_scalar_and_checkbox() {
        let values: Values =
            serde_json::from_str(r#"{ "age": "42", "colors": { "1": "0", "2": "1" } }"#).unwrap();
        assert_eq!(values["age"].as_scalar(), Some("42"));
        assert!(values["colors"].is_chosen("2"));
        assert!(!values["colors"].is_chosen("1"));
    }

    #[test]
    fn instance_covers_its_own_form_only() {
        let single = InstanceData::default();
        let repeat = InstanceData {
            repeat_instrument: Some("visits".into()),
            instance: Some(2),
            ..Default::default()
        };
        assert!(single.covers_form("visits"));
        assert!(repeat.covers_form("visits"));
        assert!(!repeat.covers_form("demographics"));
    }

    #[test]
    fn schema_json_uses_camel_case() {
        let json = r#"{
            "name": "sex", "formName": "demographics", "elementType": "radio",
            "label": "Sex", "choices": [{"code": "0", "label": "Male"}],
            "gridName": "", "alignment": "LH"
        }"#;
        let f: FieldSchema = serde_json::from_str(json).unwrap();
        assert_eq!(f.alignment, Alignment::LH);
        assert_eq!(f.grid(), None);
        assert_eq!(f.choices.len(), 1);
    }

    #[test]
    fn lock_entry_flattens_status() {
        let json = r#"{ "record": "1", "form": "f", "locked": true, "lockedBy": "alice" }"#;
        let entry: LockEntry = serde_json::from_str(json).unwrap();
        assert!(entry.status.locked);
        assert_eq!(entry.status.locked_by.as_deref(), Some("alice"));
        assert!(!entry.status.is_empty());
    }
}
