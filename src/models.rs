use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Label applied to contact methods captured from form submissions.
pub const WORK_LABEL: &str = "WORK";

/// The two CRM record families this crate touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Contacts,
    Leads,
}

impl RecordKind {
    /// Path and payload segment the CRM uses for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Contacts => "contacts",
            RecordKind::Leads => "leads",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Submission (inbound) ============

/// One raw form submission to be pushed into the CRM. Transient, never stored.
///
/// Only the lead name is required. Lead fields are top-level CRM lead
/// attributes keyed by name; the two custom-field maps are keyed by the CRM's
/// numeric custom-field ids.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Name of the lead (deal) to create.
    pub lead_name: String,
    /// Email of the person behind the submission.
    pub email: Option<String>,
    /// Phone of the person behind the submission.
    pub phone: Option<String>,
    /// Name of the person behind the submission.
    pub contact_name: Option<String>,
    /// Top-level lead fields (e.g. "status_id", "price").
    pub lead_fields: BTreeMap<String, Value>,
    /// Custom lead fields, keyed by field id.
    pub lead_custom_fields: BTreeMap<u64, String>,
    /// Custom contact fields, keyed by field id.
    pub contact_custom_fields: BTreeMap<u64, String>,
}

impl Submission {
    pub fn new(lead_name: impl Into<String>) -> Self {
        Self {
            lead_name: lead_name.into(),
            ..Default::default()
        }
    }
}

// ============ CRM Records (remote) ============

/// One entry of a multi-value custom field.
///
/// The CRM serializes the entry label under the `enum` key. On records read
/// back from the CRM the label may be an internal numeric token instead of
/// the display string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    /// The stored value (an email address, a phone number, ...).
    pub value: String,
    /// The entry label (e.g. "WORK"), if any.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl FieldValue {
    /// A value labeled "WORK", the label given to everything captured from forms.
    pub fn work(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: Some(WORK_LABEL.to_string()),
        }
    }

    /// An unlabeled value.
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: None,
        }
    }
}

/// A custom field attached to a CRM record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: u64,
    /// Semantic code (e.g. "EMAIL", "PHONE"). Account-defined fields may have none.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

/// A contact (person) record as the CRM returns it.
///
/// Owned and persisted by the CRM; this crate only reads and patches it.
#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

impl Contact {
    /// Converts the CRM's raw response shape into the typed model.
    pub fn from_raw(raw: &Value) -> Result<Self, AppError> {
        serde_json::from_value(raw.clone())
            .map_err(|e| AppError::ExternalApiError(format!("Malformed contact record: {}", e)))
    }

    /// The custom field with this semantic code, if the contact carries one.
    pub fn field(&self, code: &str) -> Option<&CustomField> {
        self.custom_fields
            .iter()
            .find(|field| field.code.as_deref() == Some(code))
    }

    /// All stored values of the field with this code, in CRM order.
    pub fn field_values(&self, code: &str) -> Vec<&str> {
        self.field(code)
            .map(|field| field.values.iter().map(|v| v.value.as_str()).collect())
            .unwrap_or_default()
    }

    /// Whether the field with this code already holds exactly this value.
    pub fn has_value(&self, code: &str, value: &str) -> bool {
        self.field_values(code).iter().any(|v| *v == value)
    }
}

// ============ Outbound payloads ============

/// Patch for one custom field; submitting it replaces the field's whole value set.
#[derive(Debug, Clone, Serialize)]
pub struct CustomFieldPatch {
    pub id: u64,
    pub values: Vec<FieldValue>,
}

/// Outbound record payload for create and update calls.
///
/// Leads are created from a draft and never read back; contact updates ship a
/// draft carrying only the changed fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomFieldPatch>,
    /// Top-level record fields, serialized flat next to `name`.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl RecordDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Sets a top-level record field.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Appends a custom-field patch carrying the field's full value set.
    pub fn add_custom_field(&mut self, id: u64, values: Vec<FieldValue>) {
        self.custom_fields.push(CustomFieldPatch { id, values });
    }
}

// ============ Account metadata ============

/// The account's contact custom-field catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountMetadata {
    #[serde(default)]
    pub contact_fields: Vec<FieldDefinition>,
}

/// One custom-field definition from the account catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinition {
    pub id: u64,
    #[serde(default)]
    pub code: Option<String>,
    /// Internal enum token -> display label (e.g. "1001" -> "WORK").
    #[serde(default)]
    pub enums: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_value_label_round_trips_under_the_enum_key() {
        let parsed: FieldValue =
            serde_json::from_value(json!({"value": "a@x.com", "enum": "WORK"})).unwrap();
        assert_eq!(parsed.value, "a@x.com");
        assert_eq!(parsed.kind.as_deref(), Some("WORK"));

        let out = serde_json::to_value(FieldValue::work("a@x.com")).unwrap();
        assert_eq!(out, json!({"value": "a@x.com", "enum": "WORK"}));

        let out = serde_json::to_value(FieldValue::plain("555")).unwrap();
        assert_eq!(out, json!({"value": "555"}));
    }

    #[test]
    fn contact_parses_raw_record_and_ignores_extra_keys() {
        let raw = json!({
            "id": 7,
            "name": "Jane Roe",
            "last_modified": 1700000000,
            "responsible_user_id": 42,
            "custom_fields": [
                {"id": 102, "code": "EMAIL", "values": [{"value": "a@x.com", "enum": "WORK"}]},
                {"id": 205, "values": [{"value": "sem-code"}]}
            ]
        });

        let contact = Contact::from_raw(&raw).unwrap();
        assert_eq!(contact.id, 7);
        assert_eq!(contact.name, "Jane Roe");
        assert_eq!(contact.field_values("EMAIL"), vec!["a@x.com"]);
        assert!(contact.has_value("EMAIL", "a@x.com"));
        assert!(!contact.has_value("EMAIL", "b@x.com"));
        assert!(!contact.has_value("PHONE", "555"));
    }

    #[test]
    fn malformed_contact_record_is_an_external_api_error() {
        let raw = json!({"name": "no id here"});
        let err = Contact::from_raw(&raw).unwrap_err();
        assert!(matches!(err, AppError::ExternalApiError(_)));
    }

    #[test]
    fn draft_serializes_flat_fields_and_skips_empty_parts() {
        let mut draft = RecordDraft::new("Website order");
        draft.set_field("status_id", json!(142));
        let out = serde_json::to_value(&draft).unwrap();
        assert_eq!(out, json!({"name": "Website order", "status_id": 142}));

        let mut patch_only = RecordDraft::default();
        patch_only.add_custom_field(5, vec![FieldValue::plain("x")]);
        let out = serde_json::to_value(&patch_only).unwrap();
        assert_eq!(out, json!({"custom_fields": [{"id": 5, "values": [{"value": "x"}]}]}));
    }
}
