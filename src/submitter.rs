//! Lead and contact submission workflow.
//!
//! Everything a form backend needs from the CRM: find or create the person
//! behind a submission, keep their multi-value contact fields additive, then
//! open a lead tied to them.

use crate::crm_client::CrmClient;
use crate::errors::{AppError, ResultExt};
use crate::field_catalog::{enum_labels, FieldIdCache, EMAIL_FIELD_CODE, PHONE_FIELD_CODE};
use crate::models::{Contact, FieldValue, RecordDraft, RecordKind, Submission};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Sends form submissions into the CRM as contact + lead pairs.
///
/// Owns the custom-field id cache, so one submitter instance performs at most
/// one field-catalog fetch over its lifetime. Every public operation issues
/// its remote calls strictly one after another; an instance is meant to serve
/// submissions sequentially.
pub struct FormSubmitter<C> {
    client: C,
    field_ids: FieldIdCache,
}

impl<C: CrmClient> FormSubmitter<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            field_ids: FieldIdCache::new(),
        }
    }

    /// Sends one form submission into the CRM and returns the new lead's id.
    ///
    /// Resolves the contact first (searching by email, then phone, creating
    /// one when unknown), then creates a lead linked to it. A rejected
    /// contact or lead creation surfaces as `AppError::CreationRejected`; a
    /// rejected reconciliation of an existing contact and a failed
    /// lead-to-contact link are logged and tolerated (see `resolve_contact`
    /// and `create_lead`).
    pub async fn submit(&self, submission: &Submission) -> Result<u64, AppError> {
        tracing::info!("Submitting lead \"{}\"", submission.lead_name);

        let contact = self
            .resolve_contact(
                submission.email.as_deref(),
                submission.phone.as_deref(),
                submission.contact_name.as_deref().unwrap_or_default(),
                &submission.contact_custom_fields,
            )
            .await?;

        self.create_lead(
            &submission.lead_name,
            Some(contact.id),
            &submission.lead_fields,
            &submission.lead_custom_fields,
        )
        .await
    }

    /// Finds the contact matching the submitted email/phone, or creates one.
    ///
    /// When a match exists its EMAIL/PHONE fields are reconciled with the new
    /// values; a rejected reconciliation is logged and swallowed, and the
    /// previously fetched (pre-update) record is returned either way. When no
    /// match exists the contact is created and read back by id.
    pub async fn resolve_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        name: &str,
        custom_fields: &BTreeMap<u64, String>,
    ) -> Result<Contact, AppError> {
        let candidates: Vec<&str> = [email, phone]
            .into_iter()
            .flatten()
            .filter(|value| !value.is_empty())
            .collect();

        if let Some(contact) = self.find_contact(&candidates).await? {
            tracing::debug!("Matched existing contact {}", contact.id);
            if let Err(e) = self
                .reconcile_contact(&contact, email, phone, custom_fields)
                .await
            {
                // A rejected refresh of an existing contact does not sink the
                // submission; the lead still gets created against the match.
                tracing::warn!("Reconciliation of contact {} failed: {}", contact.id, e);
            }
            return Ok(contact);
        }

        let contact_id = self.create_contact(email, phone, name, custom_fields).await?;
        self.find_contact_by_id(contact_id)
            .await
            .context("fetching contact after creation")?
            .ok_or_else(|| {
                AppError::NotFound(format!("contact {} not visible after creation", contact_id))
            })
    }

    /// Creates a lead and, when a contact id is given, links the lead to the
    /// contact.
    ///
    /// The link call only happens after the lead exists; if the link is
    /// rejected, the miss is logged and the lead id is returned anyway. The
    /// lead's existence wins over the completeness of its association.
    pub async fn create_lead(
        &self,
        name: &str,
        contact_id: Option<u64>,
        fields: &BTreeMap<String, Value>,
        custom_fields: &BTreeMap<u64, String>,
    ) -> Result<u64, AppError> {
        let mut draft = RecordDraft::new(name);
        for (field_name, field_value) in fields {
            draft.set_field(field_name, field_value.clone());
        }
        for (&field_id, value) in custom_fields {
            draft.add_custom_field(field_id, vec![FieldValue::plain(value)]);
        }

        let lead_id = self
            .client
            .create_record(RecordKind::Leads, &draft)
            .await
            .map_err(|e| AppError::CreationRejected(format!("lead \"{}\": {}", name, e)))?;

        if let Some(contact_id) = contact_id {
            if let Err(e) = self
                .client
                .link_records(RecordKind::Leads, lead_id, RecordKind::Contacts, contact_id)
                .await
            {
                tracing::warn!(
                    "Failed to link lead {} to contact {}: {}",
                    lead_id,
                    contact_id,
                    e
                );
            }
        }

        Ok(lead_id)
    }

    /// Tries each candidate as a full-text query, first hit wins.
    ///
    /// A single-value query surfacing the matching record is a best-effort
    /// assumption about the CRM's search, not an indexed lookup.
    pub async fn find_contact(&self, candidates: &[&str]) -> Result<Option<Contact>, AppError> {
        for candidate in candidates {
            if candidate.is_empty() {
                continue;
            }
            let records = self
                .client
                .search_records(RecordKind::Contacts, candidate, 1)
                .await?;
            if let Some(raw) = records.first() {
                return Ok(Some(Contact::from_raw(raw)?));
            }
        }
        Ok(None)
    }

    /// Exact-id contact lookup.
    pub async fn find_contact_by_id(&self, id: u64) -> Result<Option<Contact>, AppError> {
        match self
            .client
            .get_record_by_id(RecordKind::Contacts, id)
            .await?
        {
            Some(raw) => Ok(Some(Contact::from_raw(&raw)?)),
            None => Ok(None),
        }
    }

    async fn create_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        name: &str,
        custom_fields: &BTreeMap<u64, String>,
    ) -> Result<u64, AppError> {
        let mut draft = RecordDraft::new(name);

        if let Some(email) = non_empty(email) {
            let field_id = self.require_field_id(EMAIL_FIELD_CODE).await?;
            draft.add_custom_field(field_id, vec![FieldValue::work(email)]);
        }
        if let Some(phone) = non_empty(phone) {
            let field_id = self.require_field_id(PHONE_FIELD_CODE).await?;
            draft.add_custom_field(field_id, vec![FieldValue::work(phone)]);
        }
        for (&field_id, value) in custom_fields {
            draft.add_custom_field(field_id, vec![FieldValue::plain(value)]);
        }

        let contact_id = self
            .client
            .create_record(RecordKind::Contacts, &draft)
            .await
            .map_err(|e| AppError::CreationRejected(format!("contact \"{}\": {}", name, e)))?;
        Ok(contact_id)
    }

    /// Reconciles an already matched contact with freshly submitted values.
    ///
    /// The EMAIL and PHONE fields are append-only: submitting a multi-value
    /// field replaces its entire value set, so prior entries are re-included
    /// whole, with the new value appended unless already present. Supplied
    /// custom fields always count as a change. One update call is issued iff
    /// anything changed; otherwise no network call occurs. Returns whether an
    /// update was sent.
    async fn reconcile_contact(
        &self,
        contact: &Contact,
        email: Option<&str>,
        phone: Option<&str>,
        custom_fields: &BTreeMap<u64, String>,
    ) -> Result<bool, AppError> {
        let mut draft = RecordDraft::default();
        let mut changed = false;

        if let Some(email) = non_empty(email) {
            if !contact.has_value(EMAIL_FIELD_CODE, email) {
                let field_id = self.require_field_id(EMAIL_FIELD_CODE).await?;
                let existing = self.normalized_values(contact, EMAIL_FIELD_CODE).await?;
                draft.add_custom_field(field_id, merge_multi_value(&existing, email));
                changed = true;
            }
        }

        if let Some(phone) = non_empty(phone) {
            if !contact.has_value(PHONE_FIELD_CODE, phone) {
                let field_id = self.require_field_id(PHONE_FIELD_CODE).await?;
                let existing = self.normalized_values(contact, PHONE_FIELD_CODE).await?;
                draft.add_custom_field(field_id, merge_multi_value(&existing, phone));
                changed = true;
            }
        }

        if !custom_fields.is_empty() {
            // Supplied custom fields are always treated as a change.
            changed = true;
            for (&field_id, value) in custom_fields {
                draft.add_custom_field(field_id, vec![FieldValue::plain(value)]);
            }
        }

        if !changed {
            tracing::debug!("Contact {} already up to date, skipping update", contact.id);
            return Ok(false);
        }

        self.client
            .update_record(RecordKind::Contacts, contact.id, &draft)
            .await
            .map_err(|e| {
                AppError::ReconciliationRejected(format!("contact {}: {}", contact.id, e))
            })?;
        Ok(true)
    }

    /// A contact's raw multi-value entries for `code`, with any CRM-internal
    /// numeric enum token in an entry kind resolved to its display label.
    ///
    /// The CRM accepts a label, not a token, as the kind of each entry when a
    /// field is submitted back whole.
    async fn normalized_values(
        &self,
        contact: &Contact,
        code: &str,
    ) -> Result<Vec<FieldValue>, AppError> {
        let raw = contact
            .field(code)
            .map(|field| field.values.clone())
            .unwrap_or_default();

        let token = Regex::new(r"^\d+$").unwrap();
        let mut labels: Option<HashMap<String, String>> = None;
        let mut normalized = Vec::with_capacity(raw.len());
        for mut entry in raw {
            if let Some(kind) = entry.kind.as_deref() {
                if token.is_match(kind) {
                    if labels.is_none() {
                        labels = Some(enum_labels(&self.client, code).await?);
                    }
                    if let Some(label) = labels.as_ref().and_then(|map| map.get(kind)) {
                        entry.kind = Some(label.clone());
                    }
                }
            }
            normalized.push(entry);
        }
        Ok(normalized)
    }

    async fn require_field_id(&self, code: &str) -> Result<u64, AppError> {
        let ids = self.field_ids.get(&self.client).await?;
        let id = if code == EMAIL_FIELD_CODE {
            ids.email
        } else if code == PHONE_FIELD_CODE {
            ids.phone
        } else {
            None
        };
        id.ok_or_else(|| AppError::MissingFieldId(code.to_string()))
    }
}

/// Merge used when growing a contact's multi-value field: existing entries
/// are kept in order and the new value is appended with the WORK label,
/// unless an equal value is already present.
pub fn merge_multi_value(existing: &[FieldValue], value: &str) -> Vec<FieldValue> {
    if existing.iter().any(|entry| entry.value == value) {
        return existing.to_vec();
    }
    let mut merged = existing.to_vec();
    merged.push(FieldValue::work(value));
    merged
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_appends_new_value_with_work_label() {
        let existing = vec![FieldValue::work("a@x.com")];
        let merged = merge_multi_value(&existing, "b@x.com");
        assert_eq!(
            merged,
            vec![FieldValue::work("a@x.com"), FieldValue::work("b@x.com")]
        );
    }

    #[test]
    fn merge_skips_already_present_value() {
        let existing = vec![FieldValue::work("a@x.com"), FieldValue::work("b@x.com")];
        let merged = merge_multi_value(&existing, "a@x.com");
        assert_eq!(merged, existing);
    }

    #[test]
    fn merge_into_empty_field_yields_single_entry() {
        let merged = merge_multi_value(&[], "555");
        assert_eq!(merged, vec![FieldValue::work("555")]);
    }

    #[test]
    fn non_empty_filters_blank_values() {
        assert_eq!(non_empty(Some("a@x.com")), Some("a@x.com"));
        assert_eq!(non_empty(Some("")), None);
        assert_eq!(non_empty(None), None);
    }
}
