//! Resolution of semantic field names against the account's custom-field
//! catalog, and the per-submitter memoization of the two ids every
//! submission needs.

use crate::crm_client::CrmClient;
use crate::errors::AppError;
use crate::models::AccountMetadata;
use std::collections::HashMap;
use tokio::sync::OnceCell;

/// Semantic code of the contact email field.
pub const EMAIL_FIELD_CODE: &str = "EMAIL";
/// Semantic code of the contact phone field.
pub const PHONE_FIELD_CODE: &str = "PHONE";

/// Numeric ids of the account's EMAIL and PHONE contact fields.
///
/// Either can be absent when the account does not define the field.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldIds {
    pub email: Option<u64>,
    pub phone: Option<u64>,
}

impl FieldIds {
    /// Scans the contact field catalog for the EMAIL and PHONE codes.
    pub fn from_metadata(metadata: &AccountMetadata) -> Self {
        let mut ids = FieldIds::default();
        for field in &metadata.contact_fields {
            match field.code.as_deref() {
                Some(EMAIL_FIELD_CODE) => ids.email = Some(field.id),
                Some(PHONE_FIELD_CODE) => ids.phone = Some(field.id),
                _ => {}
            }
        }
        ids
    }
}

/// Lazily populated, instance-scoped cache of [`FieldIds`].
///
/// The catalog is fetched on first use and kept for the owner's lifetime, so
/// a submitter performs at most one metadata call no matter how many records
/// it pushes.
#[derive(Debug, Default)]
pub struct FieldIdCache {
    ids: OnceCell<FieldIds>,
}

impl FieldIdCache {
    pub fn new() -> Self {
        Self {
            ids: OnceCell::new(),
        }
    }

    /// Returns the cached ids, fetching the catalog on first access.
    pub async fn get<C: CrmClient>(&self, client: &C) -> Result<FieldIds, AppError> {
        self.ids
            .get_or_try_init(|| async {
                tracing::debug!("Fetching contact field catalog from CRM");
                let metadata = client.get_account_metadata().await?;
                let ids = FieldIds::from_metadata(&metadata);
                if ids.email.is_none() {
                    tracing::warn!("Account catalog defines no EMAIL contact field");
                }
                if ids.phone.is_none() {
                    tracing::warn!("Account catalog defines no PHONE contact field");
                }
                Ok(ids)
            })
            .await
            .map(|ids| *ids)
    }
}

/// On-demand lookup of the permitted labels for one field code.
///
/// Deliberately uncached: labels are only needed while resubmitting a grown
/// multi-value field, which is rare next to plain submissions.
pub async fn enum_labels<C: CrmClient>(
    client: &C,
    code: &str,
) -> Result<HashMap<String, String>, AppError> {
    let metadata = client.get_account_metadata().await?;
    Ok(metadata
        .contact_fields
        .iter()
        .find(|field| field.code.as_deref() == Some(code))
        .map(|field| field.enums.clone())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldDefinition;
    use std::collections::HashMap;

    fn definition(id: u64, code: Option<&str>) -> FieldDefinition {
        FieldDefinition {
            id,
            code: code.map(str::to_string),
            enums: HashMap::new(),
        }
    }

    #[test]
    fn from_metadata_picks_email_and_phone_ids() {
        let metadata = AccountMetadata {
            contact_fields: vec![
                definition(101, Some("PHONE")),
                definition(102, Some("EMAIL")),
                definition(205, None),
                definition(206, Some("POSITION")),
            ],
        };

        let ids = FieldIds::from_metadata(&metadata);
        assert_eq!(ids.email, Some(102));
        assert_eq!(ids.phone, Some(101));
    }

    #[test]
    fn missing_codes_stay_unresolved() {
        let metadata = AccountMetadata {
            contact_fields: vec![definition(206, Some("POSITION"))],
        };

        let ids = FieldIds::from_metadata(&metadata);
        assert!(ids.email.is_none());
        assert!(ids.phone.is_none());
    }
}
