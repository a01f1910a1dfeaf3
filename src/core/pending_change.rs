//! Staged change payloads.
//!
//! An owner's update or deletion request is stored on the establishment row as
//! JSON until an administrator decides on it. This module gives that blob a
//! type: [`PendingChange`] holds only allow-listed descriptive fields plus the
//! proposed asset paths, so a payload can never carry writes to protected
//! columns such as the status, the registry number or the canonical paths.
//!
//! Wire keys follow the listing front end (`"descricao"`, `"nomeFantasia"`,
//! ...). Asset keys are `"logo"`, `"certificate"` and `"productImages"`; the
//! older `"ccmei"` and `"produtos"` spellings are accepted when reading.

use crate::entities::establishment;
use crate::errors::{Error, Result};
use sea_orm::{ActiveValue::Set, prelude::Json};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const LOGO_KEY: &str = "logo";
pub const CERTIFICATE_KEY: &str = "certificate";
pub const PRODUCT_IMAGES_KEY: &str = "productImages";
pub const REASON_KEY: &str = "reason";

const LEGACY_CERTIFICATE_KEY: &str = "ccmei";
const LEGACY_PRODUCT_IMAGES_KEY: &str = "produtos";

const SHORT_TEXT_MAX: usize = 255;
const LONG_TEXT_MAX: usize = 5000;
const PATH_MAX: usize = 1024;
const REASON_MAX: usize = 1000;

/// Descriptive establishment fields that owners may propose and
/// administrators may edit. Anything not listed here is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditableField {
    TradeName,
    Category,
    ActivityCode,
    ContactPhone,
    ContactEmail,
    Address,
    Description,
    Differentiator,
    ServiceAreas,
    HiddenTags,
    Website,
    Instagram,
    ResponsibleName,
    ResponsibleDocument,
}

impl EditableField {
    pub const ALL: [Self; 14] = [
        Self::TradeName,
        Self::Category,
        Self::ActivityCode,
        Self::ContactPhone,
        Self::ContactEmail,
        Self::Address,
        Self::Description,
        Self::Differentiator,
        Self::ServiceAreas,
        Self::HiddenTags,
        Self::Website,
        Self::Instagram,
        Self::ResponsibleName,
        Self::ResponsibleDocument,
    ];

    /// JSON key used by clients and in the persisted payload.
    #[must_use]
    pub const fn wire_key(self) -> &'static str {
        match self {
            Self::TradeName => "nomeFantasia",
            Self::Category => "categoria",
            Self::ActivityCode => "cnae",
            Self::ContactPhone => "contatoEstabelecimento",
            Self::ContactEmail => "emailEstabelecimento",
            Self::Address => "endereco",
            Self::Description => "descricao",
            Self::Differentiator => "descricaoDiferencial",
            Self::ServiceAreas => "areasAtuacao",
            Self::HiddenTags => "tagsInvisiveis",
            Self::Website => "website",
            Self::Instagram => "instagram",
            Self::ResponsibleName => "nomeResponsavel",
            Self::ResponsibleDocument => "cpfResponsavel",
        }
    }

    #[must_use]
    pub fn from_wire_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.wire_key() == key)
    }

    #[must_use]
    pub const fn max_len(self) -> usize {
        match self {
            Self::Description | Self::Differentiator => LONG_TEXT_MAX,
            _ => SHORT_TEXT_MAX,
        }
    }

    /// Validates a proposed value for this field and returns it trimmed.
    pub fn validate(self, value: &str) -> Result<String> {
        let trimmed = value.trim();
        if self == Self::TradeName && trimmed.is_empty() {
            return Err(Error::validation(self.wire_key(), "cannot be empty"));
        }
        let len = trimmed.chars().count();
        if len > self.max_len() {
            return Err(Error::validation(
                self.wire_key(),
                format!("must be at most {} characters (got {len})", self.max_len()),
            ));
        }
        Ok(trimmed.to_string())
    }

    /// Writes `value` into the matching column of `model`.
    pub fn apply(self, model: &mut establishment::ActiveModel, value: String) {
        match self {
            Self::TradeName => model.trade_name = Set(value),
            Self::Category => model.category = Set(Some(value)),
            Self::ActivityCode => model.activity_code = Set(Some(value)),
            Self::ContactPhone => model.contact_phone = Set(Some(value)),
            Self::ContactEmail => model.contact_email = Set(Some(value)),
            Self::Address => model.address = Set(Some(value)),
            Self::Description => model.description = Set(Some(value)),
            Self::Differentiator => model.differentiator = Set(Some(value)),
            Self::ServiceAreas => model.service_areas = Set(Some(value)),
            Self::HiddenTags => model.hidden_tags = Set(Some(value)),
            Self::Website => model.website = Set(Some(value)),
            Self::Instagram => model.instagram = Set(Some(value)),
            Self::ResponsibleName => model.responsible_name = Set(Some(value)),
            Self::ResponsibleDocument => model.responsible_document = Set(Some(value)),
        }
    }

    /// Nulls the matching column of `model`. The trade name is required, so
    /// it is refused when the override is parsed and ignored here.
    pub fn clear(self, model: &mut establishment::ActiveModel) {
        match self {
            Self::TradeName => {}
            Self::Category => model.category = Set(None),
            Self::ActivityCode => model.activity_code = Set(None),
            Self::ContactPhone => model.contact_phone = Set(None),
            Self::ContactEmail => model.contact_email = Set(None),
            Self::Address => model.address = Set(None),
            Self::Description => model.description = Set(None),
            Self::Differentiator => model.differentiator = Set(None),
            Self::ServiceAreas => model.service_areas = Set(None),
            Self::HiddenTags => model.hidden_tags = Set(None),
            Self::Website => model.website = Set(None),
            Self::Instagram => model.instagram = Set(None),
            Self::ResponsibleName => model.responsible_name = Set(None),
            Self::ResponsibleDocument => model.responsible_document = Set(None),
        }
    }
}

/// Converts a JSON scalar into field text. Null, arrays and objects yield
/// `None` and are skipped by callers.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Reads the allow-listed descriptive fields out of a JSON object.
pub(crate) fn collect_fields(object: &Map<String, Value>) -> Result<BTreeMap<EditableField, String>> {
    let mut fields = BTreeMap::new();
    for (key, value) in object {
        let Some(field) = EditableField::from_wire_key(key) else {
            continue;
        };
        if let Some(text) = scalar_text(value) {
            fields.insert(field, field.validate(&text)?);
        }
    }
    Ok(fields)
}

/// Allow-listed fields whose value is an explicit `null`.
pub(crate) fn cleared_fields(object: &Map<String, Value>) -> Result<BTreeSet<EditableField>> {
    let mut cleared = BTreeSet::new();
    for (key, value) in object {
        let Some(field) = EditableField::from_wire_key(key) else {
            continue;
        };
        if value.is_null() {
            if field == EditableField::TradeName {
                return Err(Error::validation(key.as_str(), "cannot be cleared"));
            }
            cleared.insert(field);
        }
    }
    Ok(cleared)
}

pub(crate) fn validate_path(key: &str, path: &str) -> Result<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(key, "asset path cannot be empty"));
    }
    if trimmed.len() > PATH_MAX {
        return Err(Error::validation(key, "asset path is too long"));
    }
    Ok(trimmed.to_string())
}

fn path_list(key: &str, value: &Value) -> Result<Option<Vec<String>>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| Error::validation(key, "entries must be strings"))
                    .and_then(|path| validate_path(key, path))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        _ => Err(Error::validation(key, "must be a list of paths")),
    }
}

fn optional_path(key: &str, value: Option<&Value>) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(path)) => validate_path(key, path).map(Some),
        Some(_) => Err(Error::validation(key, "must be a path string")),
    }
}

/// A proposed change to a published establishment, awaiting moderation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChange {
    /// Proposed descriptive values, allow-listed and validated
    pub fields: BTreeMap<EditableField, String>,
    /// Newly uploaded logo that should replace the canonical one
    pub new_logo: Option<String>,
    /// Newly uploaded certificate document
    pub new_certificate: Option<String>,
    /// Full replacement set of product image paths
    pub new_product_images: Option<Vec<String>>,
    /// Owner's explanation, used by deletion requests
    pub reason: Option<String>,
}

impl PendingChange {
    /// Builds a payload from an untrusted JSON object.
    ///
    /// Unknown and protected keys are dropped; recognized values are
    /// validated and trimmed.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(object) = value else {
            return Err(Error::validation("payload", "must be a JSON object"));
        };

        let fields = collect_fields(object)?;
        let new_logo = optional_path(LOGO_KEY, object.get(LOGO_KEY))?;
        let new_certificate = optional_path(
            CERTIFICATE_KEY,
            object
                .get(CERTIFICATE_KEY)
                .or_else(|| object.get(LEGACY_CERTIFICATE_KEY)),
        )?;
        let new_product_images = match object
            .get(PRODUCT_IMAGES_KEY)
            .or_else(|| object.get(LEGACY_PRODUCT_IMAGES_KEY))
        {
            Some(list) => path_list(PRODUCT_IMAGES_KEY, list)?,
            None => None,
        };
        let reason = match object.get(REASON_KEY).and_then(scalar_text) {
            Some(text) => Some(validate_reason(&text)?),
            None => None,
        };

        let ignored: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|key| !Self::is_known_key(key))
            .collect();
        if !ignored.is_empty() {
            debug!(?ignored, "Dropping keys outside the editable allow-list");
        }

        Ok(Self {
            fields,
            new_logo,
            new_certificate,
            new_product_images,
            reason,
        })
    }

    /// Payload for an owner's deletion request.
    pub fn deletion(reason: Option<&str>) -> Result<Self> {
        Ok(Self {
            reason: reason.map(validate_reason).transpose()?,
            ..Self::default()
        })
    }

    fn is_known_key(key: &str) -> bool {
        EditableField::from_wire_key(key).is_some()
            || matches!(
                key,
                LOGO_KEY
                    | CERTIFICATE_KEY
                    | PRODUCT_IMAGES_KEY
                    | REASON_KEY
                    | LEGACY_CERTIFICATE_KEY
                    | LEGACY_PRODUCT_IMAGES_KEY
            )
    }

    /// Serializes the payload into its persisted JSON shape.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut object = Map::new();
        for (field, value) in &self.fields {
            object.insert(field.wire_key().to_string(), Value::String(value.clone()));
        }
        if let Some(logo) = &self.new_logo {
            object.insert(LOGO_KEY.to_string(), Value::String(logo.clone()));
        }
        if let Some(certificate) = &self.new_certificate {
            object.insert(CERTIFICATE_KEY.to_string(), Value::String(certificate.clone()));
        }
        if let Some(images) = &self.new_product_images {
            object.insert(
                PRODUCT_IMAGES_KEY.to_string(),
                Value::Array(images.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(reason) = &self.reason {
            object.insert(REASON_KEY.to_string(), Value::String(reason.clone()));
        }
        Value::Object(object)
    }

    /// Reads the payload stored on an establishment, if any.
    pub fn from_record(record: &establishment::Model) -> Result<Option<Self>> {
        record.pending_change.as_ref().map(Self::from_json).transpose()
    }

    /// Every file this payload introduced. These become orphans when the
    /// request is rejected.
    #[must_use]
    pub fn uploaded_paths(&self) -> Vec<String> {
        self.new_logo
            .iter()
            .chain(self.new_certificate.iter())
            .chain(self.new_product_images.iter().flatten())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.new_logo.is_none()
            && self.new_certificate.is_none()
            && self.new_product_images.is_none()
    }
}

fn validate_reason(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.chars().count() > REASON_MAX {
        return Err(Error::validation(
            REASON_KEY,
            format!("must be at most {REASON_MAX} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allow_list_drops_protected_keys() {
        let payload = json!({
            "descricao": "Novo texto",
            "status": "ACTIVE",
            "cnpj": "00.000.000/0001-00",
            "logoPath": "uploads/evil.png",
            "ativo": true,
            "estabelecimentoId": 1
        });

        let change = PendingChange::from_json(&payload).unwrap();
        assert_eq!(change.fields.len(), 1);
        assert_eq!(
            change.fields.get(&EditableField::Description).map(String::as_str),
            Some("Novo texto")
        );
        assert!(change.new_logo.is_none());
    }

    #[test]
    fn test_null_fields_are_skipped_and_scalars_stringified() {
        let payload = json!({ "categoria": null, "cnae": 5611201, "website": "  https://x.example  " });
        let change = PendingChange::from_json(&payload).unwrap();
        assert!(!change.fields.contains_key(&EditableField::Category));
        assert_eq!(change.fields[&EditableField::ActivityCode], "5611201");
        assert_eq!(change.fields[&EditableField::Website], "https://x.example");
    }

    #[test]
    fn test_legacy_asset_keys_are_accepted() {
        let payload = json!({
            "ccmei": "uploads/a/ccmei.pdf",
            "produtos": ["uploads/a/1.webp", "uploads/a/2.webp"]
        });
        let change = PendingChange::from_json(&payload).unwrap();
        assert_eq!(change.new_certificate.as_deref(), Some("uploads/a/ccmei.pdf"));
        assert_eq!(change.new_product_images.unwrap().len(), 2);
    }

    #[test]
    fn test_field_length_is_validated() {
        let payload = json!({ "nomeFantasia": "x".repeat(256) });
        let err = PendingChange::from_json(&payload).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "nomeFantasia"));

        let payload = json!({ "descricao": "x".repeat(5000) });
        assert!(PendingChange::from_json(&payload).is_ok());
    }

    #[test]
    fn test_empty_trade_name_is_rejected() {
        let err = PendingChange::from_json(&json!({ "nomeFantasia": "   " })).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_malformed_image_list_is_rejected() {
        let err = PendingChange::from_json(&json!({ "productImages": "uploads/a.webp" })).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        let err = PendingChange::from_json(&json!({ "productImages": [1, 2] })).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_persisted_shape_reads_back() {
        let mut change = PendingChange::default();
        change
            .fields
            .insert(EditableField::Description, "Novo texto".to_string());
        change.new_logo = Some("uploads/x/new.webp".to_string());
        change.new_product_images = Some(vec!["uploads/x/p1.webp".to_string()]);

        let stored = change.to_json();
        assert_eq!(stored["descricao"], "Novo texto");
        assert_eq!(stored["logo"], "uploads/x/new.webp");
        assert_eq!(stored["productImages"][0], "uploads/x/p1.webp");
        assert_eq!(PendingChange::from_json(&stored).unwrap(), change);
    }

    #[test]
    fn test_deletion_payload_is_empty_of_changes() {
        let change = PendingChange::deletion(Some("Closing the shop")).unwrap();
        assert!(change.is_empty());
        assert_eq!(change.reason.as_deref(), Some("Closing the shop"));
        assert_eq!(change.to_json(), json!({ "reason": "Closing the shop" }));
    }

    #[test]
    fn test_uploaded_paths_lists_every_new_file() {
        let change = PendingChange::from_json(&json!({
            "logo": "l.webp",
            "certificate": "c.pdf",
            "productImages": ["p1.webp", "p2.webp"]
        }))
        .unwrap();
        assert_eq!(
            change.uploaded_paths(),
            vec!["l.webp", "c.pdf", "p1.webp", "p2.webp"]
        );
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        assert!(PendingChange::from_json(&json!(["descricao"])).is_err());
    }
}
