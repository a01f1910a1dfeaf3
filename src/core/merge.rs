//! Pending-change merge engine.
//!
//! [`merge`] is a pure function: given the canonical record, its stored
//! product images, a staged [`PendingChange`] and optional administrator
//! overrides, it returns a [`MergePlan`] describing the field writes, asset
//! slot changes, image-set changes and the files that become orphans once the
//! plan is committed. Nothing here touches the database or the disk.

use crate::core::pending_change::{
    CERTIFICATE_KEY, EditableField, LOGO_KEY, PendingChange, cleared_fields, collect_fields,
    validate_path,
};
use crate::entities::{establishment, product_image};
use crate::errors::{Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

const EXCLUDED_IMAGES_KEY: &str = "excludedImageUrls";
const ACTIVE_KEY: &str = "active";

/// What an administrator wants done to one asset slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SlotDirective {
    /// Leave the slot as the staged payload resolves it
    #[default]
    Keep,
    /// Point the slot at a different file
    ReplaceWith(String),
    /// Remove the file and null the slot
    Clear,
}

impl SlotDirective {
    /// Reads a directive from an override body: absent is `Keep`, `null` is
    /// `Clear`, a string is `ReplaceWith`.
    fn from_json(key: &str, value: Option<&Value>) -> Result<Self> {
        match value {
            None => Ok(Self::Keep),
            Some(Value::Null) => Ok(Self::Clear),
            Some(Value::String(path)) => validate_path(key, path).map(Self::ReplaceWith),
            Some(_) => Err(Error::validation(key, "must be a path string or null")),
        }
    }
}

/// Administrator edits layered on top of a staged payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminOverrides {
    pub fields: BTreeMap<EditableField, String>,
    /// Fields sent as `null`, to be emptied
    pub cleared: BTreeSet<EditableField>,
    pub logo: SlotDirective,
    pub certificate: SlotDirective,
    /// Image paths the administrator wants dropped
    pub excluded_images: BTreeSet<String>,
}

impl AdminOverrides {
    /// Parses an edit-and-approve body.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(object) = value else {
            return Err(Error::validation("body", "must be a JSON object"));
        };

        let excluded_images = match object.get(EXCLUDED_IMAGES_KEY) {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(_) => {
                return Err(Error::validation(
                    EXCLUDED_IMAGES_KEY,
                    "must be a list of image paths",
                ));
            }
        };

        Ok(Self {
            fields: collect_fields(object)?,
            cleared: cleared_fields(object)?,
            logo: SlotDirective::from_json(LOGO_KEY, object.get(LOGO_KEY))?,
            certificate: SlotDirective::from_json(CERTIFICATE_KEY, object.get(CERTIFICATE_KEY))?,
            excluded_images,
        })
    }
}

/// A direct administrator edit of a settled record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminEdit {
    pub overrides: AdminOverrides,
    /// Visibility toggle; switching it also moves the status
    pub active: Option<bool>,
}

impl AdminEdit {
    /// Parses a PATCH body.
    pub fn from_json(value: &Value) -> Result<Self> {
        let overrides = AdminOverrides::from_json(value)?;
        let active = match value.get(ACTIVE_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(flag)) => Some(*flag),
            Some(_) => return Err(Error::validation(ACTIVE_KEY, "must be a boolean")),
        };
        Ok(Self { overrides, active })
    }
}

/// Final state of one asset slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotChange {
    Unchanged,
    Set(Option<String>),
}

/// What happens to the stored product images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    Unchanged,
    /// Destroy every stored row and create these
    ReplaceAll(Vec<String>),
    /// Destroy only these rows
    Remove(Vec<i64>),
}

/// Everything a moderation action will write, plus the files it orphans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub fields: BTreeMap<EditableField, String>,
    /// Columns set to `NULL`; never overlaps `fields`
    pub cleared: BTreeSet<EditableField>,
    pub logo: SlotChange,
    pub certificate: SlotChange,
    pub images: ImageChange,
    /// Paths to delete after the commit, in discovery order, without duplicates
    pub orphaned: Vec<String>,
}

impl MergePlan {
    /// Whether the plan writes nothing besides the status change.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.fields.is_empty()
            && self.cleared.is_empty()
            && self.logo == SlotChange::Unchanged
            && self.certificate == SlotChange::Unchanged
            && self.images == ImageChange::Unchanged
    }
}

#[derive(Default)]
struct Orphans(Vec<String>);

impl Orphans {
    fn push(&mut self, path: String) {
        if !self.0.contains(&path) {
            self.0.push(path);
        }
    }
}

/// Moves a slot from `canonical` through the staged path and then the
/// administrator directive, recording every file that is no longer referenced.
fn resolve_slot(
    canonical: Option<&str>,
    staged: Option<&str>,
    directive: &SlotDirective,
    orphans: &mut Orphans,
) -> SlotChange {
    let mut current = canonical.map(str::to_string);
    let mut changed = false;

    let mut replace = |current: &mut Option<String>, next: Option<String>| {
        if let Some(previous) = current.take() {
            if next.as_deref() != Some(previous.as_str()) {
                orphans.push(previous);
            }
        }
        *current = next;
    };

    if let Some(path) = staged {
        replace(&mut current, Some(path.to_string()));
        changed = true;
    }
    match directive {
        SlotDirective::Keep => {}
        SlotDirective::ReplaceWith(path) => {
            replace(&mut current, Some(path.clone()));
            changed = true;
        }
        SlotDirective::Clear => {
            replace(&mut current, None);
            changed = true;
        }
    }

    if changed {
        SlotChange::Set(current)
    } else {
        SlotChange::Unchanged
    }
}

fn resolve_images(
    stored: &[product_image::Model],
    staged: Option<&[String]>,
    excluded: &BTreeSet<String>,
    orphans: &mut Orphans,
) -> ImageChange {
    match staged {
        Some(new_set) if !new_set.is_empty() => {
            for image in stored {
                orphans.push(image.path.clone());
            }
            let mut kept = Vec::with_capacity(new_set.len());
            for path in new_set {
                if excluded.contains(path) {
                    orphans.push(path.clone());
                } else if !kept.contains(path) {
                    kept.push(path.clone());
                }
            }
            ImageChange::ReplaceAll(kept)
        }
        _ => {
            let removed: Vec<i64> = stored
                .iter()
                .filter(|image| excluded.contains(&image.path))
                .map(|image| {
                    orphans.push(image.path.clone());
                    image.id
                })
                .collect();
            if removed.is_empty() {
                ImageChange::Unchanged
            } else {
                ImageChange::Remove(removed)
            }
        }
    }
}

/// Every path the record references once `logo`, `certificate` and `images`
/// have been applied.
fn referenced_after(
    record: &establishment::Model,
    stored_images: &[product_image::Model],
    logo: &SlotChange,
    certificate: &SlotChange,
    images: &ImageChange,
) -> BTreeSet<String> {
    let slot = |change: &SlotChange, canonical: &Option<String>| match change {
        SlotChange::Unchanged => canonical.clone(),
        SlotChange::Set(path) => path.clone(),
    };

    let mut referenced: BTreeSet<String> = slot(logo, &record.logo_path)
        .into_iter()
        .chain(slot(certificate, &record.certificate_path))
        .collect();
    match images {
        ImageChange::Unchanged => {
            referenced.extend(stored_images.iter().map(|image| image.path.clone()));
        }
        ImageChange::ReplaceAll(paths) => referenced.extend(paths.iter().cloned()),
        ImageChange::Remove(ids) => referenced.extend(
            stored_images
                .iter()
                .filter(|image| !ids.contains(&image.id))
                .map(|image| image.path.clone()),
        ),
    }
    referenced
}

/// Computes the writes for approving `staged` on `record`, with `overrides`
/// layered on top when an administrator edited the request.
#[must_use]
pub fn merge(
    record: &establishment::Model,
    stored_images: &[product_image::Model],
    staged: &PendingChange,
    overrides: Option<&AdminOverrides>,
) -> MergePlan {
    let no_overrides = AdminOverrides::default();
    let overrides = overrides.unwrap_or(&no_overrides);
    let mut orphans = Orphans::default();

    let mut fields = staged.fields.clone();

    let logo = resolve_slot(
        record.logo_path.as_deref(),
        staged.new_logo.as_deref(),
        &overrides.logo,
        &mut orphans,
    );
    let certificate = resolve_slot(
        record.certificate_path.as_deref(),
        staged.new_certificate.as_deref(),
        &overrides.certificate,
        &mut orphans,
    );
    let images = resolve_images(
        stored_images,
        staged.new_product_images.as_deref(),
        &overrides.excluded_images,
        &mut orphans,
    );

    for (field, value) in &overrides.fields {
        fields.insert(*field, value.clone());
    }
    for field in &overrides.cleared {
        fields.remove(field);
    }

    // Uploads are content-addressed, so an "old" path can reappear in the
    // merged state and must survive.
    let retained = referenced_after(record, stored_images, &logo, &certificate, &images);
    orphans.0.retain(|path| !retained.contains(path));

    MergePlan {
        fields,
        cleared: overrides.cleared.clone(),
        logo,
        certificate,
        images,
        orphaned: orphans.0,
    }
}
