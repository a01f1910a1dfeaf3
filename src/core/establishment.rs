//! Establishment business logic - owner submissions, owner requests and lookups.
//!
//! Owners never modify a published listing directly. A new listing starts in
//! `PENDING_APPROVAL`; later changes are staged on the row as a
//! [`PendingChange`] and wait for an administrator (see `core::moderation`).

use crate::{
    core::{
        lifecycle::{Action, Transition, plan_transition},
        pending_change::{EditableField, PendingChange},
    },
    entities::{
        Establishment, EstablishmentStatus, ProductImage, establishment, product_image,
    },
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

const REGISTRY_KEY: &str = "cnpj";

/// Data for a first-time listing submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEstablishment {
    pub registry_number: String,
    pub fields: BTreeMap<EditableField, String>,
    pub logo_path: Option<String>,
    pub certificate_path: Option<String>,
    pub product_images: Vec<String>,
}

impl NewEstablishment {
    /// Builds a submission from a registration form body. The body uses the
    /// same keys as an update request.
    pub fn from_json(registry_number: &str, value: &Value) -> Result<Self> {
        let parsed = PendingChange::from_json(value)?;
        Ok(Self {
            registry_number: registry_number.to_string(),
            fields: parsed.fields,
            logo_path: parsed.new_logo,
            certificate_path: parsed.new_certificate,
            product_images: parsed.new_product_images.unwrap_or_default(),
        })
    }
}

/// Registers a new establishment awaiting approval.
///
/// The listing is stored with status `PENDING_APPROVAL` and stays invisible
/// until an administrator approves it.
///
/// # Errors
/// Returns an error if:
/// - The registry number is blank or already registered
/// - The trade name is missing, or any field fails validation
/// - The database insert fails
pub async fn submit_establishment(
    db: &DatabaseConnection,
    submission: NewEstablishment,
) -> Result<establishment::Model> {
    let registry_number = submission.registry_number.trim().to_string();
    if registry_number.is_empty() {
        return Err(Error::validation(REGISTRY_KEY, "cannot be empty"));
    }
    if !submission.fields.contains_key(&EditableField::TradeName) {
        return Err(Error::validation(
            EditableField::TradeName.wire_key(),
            "is required",
        ));
    }

    let now = chrono::Utc::now();
    let mut model = establishment::ActiveModel {
        registry_number: Set(registry_number.clone()),
        status: Set(EstablishmentStatus::PendingApproval),
        active: Set(false),
        logo_path: Set(submission.logo_path),
        certificate_path: Set(submission.certificate_path),
        pending_change: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    for (field, value) in submission.fields {
        field.apply(&mut model, field.validate(&value)?);
    }

    let txn = db.begin().await?;

    if get_by_registry_number(&txn, &registry_number).await?.is_some() {
        return Err(Error::validation(
            REGISTRY_KEY,
            format!("'{registry_number}' is already registered"),
        ));
    }

    let record = model.insert(&txn).await?;
    for path in &submission.product_images {
        product_image::ActiveModel {
            establishment_id: Set(record.id),
            path: Set(path.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    info!(
        establishment_id = record.id,
        images = submission.product_images.len(),
        "Establishment submitted for approval"
    );
    Ok(record)
}

/// Stages `change` on `record` and moves it to the pending status that
/// `action` implies.
async fn stage_request(
    db: &DatabaseConnection,
    registry_number: &str,
    action: Action,
    change: &PendingChange,
) -> Result<establishment::Model> {
    let txn = db.begin().await?;

    let record = get_by_registry_number(&txn, registry_number)
        .await?
        .ok_or_else(|| Error::establishment_not_found(registry_number))?;

    let Transition::StageRequest(next) = plan_transition(record.status, action)? else {
        return Err(Error::InvalidStateTransition {
            status: record.status.to_string(),
            action: action.to_string(),
        });
    };

    let id = record.id;
    let mut model: establishment::ActiveModel = record.into();
    model.status = Set(next);
    model.pending_change = Set(Some(change.to_json()));
    model.updated_at = Set(chrono::Utc::now());
    let updated = model.update(&txn).await?;

    txn.commit().await?;
    info!(establishment_id = id, status = %next, "Owner request staged");
    Ok(updated)
}

/// Stages an owner's update request on a published listing.
///
/// The live record is not modified; the proposal waits in the staged payload
/// until an administrator approves or rejects it.
pub async fn request_update(
    db: &DatabaseConnection,
    registry_number: &str,
    change: &PendingChange,
) -> Result<establishment::Model> {
    stage_request(db, registry_number, Action::RequestUpdate, change).await
}

/// Stages an owner's request to remove a published listing.
pub async fn request_deletion(
    db: &DatabaseConnection,
    registry_number: &str,
    reason: Option<&str>,
) -> Result<establishment::Model> {
    let change = PendingChange::deletion(reason)?;
    stage_request(db, registry_number, Action::RequestDeletion, &change).await
}

pub async fn get_by_id<C>(db: &C, id: i64) -> Result<Option<establishment::Model>>
where
    C: ConnectionTrait,
{
    Establishment::find_by_id(id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Looks an establishment up by its registry number (CNPJ).
pub async fn get_by_registry_number<C>(
    db: &C,
    registry_number: &str,
) -> Result<Option<establishment::Model>>
where
    C: ConnectionTrait,
{
    Establishment::find()
        .filter(establishment::Column::RegistryNumber.eq(registry_number.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// The moderation queue: every establishment waiting for a decision, oldest
/// first.
pub async fn list_pending(db: &DatabaseConnection) -> Result<Vec<establishment::Model>> {
    Establishment::find()
        .filter(establishment::Column::Status.is_in([
            EstablishmentStatus::PendingApproval,
            EstablishmentStatus::PendingUpdate,
            EstablishmentStatus::PendingDeletion,
        ]))
        .order_by_asc(establishment::Column::CreatedAt)
        .order_by_asc(establishment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Published listings, alphabetically by trade name.
pub async fn list_active(db: &DatabaseConnection) -> Result<Vec<establishment::Model>> {
    Establishment::find()
        .filter(establishment::Column::Status.eq(EstablishmentStatus::Active))
        .filter(establishment::Column::Active.eq(true))
        .order_by_asc(establishment::Column::TradeName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Product images stored for an establishment, in upload order.
pub async fn images_for<C>(db: &C, establishment_id: i64) -> Result<Vec<product_image::Model>>
where
    C: ConnectionTrait,
{
    ProductImage::find()
        .filter(product_image::Column::EstablishmentId.eq(establishment_id))
        .order_by_asc(product_image::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
