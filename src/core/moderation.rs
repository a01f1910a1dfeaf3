//! Moderation service - administrator decisions on establishments.
//!
//! Each action runs in a single transaction: read the record, check the
//! transition, mutate rows, drop any file another row still points at from the
//! cleanup list, commit. Only after the commit does the service remove the
//! remaining files and notify the owner. Both
//! of those steps are best-effort: a failure is logged and the action still
//! succeeds, because the committed state is already correct.

use crate::{
    adapters::{AssetStore, Notifier, OutboundMessage, remove_orphans},
    core::{
        deletion::{DeletionPlan, unreferenced},
        establishment::images_for,
        lifecycle::{Action, Transition, plan_transition},
        merge::{AdminEdit, AdminOverrides, ImageChange, MergePlan, SlotChange, merge},
        notice::Notice,
        pending_change::PendingChange,
    },
    entities::{Establishment, EstablishmentStatus, ProductImage, establishment, product_image},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait, prelude::*};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Result handed back to the transport layer on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationOutcome {
    pub message: String,
}

impl ModerationOutcome {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Owner notification owed by a committed action.
enum Delivery {
    /// The action does not notify anyone
    Silent,
    /// The record has no contact address
    NoAddress,
    Send(OutboundMessage),
}

impl From<Option<OutboundMessage>> for Delivery {
    fn from(message: Option<OutboundMessage>) -> Self {
        message.map_or(Self::NoAddress, Self::Send)
    }
}

/// Work left for after the commit.
struct Committed {
    establishment_id: i64,
    orphaned: Vec<String>,
    delivery: Delivery,
    outcome: ModerationOutcome,
}

/// Administrator-facing moderation operations.
pub struct ModerationService {
    db: Arc<DatabaseConnection>,
    assets: Arc<dyn AssetStore>,
    notifier: Arc<dyn Notifier>,
    /// Signature used in notification messages
    team_name: String,
}

async fn find_record<C>(db: &C, id: i64) -> Result<establishment::Model>
where
    C: ConnectionTrait,
{
    Establishment::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::establishment_not_found(id))
}

/// Writes a merge plan onto `record` and leaves it in `status` with no staged
/// payload.
async fn apply_merge<C>(
    db: &C,
    record: establishment::Model,
    plan: &MergePlan,
    status: EstablishmentStatus,
) -> Result<establishment::Model>
where
    C: ConnectionTrait,
{
    let id = record.id;
    let mut model: establishment::ActiveModel = record.into();
    for (field, value) in &plan.fields {
        field.apply(&mut model, value.clone());
    }
    for field in &plan.cleared {
        field.clear(&mut model);
    }
    if let SlotChange::Set(path) = &plan.logo {
        model.logo_path = Set(path.clone());
    }
    if let SlotChange::Set(path) = &plan.certificate {
        model.certificate_path = Set(path.clone());
    }
    model.status = Set(status);
    model.active = Set(status == EstablishmentStatus::Active);
    model.pending_change = Set(None);
    model.updated_at = Set(chrono::Utc::now());
    let updated = model.update(db).await?;

    match &plan.images {
        ImageChange::Unchanged => {}
        ImageChange::ReplaceAll(paths) => {
            ProductImage::delete_many()
                .filter(product_image::Column::EstablishmentId.eq(id))
                .exec(db)
                .await?;
            for path in paths {
                product_image::ActiveModel {
                    establishment_id: Set(id),
                    path: Set(path.clone()),
                    ..Default::default()
                }
                .insert(db)
                .await?;
            }
        }
        ImageChange::Remove(ids) => {
            ProductImage::delete_many()
                .filter(product_image::Column::EstablishmentId.eq(id))
                .filter(product_image::Column::Id.is_in(ids.iter().copied()))
                .exec(db)
                .await?;
        }
    }
    Ok(updated)
}

impl ModerationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        assets: Arc<dyn AssetStore>,
        notifier: Arc<dyn Notifier>,
        team_name: impl Into<String>,
    ) -> Self {
        Self {
            db,
            assets,
            notifier,
            team_name: team_name.into(),
        }
    }

    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Approves whatever request is pending on establishment `id`.
    ///
    /// - `PENDING_APPROVAL`: the listing is published.
    /// - `PENDING_UPDATE`: the staged payload is merged into the record.
    /// - `PENDING_DELETION`: the record, its child rows and its files are removed.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `InvalidStateTransition` when nothing is
    /// pending, or a database error (in which case nothing was changed).
    #[instrument(skip(self))]
    pub async fn approve(&self, id: i64) -> Result<ModerationOutcome> {
        self.approve_with(id, Action::Approve, None).await
    }

    /// Layers administrator edits over the pending request, then approves it.
    /// Only new listings and update requests can be edited this way.
    #[instrument(skip(self, overrides))]
    pub async fn edit_and_approve(
        &self,
        id: i64,
        overrides: &AdminOverrides,
    ) -> Result<ModerationOutcome> {
        self.approve_with(id, Action::EditAndApprove, Some(overrides))
            .await
    }

    async fn approve_with(
        &self,
        id: i64,
        action: Action,
        overrides: Option<&AdminOverrides>,
    ) -> Result<ModerationOutcome> {
        let edited = overrides.is_some();
        let txn = self.db.begin().await?;

        let record = find_record(&txn, id).await?;
        let previous = record.status;
        let transition = plan_transition(previous, action)?;

        let mut committed = match transition {
            Transition::PublishListing | Transition::MergeUpdate => {
                let staged = PendingChange::from_record(&record)?.unwrap_or_default();
                let images = images_for(&txn, id).await?;
                let plan = merge(&record, &images, &staged, overrides);
                let updated = apply_merge(&txn, record, &plan, EstablishmentStatus::Active).await?;

                let (notice, message) = if transition == Transition::PublishListing {
                    (Notice::ListingApproved { edited }, "Establishment approved")
                } else {
                    (Notice::UpdateApproved { edited }, "Update request approved")
                };
                Committed {
                    establishment_id: id,
                    orphaned: plan.orphaned,
                    delivery: notice.compose(&updated, &self.team_name).into(),
                    outcome: ModerationOutcome::new(message),
                }
            }
            Transition::RemoveListing => {
                let plan = DeletionPlan::collect(&txn, &record).await?;
                plan.execute(&txn).await?;
                Committed {
                    establishment_id: id,
                    orphaned: plan.asset_paths,
                    delivery: Notice::DeletionApproved.compose(&record, &self.team_name).into(),
                    outcome: ModerationOutcome::new("Deletion request approved; establishment removed"),
                }
            }
            Transition::DiscardRequest
            | Transition::StageRequest(_)
            | Transition::EditInPlace => {
                return Err(Error::InvalidStateTransition {
                    status: previous.to_string(),
                    action: action.to_string(),
                });
            }
        };

        committed.orphaned = unreferenced(&txn, committed.orphaned).await?;
        txn.commit().await?;
        info!(establishment_id = id, from = %previous, %action, "Moderation action committed");
        Ok(self.after_commit(committed).await)
    }

    /// Rejects whatever request is pending on establishment `id`.
    ///
    /// - `PENDING_APPROVAL`: the submission is deleted with all of its files.
    /// - `PENDING_UPDATE`: the staged payload and the files it introduced are
    ///   discarded; the published record is untouched.
    /// - `PENDING_DELETION`: the request is discarded; the listing stays.
    ///
    /// `reason` is included in the owner's notification.
    #[instrument(skip(self))]
    pub async fn reject(&self, id: i64, reason: Option<&str>) -> Result<ModerationOutcome> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let txn = self.db.begin().await?;

        let record = find_record(&txn, id).await?;
        let previous = record.status;

        let mut committed = match plan_transition(previous, Action::Reject)? {
            Transition::RemoveListing => {
                let plan = DeletionPlan::collect(&txn, &record).await?;
                plan.execute(&txn).await?;
                let notice = Notice::ListingRejected { reason };
                Committed {
                    establishment_id: id,
                    orphaned: plan.asset_paths,
                    delivery: notice.compose(&record, &self.team_name).into(),
                    outcome: ModerationOutcome::new("Establishment rejected and removed"),
                }
            }
            Transition::DiscardRequest => {
                let staged = match PendingChange::from_record(&record) {
                    Ok(staged) => staged,
                    Err(e) => {
                        warn!(establishment_id = id, error = %e, "Discarding unreadable staged payload");
                        None
                    }
                };

                let orphaned = staged
                    .as_ref()
                    .map(PendingChange::uploaded_paths)
                    .unwrap_or_default();

                let notice = if previous == EstablishmentStatus::PendingUpdate {
                    Notice::UpdateRejected { reason }
                } else {
                    Notice::DeletionRejected { reason }
                };
                let delivery = notice.compose(&record, &self.team_name).into();

                let mut model: establishment::ActiveModel = record.into();
                model.status = Set(EstablishmentStatus::Active);
                model.active = Set(true);
                model.pending_change = Set(None);
                model.updated_at = Set(chrono::Utc::now());
                model.update(&txn).await?;

                Committed {
                    establishment_id: id,
                    orphaned,
                    delivery,
                    outcome: ModerationOutcome::new("Request rejected; establishment remains active"),
                }
            }
            Transition::PublishListing
            | Transition::MergeUpdate
            | Transition::StageRequest(_)
            | Transition::EditInPlace => {
                return Err(Error::InvalidStateTransition {
                    status: previous.to_string(),
                    action: Action::Reject.to_string(),
                });
            }
        };

        committed.orphaned = unreferenced(&txn, committed.orphaned).await?;
        txn.commit().await?;
        info!(establishment_id = id, from = %previous, "Moderation request rejected");
        Ok(self.after_commit(committed).await)
    }

    /// Edits a settled (`ACTIVE` or `REJECTED`) record in place. Setting
    /// `active` also moves the status: `false` to `REJECTED`, `true` to
    /// `ACTIVE`. No notification is sent.
    #[instrument(skip(self, edit))]
    pub async fn admin_update(&self, id: i64, edit: &AdminEdit) -> Result<ModerationOutcome> {
        let txn = self.db.begin().await?;

        let record = find_record(&txn, id).await?;
        let previous = record.status;
        plan_transition(previous, Action::AdminEdit)?;

        let images = images_for(&txn, id).await?;
        let plan = merge(&record, &images, &PendingChange::default(), Some(&edit.overrides));
        let status = match edit.active {
            Some(true) => EstablishmentStatus::Active,
            Some(false) => EstablishmentStatus::Rejected,
            None => previous,
        };
        apply_merge(&txn, record, &plan, status).await?;
        let orphaned = unreferenced(&txn, plan.orphaned).await?;

        txn.commit().await?;
        info!(establishment_id = id, from = %previous, to = %status, "Establishment edited by administrator");
        Ok(self
            .after_commit(Committed {
                establishment_id: id,
                orphaned,
                delivery: Delivery::Silent,
                outcome: ModerationOutcome::new("Establishment updated"),
            })
            .await)
    }

    /// Removes an establishment regardless of its status, together with its
    /// product images, reviews and files.
    #[instrument(skip(self))]
    pub async fn admin_delete(&self, id: i64) -> Result<ModerationOutcome> {
        let txn = self.db.begin().await?;

        let record = find_record(&txn, id).await?;
        let plan = DeletionPlan::collect(&txn, &record).await?;
        plan.execute(&txn).await?;
        let orphaned = unreferenced(&txn, plan.asset_paths).await?;

        txn.commit().await?;
        info!(
            establishment_id = id,
            status = %record.status,
            reviews = plan.review_count,
            "Establishment deleted by administrator"
        );
        Ok(self
            .after_commit(Committed {
                establishment_id: id,
                orphaned,
                delivery: Delivery::Silent,
                outcome: ModerationOutcome::new("Establishment deleted"),
            })
            .await)
    }

    /// Post-commit side effects. Never fails.
    async fn after_commit(&self, committed: Committed) -> ModerationOutcome {
        let id = committed.establishment_id;

        let report = remove_orphans(self.assets.as_ref(), &committed.orphaned).await;
        if !report.failed.is_empty() {
            warn!(
                establishment_id = id,
                failed = report.failed.len(),
                "Some orphaned files were left on disk"
            );
        }

        match committed.delivery {
            Delivery::Silent => {}
            Delivery::NoAddress => {
                info!(establishment_id = id, "No contact email on record; notification skipped");
            }
            Delivery::Send(message) => {
                if let Err(e) = self.notifier.send(&message).await {
                    warn!(establishment_id = id, to = %message.to, error = %e, "Failed to send moderation notification");
                }
            }
        }

        committed.outcome
    }
}
