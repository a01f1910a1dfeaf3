//! Establishment lifecycle rules.
//!
//! Every status change in the system goes through [`plan_transition`], which
//! maps the current status and the requested action to what the caller must
//! do. Anything not in the table is an `InvalidStateTransition` and the caller
//! must not touch the record.

use crate::entities::EstablishmentStatus;
use crate::errors::{Error, Result};
use std::fmt;

/// Something an owner or administrator asks to happen to an establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Administrator accepts the pending request
    Approve,
    /// Administrator refuses the pending request
    Reject,
    /// Administrator edits the pending data and accepts it in one step
    EditAndApprove,
    /// Administrator edits a settled record directly
    AdminEdit,
    /// Owner proposes new data for a published listing
    RequestUpdate,
    /// Owner asks for a published listing to be removed
    RequestDeletion,
}

impl Action {
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::EditAndApprove => "edit and approve",
            Self::AdminEdit => "directly edit",
            Self::RequestUpdate => "request an update for",
            Self::RequestDeletion => "request deletion of",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The work an allowed action implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First-time submission goes live: status ACTIVE, visible
    PublishListing,
    /// Staged update is merged into the record, which returns to ACTIVE
    MergeUpdate,
    /// Record, child rows and owned files are removed
    RemoveListing,
    /// Staged payload (and any files it introduced) is thrown away; back to ACTIVE
    DiscardRequest,
    /// Owner payload is stored and the record moves to the given pending status
    StageRequest(EstablishmentStatus),
    /// Fields and assets are edited in place without a pending request
    EditInPlace,
}

/// Resolves `action` against `status`.
pub fn plan_transition(status: EstablishmentStatus, action: Action) -> Result<Transition> {
    use EstablishmentStatus as S;

    let transition = match (status, action) {
        (S::PendingApproval, Action::Approve | Action::EditAndApprove) => {
            Transition::PublishListing
        }
        (S::PendingUpdate, Action::Approve | Action::EditAndApprove) => Transition::MergeUpdate,
        (S::PendingApproval, Action::Reject) | (S::PendingDeletion, Action::Approve) => {
            Transition::RemoveListing
        }
        (S::PendingUpdate | S::PendingDeletion, Action::Reject) => Transition::DiscardRequest,
        (S::Active, Action::RequestUpdate) => Transition::StageRequest(S::PendingUpdate),
        (S::Active, Action::RequestDeletion) => Transition::StageRequest(S::PendingDeletion),
        (S::Active | S::Rejected, Action::AdminEdit) => Transition::EditInPlace,
        _ => {
            return Err(Error::InvalidStateTransition {
                status: status.to_string(),
                action: action.to_string(),
            });
        }
    };
    Ok(transition)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_moderation_table() {
        use EstablishmentStatus as S;

        assert_eq!(
            plan_transition(S::PendingApproval, Action::Approve).unwrap(),
            Transition::PublishListing
        );
        assert_eq!(
            plan_transition(S::PendingApproval, Action::Reject).unwrap(),
            Transition::RemoveListing
        );
        assert_eq!(
            plan_transition(S::PendingUpdate, Action::Approve).unwrap(),
            Transition::MergeUpdate
        );
        assert_eq!(
            plan_transition(S::PendingUpdate, Action::Reject).unwrap(),
            Transition::DiscardRequest
        );
        assert_eq!(
            plan_transition(S::PendingDeletion, Action::Approve).unwrap(),
            Transition::RemoveListing
        );
        assert_eq!(
            plan_transition(S::PendingDeletion, Action::Reject).unwrap(),
            Transition::DiscardRequest
        );
        assert_eq!(
            plan_transition(S::PendingUpdate, Action::EditAndApprove).unwrap(),
            Transition::MergeUpdate
        );
    }

    #[test]
    fn test_owner_requests_only_from_active() {
        for status in EstablishmentStatus::iter() {
            let update = plan_transition(status, Action::RequestUpdate);
            let deletion = plan_transition(status, Action::RequestDeletion);
            if status == EstablishmentStatus::Active {
                assert_eq!(
                    update.unwrap(),
                    Transition::StageRequest(EstablishmentStatus::PendingUpdate)
                );
                assert_eq!(
                    deletion.unwrap(),
                    Transition::StageRequest(EstablishmentStatus::PendingDeletion)
                );
            } else {
                assert!(update.is_err());
                assert!(deletion.is_err());
            }
        }
    }

    #[test]
    fn test_edit_and_approve_refuses_deletion_requests() {
        let err = plan_transition(EstablishmentStatus::PendingDeletion, Action::EditAndApprove)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(
            err.to_string(),
            "Cannot edit and approve an establishment with status PENDING_DELETION"
        );
    }

    #[test]
    fn test_settled_records_cannot_be_moderated() {
        for status in [EstablishmentStatus::Active, EstablishmentStatus::Rejected] {
            for action in [Action::Approve, Action::Reject, Action::EditAndApprove] {
                assert!(plan_transition(status, action).is_err());
            }
        }
    }

    #[test]
    fn test_admin_edit_requires_settled_record() {
        for status in EstablishmentStatus::iter() {
            let result = plan_transition(status, Action::AdminEdit);
            assert_eq!(result.is_ok(), !status.is_pending());
        }
    }
}
