//! Establishment entity - the canonical row for a listed business.
//!
//! Each establishment carries its lifecycle `status`, a visibility flag, the
//! descriptive fields shown on the public listing, relative paths to its logo
//! and certificate files, and (only while a request is pending) the owner's
//! staged change payload.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstablishmentStatus {
    /// Newly submitted, never published
    #[sea_orm(string_value = "PENDING_APPROVAL")]
    PendingApproval,
    /// Published and operating normally
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    /// Owner asked to change published data
    #[sea_orm(string_value = "PENDING_UPDATE")]
    PendingUpdate,
    /// Owner asked to remove the listing
    #[sea_orm(string_value = "PENDING_DELETION")]
    PendingDeletion,
    /// Deactivated by an administrator
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

impl EstablishmentStatus {
    /// Whether an owner request is waiting for an administrator decision.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::PendingApproval | Self::PendingUpdate | Self::PendingDeletion
        )
    }

    /// Whether this status must carry a staged change payload.
    #[must_use]
    pub const fn carries_pending_change(self) -> bool {
        matches!(self, Self::PendingUpdate | Self::PendingDeletion)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Active => "ACTIVE",
            Self::PendingUpdate => "PENDING_UPDATE",
            Self::PendingDeletion => "PENDING_DELETION",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for EstablishmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Establishment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "establishments")]
pub struct Model {
    /// Unique identifier for the establishment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Business-registry number (CNPJ), treated as an opaque unique string
    #[sea_orm(unique)]
    pub registry_number: String,
    /// Public display name
    pub trade_name: String,
    /// Current lifecycle status
    pub status: EstablishmentStatus,
    /// Whether the listing is publicly visible
    pub active: bool,
    pub category: Option<String>,
    /// Economic activity code (CNAE)
    pub activity_code: Option<String>,
    pub contact_phone: Option<String>,
    /// Address used for moderation notifications
    pub contact_email: Option<String>,
    pub address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub differentiator: Option<String>,
    pub service_areas: Option<String>,
    /// Search tags that are never displayed
    pub hidden_tags: Option<String>,
    pub website: Option<String>,
    pub instagram: Option<String>,
    pub responsible_name: Option<String>,
    /// Identity document of the responsible person (CPF)
    pub responsible_document: Option<String>,
    /// Relative path of the logo file
    pub logo_path: Option<String>,
    /// Relative path of the certificate document (CCMEI)
    pub certificate_path: Option<String>,
    /// Staged change payload; present only while an update or deletion is pending
    pub pending_change: Option<Json>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Checks the staging invariant: a payload exists exactly when the status
    /// is `PENDING_UPDATE` or `PENDING_DELETION`.
    #[must_use]
    pub const fn staging_consistent(&self) -> bool {
        self.pending_change.is_some() == self.status.carries_pending_change()
    }

    /// Canonical asset paths owned directly by this row.
    #[must_use]
    pub fn owned_asset_paths(&self) -> Vec<String> {
        self.logo_path
            .iter()
            .chain(self.certificate_path.iter())
            .cloned()
            .collect()
    }
}

/// Defines relationships between Establishment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One establishment has many product images
    #[sea_orm(has_many = "super::product_image::Entity")]
    ProductImages,
    /// One establishment has many reviews
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductImages.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
