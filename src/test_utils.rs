//! Shared test utilities for the moderation core.
//!
//! This module provides helpers for setting up test databases, creating
//! establishments in a given lifecycle state, and spy implementations of the
//! asset store and notifier.
#![allow(clippy::unwrap_used)]

use crate::{
    adapters::{AssetStore, Notifier, OutboundMessage, Removal},
    core::moderation::ModerationService,
    entities::{
        Establishment, EstablishmentStatus, ProductImage, establishment, product_image,
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use sea_orm::{Condition, DatabaseConnection, Set, prelude::*};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

fn base_model(registry_number: &str, status: EstablishmentStatus) -> establishment::ActiveModel {
    let now = chrono::Utc::now();
    establishment::ActiveModel {
        registry_number: Set(registry_number.to_string()),
        trade_name: Set(format!("Business {registry_number}")),
        status: Set(status),
        active: Set(matches!(
            status,
            EstablishmentStatus::Active
                | EstablishmentStatus::PendingUpdate
                | EstablishmentStatus::PendingDeletion
        )),
        contact_email: Set(Some("owner@example.org".to_string())),
        description: Set(Some("Old text".to_string())),
        website: Set(Some("https://keep.example".to_string())),
        responsible_name: Set(Some("Ana".to_string())),
        pending_change: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Creates an establishment with the given status and no staged payload.
///
/// # Defaults
/// * `trade_name`: `"Business <registry_number>"`
/// * `contact_email`: `"owner@example.org"`
/// * `description`: `"Old text"`
/// * `website`: `"https://keep.example"`
pub async fn create_establishment(
    db: &DatabaseConnection,
    registry_number: &str,
    status: EstablishmentStatus,
) -> Result<establishment::Model> {
    base_model(registry_number, status)
        .insert(db)
        .await
        .map_err(Into::into)
}

/// Same as [`create_establishment`] but with a fixed primary key.
pub async fn create_establishment_with_id(
    db: &DatabaseConnection,
    id: i64,
    status: EstablishmentStatus,
) -> Result<establishment::Model> {
    let mut model = base_model(&format!("{id:02}.000.000/0001-{id:02}"), status);
    model.id = Set(id);
    model.insert(db).await.map_err(Into::into)
}

/// Creates a published establishment.
pub async fn create_active_establishment(
    db: &DatabaseConnection,
    registry_number: &str,
) -> Result<establishment::Model> {
    create_establishment(db, registry_number, EstablishmentStatus::Active).await
}

/// Writes a raw staged payload and pending status, bypassing the owner
/// request path. Use this for malformed or legacy-shaped payloads.
pub async fn stage_raw_payload(
    db: &DatabaseConnection,
    record: establishment::Model,
    status: EstablishmentStatus,
    payload: Value,
) -> Result<establishment::Model> {
    let mut model: establishment::ActiveModel = record.into();
    model.status = Set(status);
    model.pending_change = Set(Some(payload));
    model.update(db).await.map_err(Into::into)
}

/// Sets the canonical logo and certificate paths.
pub async fn set_asset_paths(
    db: &DatabaseConnection,
    record: establishment::Model,
    logo: Option<&str>,
    certificate: Option<&str>,
) -> Result<establishment::Model> {
    let mut model: establishment::ActiveModel = record.into();
    model.logo_path = Set(logo.map(str::to_string));
    model.certificate_path = Set(certificate.map(str::to_string));
    model.update(db).await.map_err(Into::into)
}

/// Sets or clears the contact address used for notifications.
pub async fn set_contact_email(
    db: &DatabaseConnection,
    record: establishment::Model,
    email: Option<&str>,
) -> Result<establishment::Model> {
    let mut model: establishment::ActiveModel = record.into();
    model.contact_email = Set(email.map(str::to_string));
    model.update(db).await.map_err(Into::into)
}

/// Stores product image rows for an establishment, in order.
pub async fn add_test_images(
    db: &DatabaseConnection,
    establishment_id: i64,
    paths: &[&str],
) -> Result<Vec<product_image::Model>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let image = product_image::ActiveModel {
            establishment_id: Set(establishment_id),
            path: Set((*path).to_string()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        images.push(image);
    }
    Ok(images)
}

/// Paths of the product images currently stored for an establishment.
pub async fn image_paths(db: &DatabaseConnection, establishment_id: i64) -> Result<Vec<String>> {
    Ok(crate::core::establishment::images_for(db, establishment_id)
        .await?
        .into_iter()
        .map(|image| image.path)
        .collect())
}

/// In-memory [`AssetStore`] that records every removal attempt.
///
/// When built with [`RecordingAssetStore::watching`], every removal also
/// checks whether the database still references the path at that moment.
#[derive(Default)]
pub struct RecordingAssetStore {
    existing: Mutex<BTreeSet<String>>,
    failing: BTreeSet<String>,
    attempts: Mutex<Vec<String>>,
    referenced_at_removal: Mutex<Vec<String>>,
    db: Option<Arc<DatabaseConnection>>,
}

impl RecordingAssetStore {
    pub fn with_existing(paths: &[&str]) -> Self {
        Self {
            existing: Mutex::new(paths.iter().map(|p| (*p).to_string()).collect()),
            ..Self::default()
        }
    }

    /// Makes removal of `path` fail with an I/O error.
    #[must_use]
    pub fn failing_on(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// Checks each removed path against `db`.
    #[must_use]
    pub fn watching(mut self, db: Arc<DatabaseConnection>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn removal_attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Paths that were still referenced by a committed row when removed.
    pub fn referenced_at_removal(&self) -> Vec<String> {
        self.referenced_at_removal.lock().unwrap().clone()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.existing.lock().unwrap().contains(path)
    }

    async fn is_referenced(db: &DatabaseConnection, path: &str) -> Result<bool> {
        let records = Establishment::find()
            .filter(
                Condition::any()
                    .add(establishment::Column::LogoPath.eq(path))
                    .add(establishment::Column::CertificatePath.eq(path)),
            )
            .count(db)
            .await?;
        let images = ProductImage::find()
            .filter(product_image::Column::Path.eq(path))
            .count(db)
            .await?;
        Ok(records + images > 0)
    }
}

#[async_trait]
impl AssetStore for RecordingAssetStore {
    async fn store(&self, _bytes: &[u8], extension: &str) -> Result<String> {
        let mut existing = self.existing.lock().unwrap();
        let path = format!("uploads/test-{}.{extension}", existing.len());
        existing.insert(path.clone());
        Ok(path)
    }

    async fn remove(&self, path: &str) -> Result<Removal> {
        self.attempts.lock().unwrap().push(path.to_string());

        if let Some(db) = &self.db {
            if Self::is_referenced(db, path).await? {
                self.referenced_at_removal
                    .lock()
                    .unwrap()
                    .push(path.to_string());
            }
        }

        if self.failing.contains(path) {
            return Err(Error::AssetCleanup {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        if self.existing.lock().unwrap().remove(path) {
            Ok(Removal::Deleted)
        } else {
            Ok(Removal::AlreadyAbsent)
        }
    }
}

/// [`Notifier`] that keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// [`Notifier`] whose relay is always down.
#[derive(Default)]
pub struct FailingNotifier {
    attempts: Mutex<usize>,
}

impl FailingNotifier {
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _message: &OutboundMessage) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        Err(Error::Notification {
            message: "relay unavailable".to_string(),
        })
    }
}

/// Builds a service over `db` with the given spies.
pub fn test_service(
    db: Arc<DatabaseConnection>,
    assets: &Arc<RecordingAssetStore>,
    notifier: Arc<dyn Notifier>,
) -> ModerationService {
    ModerationService::new(db, Arc::clone(assets) as Arc<dyn AssetStore>, notifier, "Listings Team")
}
