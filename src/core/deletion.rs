//! Ordered removal of an establishment and everything that hangs off it.
//!
//! The plan is collected first so the list of files to clean up is known
//! before any row disappears, then executed inside the caller's transaction:
//! product images, then review replies, then top-level reviews, then the
//! establishment itself.
//!
//! Uploads are content-addressed, so one file can back several rows. Before a
//! transaction commits, [`unreferenced`] narrows any cleanup list down to the
//! paths that no row points at any more.

use crate::entities::{
    Establishment, ProductImage, Review, establishment, product_image, review,
};
use crate::errors::Result;
use sea_orm::{Condition, ConnectionTrait, QueryOrder, prelude::*};
use std::collections::BTreeSet;
use tracing::debug;

/// Rows and files that go away with one establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    pub establishment_id: i64,
    pub review_count: usize,
    /// Logo, certificate and product image files, in that order
    pub asset_paths: Vec<String>,
}

impl DeletionPlan {
    /// Gathers child rows and owned file paths for `record`.
    pub async fn collect<C>(db: &C, record: &establishment::Model) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        let images = ProductImage::find()
            .filter(product_image::Column::EstablishmentId.eq(record.id))
            .order_by_asc(product_image::Column::Id)
            .all(db)
            .await?;
        let review_count = Review::find()
            .filter(review::Column::EstablishmentId.eq(record.id))
            .count(db)
            .await?;

        let mut asset_paths = record.owned_asset_paths();
        asset_paths.extend(images.iter().map(|image| image.path.clone()));

        Ok(Self {
            establishment_id: record.id,
            review_count: usize::try_from(review_count).unwrap_or(usize::MAX),
            asset_paths,
        })
    }

    /// Deletes the rows in dependency order. Files are left alone; the caller
    /// removes `asset_paths` once the transaction has committed.
    pub async fn execute<C>(&self, db: &C) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let images = ProductImage::delete_many()
            .filter(product_image::Column::EstablishmentId.eq(self.establishment_id))
            .exec(db)
            .await?;
        let replies = Review::delete_many()
            .filter(review::Column::EstablishmentId.eq(self.establishment_id))
            .filter(review::Column::ParentId.is_not_null())
            .exec(db)
            .await?;
        let reviews = Review::delete_many()
            .filter(review::Column::EstablishmentId.eq(self.establishment_id))
            .exec(db)
            .await?;
        establishment::Entity::delete_by_id(self.establishment_id)
            .exec(db)
            .await?;

        debug!(
            establishment_id = self.establishment_id,
            images = images.rows_affected,
            reviews = replies.rows_affected + reviews.rows_affected,
            "Removed establishment rows"
        );
        Ok(())
    }
}

/// Keeps only the paths that no establishment or product image references.
///
/// Call this inside the transaction, after every mutation, so it sees the
/// state that is about to be committed.
pub async fn unreferenced<C>(db: &C, paths: Vec<String>) -> Result<Vec<String>>
where
    C: ConnectionTrait,
{
    if paths.is_empty() {
        return Ok(paths);
    }

    let records = Establishment::find()
        .filter(
            Condition::any()
                .add(establishment::Column::LogoPath.is_in(paths.iter().cloned()))
                .add(establishment::Column::CertificatePath.is_in(paths.iter().cloned())),
        )
        .all(db)
        .await?;
    let images = ProductImage::find()
        .filter(product_image::Column::Path.is_in(paths.iter().cloned()))
        .all(db)
        .await?;

    let mut referenced: BTreeSet<String> = records
        .iter()
        .flat_map(establishment::Model::owned_asset_paths)
        .collect();
    referenced.extend(images.into_iter().map(|image| image.path));

    if !referenced.is_empty() {
        debug!(shared = referenced.len(), "Keeping files still referenced elsewhere");
    }
    Ok(paths
        .into_iter()
        .filter(|path| !referenced.contains(path))
        .collect())
}
