//! Review business logic.
//!
//! Reviews are plain rows attached to an establishment. Each user reviews an
//! establishment at most once, and comments containing blocked words are
//! refused. The moderation core needs reviews for cascading deletes, plus the
//! administrator's ability to inspect and remove individual reviews.

use crate::{
    core::profanity::contains_profanity,
    entities::{Establishment, Review, review},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

const COMMENT_MAX: usize = 2000;

fn validate_comment(comment: &str) -> Result<String> {
    let trimmed = comment.trim();
    if trimmed.chars().count() > COMMENT_MAX {
        return Err(Error::validation(
            "comentario",
            format!("must be at most {COMMENT_MAX} characters"),
        ));
    }
    if contains_profanity(trimmed) {
        return Err(Error::validation("comentario", "contains inappropriate language"));
    }
    Ok(trimmed.to_string())
}

/// Adds a top-level review with a 1-5 rating.
///
/// # Errors
/// Returns an error if:
/// - The rating is outside 1..=5 or not finite
/// - The comment is too long or contains a blocked word
/// - The establishment does not exist
/// - `author_id` already reviewed this establishment
pub async fn add_review(
    db: &DatabaseConnection,
    establishment_id: i64,
    author_id: i64,
    rating: f64,
    comment: Option<&str>,
) -> Result<review::Model> {
    if !rating.is_finite() || !(1.0..=5.0).contains(&rating) {
        return Err(Error::validation("nota", "rating must be between 1 and 5"));
    }
    let comment = comment.map(validate_comment).transpose()?;

    Establishment::find_by_id(establishment_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::establishment_not_found(establishment_id))?;

    let existing = Review::find()
        .filter(review::Column::EstablishmentId.eq(establishment_id))
        .filter(review::Column::AuthorId.eq(author_id))
        .filter(review::Column::ParentId.is_null())
        .count(db)
        .await?;
    if existing > 0 {
        return Err(Error::validation(
            "usuarioId",
            "this user has already reviewed this establishment",
        ));
    }

    review::ActiveModel {
        establishment_id: Set(establishment_id),
        parent_id: Set(None),
        author_id: Set(author_id),
        rating: Set(Some(rating)),
        comment: Set(comment),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Adds a reply to a top-level review. Replies to replies are refused so the
/// thread stays one level deep.
pub async fn add_reply(
    db: &DatabaseConnection,
    parent_id: i64,
    author_id: i64,
    comment: &str,
) -> Result<review::Model> {
    let comment = validate_comment(comment)?;
    if comment.is_empty() {
        return Err(Error::validation("comentario", "reply cannot be empty"));
    }

    let parent = Review::find_by_id(parent_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "Review",
            key: parent_id.to_string(),
        })?;
    if parent.parent_id.is_some() {
        return Err(Error::validation("parentId", "cannot reply to a reply"));
    }

    review::ActiveModel {
        establishment_id: Set(parent.establishment_id),
        parent_id: Set(Some(parent.id)),
        author_id: Set(author_id),
        rating: Set(None),
        comment: Set(Some(comment)),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// All reviews and replies for an establishment, newest first.
pub async fn list_for_establishment(
    db: &DatabaseConnection,
    establishment_id: i64,
) -> Result<Vec<review::Model>> {
    Establishment::find_by_id(establishment_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::establishment_not_found(establishment_id))?;

    Review::find()
        .filter(review::Column::EstablishmentId.eq(establishment_id))
        .order_by_desc(review::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Removes any review on behalf of an administrator, replies included.
pub async fn admin_delete_review(db: &DatabaseConnection, review_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let target = Review::find_by_id(review_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "Review",
            key: review_id.to_string(),
        })?;

    let replies = Review::delete_many()
        .filter(review::Column::ParentId.eq(target.id))
        .exec(&txn)
        .await?;
    target.delete(&txn).await?;

    txn.commit().await?;
    info!(
        review_id,
        replies = replies.rows_affected,
        "Review removed by administrator"
    );
    Ok(())
}
