//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! models without hand-written SQL.

use crate::entities::{Establishment, ProductImage, Review};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

/// Default database location used when neither the config file nor the
/// environment provides one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/listings.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all tables from the entity definitions.
///
/// Parents are created before children so the foreign keys generated from the
/// entity relations resolve: establishments, then product images, then reviews.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let establishment_table = schema
        .create_table_from_entity(Establishment)
        .if_not_exists()
        .to_owned();
    let product_image_table = schema
        .create_table_from_entity(ProductImage)
        .if_not_exists()
        .to_owned();
    let review_table = schema
        .create_table_from_entity(Review)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&establishment_table)).await?;
    db.execute(builder.build(&product_image_table)).await?;
    db.execute(builder.build(&review_table)).await?;

    info!("Database tables ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        establishment::Model as EstablishmentModel, product_image::Model as ProductImageModel,
        review::Model as ReviewModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<EstablishmentModel> = Establishment::find().limit(1).all(&db).await?;
        let _: Vec<ProductImageModel> = ProductImage::find().limit(1).all(&db).await?;
        let _: Vec<ReviewModel> = Review::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
