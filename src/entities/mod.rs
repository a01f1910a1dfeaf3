//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod establishment;
pub mod product_image;
pub mod review;

// Re-export specific types to avoid conflicts
pub use establishment::{
    Column as EstablishmentColumn, Entity as Establishment, EstablishmentStatus,
    Model as EstablishmentModel,
};
pub use product_image::{
    Column as ProductImageColumn, Entity as ProductImage, Model as ProductImageModel,
};
pub use review::{Column as ReviewColumn, Entity as Review, Model as ReviewModel};
