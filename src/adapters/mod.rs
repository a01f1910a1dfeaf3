//! Narrow interfaces to the collaborators the core does not own: file
//! storage and message delivery.

/// Asset storage and post-commit orphan cleanup
pub mod assets;
/// Notification delivery
pub mod mailer;

pub use assets::{AssetStore, CleanupReport, LocalAssetStore, Removal, remove_orphans};
pub use mailer::{LogNotifier, Notifier, OutboundMessage};
