//! Core business logic - framework-agnostic establishment lifecycle,
//! moderation and review operations.

/// Ordered cascade removal of an establishment
pub mod deletion;
/// Owner submissions, owner requests and lookups
pub mod establishment;
/// Lifecycle transition table
pub mod lifecycle;
/// Pure merge of a staged payload and administrator overrides
pub mod merge;
/// Administrator moderation actions
pub mod moderation;
/// Owner notification templates
pub mod notice;
/// Typed staged change payload
pub mod pending_change;
/// Offensive-language check for comments
pub mod profanity;
/// Reviews and replies
pub mod review;

pub use lifecycle::{Action, Transition, plan_transition};
pub use merge::{AdminEdit, AdminOverrides, SlotDirective};
pub use moderation::{ModerationOutcome, ModerationService};
pub use pending_change::{EditableField, PendingChange};
