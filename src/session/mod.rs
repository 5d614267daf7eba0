//! Session state: the data model and the snapshot store
//!
//! The whole workflow state lives in a single immutable [`SessionSnapshot`]
//! owned by [`SessionStore`]. Controllers mutate it only through the store's
//! named operations; subscribers observe every committed snapshot.

pub mod store;
pub mod types;

pub use store::{SessionStore, SubscriptionId};
pub use types::*;
