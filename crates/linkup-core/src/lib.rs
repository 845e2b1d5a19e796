//! Client core for the Linkup social app.
//!
//! Holds everything between the managed backend and the views: decoding rows,
//! normalizing realtime changes, the per-screen feed stores, pagination and
//! optimistic mutations. Rendering lives in the shell that embeds this crate.

pub mod backend;
pub mod compose;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod normalizer;
pub mod optimistic;
pub mod screen;
pub mod store;
pub mod tracing_setup;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use events::{Alert, CoreEvent, ScreenKind};
pub use models::{ChangeEvent, Item, ItemKind, Notification, RawChange, Table, UserSummary};
pub use screen::{FeedScope, FeedScreen, NotificationsScreen, PostDetailScreen};
pub use store::{FeedStore, PaginationCursor};
