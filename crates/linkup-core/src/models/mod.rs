pub mod change;
pub mod draft;
pub mod item;
pub mod notification;
pub(crate) mod row;
pub mod user;

pub use change::{ChangeEvent, ChangeKind, RawChange, Table};
pub use draft::{
    MediaAttachment, NewComment, NewLike, PostDraft, PostRecord, ProfileDraft, ProfileUpdate,
};
pub use item::{is_local_id, local_id, Item, ItemKind, ItemPatch, PostDetail};
pub use notification::{NewNotification, Notification, NotificationPayload};
pub use row::parse_timestamp;
pub use user::UserSummary;
