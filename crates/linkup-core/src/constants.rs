//! Application-wide constants
//!
//! Table names, storage folders and the user-facing strings shared by the
//! screens and the mutation coordinator.

/// How many more posts each end-of-list trigger asks for
pub const PAGE_INCREMENT: usize = 4;

/// Storage bucket holding every uploaded file
pub const STORAGE_BUCKET: &str = "uploads";

/// Prefix of ids synthesized locally before the server assigns one
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Env var enabling the debug file log
pub const LOG_FILE_ENV: &str = "LINKUP_LOG_FILE";

// Backend tables
pub mod tables {
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";
    pub const POST_LIKES: &str = "post_likes";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const USERS: &str = "users";
}

// Storage folders
pub mod folders {
    pub const POST_IMAGES: &str = "postImages";
    pub const POST_VIDEOS: &str = "postVideos";
    pub const PROFILES: &str = "profiles";
}

/// Title stored on the notification sent to a post author
pub const COMMENT_NOTIFICATION_TITLE: &str = "commented on your post";

// Alert titles and messages
pub mod alerts {
    pub const POST_TITLE: &str = "Post";
    pub const COMMENT_TITLE: &str = "Comment";
    pub const PROFILE_TITLE: &str = "Profile";
    pub const ERROR_TITLE: &str = "Error";
    pub const FEED_TITLE: &str = "Feed";

    pub const EMPTY_POST: &str = "Post a file or add a comment";
    pub const EMPTY_COMMENT: &str = "Write a comment first";
    pub const INCOMPLETE_PROFILE: &str = "Please fill all fields";
    pub const CANNOT_DELETE_COMMENT: &str = "You can only delete your own comments";
    pub const CANNOT_DELETE_POST: &str = "You can only delete your own posts";
    pub const LIVE_UPDATES_LOST: &str = "Live updates are unavailable, pull to refresh";
}
