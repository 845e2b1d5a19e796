/// Which screen an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Home,
    Profile,
    PostDetail,
    Notifications,
}

/// User-visible failure notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Events the core pushes to the UI. The shell drains them after each
/// handled input and re-reads the affected screen state.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// The ordered item list of a screen changed
    FeedChanged { screen: ScreenKind },
    Alert(Alert),
    /// Unread notification count on the home header
    NotificationBadge { unread: u32 },
    /// A post delete was confirmed by the server (detail screen should close)
    PostDeleted { post_id: String },
    /// A realtime channel gave up reconnecting
    LiveUpdatesLost { table: String },
}

pub type EventSender = std::sync::mpsc::Sender<CoreEvent>;

/// Send without caring whether the UI side is still listening
pub(crate) fn emit(events: &EventSender, event: CoreEvent) {
    if events.send(event).is_err() {
        tracing::debug!("UI event receiver dropped");
    }
}
