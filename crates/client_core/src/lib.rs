//! In-page coordination for collaborative event editing: the edit-session
//! controller, the notification channel it publishes through, and the small
//! form helpers around them.

pub mod channel;
pub mod config;
pub mod edit_session;
pub mod presence;
pub mod project_api;
pub mod surface;
pub mod validation;

pub use channel::{ChannelEvent, ChannelSettings, EditingStatusPublisher, NotificationChannel};
pub use edit_session::{
    reveal_delay, EditSessionController, EditTimings, EditorError, OpenOutcome, SubmitOutcome,
    EDITING_BROADCAST_PERIOD, FORM_TRANSITION_DELAY,
};
pub use presence::{PeerPresence, PresenceChange};
pub use project_api::{EditEventResponse, PageActions, ProjectApi};
pub use surface::{EditForm, FormSurface, FormVisibility};
