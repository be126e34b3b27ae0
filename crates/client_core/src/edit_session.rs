//! Edit-session controller: which event this page is editing, which inline
//! form is open for it, and the periodic "still editing" broadcast.
//!
//! At most one session is live. Opening a different event ends the previous
//! session (form collapsed, broadcast cancelled, `stopped` published) before
//! the new form is revealed. All methods run on the page's event loop; the
//! broadcast runs as a tokio task owned by the session.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use shared::{
    domain::{EventFields, EventId, FormBoxId},
    protocol::EditingStatus,
};
use thiserror::Error;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    channel::EditingStatusPublisher,
    project_api::{EditEventResponse, ProjectApi},
    surface::{EditForm, FormSurface, FormVisibility},
};

pub const EDITING_BROADCAST_PERIOD: Duration = Duration::from_millis(1800);
pub const FORM_TRANSITION_DELAY: Duration = Duration::from_millis(300);

const UNREACHABLE_SERVER_MESSAGE: &str = "Could not reach the server, please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTimings {
    pub broadcast_period: Duration,
    pub transition_delay: Duration,
}

impl Default for EditTimings {
    fn default() -> Self {
        Self {
            broadcast_period: EDITING_BROADCAST_PERIOD,
            transition_delay: FORM_TRANSITION_DELAY,
        }
    }
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no edit form has been opened in box {0}")]
    UnknownForm(FormBoxId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened { reveal_delay: Duration },
    ToggledClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected { errors: Vec<String> },
}

/// How long to hold the reveal of a new form so that collapse animations of
/// other forms can finish first.
pub fn reveal_delay(
    previous_form_closed: bool,
    others_collapsed: bool,
    transition: Duration,
) -> Duration {
    let previous = if previous_form_closed {
        transition
    } else {
        Duration::ZERO
    };
    let others = if others_collapsed {
        transition
    } else {
        Duration::ZERO
    };
    previous.max(others)
}

/// Repeating `editing` publisher. Aborted on drop, so replacing the handle
/// always cancels the previous broadcast.
pub struct BroadcastTask {
    event_id: EventId,
    handle: JoinHandle<()>,
}

impl BroadcastTask {
    fn spawn(
        publisher: Arc<dyn EditingStatusPublisher>,
        event_id: EventId,
        period: Duration,
    ) -> Self {
        let first_resend = Instant::now() + period;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(first_resend, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                publisher.send_editing_status(event_id, EditingStatus::Editing);
            }
        });
        Self { event_id, handle }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }
}

impl Drop for BroadcastTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct ActiveSession {
    event_id: EventId,
    form_box_id: FormBoxId,
    broadcast: BroadcastTask,
}

pub struct EditSessionController {
    publisher: Arc<dyn EditingStatusPublisher>,
    surface: Arc<dyn FormSurface>,
    api: ProjectApi,
    timings: EditTimings,
    forms: HashMap<FormBoxId, EditForm>,
    session: Option<ActiveSession>,
}

impl EditSessionController {
    pub fn new(
        publisher: Arc<dyn EditingStatusPublisher>,
        surface: Arc<dyn FormSurface>,
        api: ProjectApi,
        timings: EditTimings,
    ) -> Self {
        Self {
            publisher,
            surface,
            api,
            timings,
            forms: HashMap::new(),
            session: None,
        }
    }

    pub fn active_event(&self) -> Option<EventId> {
        self.session.as_ref().map(|session| session.event_id)
    }

    pub fn active_form_box(&self) -> Option<&FormBoxId> {
        self.session.as_ref().map(|session| &session.form_box_id)
    }

    pub fn is_broadcasting(&self) -> bool {
        self.session.is_some()
    }

    pub fn broadcasting_event(&self) -> Option<EventId> {
        self.session
            .as_ref()
            .map(|session| session.broadcast.event_id())
    }

    pub fn form(&self, form_box_id: &FormBoxId) -> Option<&EditForm> {
        self.forms.get(form_box_id)
    }

    pub fn form_mut(&mut self, form_box_id: &FormBoxId) -> Option<&mut EditForm> {
        self.forms.get_mut(form_box_id)
    }

    pub fn expanded_forms(&self) -> Vec<&FormBoxId> {
        let mut expanded: Vec<_> = self
            .forms
            .iter()
            .filter(|(_, form)| form.is_expanded())
            .map(|(form_box_id, _)| form_box_id)
            .collect();
        expanded.sort();
        expanded
    }

    /// Must be called from within a tokio runtime: the editing broadcast is
    /// spawned onto it.
    pub fn open_editor(
        &mut self,
        event_id: EventId,
        form_box_id: FormBoxId,
        fields: EventFields,
    ) -> OpenOutcome {
        if self
            .forms
            .get(&form_box_id)
            .is_some_and(EditForm::is_expanded)
        {
            debug!(event_id = event_id.0, form_box = %form_box_id, "editing: toggling open form closed");
            self.close_editor(&form_box_id);
            return OpenOutcome::ToggledClosed;
        }

        // Ending the previous session cancels its broadcast before anything
        // new is published.
        let mut previous_form_closed = false;
        if let Some(previous) = self.session.take() {
            let ActiveSession {
                event_id: previous_event,
                form_box_id: previous_box,
                broadcast,
            } = previous;
            drop(broadcast);
            if previous_box != form_box_id && self.collapse_form(&previous_box) {
                previous_form_closed = true;
            }
            // Same event handed to another box: no stop/start flicker.
            if previous_event != event_id {
                self.publisher
                    .send_editing_status(previous_event, EditingStatus::Stopped);
            }
        }

        let others_collapsed = self.collapse_all_open_forms();
        let delay = reveal_delay(
            previous_form_closed,
            others_collapsed,
            self.timings.transition_delay,
        );

        if !self.forms.contains_key(&form_box_id) {
            let form = EditForm::new(event_id, fields);
            self.surface.mount(&form_box_id, &form);
            self.forms.insert(form_box_id.clone(), form);
        }

        self.publisher
            .send_editing_status(event_id, EditingStatus::Editing);
        let broadcast = BroadcastTask::spawn(
            Arc::clone(&self.publisher),
            event_id,
            self.timings.broadcast_period,
        );
        self.session = Some(ActiveSession {
            event_id,
            form_box_id: form_box_id.clone(),
            broadcast,
        });

        if let Some(form) = self.forms.get_mut(&form_box_id) {
            form.set_visibility(FormVisibility::Expanded);
        }
        self.surface.reveal(&form_box_id, delay);

        info!(
            event_id = event_id.0,
            form_box = %form_box_id,
            ?delay,
            "editing: session opened"
        );
        OpenOutcome::Opened {
            reveal_delay: delay,
        }
    }

    pub fn close_editor(&mut self, form_box_id: &FormBoxId) {
        self.collapse_form(form_box_id);

        if let Some(session) = self.session.take() {
            let event_id = session.event_id;
            drop(session);
            self.publisher
                .send_editing_status(event_id, EditingStatus::Stopped);
            info!(
                event_id = event_id.0,
                form_box = %form_box_id,
                "editing: session closed"
            );
        }
    }

    /// Collapses every expanded form. Returns whether any was open.
    pub fn collapse_all_open_forms(&mut self) -> bool {
        let mut expanded: Vec<FormBoxId> = self
            .forms
            .iter()
            .filter(|(_, form)| form.is_expanded())
            .map(|(form_box_id, _)| form_box_id.clone())
            .collect();
        expanded.sort();

        for form_box_id in &expanded {
            self.collapse_form(form_box_id);
        }
        !expanded.is_empty()
    }

    /// Clears the form's errors and captures what to send. The returned
    /// future owns everything it needs, so the host can spawn it and keep
    /// handling opens and closes while the request is in flight. Rejections
    /// are rendered inline and leave any session (form and broadcast)
    /// untouched.
    pub fn submit_edit_request(
        &self,
        form_box_id: &FormBoxId,
    ) -> Result<impl Future<Output = SubmitOutcome> + Send + 'static, EditorError> {
        let form = self
            .forms
            .get(form_box_id)
            .ok_or_else(|| EditorError::UnknownForm(form_box_id.clone()))?;
        let event_id = form.event_id();
        let fields = form.fields().clone();
        let form_box_id = form_box_id.clone();
        let api = self.api.clone();
        let surface = Arc::clone(&self.surface);

        surface.clear_errors(&form_box_id);

        Ok(async move {
            let errors = match api.edit_event(event_id, &fields).await {
                Ok(EditEventResponse::Accepted) => {
                    info!(event_id = event_id.0, "editing: update accepted");
                    surface.refresh();
                    return SubmitOutcome::Accepted;
                }
                Ok(EditEventResponse::Rejected { errors }) => {
                    info!(
                        event_id = event_id.0,
                        error_count = errors.len(),
                        "editing: update rejected"
                    );
                    errors
                }
                Err(err) => {
                    warn!(event_id = event_id.0, %err, "editing: update request failed");
                    vec![UNREACHABLE_SERVER_MESSAGE.to_string()]
                }
            };

            surface.show_errors(&form_box_id, &errors);
            SubmitOutcome::Rejected { errors }
        })
    }

    fn collapse_form(&mut self, form_box_id: &FormBoxId) -> bool {
        match self.forms.get_mut(form_box_id) {
            Some(form) if form.is_expanded() => {
                form.set_visibility(FormVisibility::Collapsed);
                self.surface.collapse(form_box_id);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "tests/edit_session_tests.rs"]
mod tests;
