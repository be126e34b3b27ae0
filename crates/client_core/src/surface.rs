//! The page-side collaborator of the edit-session controller.
//!
//! Rendering, animation and scrolling belong to the host page. The controller
//! only tells the surface what should happen and keeps its own model of which
//! forms exist and which one is expanded.

use std::time::Duration;

use shared::domain::{EventFields, EventId, FormBoxId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormVisibility {
    Collapsed,
    Expanded,
}

/// Inline edit form attached to one form box.
///
/// Created the first time its box is opened and kept for the rest of the page
/// lifetime. Field values are captured when the form is created; reopening
/// the same box does not prefill again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    event_id: EventId,
    fields: EventFields,
    visibility: FormVisibility,
}

impl EditForm {
    pub fn new(event_id: EventId, fields: EventFields) -> Self {
        Self {
            event_id,
            fields,
            visibility: FormVisibility::Collapsed,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn fields(&self) -> &EventFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut EventFields {
        &mut self.fields
    }

    pub fn visibility(&self) -> FormVisibility {
        self.visibility
    }

    pub fn is_expanded(&self) -> bool {
        self.visibility == FormVisibility::Expanded
    }

    pub(crate) fn set_visibility(&mut self, visibility: FormVisibility) {
        self.visibility = visibility;
    }
}

pub trait FormSurface: Send + Sync {
    /// Materialize a freshly created form inside its box.
    fn mount(&self, form_box_id: &FormBoxId, form: &EditForm);
    /// Start the collapse animation. Returns immediately.
    fn collapse(&self, form_box_id: &FormBoxId);
    /// Expand the form once `delay` has elapsed and scroll it into view.
    fn reveal(&self, form_box_id: &FormBoxId, delay: Duration);
    fn clear_errors(&self, form_box_id: &FormBoxId);
    fn show_errors(&self, form_box_id: &FormBoxId, errors: &[String]);
    /// Reload the page's data view.
    fn refresh(&self);
}

