use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use shared::domain::{EventFields, EventId, SprintId};
use tracing::{debug, warn};

use crate::surface::FormSurface;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Form-encoded body of `POST /edit-event/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditEventForm {
    pub event_name: String,
    pub event_description: String,
    pub event_start_date: String,
    pub event_start_time: String,
    pub event_end_date: String,
    pub event_end_time: String,
}

impl From<&EventFields> for EditEventForm {
    fn from(fields: &EventFields) -> Self {
        Self {
            event_name: fields.name.clone(),
            event_description: fields.description.clone(),
            event_start_date: fields.start.format(DATE_FORMAT).to_string(),
            event_start_time: fields.start.format(TIME_FORMAT).to_string(),
            event_end_date: fields.end.format(DATE_FORMAT).to_string(),
            event_end_time: fields.end.format(TIME_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditEventResponse {
    Accepted,
    Rejected { errors: Vec<String> },
}

/// Splits a rejection body into one message per line. Blank lines carry no
/// message and are skipped; other lines are kept as sent, minus a trailing CR.
pub fn parse_error_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone)]
pub struct ProjectApi {
    http: Client,
    endpoint: String,
}

impl ProjectApi {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            http: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn edit_event(
        &self,
        event_id: EventId,
        fields: &EventFields,
    ) -> Result<EditEventResponse> {
        let url = format!("{}/edit-event/{}", self.endpoint, event_id);
        let res = self
            .http
            .post(&url)
            .form(&EditEventForm::from(fields))
            .send()
            .await
            .with_context(|| format!("failed to send event update: {url}"))?;

        if res.status() == StatusCode::OK {
            return Ok(EditEventResponse::Accepted);
        }

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("failed to read rejection body ({status}): {url}"))?;
        Ok(EditEventResponse::Rejected {
            errors: parse_error_lines(&body),
        })
    }

    pub async fn delete_sprint(&self, sprint_id: SprintId) -> Result<StatusCode> {
        self.delete(format!("{}/delete-sprint/{}", self.endpoint, sprint_id))
            .await
    }

    pub async fn delete_event(&self, event_id: EventId) -> Result<StatusCode> {
        self.delete(format!("{}/delete-event/{}", self.endpoint, event_id))
            .await
    }

    async fn delete(&self, url: String) -> Result<StatusCode> {
        let res = self
            .http
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("failed to send delete request: {url}"))?;
        Ok(res.status())
    }
}

/// Page-level delete buttons. Whatever the server answers, the page view is
/// reloaded afterwards; failures are only logged.
pub struct PageActions {
    api: ProjectApi,
    surface: Arc<dyn FormSurface>,
}

impl PageActions {
    pub fn new(api: ProjectApi, surface: Arc<dyn FormSurface>) -> Self {
        Self { api, surface }
    }

    pub async fn delete_sprint(&self, sprint_id: SprintId) {
        match self.api.delete_sprint(sprint_id).await {
            Ok(status) => debug!(sprint_id = sprint_id.0, %status, "page: sprint delete answered"),
            Err(err) => warn!(sprint_id = sprint_id.0, %err, "page: sprint delete failed"),
        }
        self.surface.refresh();
    }

    pub async fn delete_event(&self, event_id: EventId) {
        match self.api.delete_event(event_id).await {
            Ok(status) => debug!(event_id = event_id.0, %status, "page: event delete answered"),
            Err(err) => warn!(event_id = event_id.0, %err, "page: event delete failed"),
        }
        self.surface.refresh();
    }
}

#[cfg(test)]
#[path = "tests/project_api_tests.rs"]
mod tests;
