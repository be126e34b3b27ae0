//! Form helpers shared by the sprint and event forms.

use shared::domain::EventFields;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    TextArea,
    Date,
    DateTime,
    Number,
    Checkbox,
    File,
}

impl InputKind {
    fn accepts_free_text(self) -> bool {
        matches!(self, Self::Text | Self::TextArea)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor {
    pub id: String,
    pub kind: InputKind,
}

impl InputDescriptor {
    pub fn new(id: impl Into<String>, kind: InputKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CounterBindError {
    #[error("character counter needs a text input or textarea, but '{id}' is a {kind:?} input")]
    NotTextInput { id: String, kind: InputKind },
    #[error("character counter for '{id}' needs a positive limit")]
    ZeroLimit { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterReading {
    pub used: usize,
    pub max: usize,
}

impl CounterReading {
    pub fn remaining(&self) -> usize {
        self.max.saturating_sub(self.used)
    }

    pub fn is_over_limit(&self) -> bool {
        self.used > self.max
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.used, self.max)
    }
}

/// Live "used/max" counter for a free-text input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterCounter {
    input_id: String,
    max_chars: usize,
}

impl CharacterCounter {
    /// Binding to anything but a text input or textarea is a programming
    /// error and is rejected here rather than on first keystroke.
    pub fn bind(input: &InputDescriptor, max_chars: usize) -> Result<Self, CounterBindError> {
        if !input.kind.accepts_free_text() {
            return Err(CounterBindError::NotTextInput {
                id: input.id.clone(),
                kind: input.kind,
            });
        }
        if max_chars == 0 {
            return Err(CounterBindError::ZeroLimit {
                id: input.id.clone(),
            });
        }
        Ok(Self {
            input_id: input.id.clone(),
            max_chars,
        })
    }

    pub fn input_id(&self) -> &str {
        &self.input_id
    }

    pub fn reading(&self, value: &str) -> CounterReading {
        CounterReading {
            used: value.chars().count(),
            max: self.max_chars,
        }
    }
}

/// Client-side checks mirroring what the server rejects. Messages use the
/// same one-line-per-error shape as a rejected update.
pub fn validate_event_fields(
    fields: &EventFields,
    max_name_chars: usize,
    max_description_chars: usize,
) -> Vec<String> {
    let mut errors = Vec::new();

    let name_len = fields.name.trim().chars().count();
    if name_len == 0 {
        errors.push("Event name is required".to_string());
    } else if name_len > max_name_chars {
        errors.push(format!(
            "Event name must be at most {max_name_chars} characters"
        ));
    }

    if fields.description.chars().count() > max_description_chars {
        errors.push(format!(
            "Event description must be at most {max_description_chars} characters"
        ));
    }

    if fields.end < fields.start {
        errors.push("Event end must not be before its start".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn fields(name: &str, start_hour: u32, end_hour: u32) -> EventFields {
        let day = NaiveDate::from_ymd_opt(2024, 3, 14).expect("date");
        EventFields {
            name: name.to_string(),
            description: String::new(),
            start: day.and_hms_opt(start_hour, 0, 0).expect("start"),
            end: day.and_hms_opt(end_hour, 0, 0).expect("end"),
        }
    }

    #[test]
    fn counter_refuses_non_text_inputs_at_bind_time() {
        let input = InputDescriptor::new("sprintStartDate", InputKind::Date);
        let err = CharacterCounter::bind(&input, 50).expect_err("date input");
        assert_eq!(
            err,
            CounterBindError::NotTextInput {
                id: "sprintStartDate".into(),
                kind: InputKind::Date,
            }
        );
        assert!(err.to_string().contains("sprintStartDate"));
    }

    #[test]
    fn counter_counts_characters_not_bytes() {
        let input = InputDescriptor::new("eventName", InputKind::Text);
        let counter = CharacterCounter::bind(&input, 5).expect("bind");

        let reading = counter.reading("héllo");
        assert_eq!(reading.used, 5);
        assert_eq!(reading.remaining(), 0);
        assert!(!reading.is_over_limit());
        assert_eq!(reading.label(), "5/5");

        let over = counter.reading("héllo!");
        assert!(over.is_over_limit());
        assert_eq!(over.remaining(), 0);
    }

    #[test]
    fn counter_rejects_zero_limit() {
        let input = InputDescriptor::new("eventDescription", InputKind::TextArea);
        assert!(matches!(
            CharacterCounter::bind(&input, 0),
            Err(CounterBindError::ZeroLimit { .. })
        ));
    }

    #[test]
    fn valid_event_has_no_errors() {
        assert!(validate_event_fields(&fields("Demo day", 9, 17), 50, 500).is_empty());
    }

    #[test]
    fn reports_every_failed_check() {
        let mut bad = fields("   ", 17, 9);
        bad.description = "x".repeat(11);

        let errors = validate_event_fields(&bad, 50, 10);
        assert_eq!(
            errors,
            vec![
                "Event name is required".to_string(),
                "Event description must be at most 10 characters".to_string(),
                "Event end must not be before its start".to_string(),
            ]
        );
    }

    #[test]
    fn long_name_is_rejected() {
        let errors = validate_event_fields(&fields("abcdef", 9, 10), 5, 500);
        assert_eq!(errors, vec!["Event name must be at most 5 characters".to_string()]);
    }
}
