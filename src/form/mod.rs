//! Form Builder
//!
//! Turns a [`CommandSpec`] into an ordered set of typed controls and, on
//! submission, collects their values into the positional parameter list the
//! statement template expects.
//!
//! A form owns its state exclusively. It is created when the command is
//! opened and dropped when the form is submitted or cancelled.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::catalog::{CommandSpec, FieldKind, FieldSpec};
use crate::error::{ConsoleError, Result};
use crate::validation::{complete_time_of_day, TimeBuffer};

/// Popup size of a form with no fields
pub const EMPTY_FORM_SIZE: (u32, u32) = (200, 100);

/// Input control backing one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Free text (also used for numbers and dates until submission)
    Text(String),
    /// Keystroke-gated time of day
    Time(TimeBuffer),
    /// One of the field's fixed choices
    Choice { selected: &'static str },
}

impl Control {
    fn for_field(field: &FieldSpec) -> Self {
        match field.kind {
            FieldKind::Text | FieldKind::Number | FieldKind::Date => Self::Text(String::new()),
            FieldKind::TimeOfDay => Self::Time(TimeBuffer::new()),
            FieldKind::Choice => Self::Choice {
                selected: field
                    .default
                    .or_else(|| field.choices.first().copied())
                    .unwrap_or_default(),
            },
        }
    }

    /// Raw text currently held by the control
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Text(value) => value,
            Self::Time(buffer) => buffer.text(),
            Self::Choice { selected } => selected,
        }
    }
}

/// An open form for one command
#[derive(Debug, Clone)]
pub struct Form {
    command: &'static CommandSpec,
    controls: Vec<Control>,
}

impl Form {
    /// Build the controls for `command`, in field order
    #[must_use]
    pub fn build(command: &'static CommandSpec) -> Self {
        let controls = command.fields.iter().map(Control::for_field).collect();
        Self { command, controls }
    }

    #[must_use]
    pub const fn command(&self) -> &'static CommandSpec {
        self.command
    }

    #[must_use]
    pub const fn fields(&self) -> &'static [FieldSpec] {
        self.command.fields
    }

    /// Control of the field with the given id
    pub fn control(&self, id: &str) -> Result<&Control> {
        let idx = self.index_of(id)?;
        Ok(&self.controls[idx])
    }

    /// Type `incoming` into a field
    ///
    /// Text controls append; time controls insert at the caret and only if the
    /// keystroke gate accepts the result. Returns whether the text changed.
    pub fn type_text(&mut self, id: &str, incoming: &str) -> Result<bool> {
        let idx = self.index_of(id)?;

        match &mut self.controls[idx] {
            Control::Text(value) => {
                value.push_str(incoming);
                Ok(true)
            }
            Control::Time(buffer) => Ok(buffer.insert(incoming)),
            Control::Choice { .. } => Err(ConsoleError::validation(format!(
                "'{}' only accepts one of its listed values",
                self.command.fields[idx].label
            ))),
        }
    }

    /// Replace a field's value
    ///
    /// Time values are fed through the keystroke gate one character at a time;
    /// if any character is refused the field keeps its previous value and
    /// `false` is returned.
    pub fn set_value(&mut self, id: &str, value: &str) -> Result<bool> {
        let idx = self.index_of(id)?;

        if matches!(self.controls[idx], Control::Choice { .. }) {
            self.select(id, value)?;
            return Ok(true);
        }

        match &mut self.controls[idx] {
            Control::Time(buffer) => {
                let mut candidate = TimeBuffer::new();
                let mut chars = [0u8; 4];
                if value.chars().all(|c| candidate.insert(c.encode_utf8(&mut chars))) {
                    *buffer = candidate;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            control => {
                *control = Control::Text(value.to_string());
                Ok(true)
            }
        }
    }

    /// Pick one of a choice field's values
    pub fn select(&mut self, id: &str, choice: &str) -> Result<()> {
        let idx = self.index_of(id)?;
        let field = &self.command.fields[idx];

        let Control::Choice { selected } = &mut self.controls[idx] else {
            return Err(ConsoleError::validation(format!("'{}' is not a choice", field.label)));
        };

        let chosen = field.choices.iter().find(|c| **c == choice).ok_or_else(|| {
            ConsoleError::validation(format!(
                "'{choice}' is not a valid option for '{}'",
                field.label
            ))
        })?;

        *selected = chosen;
        Ok(())
    }

    /// Focus left the field: normalize a time value in place
    pub fn blur(&mut self, id: &str) -> Result<()> {
        let idx = self.index_of(id)?;
        if let Control::Time(buffer) = &mut self.controls[idx] {
            buffer.finalize();
        }
        Ok(())
    }

    /// Time buffer of a time-of-day field, for caret editing
    pub fn time_buffer_mut(&mut self, id: &str) -> Result<&mut TimeBuffer> {
        let idx = self.index_of(id)?;
        let label = self.command.fields[idx].label;

        match &mut self.controls[idx] {
            Control::Time(buffer) => Ok(buffer),
            _ => Err(ConsoleError::validation(format!("'{label}' is not a time field"))),
        }
    }

    /// Raw text of every field, keyed by field id
    #[must_use]
    pub fn current_values(&self) -> BTreeMap<&'static str, String> {
        self.command
            .fields
            .iter()
            .zip(&self.controls)
            .map(|(field, control)| (field.id, control.raw().to_string()))
            .collect()
    }

    /// Collect the statement parameters, in field order
    ///
    /// Time values are normalized first, so the operator sees the formatted
    /// value even when submission is refused.
    pub fn submit(&mut self) -> Result<Vec<String>> {
        for control in &mut self.controls {
            if let Control::Time(buffer) = control {
                buffer.finalize();
            }
        }

        let missing: Vec<&str> = self
            .command
            .fields
            .iter()
            .zip(&self.controls)
            .filter(|(field, control)| field.required && control.raw().trim().is_empty())
            .map(|(field, _)| field.label)
            .collect();

        if !missing.is_empty() {
            return Err(ConsoleError::validation(format!(
                "Please fill in: {}",
                missing.join(", ")
            )));
        }

        self.command
            .fields
            .iter()
            .zip(&self.controls)
            .map(|(field, control)| marshal(field, control.raw()))
            .collect()
    }

    /// Popup size for this form
    #[must_use]
    pub fn layout(&self) -> (u32, u32) {
        layout_for(self.command.fields.len())
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.command.field_index(id).ok_or_else(|| {
            ConsoleError::lookup(format!("Unknown field '{id}' in '{}'", self.command.name))
        })
    }
}

/// Form popup size by number of fields
#[must_use]
pub const fn layout_for(field_count: usize) -> (u32, u32) {
    match field_count {
        0 => EMPTY_FORM_SIZE,
        1 => (500, 200),
        2 => (500, 350),
        _ => (500, 400),
    }
}

fn marshal(field: &FieldSpec, raw: &str) -> Result<String> {
    match field.kind {
        FieldKind::Text | FieldKind::Choice => Ok(raw.to_string()),

        FieldKind::Number => {
            let value = raw.trim();
            let number: f64 = value
                .parse()
                .ok()
                .filter(|n: &f64| n.is_finite())
                .ok_or_else(|| {
                    ConsoleError::validation(format!("'{}' must be a number", field.label))
                })?;

            Ok(match field.scale {
                Some(scale) => format!("{number:.scale$}"),
                None => value.to_string(),
            })
        }

        FieldKind::Date => {
            let value = raw.trim();
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                ConsoleError::validation(format!("'{}' must be a YYYY-MM-DD date", field.label))
            })?;
            Ok(value.to_string())
        }

        FieldKind::TimeOfDay => Ok(complete_time_of_day(raw)),
    }
}
