//! Dispatcher
//!
//! Owns the operator's selections and drives one command at a time through
//! `Idle -> CategorySelected -> CommandSelected -> FormOpen -> Executing ->
//! (ResultShown | Idle)`.
//!
//! The dispatcher never touches the database itself. [`Dispatcher::submit`]
//! hands back a [`Submission`] for whoever runs the gateway, and
//! [`Dispatcher::complete`] routes the outcome. [`Dispatcher::execute_with`]
//! does both around a gateway call.
//!
//! Every failure leaves the dispatcher in a usable state: lookup and
//! validation errors change nothing, execution errors end in `Idle`.

use serde::Serialize;
use tracing::debug;

use crate::catalog::{BoundStatement, Catalog, CommandSpec};
use crate::error::{ConsoleError, Result};
use crate::form::Form;
use crate::gateway::{ExecutionGateway, ResultSet};
use crate::present::{present, ResultPopup, Screen};

/// Command option shown before a concrete command is picked
pub const COMMAND_PLACEHOLDER: &str = "Select Command";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum State {
    Idle,
    CategorySelected,
    CommandSelected,
    FormOpen,
    Executing,
    ResultShown,
}

/// Message shown to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Info { title: String, message: String },
    Error { title: String, message: String },
}

impl Notice {
    pub(crate) fn info(message: impl Into<String>) -> Self {
        Self::Info { title: "Success".to_string(), message: message.into() }
    }

    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self::Error { title: "Error".to_string(), message: message.into() }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Info { message, .. } | Self::Error { message, .. } => message,
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// A statement ready to be handed to the execution gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub statement: &'static str,
    pub params: Vec<String>,
    pub fetch_results: bool,
    pub title: String,
}

/// What the operator sees once a command has run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Notice(Notice),
    Result(ResultPopup),
}

/// Single-operator command state machine
#[derive(Debug)]
pub struct Dispatcher {
    catalog: &'static Catalog,
    screen: Screen,
    state: State,
    category: Option<&'static str>,
    command: Option<&'static CommandSpec>,
    form: Option<Form>,
    pending_title: Option<String>,
    popup: Option<ResultPopup>,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(catalog: &'static Catalog, screen: Screen) -> Self {
        Self {
            catalog,
            screen,
            state: State::Idle,
            category: None,
            command: None,
            form: None,
            pending_title: None,
            popup: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub const fn category(&self) -> Option<&'static str> {
        self.category
    }

    #[must_use]
    pub fn command(&self) -> Option<&'static CommandSpec> {
        self.command
    }

    /// Popup currently shown, if any
    #[must_use]
    pub const fn popup(&self) -> Option<&ResultPopup> {
        self.popup.as_ref()
    }

    /// Command options for the selected category, placeholder first
    #[must_use]
    pub fn command_options(&self) -> Vec<&'static str> {
        let mut options = vec![COMMAND_PLACEHOLDER];
        if let Some(category) = self.category {
            options.extend(self.catalog.commands_for(category));
        }
        options
    }

    /// Select a category and reset the command to the placeholder
    pub fn select_category(&mut self, name: &str) -> Result<()> {
        self.ensure_selecting()?;

        let category = self
            .catalog
            .category(name)
            .ok_or_else(|| ConsoleError::lookup(format!("Unknown category '{name}'")))?;

        self.category = Some(category.name);
        self.command = None;
        self.transition(State::CategorySelected);
        Ok(())
    }

    /// Select a command of the current category
    ///
    /// Choosing the placeholder goes back to `CategorySelected`.
    pub fn select_command(&mut self, name: &str) -> Result<()> {
        self.ensure_selecting()?;

        let category = self
            .category
            .ok_or_else(|| ConsoleError::lookup("Please select a command type first!"))?;

        if name == COMMAND_PLACEHOLDER {
            self.command = None;
            self.transition(State::CategorySelected);
            return Ok(());
        }

        let command = self.catalog.spec_for(category, name).ok_or_else(|| {
            ConsoleError::lookup(format!("Unknown command '{name}' in '{category}'"))
        })?;

        self.command = Some(command);
        self.transition(State::CommandSelected);
        Ok(())
    }

    /// Open the form of the selected command
    pub fn open_form(&mut self) -> Result<&mut Form> {
        self.ensure_selecting()?;

        let command = self
            .command
            .ok_or_else(|| ConsoleError::lookup("Please select a valid command!"))?;

        self.transition(State::FormOpen);
        let form = self.form.insert(Form::build(command));
        let (width, height) = form.layout();
        debug!(command = command.name, width, height, "form opened");
        Ok(form)
    }

    /// The open form
    pub fn form_mut(&mut self) -> Result<&mut Form> {
        self.form.as_mut().ok_or_else(|| ConsoleError::busy("No form is open"))
    }

    /// Close the form without running anything
    pub fn cancel_form(&mut self) -> Result<()> {
        if self.state != State::FormOpen {
            return Err(ConsoleError::busy("No form is open"));
        }

        self.form = None;
        self.transition(State::CommandSelected);
        Ok(())
    }

    /// Marshal the open form into a statement for the gateway
    ///
    /// A validation error keeps the form open. A second submission while one
    /// is executing is refused.
    pub fn submit(&mut self) -> Result<Submission> {
        match self.state {
            State::FormOpen => {}
            State::Executing => {
                return Err(ConsoleError::busy("A command is already executing"));
            }
            _ => return Err(ConsoleError::busy("No form is open")),
        }

        let form = self.form.as_mut().ok_or_else(|| ConsoleError::busy("No form is open"))?;
        let command = form.command();
        let values = form.submit()?;
        let BoundStatement { sql, params, title } = command.bind(&values)?;

        self.form = None;
        self.pending_title = Some(title.clone());
        self.transition(State::Executing);

        Ok(Submission {
            statement: sql,
            params,
            fetch_results: command.expects_rows,
            title,
        })
    }

    /// Route the outcome of an execution
    ///
    /// Rows go to a result popup and mutations to a success notice. Execution
    /// failures become an error notice prefixed with the command's failure
    /// context; any other error is shown as is.
    pub fn complete(&mut self, result: Result<Option<ResultSet>>) -> Result<Outcome> {
        if self.state != State::Executing {
            return Err(ConsoleError::busy("No command is executing"));
        }

        let command = self.command.ok_or_else(|| ConsoleError::busy("No command is executing"))?;
        let title = self.pending_title.take().unwrap_or_else(|| command.result_title.to_string());

        let outcome = match result {
            Err(e) => {
                debug!(command = command.name, code = e.error_code(), "command failed");
                self.reset();
                let message = if e.is_execution() {
                    format!("{}: {}", command.failure_context, e.message())
                } else {
                    e.message()
                };
                return Ok(Outcome::Notice(Notice::error(message)));
            }

            Ok(rows) if command.expects_rows => {
                let empty = rows.as_ref().map_or(true, ResultSet::is_empty);
                match command.empty_notice {
                    Some(message) if empty => {
                        self.reset();
                        Outcome::Notice(Notice::error(message))
                    }
                    _ => {
                        let popup =
                            present(rows.as_ref(), &title, command.result_columns, self.screen);
                        self.popup = Some(popup.clone());
                        self.transition(State::ResultShown);
                        Outcome::Result(popup)
                    }
                }
            }

            Ok(_) => {
                self.reset();
                Outcome::Notice(Notice::info(command.success_notice))
            }
        };

        Ok(outcome)
    }

    /// Close the result popup
    pub fn close_result(&mut self) -> Result<()> {
        if self.state != State::ResultShown {
            return Err(ConsoleError::busy("No result is shown"));
        }

        self.reset();
        Ok(())
    }

    /// Submit the open form, run it through `gateway` and route the outcome
    ///
    /// Validation errors are returned and the form stays open; execution
    /// errors come back as an error notice.
    pub async fn execute_with<G: ExecutionGateway>(&mut self, gateway: &G) -> Result<Outcome> {
        let submission = self.submit()?;
        let result = gateway
            .execute(submission.statement, submission.fetch_results, &submission.params)
            .await;
        self.complete(result)
    }

    fn ensure_selecting(&self) -> Result<()> {
        match self.state {
            State::Idle | State::CategorySelected | State::CommandSelected => Ok(()),
            State::FormOpen => Err(ConsoleError::busy("Close the open form first")),
            State::Executing => Err(ConsoleError::busy("A command is already executing")),
            State::ResultShown => Err(ConsoleError::busy("Close the result first")),
        }
    }

    fn reset(&mut self) {
        self.category = None;
        self.command = None;
        self.form = None;
        self.pending_title = None;
        self.popup = None;
        self.transition(State::Idle);
    }

    fn transition(&mut self, next: State) {
        debug!(from = ?self.state, to = ?next, "dispatcher transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;
    use pretty_assertions::assert_eq;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(catalog(), Screen::default())
    }

    fn open(dispatcher: &mut Dispatcher, category: &str, command: &str) {
        dispatcher.select_category(category).unwrap();
        dispatcher.select_command(command).unwrap();
        dispatcher.open_form().unwrap();
    }

    #[test]
    fn test_select_category_lists_commands() {
        let mut d = dispatcher();
        assert_eq!(d.command_options(), vec![COMMAND_PLACEHOLDER]);

        d.select_category("Entry Management").unwrap();
        assert_eq!(d.state(), State::CategorySelected);
        assert_eq!(d.command_options()[0], COMMAND_PLACEHOLDER);
        assert_eq!(d.command_options().len(), 6);
    }

    #[test]
    fn test_unknown_category_changes_nothing() {
        let mut d = dispatcher();
        d.select_category("Exam Management").unwrap();
        d.select_command("Delete Exam").unwrap();

        let err = d.select_category("Staff Management").unwrap_err();
        assert_eq!(err.error_code(), "LOOKUP_ERROR");
        assert_eq!(d.state(), State::CommandSelected);
        assert_eq!(d.category(), Some("Exam Management"));
    }

    #[test]
    fn test_changing_category_resets_command() {
        let mut d = dispatcher();
        d.select_category("Exam Management").unwrap();
        d.select_command("Delete Exam").unwrap();
        d.select_category("Student Management").unwrap();

        assert!(d.command().is_none());
        assert_eq!(d.state(), State::CategorySelected);
    }

    #[test]
    fn test_placeholder_blocks_open_form() {
        let mut d = dispatcher();
        d.select_category("Student Management").unwrap();
        d.select_command("Delete Student").unwrap();
        d.select_command(COMMAND_PLACEHOLDER).unwrap();
        assert_eq!(d.state(), State::CategorySelected);

        let err = d.open_form().unwrap_err();
        assert_eq!(err.message(), "Please select a valid command!");
        assert_eq!(d.state(), State::CategorySelected);
    }

    #[test]
    fn test_unknown_command_is_lookup_error() {
        let mut d = dispatcher();
        d.select_category("Student Management").unwrap();
        assert!(d.select_command("Delete Exam").is_err());
        assert_eq!(d.state(), State::CategorySelected);
    }

    #[test]
    fn test_validation_error_keeps_form_open() {
        let mut d = dispatcher();
        open(&mut d, "Student Management", "Delete Student");

        let err = d.submit().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(d.state(), State::FormOpen);
        assert!(d.form_mut().is_ok());
    }

    #[test]
    fn test_cancel_form_returns_to_command() {
        let mut d = dispatcher();
        open(&mut d, "Student Management", "Delete Student");
        d.cancel_form().unwrap();

        assert_eq!(d.state(), State::CommandSelected);
        assert!(d.form_mut().is_err());
    }

    #[test]
    fn test_submit_while_executing_is_refused() {
        let mut d = dispatcher();
        open(&mut d, "Student Management", "Delete Student");
        d.form_mut().unwrap().set_value("sno", "12345678").unwrap();

        let submission = d.submit().unwrap();
        assert_eq!(submission.params, vec!["12345678"]);
        assert!(!submission.fetch_results);
        assert_eq!(d.state(), State::Executing);

        let err = d.submit().unwrap_err();
        assert_eq!(err.error_code(), "BUSY");
        assert!(d.select_category("Exam Management").is_err());
    }

    #[test]
    fn test_mutation_success_notice() {
        let mut d = dispatcher();
        open(&mut d, "Student Management", "Delete Student");
        d.form_mut().unwrap().set_value("sno", "12345678").unwrap();
        d.submit().unwrap();

        let outcome = d.complete(Ok(None)).unwrap();
        assert_eq!(
            outcome,
            Outcome::Notice(Notice::Info {
                title: "Success".to_string(),
                message: "Student deleted successfully!".to_string(),
            })
        );
        assert_eq!(d.state(), State::Idle);
        assert!(d.category().is_none());
    }

    #[test]
    fn test_failure_notice_carries_context() {
        let mut d = dispatcher();
        open(&mut d, "Exam Management", "Delete Exam");
        d.form_mut().unwrap().set_value("excode", "CS101").unwrap();
        d.submit().unwrap();

        let outcome = d
            .complete(Err(ConsoleError::statement_failed("exam has entries")))
            .unwrap();
        let Outcome::Notice(notice) = outcome else {
            panic!("expected a notice");
        };
        assert!(notice.is_error());
        assert_eq!(notice.message(), "Failed to delete exam: exam has entries");
        assert_eq!(d.state(), State::Idle);
    }

    #[test]
    fn test_config_failure_notice_has_no_context() {
        let mut d = dispatcher();
        open(&mut d, "Exam Management", "View Exam Schedule");
        d.submit().unwrap();

        let outcome = d
            .complete(Err(ConsoleError::config("PostgreSQL requires 'host' parameter")))
            .unwrap();
        let Outcome::Notice(notice) = outcome else {
            panic!("expected a notice");
        };
        assert!(notice.is_error());
        assert_eq!(notice.message(), "Configuration error: PostgreSQL requires 'host' parameter");
        assert_eq!(d.state(), State::Idle);
    }

    #[test]
    fn test_rows_open_result_popup() {
        let mut d = dispatcher();
        open(&mut d, "Student Management", "View Students");
        let submission = d.submit().unwrap();
        assert!(submission.fetch_results);

        let rows = ResultSet::new(
            vec!["sno".into(), "sname".into(), "semail".into()],
            vec![vec!["1".into(), "Ann".into(), "ann@example.com".into()]],
        );
        let Outcome::Result(popup) = d.complete(Ok(Some(rows))).unwrap() else {
            panic!("expected a result popup");
        };
        assert_eq!(popup.title, "View Students");
        assert_eq!(d.state(), State::ResultShown);
        assert!(d.popup().is_some());

        d.close_result().unwrap();
        assert_eq!(d.state(), State::Idle);
        assert!(d.popup().is_none());
    }

    #[test]
    fn test_empty_search_shows_notice() {
        let mut d = dispatcher();
        open(&mut d, "Student Management", "Search Student By Email/ID/Name");
        let form = d.form_mut().unwrap();
        form.set_value("term", "zed").unwrap();
        form.select("search_by", "Name").unwrap();

        let submission = d.submit().unwrap();
        assert_eq!(submission.params, vec!["%zed%"]);
        assert_eq!(submission.title, "Search Results (Name)");

        let Outcome::Notice(notice) = d.complete(Ok(Some(ResultSet::default()))).unwrap() else {
            panic!("expected a notice");
        };
        assert_eq!(notice.message(), "No students found matching the criteria");
        assert_eq!(d.state(), State::Idle);
    }

    #[test]
    fn test_empty_listing_shows_no_results_popup() {
        let mut d = dispatcher();
        open(&mut d, "Entry Management", "View Entries");
        d.submit().unwrap();

        let Outcome::Result(popup) = d.complete(Ok(Some(ResultSet::default()))).unwrap() else {
            panic!("expected a result popup");
        };
        assert_eq!(popup.render_text(), "View Entries\nNo results found\n");
    }

    #[test]
    fn test_complete_without_submission_is_refused() {
        let mut d = dispatcher();
        assert!(d.complete(Ok(None)).is_err());
        assert!(d.close_result().is_err());
        assert!(d.cancel_form().is_err());
    }
}
