//! Console Front End
//!
//! Drives the [`Dispatcher`] from a terminal. The interactive loop prompts
//! for a category, a command and each form field with `dialoguer`;
//! [`run_once`] runs a single command from already-known field values.
//!
//! Gateway calls run on a tokio worker task so the prompt loop only ever
//! waits on a join handle.

use anyhow::Context;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::catalog::{catalog, FieldKind, FieldSpec};
use crate::dispatch::{Dispatcher, Notice, Outcome, Submission};
use crate::error::{ConsoleError, Result};
use crate::form::Form;
use crate::gateway::{ExecutionGateway, ResultSet};
use crate::present::Screen;

/// Menu entry that leaves the interactive loop
const QUIT: &str = "Quit";

/// Result of a single non-interactive run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,

    /// Code of the execution error, if the gateway failed
    pub error_code: Option<&'static str>,

    pub execution_ms: u64,

    /// Rows returned, for commands that fetch rows
    pub rows_returned: Option<usize>,
}

/// Run one catalog command with the given `(field id, value)` pairs
///
/// Fields not mentioned keep their initial value (choice defaults, empty
/// text). Lookup and validation errors are returned; execution errors are
/// reported through the outcome.
pub async fn run_once<G: ExecutionGateway>(
    gateway: &G,
    category: &str,
    command: &str,
    values: &[(String, String)],
) -> Result<RunReport> {
    let mut dispatcher = Dispatcher::new(catalog(), Screen::default());
    dispatcher.select_category(category)?;
    dispatcher.select_command(command)?;

    let form = dispatcher.open_form()?;
    for (id, value) in values {
        if !form.set_value(id, value)? {
            return Err(ConsoleError::validation(format!(
                "'{value}' is not a valid time for '{id}'"
            )));
        }
    }

    let submission = dispatcher.submit()?;
    let start = Instant::now();
    let result = gateway
        .execute(submission.statement, submission.fetch_results, &submission.params)
        .await;
    let execution_ms = start.elapsed().as_millis() as u64;

    let error_code = result.as_ref().err().map(ConsoleError::error_code);
    let rows_returned = match &result {
        Ok(Some(rows)) => Some(rows.row_count()),
        _ => None,
    };

    let outcome = dispatcher.complete(result)?;
    Ok(RunReport { outcome, error_code, execution_ms, rows_returned })
}

/// Interactive prompt loop
///
/// Returns when the operator picks "Quit" or escapes the category menu.
pub async fn run_interactive<G>(gateway: Arc<G>, screen: Screen) -> anyhow::Result<()>
where
    G: ExecutionGateway + 'static,
{
    let theme = ColorfulTheme::default();
    let mut dispatcher = Dispatcher::new(catalog(), screen);

    loop {
        let mut categories: Vec<&str> = catalog().categories().collect();
        categories.push(QUIT);

        let Some(picked) = Select::with_theme(&theme)
            .with_prompt("Command type")
            .items(&categories)
            .default(0)
            .interact_opt()
            .context("Failed to read command type")?
        else {
            break;
        };

        if categories[picked] == QUIT {
            break;
        }
        dispatcher.select_category(categories[picked])?;

        let options = dispatcher.command_options();
        let Some(picked) = Select::with_theme(&theme)
            .with_prompt("Command")
            .items(&options)
            .default(0)
            .interact_opt()
            .context("Failed to read command")?
        else {
            continue;
        };
        dispatcher.select_command(options[picked])?;

        let form = match dispatcher.open_form() {
            Ok(form) => form,
            Err(e) => {
                show_notice(&Notice::Error { title: "Error".to_string(), message: e.message() });
                continue;
            }
        };
        println!("\n{}", form.command().name);

        let submission = loop {
            let form = dispatcher.form_mut()?;
            if !fill_form(&theme, form)? {
                dispatcher.cancel_form()?;
                break None;
            }

            match dispatcher.submit() {
                Ok(submission) => break Some(submission),
                Err(e @ ConsoleError::Validation(_)) => {
                    eprintln!("{}", e.message());
                }
                Err(e) => return Err(e.into()),
            }
        };

        let Some(submission) = submission else {
            continue;
        };

        let result = execute_on_worker(Arc::clone(&gateway), submission).await;
        match dispatcher.complete(result)? {
            Outcome::Notice(notice) => show_notice(&notice),
            Outcome::Result(popup) => {
                println!("\n{}", popup.render_text());
                dispatcher.close_result()?;
            }
        }
    }

    Ok(())
}

/// Run the submission on a worker task and wait for it
async fn execute_on_worker<G>(gateway: Arc<G>, submission: Submission) -> Result<Option<ResultSet>>
where
    G: ExecutionGateway + 'static,
{
    debug!(title = %submission.title, "dispatching to worker");

    let handle = tokio::spawn(async move {
        gateway
            .execute(submission.statement, submission.fetch_results, &submission.params)
            .await
    });

    handle.await.unwrap_or_else(|e| {
        Err(ConsoleError::statement_failed(format!("Execution task failed: {e}")))
    })
}

/// Prompt for every field; returns `false` when the operator cancels
fn fill_form(theme: &ColorfulTheme, form: &mut Form) -> anyhow::Result<bool> {
    for field in form.fields() {
        let current = form.current_values().remove(field.id).unwrap_or_default();
        prompt_field(theme, form, field, current)?;
    }

    Confirm::with_theme(theme)
        .with_prompt("Execute?")
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

fn prompt_field(
    theme: &ColorfulTheme,
    form: &mut Form,
    field: &FieldSpec,
    current: String,
) -> anyhow::Result<()> {
    match field.kind {
        FieldKind::Choice => {
            let default = field.choices.iter().position(|c| *c == current).unwrap_or(0);
            let picked = Select::with_theme(theme)
                .with_prompt(field.label)
                .items(field.choices)
                .default(default)
                .interact()
                .with_context(|| format!("Failed to read {}", field.label))?;
            form.select(field.id, field.choices[picked])?;
        }

        FieldKind::TimeOfDay => loop {
            let typed: String = Input::with_theme(theme)
                .with_prompt(format!("{} (HH:MM:SS)", field.label))
                .with_initial_text(current.clone())
                .allow_empty(true)
                .interact_text()
                .with_context(|| format!("Failed to read {}", field.label))?;

            if form.set_value(field.id, typed.trim())? {
                form.blur(field.id)?;
                if let Some(normalized) = form.current_values().get(field.id) {
                    println!("  {} = {normalized}", field.label);
                }
                break;
            }
            eprintln!("Only digits and ':' are allowed, at most 6 digits");
        },

        FieldKind::Date => {
            let initial = if current.is_empty() {
                chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
            } else {
                current
            };
            let typed: String = Input::with_theme(theme)
                .with_prompt(format!("{} (YYYY-MM-DD)", field.label))
                .with_initial_text(initial)
                .interact_text()
                .with_context(|| format!("Failed to read {}", field.label))?;
            form.set_value(field.id, &typed)?;
        }

        FieldKind::Text | FieldKind::Number => {
            let typed: String = Input::with_theme(theme)
                .with_prompt(field.label)
                .with_initial_text(current)
                .allow_empty(true)
                .interact_text()
                .with_context(|| format!("Failed to read {}", field.label))?;
            form.set_value(field.id, &typed)?;
        }
    }

    Ok(())
}

fn show_notice(notice: &Notice) {
    match notice {
        Notice::Info { title, message } => println!("{title}: {message}"),
        Notice::Error { title, message } => eprintln!("{title}: {message}"),
    }
}
