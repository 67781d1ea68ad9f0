//! Command shell and core logic

use crate::api::HttpApiClient;
use crate::controller::{FormController, StepOutcome, SubmitOutcome};
use crate::state::{FieldValue, ValidationResult};
use anyhow::{anyhow, bail, Result};
use std::fmt::Write as _;
use std::sync::Arc;

pub const HELP: &str = "\
Commands:
  show                      show the current step
  set <field> <value>       answer a field ('-' clears it, lists are comma separated)
  next                      continue to the next step
  back                      return to the previous step
  goto <step>               jump to a step
  submit                    send your application
  save                      save your draft now
  discard                   throw the application away and start over
  login <email> <password>  sign in to the Uptick API
  help                      show this help
  quit                      save and leave";

/// One line of shell input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Set { field: String, value: String },
    Next,
    Back,
    Goto(usize),
    Submit,
    Save,
    Discard,
    Login { email: String, password: String },
    Help,
    Quit,
}

impl Command {
    /// Parse a line; blank lines give `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map(|(word, rest)| (word, rest.trim()))
            .unwrap_or((line, ""));

        let command = match word.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "show" | "s" => Self::Show,
            "set" => {
                let (field, value) = rest
                    .split_once(char::is_whitespace)
                    .map(|(field, value)| (field, value.trim()))
                    .unwrap_or((rest, ""));
                if field.is_empty() {
                    bail!("Usage: set <field> <value>");
                }
                Self::Set {
                    field: field.to_string(),
                    value: value.to_string(),
                }
            }
            "next" | "n" => Self::Next,
            "back" | "b" | "prev" => Self::Back,
            "goto" | "g" => rest
                .parse()
                .map(Self::Goto)
                .map_err(|_| anyhow!("Usage: goto <step>"))?,
            "submit" => Self::Submit,
            "save" => Self::Save,
            "discard" => Self::Discard,
            "login" => {
                let mut parts = rest.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(email), Some(password), None) => Self::Login {
                        email: email.to_string(),
                        password: password.to_string(),
                    },
                    _ => bail!("Usage: login <email> <password>"),
                }
            }
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => bail!("Unknown command '{other}', type 'help' for a list"),
        };
        Ok(Some(command))
    }
}

/// Main application struct
pub struct App {
    controller: FormController,
    /// Client used for `login`; absent when signing in is not possible
    auth: Option<Arc<HttpApiClient>>,
    quit: bool,
}

impl App {
    pub fn new(controller: FormController, auth: Option<Arc<HttpApiClient>>) -> Self {
        Self {
            controller,
            auth,
            quit: false,
        }
    }

    pub fn controller(&self) -> &FormController {
        &self.controller
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// First screen shown on start
    pub fn greeting(&self) -> String {
        let opening = if self.controller.restored_from_draft() {
            "Welcome back! Your saved answers have been restored."
        } else {
            "Welcome to the Uptick mentorship application."
        };
        format!(
            "{opening}\nType 'help' for commands.\n\n{}",
            self.render_step()
        )
    }

    /// Run one line of input and return the text to print
    pub async fn handle_line(&mut self, line: &str) -> String {
        match Command::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => String::new(),
            Err(err) => err.to_string(),
        }
    }

    pub async fn execute(&mut self, command: Command) -> String {
        match command {
            Command::Show => self.render_step(),
            Command::Set { field, value } => self.set_field(&field, &value),
            Command::Next => match self.controller.try_next() {
                StepOutcome::Moved(_) => self.render_step(),
                StepOutcome::Stayed(_) => {
                    "This is the last step. Type 'submit' to send your application.".to_string()
                }
                StepOutcome::Blocked { errors, .. } => {
                    format!("Please fix the following:\n{}", self.render_errors(&errors))
                }
            },
            Command::Back => match self.controller.try_prev() {
                StepOutcome::Stayed(_) => "You are already on the first step.".to_string(),
                _ => self.render_step(),
            },
            Command::Goto(step) => self.go_to(step),
            Command::Submit => self.submit().await,
            Command::Save => {
                self.controller.save_draft();
                "Draft saved.".to_string()
            }
            Command::Discard => {
                self.controller.discard();
                format!("Application discarded.\n\n{}", self.render_step())
            }
            Command::Login { email, password } => self.login(&email, &password).await,
            Command::Help => HELP.to_string(),
            Command::Quit => {
                self.controller.save_draft();
                self.quit = true;
                if self.controller.is_completed() {
                    "Goodbye!".to_string()
                } else {
                    "Your answers are saved. Come back any time to finish.".to_string()
                }
            }
        }
    }

    fn set_field(&self, name: &str, input: &str) -> String {
        let Some(spec) = self.controller.schema().field(name) else {
            return format!("Unknown field '{name}'");
        };
        let value = match FieldValue::parse_input(spec.kind(), input) {
            Ok(value) => value,
            Err(err) => return format!("{}: {err}", spec.label),
        };
        let shown = value.display_value();

        if !self.controller.set_field(name, value) {
            return "Your application was already submitted.".to_string();
        }
        let result = self.controller.validate_field(name);
        match result.first_error(name) {
            Some(message) => format!("{}: {shown}\n  ! {message}", spec.label),
            None => format!("{}: {shown}", spec.label),
        }
    }

    fn go_to(&self, step: usize) -> String {
        let total = self.controller.total_steps();
        match self.controller.try_go_to(step) {
            StepOutcome::Stayed(_) if !(1..=total).contains(&step) => {
                format!("There is no step {step}; pick one from 1 to {total}.")
            }
            StepOutcome::Blocked { step, errors } => format!(
                "Step {step} needs attention first:\n{}\n\n{}",
                self.render_errors(&errors),
                self.render_step()
            ),
            _ => self.render_step(),
        }
    }

    async fn submit(&self) -> String {
        match self.controller.submit().await {
            SubmitOutcome::Submitted(envelope) => {
                let mut out = "Your application has been submitted. Thank you!".to_string();
                if !envelope.message.is_empty() {
                    let _ = write!(out, "\n{}", envelope.message);
                }
                out
            }
            SubmitOutcome::Invalid {
                errors,
                first_invalid_step,
            } => {
                self.controller.try_go_to(first_invalid_step);
                format!(
                    "Your application is incomplete:\n{}\n\n{}",
                    self.render_errors(&errors),
                    self.render_step()
                )
            }
            SubmitOutcome::Failed(err) => format!(
                "Submission failed: {err}\nYour answers are still saved; try 'submit' again."
            ),
            SubmitOutcome::InFlight => "A submission is already in progress.".to_string(),
            SubmitOutcome::AlreadySubmitted => {
                "Your application was already submitted.".to_string()
            }
        }
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let Some(client) = &self.auth else {
            return "Signing in is not available.".to_string();
        };
        match client.login(email, password).await {
            Ok(session) => format!("Signed in as {}.", session.user.email),
            Err(err) => format!("Login failed: {err}"),
        }
    }

    /// Current step with its fields, values and errors
    pub fn render_step(&self) -> String {
        if self.controller.is_completed() {
            return "Your application has been submitted.".to_string();
        }

        let schema = self.controller.schema();
        let step = self.controller.current_step();
        let values = self.controller.values();
        let errors = self.controller.errors();

        let mut out = format!(
            "Step {step} of {}: {} ({}%)",
            self.controller.total_steps(),
            schema.step_title(step).unwrap_or_default(),
            self.controller.progress_percent()
        );
        for spec in schema.step_fields(step) {
            let shown = values
                .get(&spec.name)
                .map(FieldValue::display_value)
                .unwrap_or_default();
            let _ = write!(out, "\n  {} [{}]: {shown}", spec.label, spec.name);
            if !spec.options.is_empty() {
                let _ = write!(out, "\n      options: {}", spec.options.join(", "));
            }
            for message in errors.errors_for(&spec.name) {
                let _ = write!(out, "\n      ! {message}");
            }
        }

        let hint = if self.controller.is_last_step() {
            "Type 'submit' to send your application."
        } else if self.controller.is_first_step() {
            "Type 'next' to continue."
        } else {
            "Type 'next' to continue or 'back' to return."
        };
        let _ = write!(out, "\n\n{hint}");
        out
    }

    fn render_errors(&self, errors: &ValidationResult) -> String {
        let schema = self.controller.schema();
        errors
            .invalid_fields()
            .flat_map(|field| {
                let label = schema
                    .field(field)
                    .map_or(field, |spec| spec.label.as_str());
                errors
                    .errors_for(field)
                    .iter()
                    .map(move |message| format!("  {label}: {message}"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
