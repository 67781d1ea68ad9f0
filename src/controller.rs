//! Multi-step form controller
//!
//! Owns the form state, gates step transitions through the validator,
//! autosaves a debounced draft and hands the finished application to the
//! API. No operation here panics or returns `Err`: validation failures,
//! API failures and misuse all come back as outcome values.

use crate::api::{ApiEnvelope, ApiError, ApplicationApi};
use crate::draft::{Debouncer, DraftSnapshot, DraftStore, DEFAULT_DELAY};
use crate::state::{FieldValue, FormSchema, FormState, StepNavigator, ValidationResult, DRAFT_KEY};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Controller settings
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Storage key of the draft
    pub draft_key: String,
    /// Quiescence window before a draft is written
    pub autosave_delay: Duration,
    pub autosave: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            draft_key: DRAFT_KEY.to_string(),
            autosave_delay: DEFAULT_DELAY,
            autosave: true,
        }
    }
}

/// Result of a navigation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Now on this step
    Moved(usize),
    /// Nothing to do; still on this step
    Stayed(usize),
    /// The step failed validation and navigation stopped on it
    Blocked {
        step: usize,
        errors: ValidationResult,
    },
}

/// Why a valid application was not accepted
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result of a submission attempt
#[derive(Debug)]
pub enum SubmitOutcome {
    Submitted(ApiEnvelope),
    Invalid {
        errors: ValidationResult,
        first_invalid_step: usize,
    },
    Failed(SubmitError),
    /// Another submission is still waiting for the server
    InFlight,
    /// The application was already accepted
    AlreadySubmitted,
}

#[derive(Debug)]
struct Inner {
    values: FormState,
    navigator: StepNavigator,
    errors: ValidationResult,
    autosave: Option<Debouncer<(u64, FormState)>>,
    completed: bool,
}

/// Orders every write and removal of one draft entry.
///
/// Scheduled writes carry the generation they were claimed under and are
/// skipped once anything newer happened. Store calls run under `io`, so a
/// removal waits for a write that is already running instead of racing it.
struct DraftWriter {
    store: Arc<dyn DraftStore>,
    key: String,
    generation: AtomicU64,
    io: Mutex<()>,
}

impl DraftWriter {
    fn new(store: Arc<dyn DraftStore>, key: String) -> Self {
        Self {
            store,
            key,
            generation: AtomicU64::new(0),
            io: Mutex::new(()),
        }
    }

    fn load(&self) -> Option<Value> {
        self.store.load(&self.key)
    }

    /// Supersede everything scheduled so far and return the new generation
    fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn write_if_current(&self, generation: u64, state: &FormState) {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::Acquire) != generation {
            trace!("Skipping superseded draft write");
            return;
        }
        self.store
            .save(&self.key, &DraftSnapshot::capture(state).to_json());
    }

    fn write_now(&self, state: &FormState) {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        self.advance();
        self.store
            .save(&self.key, &DraftSnapshot::capture(state).to_json());
    }

    fn remove(&self) {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        self.advance();
        self.store.remove(&self.key);
    }

    /// Drop scheduled writes, waiting for one that is already running
    fn close(&self) {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        self.advance();
    }
}

/// Clears the in-flight flag when the submission ends or is dropped
struct SubmitGuard<'a>(&'a AtomicBool);

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one application form from first step to submission
pub struct FormController {
    schema: Arc<FormSchema>,
    drafts: Arc<DraftWriter>,
    api: Arc<dyn ApplicationApi>,
    restored: bool,
    inner: Mutex<Inner>,
    submitting: AtomicBool,
}

impl FormController {
    /// Mount the form, resuming from a stored draft when one fits.
    ///
    /// Must be called from within a Tokio runtime when autosave is on.
    pub fn new(
        schema: Arc<FormSchema>,
        store: Arc<dyn DraftStore>,
        api: Arc<dyn ApplicationApi>,
        options: ControllerOptions,
    ) -> Self {
        let drafts = Arc::new(DraftWriter::new(store, options.draft_key));
        let restored_values = Self::restore(&schema, &drafts);
        let restored = restored_values.is_some();
        let values = restored_values.unwrap_or_else(|| schema.defaults());

        let autosave = options.autosave.then(|| {
            let drafts = Arc::clone(&drafts);
            Debouncer::new(
                options.autosave_delay,
                move |(generation, state): (u64, FormState)| {
                    drafts.write_if_current(generation, &state);
                },
            )
        });

        Self {
            inner: Mutex::new(Inner {
                values,
                navigator: StepNavigator::new(schema.total_steps()),
                errors: ValidationResult::new(),
                autosave,
                completed: false,
            }),
            schema,
            drafts,
            api,
            restored,
            submitting: AtomicBool::new(false),
        }
    }

    fn restore(schema: &FormSchema, drafts: &DraftWriter) -> Option<FormState> {
        let stored = drafts.load()?;
        match DraftSnapshot::from_json(stored)
            .and_then(|snapshot| snapshot.restore(&schema.definition().fields))
        {
            Ok(values) => {
                info!("Resuming application from saved draft");
                Some(values)
            }
            Err(err) => {
                warn!("Starting a fresh application: {err}");
                None
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// True when the form was seeded from a stored draft
    pub fn restored_from_draft(&self) -> bool {
        self.restored
    }

    pub fn values(&self) -> FormState {
        self.lock().values.clone()
    }

    pub fn current_step(&self) -> usize {
        self.lock().navigator.current()
    }

    pub fn total_steps(&self) -> usize {
        self.lock().navigator.total()
    }

    pub fn is_first_step(&self) -> bool {
        self.lock().navigator.is_first_step()
    }

    pub fn is_last_step(&self) -> bool {
        self.lock().navigator.is_last_step()
    }

    pub fn progress_percent(&self) -> u8 {
        self.lock().navigator.progress_percent()
    }

    /// Latest validation messages, per field
    pub fn errors(&self) -> ValidationResult {
        self.lock().errors.clone()
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    #[cfg(test)]
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// True while a draft write is scheduled but not yet written
    #[cfg(test)]
    pub fn autosave_pending(&self) -> bool {
        self.lock()
            .autosave
            .as_ref()
            .is_some_and(Debouncer::is_pending)
    }

    /// Update one field and schedule an autosave.
    ///
    /// Returns false, leaving the state untouched, for unknown fields, values
    /// of the wrong kind, or a form that was already submitted.
    pub fn set_field(&self, name: &str, value: FieldValue) -> bool {
        let mut inner = self.lock();
        if inner.completed {
            debug!("Ignoring update to '{name}' after submission");
            return false;
        }
        if let Err(err) = inner.values.set(name, value) {
            warn!("Ignoring field update: {err}");
            return false;
        }

        let snapshot = inner.values.clone();
        if let Some(autosave) = inner.autosave.as_mut() {
            autosave.push((self.drafts.advance(), snapshot));
        }
        true
    }

    /// Re-validate a single field, replacing its previous messages
    pub fn validate_field(&self, name: &str) -> ValidationResult {
        let mut inner = self.lock();
        let result = self.schema.validator().validate_field(name, &inner.values);
        inner.errors.replace_scope(result.clone());
        result
    }

    /// Advance one step if the current step is valid
    pub fn try_next(&self) -> StepOutcome {
        let mut inner = self.lock();
        let step = inner.navigator.current();
        let result = self.schema.validator().validate_step(step, &inner.values);
        inner.errors.replace_scope(result.clone());

        if !result.is_valid() {
            debug!("Step {step} has errors, staying");
            return StepOutcome::Blocked {
                step,
                errors: result,
            };
        }
        if inner.navigator.is_last_step() {
            return StepOutcome::Stayed(step);
        }

        inner.navigator.next();
        debug!("Moved to step {}", inner.navigator.current());
        StepOutcome::Moved(inner.navigator.current())
    }

    /// Go back one step; never blocked by validation
    pub fn try_prev(&self) -> StepOutcome {
        let mut inner = self.lock();
        if inner.navigator.is_first_step() {
            return StepOutcome::Stayed(1);
        }
        inner.navigator.prev();
        StepOutcome::Moved(inner.navigator.current())
    }

    /// Jump to `target`.
    ///
    /// Going back is always allowed. Going forward validates each step on
    /// the way and stops on the first invalid one.
    pub fn try_go_to(&self, target: usize) -> StepOutcome {
        let mut inner = self.lock();
        let current = inner.navigator.current();

        if !(1..=inner.navigator.total()).contains(&target) {
            warn!("Ignoring jump to step {target} of {}", inner.navigator.total());
            return StepOutcome::Stayed(current);
        }
        if target == current {
            return StepOutcome::Stayed(current);
        }

        for step in current..target {
            let result = self.schema.validator().validate_step(step, &inner.values);
            inner.errors.replace_scope(result.clone());
            if !result.is_valid() {
                inner.navigator.go_to(step);
                return StepOutcome::Blocked {
                    step,
                    errors: result,
                };
            }
        }

        inner.navigator.go_to(target);
        StepOutcome::Moved(target)
    }

    /// Validate everything and send the application.
    ///
    /// A second call while one is waiting on the server returns `InFlight`
    /// without contacting the API. On success the draft is deleted and the
    /// form stops autosaving; on failure state and draft are left as they
    /// were so the user can retry.
    pub async fn submit(&self) -> SubmitOutcome {
        let Some(_guard) = SubmitGuard::acquire(&self.submitting) else {
            warn!("Submission already in progress");
            return SubmitOutcome::InFlight;
        };

        let payload = {
            let mut inner = self.lock();
            if inner.completed {
                return SubmitOutcome::AlreadySubmitted;
            }

            let validator = self.schema.validator();
            let errors = validator.validate_all(&inner.values);
            inner.errors = errors.clone();
            if !errors.is_valid() {
                let first_invalid_step = validator
                    .first_invalid_step(&errors)
                    .unwrap_or_else(|| inner.navigator.current());
                info!("Application has errors on step {first_invalid_step}");
                return SubmitOutcome::Invalid {
                    errors,
                    first_invalid_step,
                };
            }
            self.schema.payload(&inner.values)
        };

        info!("Submitting application");
        match self.api.submit_application(&payload).await {
            Ok(envelope) if envelope.is_success() => {
                {
                    let mut inner = self.lock();
                    inner.completed = true;
                    if let Some(autosave) = inner.autosave.as_mut() {
                        autosave.cancel();
                    }
                    self.drafts.remove();
                }
                info!("Application accepted: {}", envelope.message);
                SubmitOutcome::Submitted(envelope)
            }
            Ok(envelope) => {
                let message = if envelope.message.trim().is_empty() {
                    "The application was not accepted".to_string()
                } else {
                    envelope.message
                };
                warn!("Application rejected: {message}");
                SubmitOutcome::Failed(SubmitError::Rejected(message))
            }
            Err(err) => {
                warn!("Application submission failed: {err}");
                SubmitOutcome::Failed(SubmitError::Api(err))
            }
        }
    }

    /// Write the draft now instead of waiting out the quiescence window
    pub fn save_draft(&self) {
        let mut inner = self.lock();
        if let Some(autosave) = inner.autosave.as_mut() {
            if autosave.is_pending() {
                trace!("Flushing scheduled autosave");
            }
            autosave.cancel();
        }
        if inner.completed {
            return;
        }
        self.drafts.write_now(&inner.values);
        debug!("Draft saved");
    }

    /// Throw the application away and start over
    pub fn discard(&self) {
        let mut inner = self.lock();
        if let Some(autosave) = inner.autosave.as_mut() {
            autosave.cancel();
        }
        self.drafts.remove();
        inner.values = self.schema.defaults();
        inner.navigator.reset();
        inner.errors.clear();
        inner.completed = false;
        info!("Application discarded");
    }
}

impl Drop for FormController {
    fn drop(&mut self) {
        self.drafts.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApplicationApi;
    use crate::draft::MemoryDraftStore;
    use crate::state::{complete_answers, uptick_application};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;
    use tokio_test::{assert_pending, assert_ready};

    const SETTLE: Duration = Duration::from_millis(600);

    fn schema() -> Arc<FormSchema> {
        Arc::new(FormSchema::compile(uptick_application()).unwrap())
    }

    fn controller(store: Arc<MemoryDraftStore>, api: Arc<dyn ApplicationApi>) -> FormController {
        FormController::new(schema(), store, api, ControllerOptions::default())
    }

    fn idle_api() -> Arc<dyn ApplicationApi> {
        let mut api = MockApplicationApi::new();
        api.expect_submit_application().never();
        Arc::new(api)
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn fill(controller: &FormController) {
        for (name, value) in complete_answers() {
            assert!(controller.set_field(name, value), "{name}");
        }
    }

    fn stored_values(store: &MemoryDraftStore) -> Option<FormState> {
        let json = store.load(DRAFT_KEY)?;
        let snapshot = DraftSnapshot::from_json(json).ok()?;
        snapshot.restore(&uptick_application().fields).ok()
    }

    /// API whose calls wait until released
    #[derive(Default)]
    struct GatedApi {
        calls: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl ApplicationApi for GatedApi {
        async fn submit_application(&self, _payload: &Value) -> Result<ApiEnvelope, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(ApiEnvelope::success("Application received", None))
        }
    }

    mod mount {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_defaults_without_draft() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            assert!(!c.restored_from_draft());
            assert_eq!(c.values(), schema().defaults());
            assert_eq!(c.current_step(), 1);
            assert_eq!(c.total_steps(), 5);
            assert!(c.errors().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_resume_reproduces_state() {
            let store = Arc::new(MemoryDraftStore::new());
            let first = controller(Arc::clone(&store), idle_api());
            fill(&first);
            tokio::time::sleep(SETTLE).await;
            let expected = first.values();
            drop(first);

            let resumed = controller(store, idle_api());
            assert!(resumed.restored_from_draft());
            assert_eq!(resumed.values(), expected);
            assert_eq!(resumed.current_step(), 1);
        }

        #[tokio::test]
        async fn test_corrupt_draft_falls_back_to_defaults() {
            let store = Arc::new(MemoryDraftStore::new());
            store.save(DRAFT_KEY, &json!({"firstName": "not a snapshot"}));
            let c = controller(store, idle_api());
            assert!(!c.restored_from_draft());
            assert_eq!(c.values(), schema().defaults());
        }

        #[tokio::test]
        async fn test_incompatible_draft_falls_back_to_defaults() {
            let store = Arc::new(MemoryDraftStore::new());
            store.save(
                DRAFT_KEY,
                &json!({
                    "version": 1,
                    "savedAt": "2026-10-01T10:00:00Z",
                    "values": {"track": {"list": ["FRONTEND"]}}
                }),
            );
            let c = controller(store, idle_api());
            assert!(!c.restored_from_draft());
        }
    }

    mod autosave {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test(start_paused = true)]
        async fn test_draft_matches_latest_state_after_window() {
            let store = Arc::new(MemoryDraftStore::new());
            let c = controller(Arc::clone(&store), idle_api());

            c.set_field("firstName", text("A"));
            c.set_field("firstName", text("Ad"));
            c.set_field("firstName", text("Ada"));
            c.set_field("track", FieldValue::Choice(Some("BACKEND".to_string())));
            assert!(c.autosave_pending());
            assert!(store.load(DRAFT_KEY).is_none());

            tokio::time::sleep(SETTLE).await;
            assert!(!c.autosave_pending());
            assert_eq!(stored_values(&store), Some(c.values()));
        }

        #[tokio::test(start_paused = true)]
        async fn test_later_edits_overwrite_draft() {
            let store = Arc::new(MemoryDraftStore::new());
            let c = controller(Arc::clone(&store), idle_api());

            c.set_field("lastName", text("Okafor"));
            tokio::time::sleep(SETTLE).await;
            c.set_field("lastName", text("Okafor-Bello"));
            tokio::time::sleep(SETTLE).await;

            let saved = stored_values(&store).unwrap();
            assert_eq!(saved.get("lastName"), Some(&text("Okafor-Bello")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_teardown_cancels_pending_save() {
            let store = Arc::new(MemoryDraftStore::new());
            let c = controller(Arc::clone(&store), idle_api());
            c.set_field("firstName", text("Ada"));
            drop(c);

            tokio::time::sleep(Duration::from_secs(2)).await;
            assert!(store.load(DRAFT_KEY).is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_disabled_autosave_never_writes() {
            let store = Arc::new(MemoryDraftStore::new());
            let options = ControllerOptions {
                autosave: false,
                ..Default::default()
            };
            let c = FormController::new(schema(), store.clone(), idle_api(), options);
            c.set_field("firstName", text("Ada"));
            tokio::time::sleep(SETTLE).await;
            assert!(store.is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_save_draft_writes_immediately() {
            let store = Arc::new(MemoryDraftStore::new());
            let c = controller(Arc::clone(&store), idle_api());
            c.set_field("firstName", text("Ada"));

            c.save_draft();
            assert!(!c.autosave_pending());
            assert_eq!(stored_values(&store), Some(c.values()));
        }

        #[tokio::test]
        async fn test_rejected_updates() {
            let store = Arc::new(MemoryDraftStore::new());
            let c = controller(Arc::clone(&store), idle_api());
            assert!(!c.set_field("nickname", text("Ada")));
            assert!(!c.set_field("agreeToTerms", text("yes")));
            assert!(!c.autosave_pending());
            assert_eq!(c.values(), schema().defaults());
        }
    }

    mod navigation {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_invalid_step_blocks_next() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            let outcome = c.try_next();
            match outcome {
                StepOutcome::Blocked { step, errors } => {
                    assert_eq!(step, 1);
                    assert_eq!(errors.first_error("firstName"), Some("First name is required"));
                }
                other => panic!("expected Blocked, got {other:?}"),
            }
            assert_eq!(c.current_step(), 1);
            assert!(!c.errors().is_valid());
        }

        #[tokio::test]
        async fn test_empty_track_blocks_step_two() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            fill(&c);
            assert_eq!(c.try_next(), StepOutcome::Moved(2));

            c.set_field("track", FieldValue::Choice(Some(String::new())));
            let StepOutcome::Blocked { step, errors } = c.try_next() else {
                panic!("expected Blocked");
            };
            assert_eq!(step, 2);
            assert_eq!(errors.errors_for("track"), &["Please select a track".to_string()]);
            assert_eq!(errors.invalid_fields().collect::<Vec<_>>(), vec!["track"]);
            assert_eq!(c.current_step(), 2);
        }

        #[tokio::test]
        async fn test_walk_to_last_step() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            fill(&c);
            for expected in 2..=5 {
                assert_eq!(c.try_next(), StepOutcome::Moved(expected));
            }
            assert!(c.is_last_step());
            assert_eq!(c.try_next(), StepOutcome::Stayed(5));
            assert_eq!(c.progress_percent(), 100);
        }

        #[tokio::test]
        async fn test_prev_is_never_blocked() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            assert_eq!(c.try_prev(), StepOutcome::Stayed(1));

            fill(&c);
            c.try_next();
            c.set_field("firstName", text(""));
            assert_eq!(c.try_prev(), StepOutcome::Moved(1));
            assert!(c.is_first_step());
        }

        #[tokio::test]
        async fn test_go_to_out_of_range_is_noop() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            assert_eq!(c.try_go_to(0), StepOutcome::Stayed(1));
            assert_eq!(c.try_go_to(6), StepOutcome::Stayed(1));
            assert_eq!(c.current_step(), 1);
        }

        #[tokio::test]
        async fn test_go_to_forward_stops_at_first_invalid_step() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            fill(&c);
            c.set_field("experienceLevel", FieldValue::Choice(None));

            let StepOutcome::Blocked { step, errors } = c.try_go_to(5) else {
                panic!("expected Blocked");
            };
            assert_eq!(step, 3);
            assert_eq!(
                errors.first_error("experienceLevel"),
                Some("Please select your experience level")
            );
            assert_eq!(c.current_step(), 3);
        }

        #[tokio::test]
        async fn test_go_to_backward_skips_validation() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            fill(&c);
            assert_eq!(c.try_go_to(4), StepOutcome::Moved(4));
            c.set_field("firstName", text(""));
            assert_eq!(c.try_go_to(2), StepOutcome::Moved(2));
        }

        #[tokio::test]
        async fn test_validate_field_replaces_only_that_field() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            c.try_next();
            assert!(!c.errors().errors_for("email").is_empty());

            c.set_field("email", text("ada@example.com"));
            let result = c.validate_field("email");
            assert!(result.is_valid());
            assert!(c.errors().errors_for("email").is_empty());
            assert!(!c.errors().errors_for("firstName").is_empty());
        }
    }

    mod submit {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test(start_paused = true)]
        async fn test_success_removes_draft() {
            let store = Arc::new(MemoryDraftStore::new());
            let mut api = MockApplicationApi::new();
            api.expect_submit_application()
                .withf(|payload| {
                    payload["firstName"] == "Adaeze" && payload.get("confirmEmail").is_none()
                })
                .times(1)
                .returning(|_| Ok(ApiEnvelope::success("Application received", None)));
            let c = controller(Arc::clone(&store), Arc::new(api));

            fill(&c);
            tokio::time::sleep(SETTLE).await;
            assert!(store.load(DRAFT_KEY).is_some());

            let outcome = c.submit().await;
            assert!(matches!(outcome, SubmitOutcome::Submitted(ref e) if e.message == "Application received"));
            assert!(store.load(DRAFT_KEY).is_none());
            assert!(c.is_completed());
            assert!(!c.is_submitting());
        }

        #[tokio::test(start_paused = true)]
        async fn test_completed_form_stays_completed() {
            let store = Arc::new(MemoryDraftStore::new());
            let mut api = MockApplicationApi::new();
            api.expect_submit_application()
                .times(1)
                .returning(|_| Ok(ApiEnvelope::success("Application received", None)));
            let c = controller(Arc::clone(&store), Arc::new(api));

            fill(&c);
            c.submit().await;
            assert!(!c.set_field("location", text("Lagos")));
            tokio::time::sleep(SETTLE).await;
            assert!(store.load(DRAFT_KEY).is_none());
            assert!(matches!(c.submit().await, SubmitOutcome::AlreadySubmitted));
        }

        #[tokio::test(start_paused = true)]
        async fn test_pending_autosave_does_not_resurrect_draft() {
            let store = Arc::new(MemoryDraftStore::new());
            let mut api = MockApplicationApi::new();
            api.expect_submit_application()
                .times(1)
                .returning(|_| Ok(ApiEnvelope::success("Application received", None)));
            let c = controller(Arc::clone(&store), Arc::new(api));

            fill(&c);
            assert!(c.autosave_pending());
            c.submit().await;
            tokio::time::sleep(SETTLE).await;
            assert!(store.load(DRAFT_KEY).is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_failure_envelope_preserves_state_and_draft() {
            let store = Arc::new(MemoryDraftStore::new());
            let mut api = MockApplicationApi::new();
            api.expect_submit_application()
                .times(1)
                .returning(|_| Ok(ApiEnvelope::failure("Applications for this cohort are closed")));
            let c = controller(Arc::clone(&store), Arc::new(api));

            fill(&c);
            tokio::time::sleep(SETTLE).await;
            let values_before = c.values();
            let draft_before = store.load(DRAFT_KEY);

            let outcome = c.submit().await;
            match outcome {
                SubmitOutcome::Failed(err) => {
                    assert_eq!(err.to_string(), "Applications for this cohort are closed")
                }
                other => panic!("expected Failed, got {other:?}"),
            }
            assert_eq!(c.values(), values_before);
            assert_eq!(store.load(DRAFT_KEY), draft_before);
            assert!(!c.is_completed());
        }

        #[tokio::test]
        async fn test_transport_failure_can_be_retried() {
            let store = Arc::new(MemoryDraftStore::new());
            let mut api = MockApplicationApi::new();
            let mut seq = mockall::Sequence::new();
            api.expect_submit_application()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| {
                    Err(ApiError::Http {
                        status: 503,
                        message: "Service Unavailable".to_string(),
                    })
                });
            api.expect_submit_application()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(ApiEnvelope::success("Application received", None)));
            let c = controller(store, Arc::new(api));

            fill(&c);
            let first = c.submit().await;
            assert!(matches!(
                first,
                SubmitOutcome::Failed(SubmitError::Api(ApiError::Http { status: 503, .. }))
            ));
            assert!(!c.is_submitting());
            assert!(matches!(c.submit().await, SubmitOutcome::Submitted(_)));
        }

        #[tokio::test]
        async fn test_invalid_form_never_reaches_api() {
            let c = controller(Arc::new(MemoryDraftStore::new()), idle_api());
            fill(&c);
            c.set_field("agreeToTerms", FieldValue::Flag(false));

            match c.submit().await {
                SubmitOutcome::Invalid {
                    errors,
                    first_invalid_step,
                } => {
                    assert_eq!(first_invalid_step, 5);
                    assert_eq!(
                        errors.first_error("agreeToTerms"),
                        Some("You must accept the programme terms")
                    );
                }
                other => panic!("expected Invalid, got {other:?}"),
            }
            assert!(!c.errors().is_valid());
        }

        #[tokio::test]
        async fn test_concurrent_submit_calls_api_once() {
            let api = Arc::new(GatedApi::default());
            let c = controller(Arc::new(MemoryDraftStore::new()), api.clone());
            fill(&c);

            let mut first = tokio_test::task::spawn(c.submit());
            assert_pending!(first.poll());
            assert!(c.is_submitting());

            assert!(matches!(c.submit().await, SubmitOutcome::InFlight));
            assert!(c.set_field("location", text("Lagos")));
            assert_eq!(c.try_prev(), StepOutcome::Stayed(1));

            api.release.notify_one();
            let outcome = assert_ready!(first.poll());
            assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
            assert_eq!(api.calls.load(Ordering::SeqCst), 1);
            assert!(!c.is_submitting());
        }

        #[tokio::test]
        async fn test_dropped_submission_releases_guard() {
            let api = Arc::new(GatedApi::default());
            let c = controller(Arc::new(MemoryDraftStore::new()), api.clone());
            fill(&c);

            let mut first = tokio_test::task::spawn(c.submit());
            assert_pending!(first.poll());
            drop(first);
            assert!(!c.is_submitting());
        }
    }

    mod slow_store {
        use super::*;
        use pretty_assertions::assert_eq;

        const WRITE_TIME: Duration = Duration::from_millis(300);

        /// Memory store whose writes block the calling thread
        #[derive(Default)]
        struct SlowStore {
            inner: MemoryDraftStore,
        }

        impl DraftStore for SlowStore {
            fn save(&self, key: &str, value: &Value) {
                std::thread::sleep(WRITE_TIME);
                self.inner.save(key, value);
            }

            fn load(&self, key: &str) -> Option<Value> {
                self.inner.load(key)
            }

            fn remove(&self, key: &str) {
                self.inner.remove(key);
            }
        }

        fn quick_controller(store: Arc<SlowStore>, api: Arc<dyn ApplicationApi>) -> FormController {
            let options = ControllerOptions {
                autosave_delay: Duration::from_millis(10),
                ..Default::default()
            };
            FormController::new(schema(), store, api, options)
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_running_write_cannot_outlive_submit() {
            let store = Arc::new(SlowStore::default());
            let mut api = MockApplicationApi::new();
            api.expect_submit_application()
                .times(1)
                .returning(|_| Ok(ApiEnvelope::success("Application received", None)));
            let c = quick_controller(Arc::clone(&store), Arc::new(api));

            fill(&c);
            // Let the autosave start its write
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert!(matches!(c.submit().await, SubmitOutcome::Submitted(_)));

            tokio::time::sleep(WRITE_TIME * 2).await;
            assert!(store.load(DRAFT_KEY).is_none());
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_running_write_cannot_outlive_discard() {
            let store = Arc::new(SlowStore::default());
            let c = quick_controller(Arc::clone(&store), idle_api());

            fill(&c);
            tokio::time::sleep(Duration::from_millis(60)).await;
            c.discard();

            tokio::time::sleep(WRITE_TIME * 2).await;
            assert!(store.load(DRAFT_KEY).is_none());
            assert_eq!(c.values(), schema().defaults());
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_explicit_save_wins_over_older_write() {
            let store = Arc::new(SlowStore::default());
            let c = quick_controller(Arc::clone(&store), idle_api());

            c.set_field("firstName", text("Ada"));
            tokio::time::sleep(Duration::from_millis(60)).await;
            c.set_field("firstName", text("Adaeze"));
            c.save_draft();

            tokio::time::sleep(WRITE_TIME * 2).await;
            let json = store.load(DRAFT_KEY).unwrap();
            let saved = DraftSnapshot::from_json(json)
                .unwrap()
                .restore(&uptick_application().fields)
                .unwrap();
            assert_eq!(saved.get("firstName"), Some(&text("Adaeze")));
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_drop_waits_for_running_write() {
            let store = Arc::new(SlowStore::default());
            let c = quick_controller(Arc::clone(&store), idle_api());

            c.set_field("firstName", text("Ada"));
            tokio::time::sleep(Duration::from_millis(60)).await;
            drop(c);
            assert!(store.load(DRAFT_KEY).is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_starts_over() {
        let store = Arc::new(MemoryDraftStore::new());
        let c = controller(Arc::clone(&store), idle_api());
        fill(&c);
        c.try_next();
        tokio::time::sleep(SETTLE).await;
        assert!(store.load(DRAFT_KEY).is_some());

        c.discard();
        assert!(store.load(DRAFT_KEY).is_none());
        assert_eq!(c.values(), schema().defaults());
        assert_eq!(c.current_step(), 1);
        assert!(c.errors().is_empty());
    }
}
