//! Form domain layer
//!
//! Field values, the ordered form state, declarative form definitions and
//! the step-scoped validator compiled from them.

mod application;
mod definition;
mod field;
mod form_state;
mod validation;

pub use application::{uptick_application, DRAFT_KEY};
pub use definition::{FormDefinition, FormSchema};
pub use field::{FieldSpec, FieldValue};
pub use form_state::{FieldUpdateError, FormState};
pub use validation::ValidationResult;

#[cfg(test)]
pub(crate) use application::tests::complete_answers;
