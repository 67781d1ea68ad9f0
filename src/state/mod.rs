//! Form state module

mod forms;
mod navigator;

pub use forms::*;
pub use navigator::*;

#[cfg(test)]
pub(crate) use forms::complete_answers;
