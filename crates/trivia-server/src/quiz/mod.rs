//! Question bank and the round driver that plays it.

pub mod bank;
pub mod driver;

pub use bank::{Question, QuestionBank, QuestionBankError};
pub use driver::{DriverConfig, RoundDriver};
