pub mod field_dictionary;
pub mod form_locator;
pub mod submission_executor;

pub use form_locator::FormLocator;
pub use submission_executor::SubmissionExecutor;
