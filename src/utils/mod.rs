//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{calculate_checksum, is_text_file, read_file_content};
pub use retry::{RetryConfig, Retryable, with_retry};
pub use text::has_meaningful_content;
