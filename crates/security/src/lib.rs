//! Security module for strata — path confinement and message sanitization.
//!
//! Provides:
//! - **Path confinement**: repository paths resolve only inside the configured base directory
//! - **Sanitization**: error text with secrets, paths, or stack traces never crosses the trust boundary

pub mod path;
pub mod sanitize;

pub use path::{PathValidationError, confine_repo_path};
pub use sanitize::{GENERIC_ERROR, sanitize_message};
