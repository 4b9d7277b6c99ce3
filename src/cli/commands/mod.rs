//! CLI command implementations

pub mod cancel;
pub mod common;
pub mod init;
pub mod resume;
pub mod run;
pub mod status;
pub mod validate;
