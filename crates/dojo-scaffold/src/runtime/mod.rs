//! External tools: availability checks and process execution

pub mod check;
pub mod process;

pub use check::{check_tool, require_tool, RuntimeInfo};
pub use process::{ProcessOutput, ProcessRunner, TokioProcessRunner};
