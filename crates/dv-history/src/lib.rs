pub mod commands;
pub mod outcome;
pub mod validator;

pub use commands::VersionHistory;
pub use outcome::*;
