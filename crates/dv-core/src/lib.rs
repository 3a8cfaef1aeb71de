pub mod db;
pub mod error;
pub mod hash;
pub mod schema;
pub mod snapshot;
pub mod version;

pub use error::*;
pub use hash::*;
pub use snapshot::*;
pub use version::*;
