pub mod ffi;
pub mod logging;
pub mod marshal;
pub mod result;

// Re-export the C-ABI envelope so consumers can reference the type directly.
pub use result::DvResult;
