use std::ffi::CStr;
use std::os::raw::c_char;

use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Serialize `value` to a JSON string.
pub fn to_json(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

/// Parse `json` into `T`, naming `what` in the error.
pub fn deserialize_json<T: DeserializeOwned>(json: &str, what: &str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| format!("invalid {what} JSON: {e}"))
}

/// Copy the null-terminated C string at `ptr` into an owned `String`.
///
/// # Safety
///
/// `ptr` must be null or point to a null-terminated string that stays alive
/// for the duration of this call.
pub unsafe fn cstring_to_str(ptr: *const c_char) -> Result<String, String> {
    if ptr.is_null() {
        return Err("received null pointer".to_string());
    }

    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_owned)
        .map_err(|e| format!("invalid UTF-8 in C string: {e}"))
}

/// Like [`cstring_to_str`], but a null pointer reads as `None`.
///
/// # Safety
///
/// Same contract as [`cstring_to_str`].
pub unsafe fn optional_str(ptr: *const c_char) -> Result<Option<String>, String> {
    if ptr.is_null() {
        return Ok(None);
    }
    cstring_to_str(ptr).map(Some)
}

/// Read a UUID argument, naming `what` in the error.
///
/// # Safety
///
/// Same contract as [`cstring_to_str`].
pub unsafe fn uuid_arg(ptr: *const c_char, what: &str) -> Result<Uuid, String> {
    let s = cstring_to_str(ptr).map_err(|e| format!("{what}: {e}"))?;
    Uuid::parse_str(s.trim()).map_err(|e| format!("invalid {what} UUID: {e}"))
}
