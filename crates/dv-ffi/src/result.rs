use std::ffi::CString;
use std::os::raw::c_char;

/// C-compatible result envelope for all FFI calls.
///
/// Both `data` and `error` are heap-allocated C strings owned by this struct.
/// The caller frees the whole envelope by passing the pointer to `dv_free`.
#[repr(C)]
pub struct DvResult {
    /// `true` on success, `false` on failure.
    pub ok: bool,
    /// JSON payload on success; null on failure.
    pub data: *mut c_char,
    /// Error message on failure; null on success.
    pub error: *mut c_char,
}

impl DvResult {
    /// Allocate a successful result carrying `json`.
    pub fn success(json: &str) -> *mut Self {
        Self::boxed(true, to_c_string(json).into_raw(), std::ptr::null_mut())
    }

    /// Allocate a failed result carrying `message`.
    pub fn failure(message: &str) -> *mut Self {
        Self::boxed(false, std::ptr::null_mut(), to_c_string(message).into_raw())
    }

    fn boxed(ok: bool, data: *mut c_char, error: *mut c_char) -> *mut Self {
        Box::into_raw(Box::new(DvResult { ok, data, error }))
    }

    /// Reclaim the inner strings and the struct itself.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer produced by [`DvResult::success`] or
    /// [`DvResult::failure`] that has not been freed yet.
    pub unsafe fn free(ptr: *mut Self) {
        if ptr.is_null() {
            return;
        }

        let result = Box::from_raw(ptr);
        if !result.data.is_null() {
            drop(CString::from_raw(result.data));
        }
        if !result.error.is_null() {
            drop(CString::from_raw(result.error));
        }
    }
}

/// Interior NUL bytes cannot cross the C boundary; strip them.
fn to_c_string(s: &str) -> CString {
    CString::new(s).unwrap_or_else(|_| {
        let cleaned: Vec<u8> = s.bytes().filter(|&b| b != 0).collect();
        CString::new(cleaned).unwrap_or_default()
    })
}
