//! Foreign return code handling

use std::ffi::{c_char, c_int, CStr};

use tether_core::{TetherError, TetherResult};

/// Map a foreign return code to a result.
///
/// The foreign convention is non-negative for success and a negated errno
/// for failure.
pub fn check(op: &'static str, code: c_int) -> TetherResult<c_int> {
    if code < 0 {
        tracing::debug!(op, code, "foreign call failed");
        Err(TetherError::ForeignCall { op, code })
    } else {
        Ok(code)
    }
}

/// Copy a foreign C string, replacing invalid UTF-8.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string valid for the
/// duration of the call.
pub unsafe fn copy_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_codes() {
        assert_eq!(check("sync", 4).ok(), Some(4));
        assert_eq!(check("sync", 0).ok(), Some(0));
        match check("sync", -32) {
            Err(TetherError::ForeignCall { op, code }) => {
                assert_eq!(op, "sync");
                assert_eq!(code, -32);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_copy_string() {
        let raw = b"Audio/Sink\0";
        let copied = unsafe { copy_string(raw.as_ptr() as *const c_char) };
        assert_eq!(copied.as_deref(), Some("Audio/Sink"));
        assert_eq!(unsafe { copy_string(std::ptr::null()) }, None);
    }
}
