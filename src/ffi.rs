//! Shared utilities for the C FFI surface.

use std::ffi::CStr;
use std::os::raw::c_char;

/// Reads a C string that the caller may leave null.
pub(crate) fn read_optional_cstr(value: *const c_char) -> Option<String> {
    if value.is_null() {
        return None;
    }
    // Safety: caller guarantees a valid, NUL-terminated C string.
    let cstr = unsafe { CStr::from_ptr(value) };
    Some(cstr.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use super::*;

    #[test]
    fn null_reads_as_none() {
        assert_eq!(read_optional_cstr(ptr::null()), None);
    }

    #[test]
    fn reads_valid_string() {
        let value = c"/data/local";
        assert_eq!(read_optional_cstr(value.as_ptr()).as_deref(), Some("/data/local"));
    }
}
