//! Error types for the native library and its C-facing error handles.

use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Errors raised inside the library before they are mapped onto a host boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} was null")]
    NullArgument(&'static str),
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidLogFilter { filter: String, reason: String },
    #[error("logging already initialized by another logger")]
    LoggerInstalled,
    #[error("panic in native {0}")]
    Panic(&'static str),
    #[error("jni: {0}")]
    Jni(#[from] jni::errors::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Java exception class used when this error crosses the JNI boundary.
    pub(crate) fn java_class(&self) -> &'static str {
        match self {
            Error::NullArgument(_) | Error::InvalidArgument { .. } | Error::InvalidLogFilter { .. } => {
                "java/lang/IllegalArgumentException"
            }
            Error::LoggerInstalled | Error::Panic(_) | Error::Jni(_) => {
                "java/lang/IllegalStateException"
            }
        }
    }
}

/// Opaque error type for C callers.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct volumemixer_error_t;

struct ErrorHandle {
    message: CString,
}

pub(crate) fn cstring_from_str_lossy(value: &str) -> CString {
    let sanitized: String = value.chars().map(|c| if c == '\0' { ' ' } else { c }).collect();
    // Interior NULs were replaced above.
    CString::new(sanitized).unwrap_or_default()
}

pub(crate) fn clear_error(out_error: *mut *mut volumemixer_error_t) {
    if !out_error.is_null() {
        // Safety: caller provided a valid out_error pointer.
        unsafe {
            *out_error = ptr::null_mut();
        }
    }
}

pub(crate) fn write_error(out_error: *mut *mut volumemixer_error_t, message: impl ToString) {
    if out_error.is_null() {
        return;
    }
    let handle = Box::new(ErrorHandle {
        message: cstring_from_str_lossy(&message.to_string()),
    });
    // Safety: out_error is non-null and points to writable memory.
    unsafe {
        *out_error = Box::into_raw(handle) as *mut volumemixer_error_t;
    }
}

/// Returns the message for an error allocated by volumemixer.
///
/// The returned pointer is valid as long as the error handle is alive.
#[unsafe(no_mangle)]
pub extern "C" fn volumemixer_error_message(error: *const volumemixer_error_t) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }
    // Safety: error must be a valid handle allocated by volumemixer.
    let handle = unsafe { &*(error as *const ErrorHandle) };
    handle.message.as_ptr()
}

/// Frees an error returned by volumemixer.
#[unsafe(no_mangle)]
pub extern "C" fn volumemixer_error_free(error: *mut volumemixer_error_t) {
    if error.is_null() {
        return;
    }
    // Safety: error must be a valid handle allocated by volumemixer.
    unsafe {
        drop(Box::from_raw(error as *mut ErrorHandle));
    }
}
