//! Native library version.

use std::os::raw::c_char;

/// Version reported to the host; tracks the crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const VERSION_CSTR: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

pub fn version() -> &'static str {
    VERSION
}

/// Returns the library version as a static NUL-terminated string.
///
/// The pointer is owned by the library and must not be freed.
#[unsafe(no_mangle)]
pub extern "C" fn volumemixer_version() -> *const c_char {
    VERSION_CSTR.as_ptr() as *const c_char
}
