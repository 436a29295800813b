//! Process-wide configuration pushed by the host.

use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::error::{Error, Result, clear_error, volumemixer_error_t, write_error};
use crate::ffi::read_optional_cstr;

static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Whether `is_rooted` consults the filesystem probes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DetectionMode {
    /// Always report "not rooted".
    #[default]
    Disabled,
    Enabled,
}

impl From<bool> for DetectionMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            DetectionMode::Enabled
        } else {
            DetectionMode::Disabled
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub mode: DetectionMode,
    /// Directory the probe paths are resolved against.
    pub sysroot: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Disabled,
            sysroot: PathBuf::from("/"),
        }
    }
}

/// Returns a snapshot of the current configuration.
pub fn config() -> Config {
    CONFIG.read().unwrap_or_else(|err| err.into_inner()).clone()
}

pub fn set_config(config: Config) {
    update(|current| *current = config);
}

/// Changes the mode and keeps the sysroot, as one update.
pub fn set_detection_mode(mode: DetectionMode) {
    update(|current| current.mode = mode);
}

fn update(f: impl FnOnce(&mut Config)) {
    let updated = {
        let mut guard = CONFIG.write().unwrap_or_else(|err| err.into_inner());
        f(&mut guard);
        guard.clone()
    };
    log::debug!(
        "root detection {:?}, sysroot {}",
        updated.mode,
        updated.sysroot.display()
    );
}

/// Configuration accepted from C callers.
///
/// A null `sysroot` selects `/`.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct volumemixer_config_t {
    pub root_detection: bool,
    pub sysroot: *const c_char,
}

impl TryFrom<&volumemixer_config_t> for Config {
    type Error = Error;

    fn try_from(value: &volumemixer_config_t) -> Result<Self> {
        let sysroot = match read_optional_cstr(value.sysroot) {
            Some(path) if path.is_empty() => {
                return Err(Error::InvalidArgument {
                    field: "sysroot",
                    reason: "path was empty".to_string(),
                });
            }
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("/"),
        };
        Ok(Config {
            mode: value.root_detection.into(),
            sysroot,
        })
    }
}

/// Fills `config` with the defaults: detection disabled, sysroot `/`.
#[unsafe(no_mangle)]
pub extern "C" fn volumemixer_config_init(config: *mut volumemixer_config_t) {
    if config.is_null() {
        return;
    }
    // Safety: caller provided a writable config pointer.
    unsafe {
        *config = volumemixer_config_t {
            root_detection: false,
            sysroot: ptr::null(),
        };
    }
}

/// Replaces the process-wide configuration.
#[unsafe(no_mangle)]
pub extern "C" fn volumemixer_configure(
    config: *const volumemixer_config_t,
    out_error: *mut *mut volumemixer_error_t,
) -> bool {
    clear_error(out_error);
    // Safety: caller provided either null or a valid config pointer.
    let Some(config) = (unsafe { config.as_ref() }) else {
        write_error(out_error, Error::NullArgument("config"));
        return false;
    };
    match Config::try_from(config) {
        Ok(config) => {
            set_config(config);
            true
        }
        Err(err) => {
            write_error(out_error, err);
            false
        }
    }
}
