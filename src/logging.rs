//! Logging backend for the `log` facade.
//!
//! Records are filtered with `RUST_LOG`-style directives and delivered either
//! to a host callback or to stderr.

use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::RwLock;

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::{Lazy, OnceCell};

use crate::error::{
    Error, Result, clear_error, cstring_from_str_lossy, volumemixer_error_t, write_error,
};
use crate::ffi::read_optional_cstr;

const CRATE_TARGET: &str = "volumemixer";

static LOGGER: Lazy<Logger> = Lazy::new(Logger::new);
static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Log level values.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum volumemixer_log_level_t {
    VOLUMEMIXER_LOG_LEVEL_OFF = 0,
    VOLUMEMIXER_LOG_LEVEL_ERROR = 1,
    VOLUMEMIXER_LOG_LEVEL_WARN = 2,
    VOLUMEMIXER_LOG_LEVEL_INFO = 3,
    VOLUMEMIXER_LOG_LEVEL_DEBUG = 4,
    VOLUMEMIXER_LOG_LEVEL_TRACE = 5,
}

impl From<volumemixer_log_level_t> for LevelFilter {
    fn from(value: volumemixer_log_level_t) -> Self {
        match value {
            volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_OFF => LevelFilter::Off,
            volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_ERROR => LevelFilter::Error,
            volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_WARN => LevelFilter::Warn,
            volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_INFO => LevelFilter::Info,
            volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_DEBUG => LevelFilter::Debug,
            volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_TRACE => LevelFilter::Trace,
        }
    }
}

impl From<Level> for volumemixer_log_level_t {
    fn from(value: Level) -> Self {
        match value {
            Level::Error => volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_ERROR,
            Level::Warn => volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_WARN,
            Level::Info => volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_INFO,
            Level::Debug => volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_DEBUG,
            Level::Trace => volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_TRACE,
        }
    }
}

/// Maps the integer levels used by the JNI surface; out-of-range values clamp.
pub(crate) fn level_from_int(value: i32) -> LevelFilter {
    match value {
        i32::MIN..=0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Log record delivered to a C callback.
///
/// String pointers are only valid for the duration of the callback.
/// `module_path` and `file` may be null. `line` is 0 when unknown.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct volumemixer_log_record_t {
    pub level: volumemixer_log_level_t,
    pub target: *const c_char,
    pub message: *const c_char,
    pub module_path: *const c_char,
    pub file: *const c_char,
    pub line: u32,
}

/// Callback invoked for each enabled record, from whichever thread logged it.
#[allow(non_camel_case_types)]
pub type volumemixer_log_callback_t =
    Option<extern "C" fn(record: *const volumemixer_log_record_t, user_data: *mut c_void)>;

/// Logging configuration for C callers.
///
/// A non-null `filter` overrides `RUST_LOG`, which in turn overrides `level`.
/// With a null `callback` records go to stderr.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct volumemixer_log_config_t {
    pub level: volumemixer_log_level_t,
    pub filter: *const c_char,
    pub callback: volumemixer_log_callback_t,
    pub user_data: *mut c_void,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Directive {
    target: String,
    level: LevelFilter,
}

/// Parsed set of filter directives.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct LogFilter {
    default: LevelFilter,
    directives: Vec<Directive>,
}

impl LogFilter {
    pub(crate) fn for_level(level: LevelFilter) -> Self {
        Self {
            default: LevelFilter::Off,
            directives: vec![Directive {
                target: CRATE_TARGET.to_string(),
                level,
            }],
        }
    }

    pub(crate) fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidLogFilter {
            filter: input.to_string(),
            reason,
        };
        let mut filter = Self {
            default: LevelFilter::Off,
            directives: Vec::new(),
        };

        for (index, directive) in input.split(',').map(str::trim).enumerate() {
            if directive.is_empty() {
                continue;
            }
            let (target, level) = match directive.split_once('=') {
                Some((target, level)) => (target.trim(), Some(level.trim())),
                None => (directive, None),
            };
            if target.is_empty() {
                return Err(invalid(format!("empty target at position {index}")));
            }

            match level {
                Some("") => return Err(invalid(format!("missing level for `{target}`"))),
                Some(level) => {
                    let level =
                        parse_level(level).ok_or_else(|| invalid(format!("unknown level `{level}`")))?;
                    filter.directives.push(Directive {
                        target: target.to_string(),
                        level,
                    });
                }
                None => match parse_level(target) {
                    Some(level) => filter.default = level,
                    None => filter.directives.push(Directive {
                        target: target.to_string(),
                        level: LevelFilter::Trace,
                    }),
                },
            }
        }

        Ok(filter)
    }

    /// Level in effect for `target`: the longest matching directive wins.
    fn level_for(&self, target: &str) -> LevelFilter {
        self.directives
            .iter()
            .filter(|directive| target.starts_with(&directive.target))
            .max_by_key(|directive| directive.target.len())
            .map_or(self.default, |directive| directive.level)
    }

    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level().to_level_filter() <= self.level_for(metadata.target())
    }

    fn max_level(&self) -> LevelFilter {
        self.directives
            .iter()
            .map(|directive| directive.level)
            .fold(self.default, Ord::max)
    }
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Picks the filter from an explicit directive string, then `RUST_LOG`, then `level`.
pub(crate) fn resolve_filter(filter: Option<&str>, level: LevelFilter) -> Result<LogFilter> {
    if let Some(filter) = filter {
        return LogFilter::parse(filter);
    }
    if let Ok(filter) = std::env::var("RUST_LOG") {
        return LogFilter::parse(&filter);
    }
    Ok(LogFilter::for_level(level))
}

#[derive(Clone, Copy)]
enum Sink {
    Stderr,
    Callback {
        callback: extern "C" fn(*const volumemixer_log_record_t, *mut c_void),
        user_data: usize,
    },
}

struct LoggerState {
    filter: LogFilter,
    sink: Sink,
}

struct Logger {
    state: RwLock<LoggerState>,
}

impl Logger {
    fn new() -> Self {
        Self {
            state: RwLock::new(LoggerState {
                filter: LogFilter::for_level(LevelFilter::Info),
                sink: Sink::Stderr,
            }),
        }
    }

    fn update(&self, state: LoggerState) {
        *self.state.write().unwrap_or_else(|err| err.into_inner()) = state;
    }

    fn with_state<T>(&self, f: impl FnOnce(&LoggerState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(|err| err.into_inner());
        f(&guard)
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.with_state(|state| state.filter.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        // The lock is released before dispatch so a callback may reconfigure logging.
        let (enabled, sink) =
            self.with_state(|state| (state.filter.enabled(record.metadata()), state.sink));
        if !enabled {
            return;
        }

        match sink {
            Sink::Stderr => eprintln!("{} {}: {}", record.level(), record.target(), record.args()),
            Sink::Callback {
                callback,
                user_data,
            } => {
                let target = cstring_from_str_lossy(record.target());
                let message = cstring_from_str_lossy(&record.args().to_string());
                let module_path = record.module_path().map(cstring_from_str_lossy);
                let file = record.file().map(cstring_from_str_lossy);
                let raw = volumemixer_log_record_t {
                    level: record.level().into(),
                    target: target.as_ptr(),
                    message: message.as_ptr(),
                    module_path: module_path.as_ref().map_or(ptr::null(), |value| value.as_ptr()),
                    file: file.as_ref().map_or(ptr::null(), |value| value.as_ptr()),
                    line: record.line().unwrap_or(0),
                };
                callback(&raw, user_data as *mut c_void);
            }
        }
    }

    fn flush(&self) {}
}

fn install() -> Result<()> {
    let installed = *INSTALLED.get_or_init(|| log::set_logger(&*LOGGER).is_ok());
    if installed { Ok(()) } else { Err(Error::LoggerInstalled) }
}

fn apply(filter: LogFilter, sink: Sink) -> Result<()> {
    install()?;
    let max_level = filter.max_level();
    LOGGER.update(LoggerState { filter, sink });
    log::set_max_level(max_level);
    Ok(())
}

/// Installs the logger writing to stderr, or reconfigures it.
pub fn init(filter: Option<&str>, level: LevelFilter) -> Result<()> {
    apply(resolve_filter(filter, level)?, Sink::Stderr)
}

/// Fills `config` with the defaults: INFO for this library, stderr output.
#[unsafe(no_mangle)]
pub extern "C" fn volumemixer_log_config_init(config: *mut volumemixer_log_config_t) {
    if config.is_null() {
        return;
    }
    // Safety: caller provided a writable config pointer.
    unsafe {
        *config = volumemixer_log_config_t {
            level: volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_INFO,
            filter: ptr::null(),
            callback: None,
            user_data: ptr::null_mut(),
        };
    }
}

/// Initializes logging. A null `config` selects the defaults.
///
/// May be called again to change the configuration.
#[unsafe(no_mangle)]
pub extern "C" fn volumemixer_log_init(
    config: *const volumemixer_log_config_t,
    out_error: *mut *mut volumemixer_error_t,
) -> bool {
    clear_error(out_error);
    // Safety: caller provided either null or a valid config pointer.
    let config = unsafe { config.as_ref() };

    let filter = config.and_then(|config| read_optional_cstr(config.filter));
    let level = config
        .map(|config| config.level)
        .unwrap_or(volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_INFO);
    let sink = match config.and_then(|config| config.callback) {
        Some(callback) => Sink::Callback {
            callback,
            user_data: config.map_or(0, |config| config.user_data as usize),
        },
        None => Sink::Stderr,
    };

    let result = resolve_filter(filter.as_deref(), level.into())
        .and_then(|filter| apply(filter, sink));
    match result {
        Ok(()) => true,
        Err(err) => {
            write_error(out_error, err);
            false
        }
    }
}
