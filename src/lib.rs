//! Native companion library for the VolumeMixer Android app.
//!
//! Exposes root detection and version queries to the host through JNI
//! (`com.volumemixer.jni.NativeLib`) and a small C API.

mod bridge;
pub mod error;
mod ffi;

pub mod config;
pub mod logging;
pub mod root;
pub mod version;

pub use config::{Config, DetectionMode};
pub use error::{Error, Result};
pub use root::{Indicator, RootDetector, RootReport, is_rooted};
pub use version::{VERSION, version};
