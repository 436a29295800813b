//! Root detection.
//!
//! Detection is opt-in. While the configured [`DetectionMode`] is `Disabled`,
//! [`is_rooted`] reports `false` without touching the filesystem. Once enabled,
//! a [`RootDetector`] looks for the traces a rooted Android device usually
//! leaves behind: `su` binaries, Magisk artifacts, a `test-keys` build and
//! Magisk mounts.

use std::fmt;
use std::fs;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use crate::config::{self, DetectionMode};

const SU_PATHS: &[&str] = &[
    "sbin/su",
    "system/bin/su",
    "system/xbin/su",
    "system/sbin/su",
    "vendor/bin/su",
    "su/bin/su",
    "data/local/su",
    "data/local/bin/su",
    "data/local/xbin/su",
    "system/sd/xbin/su",
    "system/bin/failsafe/su",
    "cache/su",
    "dev/su",
];

const MAGISK_PATHS: &[&str] = &[
    "sbin/.magisk",
    "data/adb/magisk",
    "data/adb/magisk.db",
    "data/adb/modules",
    "cache/.disable_magisk",
    "dev/.magisk_unblock",
    "system/bin/magisk",
    "debug_ramdisk/magisk",
];

const BUILD_PROP: &str = "system/build.prop";
const MOUNTS: &str = "proc/self/mounts";

/// A single trace of root access.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Indicator {
    SuBinary(PathBuf),
    MagiskArtifact(PathBuf),
    /// `ro.build.tags` contains `test-keys`.
    TestKeys,
    /// The offending line from the mount table.
    MagiskMount(String),
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::SuBinary(path) => write!(f, "su binary at {}", path.display()),
            Indicator::MagiskArtifact(path) => write!(f, "magisk artifact at {}", path.display()),
            Indicator::TestKeys => f.write_str("build signed with test-keys"),
            Indicator::MagiskMount(line) => write!(f, "magisk mount: {line}"),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RootReport {
    pub indicators: Vec<Indicator>,
}

impl RootReport {
    pub fn is_rooted(&self) -> bool {
        !self.indicators.is_empty()
    }
}

/// Runs the root probes against a filesystem tree.
#[derive(Clone, Debug)]
pub struct RootDetector {
    sysroot: PathBuf,
}

impl RootDetector {
    pub fn new(sysroot: impl Into<PathBuf>) -> Self {
        Self {
            sysroot: sysroot.into(),
        }
    }

    pub fn sysroot(&self) -> &Path {
        &self.sysroot
    }

    pub fn scan(&self) -> RootReport {
        let mut indicators = Vec::new();
        indicators.extend(self.existing(SU_PATHS).map(Indicator::SuBinary));
        indicators.extend(self.existing(MAGISK_PATHS).map(Indicator::MagiskArtifact));
        if self.has_test_keys() {
            indicators.push(Indicator::TestKeys);
        }
        indicators.extend(self.magisk_mounts().into_iter().map(Indicator::MagiskMount));

        for indicator in &indicators {
            log::info!("root indicator: {indicator}");
        }
        RootReport { indicators }
    }

    fn existing<'a>(&'a self, paths: &'a [&'a str]) -> impl Iterator<Item = PathBuf> + 'a {
        paths
            .iter()
            .map(|relative| self.sysroot.join(relative))
            .filter(|path| match fs::symlink_metadata(path) {
                Ok(_) => true,
                Err(err) => {
                    if err.kind() != io::ErrorKind::NotFound {
                        log::debug!("cannot stat {}: {err}", path.display());
                    }
                    false
                }
            })
    }

    fn read(&self, relative: &str) -> Option<String> {
        let path = self.sysroot.join(relative);
        match fs::read(&path) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) => {
                log::debug!("cannot read {}: {err}", path.display());
                None
            }
        }
    }

    fn has_test_keys(&self) -> bool {
        let Some(props) = self.read(BUILD_PROP) else {
            return false;
        };
        props
            .lines()
            .filter_map(|line| line.trim().split_once('='))
            .filter(|(key, _)| key.trim() == "ro.build.tags")
            .any(|(_, value)| value.split(',').any(|tag| tag.trim() == "test-keys"))
    }

    fn magisk_mounts(&self) -> Vec<String> {
        let Some(mounts) = self.read(MOUNTS) else {
            return Vec::new();
        };
        mounts
            .lines()
            .filter(|line| {
                // source, target, fstype, options: the fstype is not checked.
                line.split_whitespace()
                    .take(4)
                    .enumerate()
                    .filter(|(index, _)| *index != 2)
                    .any(|(_, field)| field.to_ascii_lowercase().contains("magisk"))
            })
            .map(str::to_string)
            .collect()
    }
}

/// Runs every probe against the configured sysroot, regardless of the detection mode.
pub fn scan() -> RootReport {
    RootDetector::new(config::config().sysroot).scan()
}

/// Reports whether the device looks rooted.
///
/// Always `false` while detection is disabled, which is the default.
pub fn is_rooted() -> bool {
    let config = config::config();
    match config.mode {
        DetectionMode::Disabled => false,
        DetectionMode::Enabled => RootDetector::new(config.sysroot).scan().is_rooted(),
    }
}

/// Reports whether the device looks rooted.
///
/// Panics inside detection are contained and reported as "not rooted".
#[unsafe(no_mangle)]
pub extern "C" fn volumemixer_is_rooted() -> bool {
    guarded_is_rooted()
}

pub(crate) fn guarded_is_rooted() -> bool {
    std::panic::catch_unwind(AssertUnwindSafe(is_rooted)).unwrap_or_else(|_| {
        log::error!("panic during root detection");
        false
    })
}
