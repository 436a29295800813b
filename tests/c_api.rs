use std::ffi::{CStr, CString, c_void};
use std::fs;
use std::path::Path;
use std::ptr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use volumemixer::config::{volumemixer_config_init, volumemixer_config_t, volumemixer_configure};
use volumemixer::error::{volumemixer_error_free, volumemixer_error_message, volumemixer_error_t};
use volumemixer::logging::{
    volumemixer_log_config_init, volumemixer_log_config_t, volumemixer_log_init,
    volumemixer_log_level_t, volumemixer_log_record_t,
};
use volumemixer::root::volumemixer_is_rooted;
use volumemixer::{Config, DetectionMode};

// The configuration and logger are process-wide.
static SERIAL: Mutex<()> = Mutex::new(());
static RECORDS: Mutex<Vec<String>> = Mutex::new(Vec::new());
static RECONFIGURED: AtomicBool = AtomicBool::new(false);

fn error_message(error: *mut volumemixer_error_t) -> String {
    assert!(!error.is_null());
    let message = unsafe { CStr::from_ptr(volumemixer_error_message(error)) }
        .to_string_lossy()
        .into_owned();
    volumemixer_error_free(error);
    message
}

fn configure(enabled: bool, sysroot: &Path) {
    let sysroot = CString::new(sysroot.to_str().unwrap()).unwrap();
    let mut config = volumemixer_config_t {
        root_detection: false,
        sysroot: ptr::null(),
    };
    volumemixer_config_init(&mut config);
    config.root_detection = enabled;
    config.sysroot = sysroot.as_ptr();

    let mut error = ptr::null_mut();
    assert!(volumemixer_configure(&config, &mut error));
    assert!(error.is_null());
}

fn reset() {
    let mut config = volumemixer_config_t {
        root_detection: true,
        sysroot: ptr::null(),
    };
    volumemixer_config_init(&mut config);
    let mut error = ptr::null_mut();
    assert!(volumemixer_configure(&config, &mut error));
}

#[test]
fn disabled_detection_ignores_su_binary() {
    let _guard = SERIAL.lock().unwrap_or_else(|err| err.into_inner());
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("system/xbin")).unwrap();
    fs::write(root.path().join("system/xbin/su"), b"").unwrap();

    configure(false, root.path());
    assert!(!volumemixer_is_rooted());

    configure(true, root.path());
    assert!(volumemixer_is_rooted());
    reset();
}

#[test]
fn enabled_detection_on_clean_tree() {
    let _guard = SERIAL.lock().unwrap_or_else(|err| err.into_inner());
    let root = tempfile::tempdir().unwrap();

    configure(true, root.path());
    assert!(!volumemixer_is_rooted());
    assert!(volumemixer::root::scan().indicators.is_empty());
    reset();
}

#[test]
fn forced_scan_ignores_disabled_mode() {
    let _guard = SERIAL.lock().unwrap_or_else(|err| err.into_inner());
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("sbin")).unwrap();
    fs::write(root.path().join("sbin/su"), b"").unwrap();

    configure(false, root.path());
    let report = volumemixer::root::scan();
    assert_eq!(
        report.indicators,
        vec![volumemixer::Indicator::SuBinary(root.path().join("sbin/su"))]
    );
    assert!(!volumemixer::is_rooted());
    assert!(!volumemixer_is_rooted());
    reset();
}

#[test]
fn mode_change_keeps_concurrent_sysroot() {
    let _guard = SERIAL.lock().unwrap_or_else(|err| err.into_inner());
    for round in 0..500 {
        let sysroot = Path::new("/tmp").join(format!("root{round}"));
        volumemixer::config::set_config(Config {
            mode: DetectionMode::Disabled,
            sysroot: "/".into(),
        });

        let toggler = thread::spawn(|| {
            volumemixer::config::set_detection_mode(DetectionMode::Enabled);
        });
        let expected = sysroot.clone();
        let writer = thread::spawn(move || {
            volumemixer::config::set_config(Config {
                mode: DetectionMode::Enabled,
                sysroot: expected,
            });
        });
        toggler.join().unwrap();
        writer.join().unwrap();

        let config = volumemixer::config::config();
        assert_eq!(config.sysroot, sysroot, "round {round}");
        assert_eq!(config.mode, DetectionMode::Enabled);
    }
    reset();
}

#[test]
fn null_config_is_rejected() {
    let mut error = ptr::null_mut();
    assert!(!volumemixer_configure(ptr::null(), &mut error));
    assert_eq!(error_message(error), "config was null");
}

#[test]
fn empty_sysroot_is_rejected() {
    let _guard = SERIAL.lock().unwrap_or_else(|err| err.into_inner());
    let before = volumemixer::config::config();
    let config = volumemixer_config_t {
        root_detection: true,
        sysroot: c"".as_ptr(),
    };
    let mut error = ptr::null_mut();
    assert!(!volumemixer_configure(&config, &mut error));
    assert_eq!(error_message(error), "invalid sysroot: path was empty");
    assert_eq!(volumemixer::config::config(), before);
}

extern "C" fn collect(record: *const volumemixer_log_record_t, _user_data: *mut c_void) {
    let record = unsafe { &*record };
    let message = unsafe { CStr::from_ptr(record.message) }.to_string_lossy().into_owned();
    RECORDS.lock().unwrap_or_else(|err| err.into_inner()).push(message);
}

extern "C" fn reconfigure(_record: *const volumemixer_log_record_t, _user_data: *mut c_void) {
    if RECONFIGURED.swap(true, Ordering::SeqCst) {
        return;
    }
    let mut error = ptr::null_mut();
    assert!(volumemixer_log_init(ptr::null(), &mut error));
}

#[test]
fn log_callback_may_reconfigure_logging() {
    let _guard = SERIAL.lock().unwrap_or_else(|err| err.into_inner());
    let mut log_config = volumemixer_log_config_t {
        level: volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_OFF,
        filter: ptr::null(),
        callback: None,
        user_data: ptr::null_mut(),
    };
    volumemixer_log_config_init(&mut log_config);
    log_config.filter = c"volumemixer=info".as_ptr();
    log_config.callback = Some(reconfigure);

    let mut error = ptr::null_mut();
    assert!(volumemixer_log_init(&log_config, &mut error));

    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("data/adb/modules")).unwrap();
    let report = volumemixer::RootDetector::new(root.path()).scan();

    assert!(report.is_rooted());
    assert!(RECONFIGURED.load(Ordering::SeqCst));
}

#[test]
fn log_callback_receives_detection_records() {
    let _guard = SERIAL.lock().unwrap_or_else(|err| err.into_inner());
    let mut log_config = volumemixer_log_config_t {
        level: volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_OFF,
        filter: ptr::null(),
        callback: None,
        user_data: ptr::null_mut(),
    };
    volumemixer_log_config_init(&mut log_config);
    log_config.filter = c"volumemixer=info".as_ptr();
    log_config.callback = Some(collect);

    let mut error = ptr::null_mut();
    assert!(volumemixer_log_init(&log_config, &mut error));
    assert!(error.is_null());

    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("data/adb/modules")).unwrap();
    configure(true, root.path());
    assert!(volumemixer_is_rooted());
    reset();

    let records = RECORDS.lock().unwrap_or_else(|err| err.into_inner());
    assert!(
        records
            .iter()
            .any(|message| message.starts_with("root indicator: magisk artifact at"))
    );
}

#[test]
fn invalid_log_filter_is_reported() {
    let _guard = SERIAL.lock().unwrap_or_else(|err| err.into_inner());
    let mut log_config = volumemixer_log_config_t {
        level: volumemixer_log_level_t::VOLUMEMIXER_LOG_LEVEL_INFO,
        filter: ptr::null(),
        callback: None,
        user_data: ptr::null_mut(),
    };
    volumemixer_log_config_init(&mut log_config);
    log_config.filter = c"volumemixer=chatty".as_ptr();

    let mut error = ptr::null_mut();
    assert!(!volumemixer_log_init(&log_config, &mut error));
    assert_eq!(
        error_message(error),
        "invalid log filter `volumemixer=chatty`: unknown level `chatty`"
    );
}
