//! JNI entry points for `com.volumemixer.jni.NativeLib`.
//!
//! Errors are raised as Java exceptions and panics are contained at the
//! boundary; every entry point returns a neutral value when it fails.

use std::panic::AssertUnwindSafe;
use std::ptr;

use jni::JNIEnv;
use jni::objects::{JObject, JString};
use jni::sys::{JNI_FALSE, JNI_TRUE, jboolean, jint, jobjectArray, jstring};

use crate::config::{self, DetectionMode};
use crate::error::{Error, Result};
use crate::logging;
use crate::root;
use crate::version::version;

fn throw(env: &mut JNIEnv, err: &Error) {
    if env.exception_check().unwrap_or(false) {
        return;
    }
    if let Err(throw_err) = env.throw_new(err.java_class(), err.to_string()) {
        log::error!("failed to raise {}: {throw_err}", err.java_class());
    }
}

fn guard<'local, T>(
    env: &mut JNIEnv<'local>,
    name: &'static str,
    fallback: T,
    f: impl FnOnce(&mut JNIEnv<'local>) -> Result<T>,
) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(|| f(&mut *env))) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            log::warn!("{name} failed: {err}");
            throw(env, &err);
            fallback
        }
        Err(_) => {
            let err = Error::Panic(name);
            log::error!("{err}");
            throw(env, &err);
            fallback
        }
    }
}

fn to_jboolean(value: bool) -> jboolean {
    if value { JNI_TRUE } else { JNI_FALSE }
}

/// `external fun isRooted(): Boolean`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_volumemixer_jni_NativeLib_isRooted(
    _env: JNIEnv,
    _this: JObject,
) -> jboolean {
    to_jboolean(root::guarded_is_rooted())
}

/// `external fun getVersion(): String`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_volumemixer_jni_NativeLib_getVersion(
    mut env: JNIEnv,
    _this: JObject,
) -> jstring {
    guard(&mut env, "getVersion", ptr::null_mut(), |env| {
        Ok(env.new_string(version())?.into_raw())
    })
}

/// `external fun setRootDetectionEnabled(enabled: Boolean)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_volumemixer_jni_NativeLib_setRootDetectionEnabled(
    mut env: JNIEnv,
    _this: JObject,
    enabled: jboolean,
) {
    guard(&mut env, "setRootDetectionEnabled", (), |_| {
        config::set_detection_mode(DetectionMode::from(enabled != JNI_FALSE));
        Ok(())
    })
}

/// `external fun scanRootIndicators(): Array<String>`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_volumemixer_jni_NativeLib_scanRootIndicators(
    mut env: JNIEnv,
    _this: JObject,
) -> jobjectArray {
    guard(&mut env, "scanRootIndicators", ptr::null_mut(), |env| {
        let report = root::scan();
        let array = env.new_object_array(
            report.indicators.len() as jint,
            "java/lang/String",
            JObject::null(),
        )?;
        for (index, indicator) in report.indicators.iter().enumerate() {
            let value = JObject::from(env.new_string(indicator.to_string())?);
            env.set_object_array_element(&array, index as jint, &value)?;
            env.delete_local_ref(value)?;
        }
        Ok(array.into_raw())
    })
}

/// `external fun initLogging(level: Int, filter: String?): Boolean`
///
/// `level` uses the 0 (off) to 5 (trace) scale. A non-null `filter` takes
/// `RUST_LOG` syntax and wins over `level`.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_volumemixer_jni_NativeLib_initLogging(
    mut env: JNIEnv,
    _this: JObject,
    level: jint,
    filter: JString,
) -> jboolean {
    guard(&mut env, "initLogging", JNI_FALSE, |env| {
        let filter = if filter.is_null() {
            None
        } else {
            Some(String::from(env.get_string(&filter)?))
        };
        logging::init(filter.as_deref(), logging::level_from_int(level))?;
        Ok(JNI_TRUE)
    })
}
