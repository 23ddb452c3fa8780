use std::os::raw::{c_char, c_int, c_void};

use libloading::Library;

use crate::error::Result;

pub(crate) type ServiceNewFn = unsafe extern "C" fn() -> *mut c_void;
pub(crate) type GenerateFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> c_int;
pub(crate) type GetCipherTextFn = unsafe extern "C" fn(*mut c_void) -> *mut c_char;
pub(crate) type ExecuteFn = unsafe extern "C" fn(*mut c_void, *const c_char, u64) -> *mut c_char;
pub(crate) type VerifyFn = unsafe extern "C" fn(*mut c_void, *const c_char, u64) -> *mut c_char;
pub(crate) type ServiceDelFn = unsafe extern "C" fn(*mut c_void);
pub(crate) type StrDelFn = unsafe extern "C" fn(*mut c_char);

/// The engine's entry points, resolved once when the library is opened.
pub(crate) struct FunctionTable {
    pub service_new: ServiceNewFn,
    pub generate: GenerateFn,
    pub get_cipher_text: GetCipherTextFn,
    pub execute: ExecuteFn,
    pub verify: VerifyFn,
    pub service_del: ServiceDelFn,
    pub str_del: StrDelFn,
}

impl FunctionTable {
    /// Resolves every entry point, failing if any symbol is missing.
    pub(crate) fn resolve(library: &Library) -> Result<Self> {
        unsafe {
            Ok(Self {
                service_new: *library.get(b"service_new")?,
                generate: *library.get(b"generate")?,
                get_cipher_text: *library.get(b"get_cipher_text")?,
                execute: *library.get(b"execute")?,
                verify: *library.get(b"verify")?,
                service_del: *library.get(b"service_del")?,
                str_del: *library.get(b"str_del")?,
            })
        }
    }
}
