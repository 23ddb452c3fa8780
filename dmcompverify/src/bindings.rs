use std::os::raw::{c_char, c_longlong, c_void};

use libloading::Library;

use crate::error::Result;

pub(crate) type NewFn = unsafe extern "C" fn(c_longlong, c_longlong) -> *mut c_void;
pub(crate) type SetDimensionFn = unsafe extern "C" fn(*mut c_void, c_longlong, c_longlong);
pub(crate) type GenerateChallengeFn =
    unsafe extern "C" fn(*mut c_void, c_longlong, *const c_char, *const c_char);
pub(crate) type GetCipherTextFn = unsafe extern "C" fn(*mut c_void) -> *const c_char;
pub(crate) type ProcessChallengeResultFn =
    unsafe extern "C" fn(*mut c_void, c_longlong, *const c_char);
pub(crate) type GetUuidFn = unsafe extern "C" fn(*mut c_void) -> *const c_char;
pub(crate) type FreeFn = unsafe extern "C" fn(*mut c_void);

/// The engine's entry points, resolved once when the library is opened.
///
/// The raw function pointers stay valid for as long as the `Library` they
/// were resolved from is alive; `DmCompVerify` keeps both together.
pub(crate) struct FunctionTable {
    pub new: NewFn,
    pub set_dimension: SetDimensionFn,
    pub generate_challenge: GenerateChallengeFn,
    pub get_cipher_text: GetCipherTextFn,
    pub process_challenge_result: ProcessChallengeResultFn,
    pub get_uuid: GetUuidFn,
    pub free: FreeFn,
}

impl FunctionTable {
    /// Resolves every entry point, failing if any symbol is missing.
    pub(crate) fn resolve(library: &Library) -> Result<Self> {
        unsafe {
            Ok(Self {
                new: *library.get(b"DMCompVerify_new")?,
                set_dimension: *library.get(b"setDimension")?,
                generate_challenge: *library.get(b"generateChallenge")?,
                get_cipher_text: *library.get(b"getCipherText")?,
                process_challenge_result: *library.get(b"processChallengeResult")?,
                get_uuid: *library.get(b"getUUID")?,
                free: *library.get(b"free")?,
            })
        }
    }
}
