use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::path::Path;

use libloading::Library;

use crate::bindings::FunctionTable;
use crate::error::Result;

/// A loaded matrix-multiplication challenge engine.
pub struct DmCompVerify {
    functions: FunctionTable,
    // Keeps the symbols in `functions` alive.
    _library: Library,
}

impl DmCompVerify {
    /// Opens the shared library at `path` and resolves all entry points.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let library = unsafe { Library::new(path.as_ref())? };
        let functions = FunctionTable::resolve(&library)?;
        Ok(Self {
            functions,
            _library: library,
        })
    }

    /// Creates a new native verifier with the given initial dimensions.
    ///
    /// The returned handle is exclusively owned by the caller and is freed
    /// exactly once when dropped, on every exit path.
    pub fn new_verifier(&self, dim_n: i64, dim_k: i64) -> Verifier<'_> {
        let handle = unsafe { (self.functions.new)(dim_n, dim_k) };
        Verifier { lib: self, handle }
    }
}

/// One native verifier handle.
pub struct Verifier<'lib> {
    lib: &'lib DmCompVerify,
    handle: *mut c_void,
}

impl Verifier<'_> {
    /// Reconfigures the verifier's matrix dimensions.
    pub fn set_dimension(&self, dim_n: i64, dim_k: i64) {
        unsafe { (self.lib.functions.set_dimension)(self.handle, dim_n, dim_k) }
    }

    /// Generates a challenge binding the seed, machine info and correlation
    /// token together inside the engine.
    pub fn generate_challenge(&self, seed: i64, machine_info: &str, token: &str) -> Result<()> {
        let machine_info = CString::new(machine_info)?;
        let token = CString::new(token)?;
        unsafe {
            (self.lib.functions.generate_challenge)(
                self.handle,
                seed,
                machine_info.as_ptr(),
                token.as_ptr(),
            )
        };
        Ok(())
    }

    /// Returns the cipher text produced by `generate_challenge`, or `None`
    /// when the engine produced nothing.
    pub fn cipher_text(&self) -> Result<Option<String>> {
        let ptr = unsafe { (self.lib.functions.get_cipher_text)(self.handle) };
        decode_borrowed(ptr)
    }

    /// Feeds the cipher text back to the engine, which performs the GPU
    /// matrix multiplication.
    pub fn process_challenge_result(&self, seed: i64, cipher_text: &str) -> Result<()> {
        let cipher_text = CString::new(cipher_text)?;
        unsafe {
            (self.lib.functions.process_challenge_result)(self.handle, seed, cipher_text.as_ptr())
        };
        Ok(())
    }

    /// Returns the correlation token recovered by the computation, or
    /// `None` when the engine produced nothing.
    pub fn returned_uuid(&self) -> Result<Option<String>> {
        let ptr = unsafe { (self.lib.functions.get_uuid)(self.handle) };
        decode_borrowed(ptr)
    }
}

impl Drop for Verifier<'_> {
    fn drop(&mut self) {
        unsafe { (self.lib.functions.free)(self.handle) }
    }
}

/// Copies a handle-owned C string out of the engine. Null and empty
/// buffers both mean "nothing produced".
fn decode_borrowed(ptr: *const c_char) -> Result<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let decoded = unsafe { CStr::from_ptr(ptr) }.to_str()?;
    if decoded.is_empty() {
        Ok(None)
    } else {
        Ok(Some(decoded.to_owned()))
    }
}
