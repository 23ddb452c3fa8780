use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::path::Path;

use libloading::Library;

use crate::bindings::FunctionTable;
use crate::error::Result;

/// A loaded RAM/storage/network exercise engine.
pub struct VerifyX {
    functions: FunctionTable,
    // Keeps the symbols in `functions` alive.
    _library: Library,
}

impl VerifyX {
    /// Opens the shared library at `path` and resolves all entry points.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let library = unsafe { Library::new(path.as_ref())? };
        let functions = FunctionTable::resolve(&library)?;
        Ok(Self {
            functions,
            _library: library,
        })
    }

    /// Creates a new native service handle, released exactly once on drop.
    pub fn new_service(&self) -> Service<'_> {
        let handle = unsafe { (self.functions.service_new)() };
        Service { lib: self, handle }
    }
}

/// One native service handle.
pub struct Service<'lib> {
    lib: &'lib VerifyX,
    handle: *mut c_void,
}

impl Service<'_> {
    /// Generates a challenge from the JSON challenge input. Returns `true`
    /// when the engine reports success (return code zero).
    pub fn generate_challenge(&self, input_json: &str) -> Result<bool> {
        let input_json = CString::new(input_json)?;
        let rc = unsafe { (self.lib.functions.generate)(self.handle, input_json.as_ptr()) };
        Ok(rc == 0)
    }

    /// Returns the generated cipher text, or `None` when the engine
    /// produced nothing.
    pub fn cipher_text(&self) -> Result<Option<String>> {
        let ptr = unsafe { (self.lib.functions.get_cipher_text)(self.handle) };
        self.take_owned(ptr)
    }

    /// Executes the challenge, running the actual RAM/storage/network
    /// exercises inside the engine. Returns the result cipher, or `None`
    /// on failure.
    pub fn execute(&self, cipher_text: &str, seed: u64) -> Result<Option<String>> {
        let cipher_text = CString::new(cipher_text)?;
        let ptr = unsafe { (self.lib.functions.execute)(self.handle, cipher_text.as_ptr(), seed) };
        self.take_owned(ptr)
    }

    /// Verifies the result cipher. Returns the engine's JSON verification
    /// report, or `None` when no report was produced.
    pub fn verify(&self, result_cipher: &str, seed: u64) -> Result<Option<String>> {
        let result_cipher = CString::new(result_cipher)?;
        let ptr =
            unsafe { (self.lib.functions.verify)(self.handle, result_cipher.as_ptr(), seed) };
        self.take_owned(ptr)
    }

    /// Copies an engine-owned string and releases the native buffer through
    /// `str_del`. The buffer is released even when it is not valid UTF-8.
    fn take_owned(&self, ptr: *mut c_char) -> Result<Option<String>> {
        if ptr.is_null() {
            return Ok(None);
        }
        let decoded = unsafe { CStr::from_ptr(ptr) }
            .to_str()
            .map(ToOwned::to_owned);
        unsafe { (self.lib.functions.str_del)(ptr) };
        let decoded = decoded?;
        if decoded.is_empty() {
            Ok(None)
        } else {
            Ok(Some(decoded))
        }
    }
}

impl Drop for Service<'_> {
    fn drop(&mut self) {
        unsafe { (self.lib.functions.service_del)(self.handle) }
    }
}
