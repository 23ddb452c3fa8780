use thiserror::Error;

pub type Result<T> = std::result::Result<T, VerifyxError>;

#[derive(Debug, Error)]
pub enum VerifyxError {
    /// The shared library could not be opened or is missing an entry point.
    #[error("Failed to load library: {0}")]
    LibraryLoad(#[from] libloading::Error),

    /// A string argument contained an interior NUL byte.
    #[error("Invalid FFI string argument: {0}")]
    NulArgument(#[from] std::ffi::NulError),

    /// The engine returned a buffer that was not valid UTF-8.
    #[error("Invalid UTF-8 in string returned by the library: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}
