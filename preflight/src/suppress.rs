use std::io;

/// Scoped redirect of stdout and stderr to /dev/null.
///
/// The native engines print progress to the process's standard streams,
/// which would corrupt the single JSON verdict this binary emits. The
/// guard duplicates both descriptors, points them at /dev/null, and
/// restores the originals on drop, on every exit path. Under verbose
/// diagnostics the guard is a no-op so engine output stays visible.
pub struct OutputSuppression {
    saved: Option<SavedFds>,
}

struct SavedFds {
    stdout: i32,
    stderr: i32,
}

impl OutputSuppression {
    pub fn new(verbose: bool) -> io::Result<Self> {
        if verbose {
            return Ok(Self { saved: None });
        }
        unsafe {
            let stdout = libc::dup(libc::STDOUT_FILENO);
            if stdout < 0 {
                return Err(io::Error::last_os_error());
            }
            let stderr = libc::dup(libc::STDERR_FILENO);
            if stderr < 0 {
                let err = io::Error::last_os_error();
                libc::close(stdout);
                return Err(err);
            }
            let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
            if devnull < 0 {
                let err = io::Error::last_os_error();
                libc::close(stdout);
                libc::close(stderr);
                return Err(err);
            }
            libc::dup2(devnull, libc::STDOUT_FILENO);
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
            Ok(Self {
                saved: Some(SavedFds { stdout, stderr }),
            })
        }
    }
}

impl Drop for OutputSuppression {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            unsafe {
                libc::dup2(saved.stdout, libc::STDOUT_FILENO);
                libc::dup2(saved.stderr, libc::STDERR_FILENO);
                libc::close(saved.stdout);
                libc::close(saved.stderr);
            }
        }
    }
}
