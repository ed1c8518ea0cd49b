//! Silences ALSA's chatter on stderr while cpal probes devices.
//!
//! ALSA prints configuration warnings straight to fd 2, which would tear
//! through the alternate screen. Other platforms run the closure unchanged.

#[cfg(target_os = "linux")]
pub(crate) fn with_stderr_silenced<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    use std::fs::OpenOptions;
    use std::os::unix::io::AsRawFd;

    let Ok(dev_null) = OpenOptions::new().write(true).open("/dev/null") else {
        tracing::debug!("Could not open /dev/null; ALSA warnings stay visible");
        return f();
    };

    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved == -1 {
        return f();
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(saved) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn with_stderr_silenced<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    f()
}
