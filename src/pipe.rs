#[cfg(target_os = "linux")]
use log::info;
use log::warn;

/// Minimum pipe buffer size (4KB = one page, the kernel minimum).
#[cfg(target_os = "linux")]
const TARGET_PIPE_SIZE: i32 = 4096;

/// Shrink a pipe's kernel buffer to `TARGET_PIPE_SIZE` bytes.
///
/// The default 64KB per pipe adds tens of milliseconds of hidden buffering
/// between this process and its audio subprocesses. Failures are non-fatal.
#[cfg(target_os = "linux")]
pub fn shrink_pipe_buffer(fd: std::os::unix::io::RawFd, label: &str) {
    const F_SETPIPE_SZ: libc::c_int = 1031;
    const F_GETPIPE_SZ: libc::c_int = 1032;

    let old_size = unsafe { libc::fcntl(fd, F_GETPIPE_SZ) };
    let ret = unsafe { libc::fcntl(fd, F_SETPIPE_SZ, TARGET_PIPE_SIZE) };
    if ret < 0 {
        warn!(
            "Could not shrink {} pipe (fd={}) from {} to {}: errno={}",
            label,
            fd,
            old_size,
            TARGET_PIPE_SIZE,
            std::io::Error::last_os_error()
        );
    } else {
        info!(
            "Shrunk {} pipe (fd={}) from {} to {} bytes",
            label, fd, old_size, ret
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn shrink_pipe_buffer(_fd: i32, label: &str) {
    warn!("{label}: pipe buffer tuning not supported on this platform");
}
