//! Process scheduling priority.

use tracing::{info, warn};

/// Set this process's nice value. Failure is logged and otherwise ignored.
#[cfg(unix)]
pub fn set_process_priority(nice: i32) -> bool {
    // SAFETY: setpriority takes plain integers and touches no memory we own.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if rc == 0 {
        info!(nice, "Process priority set");
        true
    } else {
        warn!(nice, error = %std::io::Error::last_os_error(), "Failed to set process priority");
        false
    }
}

/// Set this process's nice value. Unsupported on this platform.
#[cfg(not(unix))]
pub fn set_process_priority(nice: i32) -> bool {
    warn!(nice, "Process priority is not supported on this platform");
    false
}
