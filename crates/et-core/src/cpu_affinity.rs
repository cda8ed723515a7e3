//! Thread-to-core pinning for the dispatcher worker.
//!
//! The dispatcher is the only thread besides the event loop; pinning it keeps
//! the send path off cores shared with the transport's I/O.

use tracing::{info, warn};

/// Pin the calling thread to `core` if one is configured.
///
/// Returns `true` only when a binding was actually applied. Negative or
/// out-of-range core ids are reported and ignored.
pub fn pin_current_thread(label: &str, core: Option<i32>) -> bool {
    let Some(core) = core else {
        return false;
    };
    let Ok(idx) = usize::try_from(core) else {
        warn!("[{label}] ignoring negative CPU core {core}");
        return false;
    };

    let cores = core_affinity::get_core_ids().unwrap_or_default();
    match cores.get(idx) {
        Some(id) if core_affinity::set_for_current(*id) => {
            info!("[{label}] pinned to CPU core {idx}");
            true
        }
        Some(_) => {
            warn!("[{label}] OS rejected pinning to CPU core {idx}");
            false
        }
        None => {
            warn!("[{label}] CPU core {idx} not available ({} cores)", cores.len());
            false
        }
    }
}
