use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use nix::sys::signal::{self, SigHandler, Signal};

static CANCEL: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Route SIGINT and SIGTERM to a cancellation flag.
///
/// Only the first flag registered in a process is used; later calls
/// reinstall the handlers but keep that flag.
pub fn install_cancel_handler(flag: Arc<AtomicBool>) -> nix::Result<()> {
    let _ = CANCEL.set(flag);

    // SAFETY: the handler only performs an atomic store.
    unsafe {
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_cancel))?;
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_cancel))?;
    }

    Ok(())
}

extern "C" fn handle_cancel(_: i32) {
    if let Some(flag) = CANCEL.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

/// Whether a cancellation signal has been received.
pub fn cancel_requested() -> bool {
    CANCEL
        .get()
        .map_or(false, |flag| flag.load(Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_cancel_handler() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(install_cancel_handler(flag.clone()).is_ok());

        handle_cancel(Signal::SIGINT as i32);
        assert!(cancel_requested());
        assert!(CANCEL.get().unwrap().load(Ordering::SeqCst));
    }
}
