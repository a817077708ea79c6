//! Console output
//!
//! Every line goes to stdout (or the capture buffer while a redirect is
//! active) and is mirrored to the `log` facade under the `q2vr` target.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::q_shared::{ERR_FATAL, PRINT_ALERT, PRINT_DEVELOPER};

/// Longest message written to the console in one call.
pub const MAXPRINTMSG: usize = 4096;

const LOG_TARGET: &str = "q2vr";

static REDIRECT: Mutex<Option<String>> = Mutex::new(None);
static DEVELOPER: AtomicBool = AtomicBool::new(false);

/// Capture console output until [`com_end_redirect`].
pub fn com_begin_redirect() {
    *REDIRECT.lock() = Some(String::new());
}

pub fn com_end_redirect() -> Option<String> {
    REDIRECT.lock().take()
}

/// Mirror of the `developer` cvar, pushed by the owner of the registry.
pub fn com_set_developer(enabled: bool) {
    DEVELOPER.store(enabled, Ordering::Relaxed);
}

pub fn com_developer() -> bool {
    DEVELOPER.load(Ordering::Relaxed)
}

fn console_write(msg: &str) {
    let mut end = msg.len().min(MAXPRINTMSG);
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    let msg = &msg[..end];

    if let Some(buf) = REDIRECT.lock().as_mut() {
        buf.push_str(msg);
        return;
    }
    print!("{}", msg);
}

pub fn com_printf(msg: &str) {
    log::info!(target: LOG_TARGET, "{}", msg.trim_end());
    console_write(msg);
}

/// Reaches the console only in developer mode; always logged at debug.
pub fn com_dprintf(msg: &str) {
    log::debug!(target: LOG_TARGET, "{}", msg.trim_end());
    if com_developer() {
        console_write(msg);
    }
}

/// Print at `print_level` (`PRINT_ALL`, `PRINT_DEVELOPER` or `PRINT_ALERT`).
pub fn vid_printf(print_level: i32, msg: &str) {
    match print_level {
        PRINT_DEVELOPER => com_dprintf(msg),
        PRINT_ALERT => {
            log::warn!(target: LOG_TARGET, "{}", msg.trim_end());
            console_write(msg);
        }
        _ => com_printf(msg),
    }
}

/// `ERR_FATAL` panics; anything else is reported and the caller recovers.
pub fn com_error(code: i32, msg: &str) {
    log::error!(target: LOG_TARGET, "{}", msg.trim_end());
    if code == ERR_FATAL {
        panic!("Fatal error: {}", msg);
    }
    console_write(&format!("********************\nERROR: {}\n********************\n", msg));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_shared::ERR_DROP;

    // the only test that redirects, since the buffer is process-wide
    #[test]
    fn test_redirect_captures_output() {
        com_begin_redirect();
        com_printf("hello ");
        vid_printf(PRINT_ALERT, "world\n");
        vid_printf(PRINT_DEVELOPER, "hidden\n");
        com_error(ERR_DROP, "dropped");
        com_printf(&"x".repeat(MAXPRINTMSG + 10));
        let out = com_end_redirect().unwrap_or_default();
        assert!(out.contains("hello "));
        assert!(out.contains("world\n"));
        assert!(!out.contains("hidden"));
        assert!(out.contains("ERROR: dropped"));
        assert!(out.contains(&"x".repeat(MAXPRINTMSG)));
        assert!(!out.contains(&"x".repeat(MAXPRINTMSG + 1)));
        assert!(com_end_redirect().is_none());
    }

    #[test]
    #[should_panic(expected = "Fatal error")]
    fn test_com_error_fatal_panics() {
        com_error(ERR_FATAL, "stack underflow");
    }
}
