//! Scoped "method prefix stack" for user-visible log lines (spec.md §7, §9).
//!
//! Each subsystem pushes its two-character tag on entry and the guard pops
//! it on every exit path (including `?`-propagated errors), so a deeply
//! nested call still prefixes its log lines with the full chain of active
//! tags without threading a context argument through every function.

use std::cell::RefCell;

thread_local! {
    static STACK: RefCell<Vec<&'static str>> = RefCell::new(Vec::new());
}

/// RAII guard that pushes `tag` onto the prefix stack and pops it on drop.
pub struct PrefixGuard {
    _private: (),
}

impl PrefixGuard {
    /// Push `tag` (conventionally two characters, e.g. `"AN"` for annealer,
    /// `"IT"` for iterative calibrator) onto the active prefix stack.
    pub fn push(tag: &'static str) -> Self {
        STACK.with(|s| s.borrow_mut().push(tag));
        Self { _private: () }
    }
}

impl Drop for PrefixGuard {
    fn drop(&mut self) {
        STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

/// Render the current prefix stack as a single joined tag, e.g. `"ANIT"`.
pub fn current_prefix() -> String {
    STACK.with(|s| s.borrow().concat())
}

/// Emit an info-level log line prefixed with the active tag stack.
macro_rules! log_line {
    ($($arg:tt)*) => {{
        log::info!("{}{}", crate::prefix::current_prefix(), format!($($arg)*));
    }};
}

pub(crate) use log_line;
