//! Panic containment at the bridge boundary
//!
//! Script code runs inside the host's frame loop; a panic in one script
//! must not unwind into the host.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run `f`, converting a panic into its message
pub fn catch_panic<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_panic_passes_value() {
        assert_eq!(catch_panic(|| 21 * 2), Ok(42));
    }

    #[test]
    fn test_panic_message_is_captured() {
        let result: Result<(), String> = catch_panic(|| panic!("script exploded"));
        assert_eq!(result.unwrap_err(), "script exploded");

        let id = 7;
        let result: Result<(), String> = catch_panic(|| panic!("entity {} exploded", id));
        assert_eq!(result.unwrap_err(), "entity 7 exploded");
    }
}
