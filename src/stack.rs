//! Stack safety for deep recursion
//!
//! Lexing nested enclosures, parsing and evaluating nested trees
//! all recurse. Wrap those paths in [`ensure_sufficient_stack`] so deep but
//! valid input grows the stack instead of overflowing it.

/// If less than this much stack remains, grow it
const RED_ZONE: usize = 100 * 1024;

/// Size of each stack segment added on growth
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the native stack first when it runs low
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: usize) -> usize {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn test_deep_recursion_grows_stack() {
        assert_eq!(depth(200_000), 200_000);
    }
}
