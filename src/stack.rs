//! Native stack growth for the recursive parser and evaluator.
//!
//! Deeply nested programs recurse once per nesting level. Wrapping each level
//! in [`ensure_sufficient_stack`] lets `stacker` move onto a freshly allocated
//! segment before the host stack runs out, so the evaluator's own depth limit
//! is what stops runaway recursion.

/// If less than this much stack remains, grow before recursing.
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_recursion() {
        fn deep_recurse(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { deep_recurse(n - 1) + 1 })
        }

        // Would overflow a 2MB test thread stack without growth
        assert_eq!(deep_recurse(100_000), 100_000);
    }

    #[test]
    fn test_works_with_result_type() {
        let result: Result<i32, &str> = ensure_sufficient_stack(|| Ok(123));
        assert_eq!(result, Ok(123));
    }
}
