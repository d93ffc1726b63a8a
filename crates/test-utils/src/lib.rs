//! Shared test utilities for the hrrr-slicer workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic GRIB2 objects with matching `.idx` inventories
//! - Scratch directory helpers
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use paths::*;

/// Assert that a sequence of integers is strictly increasing.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_strictly_increasing;
///
/// assert_strictly_increasing!(vec![1, 2, 5]);
/// ```
#[macro_export]
macro_rules! assert_strictly_increasing {
    ($values:expr) => {{
        let values: Vec<i64> = $values.into_iter().map(|v| v as i64).collect();
        for pair in values.windows(2) {
            if pair[0] >= pair[1] {
                panic!(
                    "assertion failed: sequence not strictly increasing at {:?}\n  values: {:?}",
                    pair, values
                );
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_strictly_increasing_passes() {
        assert_strictly_increasing!(vec![1u32, 2, 3, 10]);
        assert_strictly_increasing!(Vec::<u32>::new());
    }

    #[test]
    #[should_panic(expected = "not strictly increasing")]
    fn test_strictly_increasing_fails_on_duplicate() {
        assert_strictly_increasing!(vec![1u32, 2, 2]);
    }
}
