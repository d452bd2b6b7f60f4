//! Assertion macros for measurement tests.

/// Assert that two floating-point values are approximately equal.
///
/// ```rust
/// use torsion_test_helpers::assert_approx_eq;
///
/// assert_approx_eq!(1.0_f64, 1.0001_f64, 0.001_f64);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr $(,)?) => {
        let left = $left;
        let right = $right;
        let tolerance = $tolerance;
        let diff = (left - right).abs();
        if diff > tolerance {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}`,\n  tolerance: `{:?}`",
                left, right, diff, tolerance
            );
        }
    };
    ($left:expr, $right:expr, $tolerance:expr, $($arg:tt)+) => {
        let left = $left;
        let right = $right;
        let tolerance = $tolerance;
        let diff = (left - right).abs();
        if diff > tolerance {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}`,\n  tolerance: `{:?}`: {}",
                left, right, diff, tolerance, format_args!($($arg)+)
            );
        }
    };
}

/// Assert that two float slices match element-wise within a tolerance.
///
/// ```rust
/// use torsion_test_helpers::assert_angles_eq;
///
/// assert_angles_eq!(&[350.0, 365.0], &[350.0, 365.0000001], 1e-6);
/// ```
#[macro_export]
macro_rules! assert_angles_eq {
    ($actual:expr, $expected:expr, $tolerance:expr $(,)?) => {
        let actual: &[f64] = $actual;
        let expected: &[f64] = $expected;
        let tolerance: f64 = $tolerance;
        if actual.len() != expected.len() {
            panic!(
                "assertion failed: length mismatch\n  actual: `{:?}`,\n expected: `{:?}`",
                actual, expected
            );
        }
        for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
            if (a - e).abs() > tolerance {
                panic!(
                    "assertion failed: element {} differs\n  actual: `{:?}`,\n expected: `{:?}`,\n  tolerance: `{:?}`",
                    i, actual, expected, tolerance
                );
            }
        }
    };
}

/// Assert that a sequence never decreases.
///
/// ```rust
/// use torsion_test_helpers::assert_non_decreasing;
///
/// assert_non_decreasing!(&[1.0, 1.0, 2.5]);
/// ```
#[macro_export]
macro_rules! assert_non_decreasing {
    ($collection:expr $(,)?) => {
        let collection = $collection;
        let mut iter = collection.iter();
        if let Some(mut prev) = iter.next() {
            for (i, curr) in iter.enumerate() {
                if prev > curr {
                    panic!(
                        "assertion failed: sequence decreases\n  at index {}: {:?} > {:?}",
                        i + 1, prev, curr
                    );
                }
                prev = curr;
            }
        }
    };
}

/// Assert that a value lies within an inclusive range.
///
/// ```rust
/// use torsion_test_helpers::assert_in_range;
///
/// assert_in_range!(0.05, -0.1, 0.1);
/// ```
#[macro_export]
macro_rules! assert_in_range {
    ($value:expr, $min:expr, $max:expr $(,)?) => {
        let value = $value;
        let min = $min;
        let max = $max;
        if value < min || value > max {
            panic!(
                "assertion failed: `{:?}` not in range [{:?}, {:?}]",
                value, min, max
            );
        }
    };
}
