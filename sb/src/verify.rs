//! Linear sortedness check run after a sort

use std::cmp::Ordering;

use thiserror::Error;

/// First adjacent pair found out of order
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("elements out of order at index {index}: {left} > {right}")]
pub struct Unsorted {
    pub index: usize,
    pub left: f64,
    pub right: f64,
}

/// Check that `data` is non-descending under the IEEE-754 total order
pub fn check_sorted(data: &[f64]) -> Result<(), Unsorted> {
    match data
        .windows(2)
        .position(|pair| pair[0].total_cmp(&pair[1]) == Ordering::Greater)
    {
        Some(index) => Err(Unsorted {
            index,
            left: data[index],
            right: data[index + 1],
        }),
        None => Ok(()),
    }
}

pub fn is_sorted(data: &[f64]) -> bool {
    check_sorted(data).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_inputs() {
        assert!(is_sorted(&[]));
        assert!(is_sorted(&[1.0]));
        assert!(is_sorted(&[1.0, 1.0, 2.0, 3.5]));
        assert!(is_sorted(&[f64::NEG_INFINITY, -0.0, 0.0, f64::NAN]));
    }

    #[test]
    fn test_reports_first_offending_pair() {
        let err = check_sorted(&[1.0, 3.0, 2.0, 0.0]).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.left, 3.0);
        assert_eq!(err.right, 2.0);
        assert_eq!(err.to_string(), "elements out of order at index 1: 3 > 2");
    }
}
