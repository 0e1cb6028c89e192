//! Median-of-three Hoare partitioning and the insertion-sort fallback
//!
//! Both functions touch only the slice they are given: no locking, no
//! allocation, no I/O. Comparisons use the IEEE-754 total order, so NaN and
//! signed zeros land in a fixed position instead of breaking the scan.

use std::cmp::Ordering;

#[inline]
fn less(a: f64, b: f64) -> bool {
    a.total_cmp(&b) == Ordering::Less
}

#[inline]
fn greater(a: f64, b: f64) -> bool {
    a.total_cmp(&b) == Ordering::Greater
}

/// Split `a` around the median of its first, middle and last elements
///
/// Returns `p` with `0 < p < a.len()` such that every element of `a[..p]`
/// is <= the pivot and every element of `a[p..]` is >= the pivot.
///
/// # Panics
///
/// If `a` has fewer than three elements.
pub fn partition(a: &mut [f64]) -> usize {
    let n = a.len();
    assert!(n >= 3, "partition needs at least 3 elements, got {}", n);

    let (first, middle, last) = (0, n / 2, n - 1);
    if greater(a[first], a[middle]) {
        a.swap(first, middle);
    }
    if greater(a[middle], a[last]) {
        a.swap(middle, last);
    }
    if greater(a[first], a[middle]) {
        a.swap(first, middle);
    }

    // a[first] <= pivot <= a[last] stop both scans before they leave the slice
    let pivot = a[middle];
    let (mut i, mut j) = (1, n - 2);
    loop {
        while less(a[i], pivot) {
            i += 1;
        }
        while greater(a[j], pivot) {
            j -= 1;
        }
        if i >= j {
            return i;
        }
        a.swap(i, j);
        i += 1;
        j -= 1;
    }
}

/// Stable in-place insertion sort, meant for short ranges
pub fn insertion_sort(a: &mut [f64]) {
    for i in 1..a.len() {
        let mut j = i;
        while j > 0 && greater(a[j - 1], a[j]) {
            a.swap(j, j - 1);
            j -= 1;
        }
    }
}
