//! Random input generation

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{SortError, SortResult};

/// `len` values drawn uniformly from `[0, 1)`
///
/// The same `seed` always produces the same values. Without a seed the
/// generator is seeded from the operating system.
pub fn random_values(len: usize, seed: Option<u64>) -> SortResult<Vec<f64>> {
    debug!(len, ?seed, "random_values: called");
    let mut values = Vec::new();
    values.try_reserve_exact(len).map_err(|source| SortError::Allocation {
        what: "input array",
        len,
        source,
    })?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    values.extend((0..len).map(|_| rng.random::<f64>()));
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_in_unit_interval() {
        let values = random_values(1000, Some(1)).unwrap();
        assert_eq!(values.len(), 1000);
        assert!(values.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_seed_is_reproducible() {
        assert_eq!(random_values(64, Some(42)).unwrap(), random_values(64, Some(42)).unwrap());
        assert_ne!(random_values(64, Some(42)).unwrap(), random_values(64, Some(43)).unwrap());
    }

    #[test]
    fn test_empty() {
        assert!(random_values(0, None).unwrap().is_empty());
    }

    #[test]
    fn test_impossible_length_is_allocation_error() {
        let result = random_values(usize::MAX, Some(0));
        assert!(matches!(result, Err(SortError::Allocation { .. })));
    }
}
