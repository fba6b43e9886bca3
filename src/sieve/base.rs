//! Base primes for window sieving

use super::sieve_window;

/// Integer square root (largest `r` with `r * r <= n`).
pub fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }

    let mut root = (n as f64).sqrt() as u64;
    // Float rounding can land one off in either direction for large n
    while root.checked_mul(root).map_or(true, |sq| sq > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).map_or(false, |sq| sq <= n) {
        root += 1;
    }
    root
}

/// Classic dense Sieve of Eratosthenes: every prime `<= limit`.
pub fn simple_sieve(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return Vec::new();
    }

    let n = limit as usize;
    let mut is_prime = vec![true; n + 1];
    is_prime[0] = false;
    is_prime[1] = false;

    let mut i = 2;
    while i * i <= n {
        if is_prime[i] {
            let mut multiple = i * i;
            while multiple <= n {
                is_prime[multiple] = false;
                multiple += i;
            }
        }
        i += 1;
    }

    is_prime
        .iter()
        .enumerate()
        .filter_map(|(value, &prime)| prime.then_some(value as u64))
        .collect()
}

/// Growable set of all primes up to a covered limit.
///
/// Coverage grows at least geometrically so that a sliding window only
/// triggers a handful of extensions over its whole lifetime.
#[derive(Debug, Default)]
pub struct BasePrimes {
    primes: Vec<u64>,
    limit: u64,
}

impl BasePrimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure every prime `<= limit` is present.
    ///
    /// Returns `true` when the set had to grow.
    pub fn ensure(&mut self, limit: u64) -> bool {
        if limit <= self.limit {
            return false;
        }

        let target = limit.max(self.limit.saturating_mul(2));
        if self.limit >= 2 && isqrt(target) <= self.limit {
            // Current primes already cover sqrt(target): sieve only the new tail
            let tail = sieve_window(self.limit + 1, target + 1, &self.primes);
            self.primes.extend(tail);
        } else {
            self.primes = simple_sieve(target);
        }
        self.limit = target;
        true
    }

    pub fn primes(&self) -> &[u64] {
        &self.primes
    }

    /// Highest number the set is known to be complete up to.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(17), 4);
        assert_eq!(isqrt(1_000_000_000_000), 1_000_000);
        assert_eq!(isqrt(u64::MAX), 4_294_967_295);
    }

    #[test]
    fn test_simple_sieve() {
        assert!(simple_sieve(0).is_empty());
        assert!(simple_sieve(1).is_empty());
        assert_eq!(simple_sieve(2), vec![2]);
        assert_eq!(simple_sieve(30), vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(simple_sieve(7919).len(), 1000);
    }

    #[test]
    fn test_base_primes_growth() {
        let mut base = BasePrimes::new();
        assert!(base.ensure(10));
        assert_eq!(base.primes(), &[2, 3, 5, 7]);
        assert!(!base.ensure(10));

        // Grows to at least double the previous limit
        assert!(base.ensure(11));
        assert_eq!(base.limit(), 20);
        assert_eq!(base.primes(), &[2, 3, 5, 7, 11, 13, 17, 19]);

        // Extension by tail sieving matches a fresh sieve
        assert!(base.ensure(5000));
        assert_eq!(base.primes(), simple_sieve(base.limit()).as_slice());
    }
}
