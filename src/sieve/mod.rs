//! Segmented Sieve of Eratosthenes
//!
//! Produces every prime in ascending order without bounding memory by the
//! largest value reached. The number line is cut into windows of fixed width
//! `W`; each window is sieved with the base primes `<= sqrt(window_end)`:
//!
//! ```text
//! [0, W)  [W, 2W)  [2W, 3W)  ...
//!   │        │        │
//!   └─ base primes grow only when sqrt(window_end) passes their limit
//! ```
//!
//! Memory is `O(W + sqrt(window_end))` no matter how many primes have been
//! produced.

pub mod base;

pub use base::{isqrt, simple_sieve, BasePrimes};

/// Primes in `[start, end)`, marking composites with `base_primes`.
///
/// `base_primes` must be ascending and contain every prime `<= sqrt(end - 1)`.
pub fn sieve_window(start: u64, end: u64, base_primes: &[u64]) -> Vec<u64> {
    if end <= start {
        return Vec::new();
    }

    let len = (end - start) as usize;
    let mut composite = vec![false; len];

    for &q in base_primes {
        let square = match q.checked_mul(q) {
            Some(square) if square < end => square,
            _ => break,
        };

        let first_multiple = match start.div_ceil(q).checked_mul(q) {
            Some(multiple) => multiple.max(square),
            None => continue,
        };

        let mut multiple = first_multiple;
        while multiple < end {
            composite[(multiple - start) as usize] = true;
            multiple = match multiple.checked_add(q) {
                Some(next) => next,
                None => break,
            };
        }
    }

    composite
        .iter()
        .enumerate()
        .filter(|&(_, &marked)| !marked)
        .map(|(offset, _)| start + offset as u64)
        .filter(|&value| value > 1)
        .collect()
}

/// All primes in `[start, end)`.
pub fn sieve_range(start: u64, end: u64) -> Vec<u64> {
    let base = simple_sieve(isqrt(end.saturating_sub(1)));
    sieve_window(start, end, &base)
}

/// Unbounded, lazily evaluated ascending prime sequence.
#[derive(Debug)]
pub struct SegmentedSieve {
    window_size: u64,
    /// Start of the window currently buffered
    window_start: u64,
    /// End (exclusive) of the window currently buffered
    window_end: u64,
    base: BasePrimes,
    buffered: std::vec::IntoIter<u64>,
}

impl SegmentedSieve {
    /// Sieve from zero, so the first prime produced is 2.
    pub fn new(window_size: usize) -> Self {
        Self::starting_at(0, window_size)
    }

    /// Sieve from `start`; the first prime produced is the smallest one `>= start`.
    ///
    /// A zero window width is treated as one.
    pub fn starting_at(start: u64, window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1) as u64,
            window_start: start,
            window_end: start,
            base: BasePrimes::new(),
            buffered: Vec::new().into_iter(),
        }
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// Highest number scanned so far (exclusive end of the current window).
    pub fn cursor(&self) -> u64 {
        self.window_end
    }

    pub fn window_start(&self) -> u64 {
        self.window_start
    }

    /// Limit the base primes currently cover.
    pub fn base_prime_limit(&self) -> u64 {
        self.base.limit()
    }

    fn sieve_next_window(&mut self) -> Vec<u64> {
        let start = self.window_end;
        let end = start.saturating_add(self.window_size);

        self.base.ensure(isqrt(end.saturating_sub(1)));
        let primes = sieve_window(start, end, self.base.primes());

        self.window_start = start;
        self.window_end = end;
        primes
    }
}

impl Iterator for SegmentedSieve {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            if let Some(prime) = self.buffered.next() {
                return Some(prime);
            }
            if self.window_end == u64::MAX {
                return None;
            }
            let primes = self.sieve_next_window();
            self.buffered = primes.into_iter();
        }
    }
}
