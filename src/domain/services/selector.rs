//! Selector Service
//!
//! Pure domain logic for choosing the backend of one request.
//! This service has NO external dependencies besides an injected RNG.
//!
//! The selection is deliberately unfair. It is used to inject controlled
//! unpredictability into downstream systems:
//! 1. On a prime second-of-minute the first entry always wins.
//! 2. Otherwise every entry holds `weight` tickets.
//! 3. Paths of even length give the second entry 20 bonus tickets
//!    (only when there is more than one entry).
//! 4. One ticket is drawn uniformly at random.
//!
//! Tickets are never materialized. The draw is a single number below the
//! ticket total, resolved by walking the cumulative counts.

use crate::domain::entities::BackendEntry;
use rand::Rng;

/// Bonus tickets granted to the second entry on even-length paths.
pub const EVEN_PATH_BONUS: u64 = 20;

/// Selector for the backend of a single request.
pub struct Selector;

impl Selector {
    /// Pick the url of the backend that serves this request.
    ///
    /// # Arguments
    /// * `entries` - Registry snapshot, in registry order
    /// * `path` - Inbound request path (including any query string)
    /// * `second` - Current wall-clock second of the minute (0-59)
    /// * `rng` - Source of randomness for the weighted draw
    ///
    /// # Returns
    /// The chosen url, or None when the registry is empty
    ///
    /// # Example
    /// ```ignore
    /// let url = Selector::pick_backend(&snapshot.entries, "/x", 4, &mut rand::thread_rng());
    /// ```
    pub fn pick_backend<R>(
        entries: &[BackendEntry],
        path: &str,
        second: u32,
        rng: &mut R,
    ) -> Option<String>
    where
        R: Rng + ?Sized,
    {
        if let Some(first) = entries.first() {
            if Self::is_prime(second) {
                return Some(first.url.clone());
            }
        }

        let tickets = Self::tickets(entries, path);
        let total: u64 = tickets.iter().sum();
        if total == 0 {
            return None;
        }

        let mut draw = rng.gen_range(0..total);
        for (entry, count) in entries.iter().zip(&tickets) {
            if draw < *count {
                return Some(entry.url.clone());
            }
            draw -= count;
        }
        None
    }

    /// Ticket count of every entry for a non-prime second, in registry order.
    ///
    /// Counts are `u64` so that the sum of any number of `u32` weights plus
    /// the bonus cannot overflow.
    pub fn tickets(entries: &[BackendEntry], path: &str) -> Vec<u64> {
        let mut tickets: Vec<u64> = entries.iter().map(|e| u64::from(e.weight)).collect();
        if path.chars().count() % 2 == 0 && tickets.len() > 1 {
            tickets[1] += EVEN_PATH_BONUS;
        }
        tickets
    }

    /// Trial-division primality check, enough for 0..=59.
    pub fn is_prime(n: u32) -> bool {
        if n < 2 {
            return false;
        }
        let mut i = 2;
        while i * i <= n {
            if n % i == 0 {
                return false;
            }
            i += 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    const PRIMES: [u32; 17] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59];

    // ===== Test Helpers =====

    fn entry(name: &str, url: &str, weight: i64) -> BackendEntry {
        BackendEntry::new(name, url, weight).unwrap()
    }

    fn two_backends() -> Vec<BackendEntry> {
        vec![entry("A", "url1", 70), entry("B", "url2", 30)]
    }

    fn frequencies(entries: &[BackendEntry], path: &str, second: u32, n: usize) -> HashMap<String, usize> {
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = HashMap::new();
        for _ in 0..n {
            let url = Selector::pick_backend(entries, path, second, &mut rng).unwrap();
            *counts.entry(url).or_insert(0) += 1;
        }
        counts
    }

    // ===== is_prime Tests =====

    #[test]
    fn test_is_prime_seconds_of_minute() {
        let primes: Vec<u32> = (0..60).filter(|s| Selector::is_prime(*s)).collect();
        assert_eq!(primes, PRIMES.to_vec());
    }

    #[test]
    fn test_is_prime_small_values() {
        assert!(!Selector::is_prime(0));
        assert!(!Selector::is_prime(1));
        assert!(Selector::is_prime(2));
        assert!(!Selector::is_prime(4));
        assert!(!Selector::is_prime(49));
    }

    // ===== Prime-second override =====

    #[test]
    fn test_prime_second_always_picks_first_entry() {
        let entries = two_backends();
        let mut rng = StdRng::seed_from_u64(7);
        for second in PRIMES {
            for path in ["/", "/x", "/abc", "/even"] {
                for _ in 0..20 {
                    let url = Selector::pick_backend(&entries, path, second, &mut rng);
                    assert_eq!(url.as_deref(), Some("url1"));
                }
            }
        }
    }

    #[test]
    fn test_prime_second_ignores_weights() {
        let entries = vec![entry("tiny", "first", 1), entry("huge", "second", 10_000)];
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let url = Selector::pick_backend(&entries, "/x", 7, &mut rng);
            assert_eq!(url.as_deref(), Some("first"));
        }
    }

    // ===== Empty registry =====

    #[test]
    fn test_empty_registry_returns_none() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Selector::pick_backend(&[], "/", 4, &mut rng).is_none());
        assert!(Selector::pick_backend(&[], "/", 7, &mut rng).is_none());
    }

    // ===== Ticket counts =====

    #[test]
    fn test_tickets_even_path_adds_bonus_to_second_entry() {
        let entries = two_backends();
        assert_eq!(Selector::tickets(&entries, "/x"), vec![70, 50]);
    }

    #[test]
    fn test_tickets_odd_path_has_no_bonus() {
        let entries = two_backends();
        assert_eq!(Selector::tickets(&entries, "/ab"), vec![70, 30]);
    }

    #[test]
    fn test_tickets_single_entry_never_gets_bonus() {
        let entries = vec![entry("A", "url1", 3)];
        assert_eq!(Selector::tickets(&entries, "/x"), vec![3]);
    }

    #[test]
    fn test_tickets_bonus_goes_to_second_not_last() {
        let entries = vec![entry("A", "a", 1), entry("B", "b", 1), entry("C", "c", 1)];
        assert_eq!(Selector::tickets(&entries, "/x"), vec![1, 21, 1]);
    }

    #[test]
    fn test_tickets_count_characters_not_bytes() {
        // "/é" is two characters but three bytes
        let entries = two_backends();
        assert_eq!(Selector::tickets(&entries, "/é"), vec![70, 50]);
    }

    #[test]
    fn test_tickets_do_not_overflow_with_max_weights() {
        let entries = vec![
            entry("A", "a", u32::MAX as i64),
            entry("B", "b", u32::MAX as i64),
        ];
        let tickets = Selector::tickets(&entries, "/x");
        assert_eq!(tickets, vec![u32::MAX as u64, u32::MAX as u64 + 20]);
        assert_eq!(tickets.iter().sum::<u64>(), 2 * u32::MAX as u64 + 20);
    }

    // ===== Huge weights =====

    #[test]
    fn test_max_weight_is_drawn_without_allocating_tickets() {
        let entries = vec![entry("big", "big", u32::MAX as i64), entry("small", "small", 1)];
        let mut rng = StdRng::seed_from_u64(3);

        let url = Selector::pick_backend(&entries, "/ab", 4, &mut rng);
        assert!(matches!(url.as_deref(), Some("big") | Some("small")));

        let counts = frequencies(&entries, "/ab", 4, 1_000);
        assert_eq!(counts.get("big"), Some(&1_000));
    }

    #[test]
    fn test_max_weight_second_entry_with_even_path_bonus() {
        let entries = vec![entry("small", "small", 1), entry("big", "big", u32::MAX as i64)];
        let counts = frequencies(&entries, "/x", 4, 1_000);
        assert_eq!(counts.get("big"), Some(&1_000));
    }

    // ===== Distribution =====

    #[test]
    fn test_distribution_follows_weights_on_odd_path() {
        let entries = two_backends();
        let n = 20_000;
        let counts = frequencies(&entries, "/ab", 4, n);

        let p1 = counts["url1"] as f64 / n as f64;
        assert!((p1 - 0.70).abs() < 0.02, "url1 frequency {}", p1);
    }

    #[test]
    fn test_distribution_with_even_path_bonus() {
        let entries = two_backends();
        let n = 20_000;
        let counts = frequencies(&entries, "/x", 4, n);

        let p2 = counts["url2"] as f64 / n as f64;
        let expected = 50.0 / 120.0;
        assert!((p2 - expected).abs() < 0.02, "url2 frequency {}", p2);
    }

    #[test]
    fn test_distribution_three_equal_weights() {
        let entries = vec![entry("A", "a", 10), entry("B", "b", 10), entry("C", "c", 10)];
        let n = 30_000;
        let counts = frequencies(&entries, "/ab", 0, n);

        for url in ["a", "b", "c"] {
            let p = counts[url] as f64 / n as f64;
            assert!((p - 1.0 / 3.0).abs() < 0.02, "{} frequency {}", url, p);
        }
    }

    #[test]
    fn test_second_zero_is_not_an_override() {
        let entries = two_backends();
        let counts = frequencies(&entries, "/ab", 0, 2_000);
        assert!(counts.contains_key("url2"));
    }
}
