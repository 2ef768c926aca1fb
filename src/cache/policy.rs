//! Eviction Policy Module
//!
//! Pure victim selection for a store at capacity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::error::CacheError;

// == Eviction Policy ==
/// Rule for choosing which entries to remove when a store is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently accessed first
    #[default]
    Lru,
    /// Fewest accesses first
    Lfu,
    /// Oldest insertion first
    Fifo,
    /// Shortest remaining TTL first; entries without a TTL are never chosen
    Ttl,
    /// Uniform sample without replacement
    Random,
}

impl EvictionPolicy {
    /// Selects up to `n` keys to evict from `candidates`.
    ///
    /// Only keys present in `candidates` are ever returned. Ties on timestamps
    /// are broken by the store-assigned sequence numbers. The `Ttl` policy may
    /// return fewer than `n` keys, including none at all.
    pub fn select_victims<'a, I>(&self, candidates: I, n: usize, now: DateTime<Utc>) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, &'a CacheEntry)>,
    {
        if n == 0 {
            return Vec::new();
        }

        let mut pool: Vec<(&str, &CacheEntry)> = candidates.into_iter().collect();

        match self {
            EvictionPolicy::Lru => {
                pool.sort_by_key(|(_, e)| (e.last_accessed_at, e.access_seq));
            }
            EvictionPolicy::Lfu => {
                pool.sort_by_key(|(_, e)| (e.access_count, e.access_seq));
            }
            EvictionPolicy::Fifo => {
                pool.sort_by_key(|(_, e)| (e.created_at, e.insert_seq));
            }
            EvictionPolicy::Ttl => {
                pool.retain(|(_, e)| e.ttl.is_some());
                pool.sort_by_key(|(_, e)| (e.remaining_ttl(now), e.insert_seq));
            }
            EvictionPolicy::Random => {
                let mut rng = rand::thread_rng();
                return pool
                    .choose_multiple(&mut rng, n)
                    .map(|(key, _)| key.to_string())
                    .collect();
            }
        }

        pool.into_iter()
            .take(n)
            .map(|(key, _)| key.to_string())
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Fifo => "fifo",
            EvictionPolicy::Ttl => "ttl",
            EvictionPolicy::Random => "random",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "fifo" => Ok(EvictionPolicy::Fifo),
            "ttl" => Ok(EvictionPolicy::Ttl),
            "random" => Ok(EvictionPolicy::Random),
            other => Err(CacheError::UnknownPolicy(other.to_string())),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TagSet;
    use chrono::TimeDelta;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;

    fn entry(created: DateTime<Utc>, seq: u64, ttl: Option<u64>) -> CacheEntry {
        CacheEntry::new(
            json!(seq),
            ttl.map(Duration::from_secs),
            TagSet::new(),
            created,
            seq,
        )
    }

    fn select(
        policy: EvictionPolicy,
        entries: &[(String, CacheEntry)],
        n: usize,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        policy.select_victims(entries.iter().map(|(k, e)| (k.as_str(), e)), n, now)
    }

    #[test]
    fn test_lru_picks_least_recently_touched() {
        let now = Utc::now();
        let mut a = entry(now, 1, None);
        let b = entry(now, 2, None);
        let c = entry(now, 3, None);
        a.touch(now, 4);

        let entries = vec![("a".into(), a), ("b".into(), b), ("c".into(), c)];
        assert_eq!(select(EvictionPolicy::Lru, &entries, 1, now), vec!["b"]);
        assert_eq!(
            select(EvictionPolicy::Lru, &entries, 3, now),
            vec!["b", "c", "a"]
        );
    }

    #[test]
    fn test_lfu_picks_least_accessed() {
        let now = Utc::now();
        let mut a = entry(now, 1, None);
        let mut b = entry(now, 2, None);
        let c = entry(now, 3, None);
        a.touch(now, 4);
        a.touch(now, 5);
        b.touch(now, 6);

        let entries = vec![("a".into(), a), ("b".into(), b), ("c".into(), c)];
        assert_eq!(
            select(EvictionPolicy::Lfu, &entries, 2, now),
            vec!["c", "b"]
        );
    }

    #[test]
    fn test_fifo_ignores_access_pattern() {
        let now = Utc::now();
        let mut a = entry(now, 1, None);
        let b = entry(now + TimeDelta::seconds(1), 2, None);
        a.touch(now + TimeDelta::seconds(5), 3);

        let entries = vec![("b".into(), b), ("a".into(), a)];
        assert_eq!(select(EvictionPolicy::Fifo, &entries, 1, now), vec!["a"]);
    }

    #[test]
    fn test_ttl_prefers_shortest_remaining() {
        let now = Utc::now();
        let entries = vec![
            ("long".to_string(), entry(now, 1, Some(100))),
            ("forever".to_string(), entry(now, 2, None)),
            ("short".to_string(), entry(now, 3, Some(5))),
        ];

        assert_eq!(
            select(EvictionPolicy::Ttl, &entries, 3, now),
            vec!["short", "long"]
        );
    }

    #[test]
    fn test_ttl_without_candidates_selects_nothing() {
        let now = Utc::now();
        let entries = vec![
            ("a".to_string(), entry(now, 1, None)),
            ("b".to_string(), entry(now, 2, None)),
        ];
        assert!(select(EvictionPolicy::Ttl, &entries, 1, now).is_empty());
    }

    #[test]
    fn test_random_samples_distinct_present_keys() {
        let now = Utc::now();
        let entries: Vec<(String, CacheEntry)> = (0..10)
            .map(|i| (format!("k{i}"), entry(now, i, None)))
            .collect();

        let victims = select(EvictionPolicy::Random, &entries, 4, now);
        let unique: HashSet<&String> = victims.iter().collect();

        assert_eq!(victims.len(), 4);
        assert_eq!(unique.len(), 4);
        assert!(victims
            .iter()
            .all(|v| entries.iter().any(|(k, _)| k == v)));
    }

    #[test]
    fn test_request_more_than_available() {
        let now = Utc::now();
        let entries = vec![("only".to_string(), entry(now, 1, None))];
        for policy in [
            EvictionPolicy::Lru,
            EvictionPolicy::Lfu,
            EvictionPolicy::Fifo,
            EvictionPolicy::Random,
        ] {
            assert_eq!(select(policy, &entries, 5, now), vec!["only"]);
        }
        assert!(select(EvictionPolicy::Lru, &entries, 0, now).is_empty());
    }

    #[test]
    fn test_parse_policy_names() {
        assert_eq!("LRU".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lru);
        assert_eq!(" fifo ".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Fifo);
        assert_eq!("random".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Random);
        assert!(matches!(
            "mru".parse::<EvictionPolicy>(),
            Err(CacheError::UnknownPolicy(name)) if name == "mru"
        ));
        assert_eq!(EvictionPolicy::Lfu.to_string(), "lfu");
    }
}
