//! Recent-match feed

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use trendmark_domain::traits::MatchFeed;
use trendmark_domain::{ClientId, Match};

/// Bounded per-client ring buffer of the latest matches
///
/// Feeds downstream content-strategy analysis through [`MatchFeed`].
pub struct RecentMatches {
    limit: usize,
    matches: RwLock<HashMap<ClientId, VecDeque<Match>>>,
}

impl RecentMatches {
    /// Keep at most `limit` matches per client
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            matches: RwLock::new(HashMap::new()),
        }
    }

    /// Record a cycle's matches for a client (best first)
    pub fn record(&self, client: &ClientId, matches: &[Match]) {
        if matches.is_empty() {
            return;
        }
        let mut all = self.matches.write().expect("recent match lock poisoned");
        let buffer = all.entry(client.clone()).or_default();
        // Push worst first so the best match of the newest cycle ends up in front
        for m in matches.iter().rev() {
            buffer.push_front(m.clone());
        }
        buffer.truncate(self.limit);
    }

    /// Number of matches held for a client
    pub fn len(&self, client: &ClientId) -> usize {
        self.matches
            .read()
            .expect("recent match lock poisoned")
            .get(client)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

impl MatchFeed for RecentMatches {
    fn recent(&self, client: &ClientId, limit: usize) -> Vec<Match> {
        self.matches
            .read()
            .expect("recent match lock poisoned")
            .get(client)
            .map(|buffer| buffer.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendmark_domain::TrendId;

    fn m(url: &str, at: u64) -> Match {
        Match {
            trend_id: TrendId::new("t"),
            client_id: ClientId::new("c"),
            url: url.to_string(),
            score: 0.9,
            matched_at: at,
        }
    }

    #[test]
    fn test_newest_first_and_bounded() {
        let feed = RecentMatches::new(3);
        let client = ClientId::new("c");
        feed.record(&client, &[m("/a", 1), m("/b", 1)]);
        feed.record(&client, &[m("/c", 2), m("/d", 2)]);

        let urls: Vec<_> = feed.recent(&client, 10).into_iter().map(|m| m.url).collect();
        assert_eq!(urls, vec!["/c", "/d", "/a"]);
        assert_eq!(feed.len(&client), 3);
        assert_eq!(feed.recent(&client, 1).len(), 1);
        assert!(feed.recent(&ClientId::new("other"), 10).is_empty());
    }
}
