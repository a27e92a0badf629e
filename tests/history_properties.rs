//! Property-based tests for the query history store
//!
//! These tests check, over arbitrary sequences of recorded queries, that:
//! - the store grows by one per query until the cap, newest first
//! - recent-query recall never offers failed or duplicate texts
//! - statistics agree with the recorded entries

#[cfg(test)]
mod tests {
    use dbcli::storage::QueryHistory;
    use proptest::prelude::*;
    use proptest_derive::Arbitrary;
    use tempfile::TempDir;

    const CAP: usize = 6;

    /// One recorded query, drawn from a tiny vocabulary so repeats happen
    #[derive(Debug, Clone, Arbitrary)]
    struct Attempt {
        #[proptest(strategy = "0u8..4")]
        query: u8,
        #[proptest(strategy = "0u8..2")]
        connection: u8,
        success: bool,
        #[proptest(strategy = "proptest::option::of(0u64..500)")]
        time: Option<u64>,
    }

    impl Attempt {
        fn text(&self) -> String {
            format!("SELECT {}", self.query)
        }

        fn connection_id(&self) -> String {
            format!("conn-{}", self.connection)
        }
    }

    fn record(history: &QueryHistory, attempt: &Attempt) {
        let error = (!attempt.success).then(|| "failed".to_string());
        history.add_query(
            &attempt.text(),
            &attempt.connection_id(),
            "name",
            attempt.success,
            attempt.time,
            error,
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_newest_first_and_capped(attempts in proptest::collection::vec(any::<Attempt>(), 0..20)) {
            let dir = TempDir::new().unwrap();
            let history = QueryHistory::open(dir.path().join("history.json"), CAP);

            for attempt in &attempts {
                let before = history.len();
                record(&history, attempt);
                prop_assert_eq!(history.len(), (before + 1).min(CAP));

                let newest = &history.get_history(None, 1)[0];
                prop_assert_eq!(&newest.query, &attempt.text());
                prop_assert_eq!(&newest.connection_id, &attempt.connection_id());
                prop_assert_eq!(newest.success, attempt.success);
            }

            // A fresh load sees the same entries
            let reloaded = QueryHistory::open(dir.path().join("history.json"), CAP);
            prop_assert_eq!(reloaded.get_history(None, CAP), history.get_history(None, CAP));
        }

        #[test]
        fn prop_recent_queries_are_distinct_successes(
            attempts in proptest::collection::vec(any::<Attempt>(), 0..20),
            limit in 1usize..8,
        ) {
            let dir = TempDir::new().unwrap();
            let history = QueryHistory::open(dir.path().join("history.json"), CAP);
            for attempt in &attempts {
                record(&history, attempt);
            }

            let recent = history.get_recent_queries(Some("conn-0"), limit);

            let mut expected: Vec<String> = Vec::new();
            for entry in history.get_history(Some("conn-0"), limit) {
                if entry.success && !expected.contains(&entry.query) {
                    expected.push(entry.query);
                }
            }
            prop_assert_eq!(&recent, &expected);

            let mut unique = recent.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), recent.len());
        }

        #[test]
        fn prop_stats_match_entries(attempts in proptest::collection::vec(any::<Attempt>(), 0..20)) {
            let dir = TempDir::new().unwrap();
            let history = QueryHistory::open(dir.path().join("history.json"), CAP);
            for attempt in &attempts {
                record(&history, attempt);
            }

            let entries = history.get_history(None, CAP);
            let stats = history.get_stats(None);
            prop_assert_eq!(stats.total_queries, entries.len());
            prop_assert_eq!(stats.successful_queries, entries.iter().filter(|e| e.success).count());
            prop_assert_eq!(stats.successful_queries + stats.failed_queries, stats.total_queries);

            let times: Vec<u64> = entries.iter().filter_map(|e| e.execution_time).collect();
            if times.is_empty() {
                prop_assert_eq!(stats.average_execution_time, 0);
            } else {
                let min = *times.iter().min().unwrap();
                let max = *times.iter().max().unwrap();
                prop_assert!(stats.average_execution_time >= min && stats.average_execution_time <= max);
            }
        }

        #[test]
        fn prop_clear_one_connection_keeps_others(attempts in proptest::collection::vec(any::<Attempt>(), 0..20)) {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("history.json");
            let history = QueryHistory::open(&path, CAP);
            for attempt in &attempts {
                record(&history, attempt);
            }
            let others = history.get_history(Some("conn-1"), CAP);

            history.clear_history(Some("conn-0"));

            let reloaded = QueryHistory::open(&path, CAP);
            prop_assert!(reloaded.get_history(Some("conn-0"), CAP).is_empty());
            prop_assert_eq!(reloaded.get_history(Some("conn-1"), CAP), others);
        }
    }
}
