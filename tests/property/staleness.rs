//! Property-based tests for the freshness policy

use infuse::engine::record_is_stale;
use infuse::reducers::ShadowRecord;
use proptest::prelude::*;
use std::time::Duration;

const REFRESH: Duration = Duration::from_secs(60);
const RETRY: Duration = Duration::from_secs(5);

/// Data younger than the refresh window is never refetched
#[test]
fn test_recent_data_is_fresh() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(0u64..1 << 40, 0u64..60_000), |(loaded_at, age)| {
            let record = ShadowRecord {
                loaded_at: Some(loaded_at),
                ..ShadowRecord::default()
            };
            prop_assert!(!record_is_stale(Some(&record), loaded_at + age, REFRESH, RETRY));
            Ok(())
        })
        .unwrap();
}

/// Once both windows have passed, a path is stale whatever its history
#[test]
fn test_old_records_are_stale() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                proptest::option::of(0u64..1_000_000),
                proptest::option::of(0u64..1_000_000),
                proptest::option::of(0u64..1_000_000),
            ),
            |(started, loaded, failed)| {
                let record = ShadowRecord {
                    started_loading_at: started,
                    loaded_at: loaded,
                    failed_at: failed,
                    ..ShadowRecord::default()
                };
                let now = 1_000_000 + 60_000;
                prop_assert!(record_is_stale(Some(&record), now, REFRESH, RETRY));
                Ok(())
            },
        )
        .unwrap();
}
