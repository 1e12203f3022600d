//! Freshness windows, retries and parent cascading, driven by a manual clock.

use crate::integration::test_utils::{setup_with_clock, ManualClock};
use anyhow::anyhow;
use infuse::{
    fetch_fn, FetchOutcome, LoadError, LoaderOptions, PathOptions, PathResolution,
    ResolverDescriptor,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const START: u64 = 1_700_000_000_000;

fn counting(pattern: &str, calls: &Arc<AtomicUsize>) -> ResolverDescriptor {
    let calls = Arc::clone(calls);
    ResolverDescriptor::new(pattern).with_fetch(fetch_fn(move |resolution: PathResolution| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok(FetchOutcome::data(json!({"path": resolution.path, "n": n}))) }
    }))
}

async fn request(loader: &infuse::Loader, path: &str, options: LoaderOptions) {
    let attachment = loader.attach(path, PathOptions::wait(), options).await.unwrap();
    attachment.detach();
}

/// Let spawned fetches run until the resolver has been called `n` times
async fn wait_for_calls(calls: &AtomicUsize, n: usize) {
    while calls.load(Ordering::SeqCst) < n {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_data_is_refetched_after_refresh_window() {
    let clock = ManualClock::new(START);
    let calls = Arc::new(AtomicUsize::new(0));
    let (store, _log, loader) = setup_with_clock(vec![counting("news", &calls)], &clock);

    request(&loader, "news", LoaderOptions::default()).await;
    clock.advance_secs(59);
    request(&loader, "news", LoaderOptions::default()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance_secs(2);
    request(&loader, "news", LoaderOptions::default()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.data()["news"]["n"], json!(2));
}

#[tokio::test]
async fn test_consumer_refresh_window_overrides_config() {
    let clock = ManualClock::new(START);
    let calls = Arc::new(AtomicUsize::new(0));
    let (_store, _log, loader) = setup_with_clock(vec![counting("news", &calls)], &clock);

    let eager = LoaderOptions {
        refresh_after: Some(Duration::from_secs(5)),
        ..LoaderOptions::named("ticker")
    };
    request(&loader, "news", eager.clone()).await;
    clock.advance_secs(6);
    request(&loader, "news", eager).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // The path option wins over the consumer option
    let path_options = PathOptions {
        refresh_after: Some(Duration::from_secs(3600)),
        ..PathOptions::wait()
    };
    clock.advance_secs(6);
    let eager = LoaderOptions {
        refresh_after: Some(Duration::from_secs(5)),
        ..LoaderOptions::default()
    };
    let attachment = loader.attach("news", path_options, eager).await.unwrap();
    attachment.detach();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_path_is_retried_after_retry_window() {
    let clock = ManualClock::new(START);
    let calls = Arc::new(AtomicUsize::new(0));
    let failing = {
        let calls = Arc::clone(&calls);
        ResolverDescriptor::new("flaky").with_fetch(fetch_fn(move |_: PathResolution| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("upstream unavailable")) }
        }))
    };
    let (_store, _log, loader) = setup_with_clock(vec![failing], &clock);

    request(&loader, "flaky", LoaderOptions::default()).await;
    // A failure clears the start marker, so the next request retries at once
    request(&loader, "flaky", LoaderOptions::default()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_pending_load_blocks_duplicates_until_retry_window() {
    let clock = ManualClock::new(START);
    let calls = Arc::new(AtomicUsize::new(0));
    let hanging = {
        let calls = Arc::clone(&calls);
        ResolverDescriptor::new("slow").with_fetch(fetch_fn(move |_: PathResolution| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                std::future::pending::<()>().await;
                Ok(FetchOutcome::data(json!(null)))
            }
        }))
    };
    let (_store, _log, loader) = setup_with_clock(vec![hanging], &clock);

    let first = loader
        .attach("slow", PathOptions::default(), LoaderOptions::default())
        .await
        .unwrap();
    assert!(loader.is_fetching("slow"));
    wait_for_calls(&calls, 1).await;

    clock.advance_secs(1);
    let duplicate = loader
        .attach("slow", PathOptions::default(), LoaderOptions::default())
        .await
        .unwrap();
    assert!(matches!(duplicate, infuse::Attachment::Idle));

    clock.advance_secs(5);
    let retry = loader
        .attach("slow", PathOptions::default(), LoaderOptions::default())
        .await
        .unwrap();
    assert!(matches!(retry, infuse::Attachment::Fetching(_)));
    wait_for_calls(&calls, 2).await;

    // The first attempt was superseded by the retry
    assert_eq!(first.settled().await, Some(infuse::FetchStatus::Cancelled));
    loader.reset();
    assert_eq!(retry.settled().await, Some(infuse::FetchStatus::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fresh_parent_keeps_child_fresh() {
    let clock = ManualClock::new(START);
    let parent_calls = Arc::new(AtomicUsize::new(0));
    let child_calls = Arc::new(AtomicUsize::new(0));
    let child = counting("users/:id/profile", &child_calls).with_parent_path(|resolution| {
        resolution.param("id").map(|id| format!("users/{}", id))
    });
    let (_store, _log, loader) = setup_with_clock(
        vec![counting("users/:id", &parent_calls), child],
        &clock,
    );

    request(&loader, "users/u1", LoaderOptions::default()).await;
    request(&loader, "users/u1/profile", LoaderOptions::default()).await;
    assert_eq!(child_calls.load(Ordering::SeqCst), 0);

    clock.advance_secs(61);
    request(&loader, "users/u1/profile", LoaderOptions::default()).await;
    assert_eq!(child_calls.load(Ordering::SeqCst), 1);
    assert_eq!(parent_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_parent_is_an_error() {
    let clock = ManualClock::new(START);
    let calls = Arc::new(AtomicUsize::new(0));
    let orphan = counting("orphans/:id", &calls)
        .with_parent_path(|_: &PathResolution| Some("nowhere".to_string()));
    let (_store, _log, loader) = setup_with_clock(vec![orphan], &clock);

    let result = loader
        .attach("orphans/o1", PathOptions::default(), LoaderOptions::default())
        .await;
    match result {
        Err(err) => {
            assert_eq!(err, LoadError::ParentNotFound("nowhere".to_string()));
            assert_eq!(err.code(), "PARENT_NOT_FOUND");
        }
        Ok(attachment) => panic!("expected an error, got {:?}", attachment),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
