//! Fetch execution through the loader: events, timeouts, errors, supersession.

use crate::integration::test_utils::setup;
use anyhow::anyhow;
use infuse::reducers::ShadowRecord;
use infuse::{
    fetch_fn, Attachment, FetchOutcome, FetchStatus, LoaderOptions, PathOptions, PathResolution,
    ResolverDescriptor,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

fn fixed(pattern: &str, outcome: FetchOutcome) -> ResolverDescriptor {
    ResolverDescriptor::new(pattern).with_fetch(fetch_fn(move |_: PathResolution| {
        let outcome = outcome.clone();
        async move { Ok(outcome) }
    }))
}

#[tokio::test]
async fn test_fetch_dispatches_start_then_success() {
    let (store, log, loader) = setup(vec![fixed(
        "users/:id",
        FetchOutcome::data(json!({"name": "Hanna"})),
    )]);

    let attachment = loader
        .attach("users/u1", PathOptions::default(), LoaderOptions::default())
        .await
        .unwrap();
    assert_eq!(attachment.settled().await, Some(FetchStatus::Loaded));

    assert_eq!(log.kinds(), vec!["LOAD_INITIAL", "LOAD_START", "LOAD_SUCCESS"]);
    assert_eq!(store.data()["users"]["u1"], json!({"name": "Hanna"}));
    let record = ShadowRecord::read(&store.shadow(), "users/u1").unwrap();
    assert!(record.loaded_at.is_some());
    assert!(!loader.is_fetching("users/u1"));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_times_out() {
    let slow = ResolverDescriptor::new("slow").with_fetch(fetch_fn(|_: PathResolution| async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(FetchOutcome::data(json!("late")))
    }));
    let (store, log, loader) = setup(vec![slow]);

    let attachment = loader
        .attach("slow", PathOptions::wait(), LoaderOptions::default())
        .await
        .unwrap();
    match attachment.settled().await {
        Some(FetchStatus::Failed(error)) => assert_eq!(error.code.as_deref(), Some("TIMEOUT")),
        other => panic!("expected a timeout, got {:?}", other),
    }

    assert_eq!(log.kinds_for("slow"), vec!["LOAD_START", "LOAD_FAIL"]);
    assert_eq!(store.shadow()["slow"]["error"]["code"], json!("TIMEOUT"));
    assert!(store.data().get("slow").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_per_request_timeout_overrides_config() {
    let slow = ResolverDescriptor::new("slow").with_fetch(fetch_fn(|_: PathResolution| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(FetchOutcome::data(json!("ok")))
    }));
    let (_store, _log, loader) = setup(vec![slow]);

    let options = PathOptions {
        data_fetch_timeout: Some(Duration::from_secs(1)),
        ..PathOptions::wait()
    };
    let status = loader
        .attach("slow", options, LoaderOptions::default())
        .await
        .unwrap()
        .settled()
        .await;
    assert!(matches!(status, Some(FetchStatus::Failed(_))));
}

#[tokio::test]
async fn test_empty_outcome_is_a_resolver_error() {
    let (store, log, loader) = setup(vec![fixed("empty", FetchOutcome::default())]);

    let status = loader
        .attach("empty", PathOptions::wait(), LoaderOptions::default())
        .await
        .unwrap()
        .settled()
        .await;
    match status {
        Some(FetchStatus::Failed(error)) => {
            assert_eq!(error.code.as_deref(), Some("RESOLVER_ERROR"))
        }
        other => panic!("expected a resolver error, got {:?}", other),
    }
    assert_eq!(log.kinds_for("empty"), vec!["LOAD_START", "LOAD_FAIL"]);
    assert!(store.shadow()["empty"]["failedAt"].is_u64());
}

#[tokio::test]
async fn test_rejected_fetch_records_error() {
    let failing = ResolverDescriptor::new("broken").with_fetch(fetch_fn(|_: PathResolution| async {
        Err(anyhow!("connection refused"))
    }));
    let (store, _log, loader) = setup(vec![failing]);

    let _ = loader
        .attach("broken", PathOptions::wait(), LoaderOptions::default())
        .await
        .unwrap();

    let record = ShadowRecord::read(&store.shadow(), "broken").unwrap();
    let error = record.error.unwrap();
    assert_eq!(error.message, "connection refused");
    assert_eq!(error.code.as_deref(), Some("RESOLVER_ERROR"));
}

#[tokio::test]
async fn test_back_to_back_requests_share_one_fetch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = {
        let calls = Arc::clone(&calls);
        ResolverDescriptor::new("users/:id").with_fetch(fetch_fn(move |_: PathResolution| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(FetchOutcome::data(json!({"name": "Hanna"}))) }
        }))
    };
    let (store, log, loader) = setup(vec![counted]);

    // No yield between the two requests
    let sidebar = loader
        .attach("users/u1", PathOptions::default(), LoaderOptions::named("sidebar"))
        .await
        .unwrap();
    let header = loader
        .attach("users/u1", PathOptions::default(), LoaderOptions::named("header"))
        .await
        .unwrap();
    assert!(matches!(header, Attachment::Idle));

    assert_eq!(sidebar.settled().await, Some(FetchStatus::Loaded));
    assert_eq!(header.settled().await, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(log.kinds_for("users/u1"), vec!["LOAD_START", "LOAD_SUCCESS"]);
    assert_eq!(store.data()["users"]["u1"], json!({"name": "Hanna"}));
}

#[tokio::test]
async fn test_newer_fetch_supersedes_pending_one() {
    let (release_a, gate_a) = oneshot::channel::<()>();
    let (release_b, gate_b) = oneshot::channel::<()>();
    let gates = Arc::new(Mutex::new(VecDeque::from(vec![
        (gate_a, json!("A")),
        (gate_b, json!("B")),
    ])));
    let gated = ResolverDescriptor::new("feed").with_fetch(fetch_fn(move |_: PathResolution| {
        let next = gates.lock().pop_front();
        async move {
            let (gate, value): (oneshot::Receiver<()>, Value) =
                next.ok_or_else(|| anyhow!("unexpected fetch"))?;
            let _ = gate.await;
            Ok(FetchOutcome::data(value))
        }
    }));
    let (store, log, loader) = setup(vec![gated]);
    let (resolver, resolution) = loader
        .resolve("feed", PathOptions::default(), LoaderOptions::default())
        .unwrap();

    let first = tokio::spawn({
        let (loader, resolver, resolution) = (loader.clone(), resolver.clone(), resolution.clone());
        async move { loader.fetch(resolver, resolution).await }
    });
    while !loader.is_fetching("feed") {
        tokio::task::yield_now().await;
    }

    let second = tokio::spawn({
        let loader = loader.clone();
        async move { loader.fetch(resolver, resolution).await }
    });

    assert_eq!(first.await.unwrap(), FetchStatus::Cancelled);
    let _ = release_b.send(());
    assert_eq!(second.await.unwrap(), FetchStatus::Loaded);
    let _ = release_a.send(());

    assert_eq!(
        log.kinds_for("feed"),
        vec!["LOAD_START", "LOAD_START", "LOAD_SUCCESS"]
    );
    assert_eq!(store.data()["feed"], json!("B"));
    assert!(!loader.is_fetching("feed"));
}

#[tokio::test]
async fn test_store_errors_do_not_break_the_fetch() {
    let (store, _log, loader) = setup(vec![fixed("a", FetchOutcome::data(json!(1)))]);
    store.subscribe(|_, _| Err(anyhow!("view exploded")));

    let status = loader
        .attach("a", PathOptions::wait(), LoaderOptions::default())
        .await
        .unwrap()
        .settled()
        .await;
    assert_eq!(status, Some(FetchStatus::Loaded));
    assert_eq!(store.data()["a"], json!(1));
}

#[tokio::test]
async fn test_outcome_with_alternate_data_path() {
    let me = fixed(
        "users/me",
        FetchOutcome::data(json!({"id": "u1"}))
            .at_path("users/u1")
            .with_extra("teams/t1", json!({"id": "t1"})),
    );
    let (store, log, loader) = setup(vec![me]);

    let _ = loader
        .attach("users/me", PathOptions::wait(), LoaderOptions::default())
        .await
        .unwrap();

    assert_eq!(
        *store.data(),
        json!({"users": {"u1": {"id": "u1"}}, "teams": {"t1": {"id": "t1"}}})
    );
    let shadow = store.shadow();
    for path in ["users/me", "users/u1", "teams/t1"] {
        assert!(
            ShadowRecord::read(&shadow, path).unwrap().loaded_at.is_some(),
            "{} should be marked loaded",
            path
        );
    }
    match log.events().last() {
        Some(infuse::LoadEvent::Success(payload)) => {
            assert_eq!(payload.data_path.as_deref(), Some("users/u1"))
        }
        other => panic!("expected a success event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_paginated_index_is_stitched() {
    let pages = Arc::new(Mutex::new(VecDeque::from(vec![
        FetchOutcome::append_index(["c", "d"]).with_index_bounds(false, true),
        FetchOutcome::append_index(["a", "b", "c"]).with_index_bounds(true, false),
    ])));
    let paged = ResolverDescriptor::new("posts/index").with_fetch(fetch_fn(
        move |_: PathResolution| {
            let page = pages.lock().pop_front();
            async move { page.ok_or_else(|| anyhow!("no more pages")) }
        },
    ));
    let (store, _log, loader) = setup(vec![paged]);

    let _ = loader
        .attach("posts/index", PathOptions::wait(), LoaderOptions::default())
        .await
        .unwrap();
    // The first page is fresh now; the older page has to be forced
    let older_page = PathOptions {
        force_redownload: true,
        ..PathOptions::wait()
    };
    let _ = loader
        .attach("posts/index", older_page, LoaderOptions::default())
        .await
        .unwrap();

    assert_eq!(store.data()["posts"]["index"], json!(["a", "b", "c", "d"]));
    let record = ShadowRecord::read(&store.shadow(), "posts/index").unwrap();
    assert_eq!(record.index_start, Some(true));
    assert_eq!(record.index_end, Some(true));
}
