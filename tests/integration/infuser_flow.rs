//! An infuser selecting several paths from a live loader.

use crate::integration::test_utils::setup;
use anyhow::anyhow;
use infuse::{
    fetch_fn, listen_fn, DataSink, FetchOutcome, FetchStatus, Infuser, LoaderConfig, LoaderOptions,
    PathOptions, PathResolution, ResolverDescriptor, Selection, Store,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[tokio::test]
async fn test_attach_all_then_collect() {
    let sinks: Arc<Mutex<Vec<DataSink>>> = Arc::default();
    let users = ResolverDescriptor::new("users/:id").with_fetch(fetch_fn(
        |resolution: PathResolution| async move {
            let id = resolution.param("id").unwrap_or_default().to_string();
            Ok(FetchOutcome::data(json!({"id": id, "name": "Hanna"})))
        },
    ));
    let presence = {
        let sinks = Arc::clone(&sinks);
        ResolverDescriptor::new("presence/:id").with_listen(listen_fn(
            move |_: &PathResolution, sink: DataSink| {
                sinks.lock().push(sink);
                Box::new(|| {})
            },
        ))
    };
    let (store, _log, loader) = setup(vec![users, presence]);

    let mut infuser = Infuser::new(&LoaderConfig::default())
        .select("users/u1", "user")
        .select(
            "users/u2",
            Selection::new()
                .to("nickname")
                .transform(|user: &Value| user["name"].clone()),
        )
        .select(
            "presence/u1",
            Selection::new()
                .to("online")
                .with_status()
                .with_options(PathOptions::listen()),
        );

    infuser.seed(store.get_state());
    assert!(infuser.is_loading());

    let mut handle = infuser
        .attach_all(&loader, LoaderOptions::named("profile-card"))
        .await
        .unwrap();
    let statuses = handle.settled().await;
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses.get("users/u1"), Some(&FetchStatus::Loaded));
    assert_eq!(statuses.get("users/u2"), Some(&FetchStatus::Loaded));
    assert_eq!(handle.listening(), 1);

    infuser.seed(store.get_state());
    let collected = infuser.collect();
    assert_eq!(collected["user"], json!({"id": "u1", "name": "Hanna"}));
    assert_eq!(collected["nickname"], json!("Hanna"));
    assert_eq!(collected["online"], Value::Null);
    // The subscription has not delivered anything yet
    assert!(infuser.is_loading());

    let sink = sinks.lock().first().cloned().unwrap();
    sink.send(FetchOutcome::data(json!(true)));
    infuser.seed(store.get_state());
    assert!(!infuser.is_loading());
    let collected = infuser.collect();
    assert_eq!(collected["online"], json!(true));

    // Nothing changed, so the same map comes back
    infuser.seed(store.get_state());
    assert!(Arc::ptr_eq(&collected, &infuser.collect()));

    handle.detach();
    assert!(!loader.is_listening("presence/u1"));
}

#[tokio::test]
async fn test_settled_reports_failed_paths() {
    let broken = ResolverDescriptor::new("teams/:id").with_fetch(fetch_fn(|_: PathResolution| async {
        Err(anyhow!("team service down"))
    }));
    let (_store, _log, loader) = setup(vec![broken]);

    let infuser = Infuser::new(&LoaderConfig::default()).select(
        "teams/t1",
        Selection::new().to("team").with_options(PathOptions::wait()),
    );
    let mut handle = infuser
        .attach_all(&loader, LoaderOptions::default())
        .await
        .unwrap();

    let statuses = handle.settled().await;
    match statuses.get("teams/t1") {
        Some(FetchStatus::Failed(error)) => {
            assert_eq!(error.code.as_deref(), Some("RESOLVER_ERROR"));
            assert_eq!(error.message, "team service down");
        }
        other => panic!("expected a failure, got {:?}", other),
    }
    // Statuses are reported once
    assert!(handle.settled().await.is_empty());
    handle.detach();
}

#[tokio::test]
async fn test_selector_change_attaches_the_new_path() {
    let users = ResolverDescriptor::new("users/:id").with_fetch(fetch_fn(
        |resolution: PathResolution| async move {
            let id = resolution.param("id").unwrap_or_default().to_string();
            Ok(FetchOutcome::data(json!({"id": id})))
        },
    ));
    let (store, _log, loader) = setup(vec![users]);
    loader.update_data("session/userId", json!("u1"));

    let mut infuser = Infuser::with_selector(&LoaderConfig::default(), |state: &Value| {
        let mut selections = BTreeMap::new();
        if let Some(id) = state["data"]["session"]["userId"].as_str() {
            selections.insert(format!("users/{}", id), Selection::from("user"));
        }
        selections
    });

    assert!(infuser.seed(store.get_state()));
    let mut handle = infuser.attach_all(&loader, LoaderOptions::default()).await.unwrap();
    handle.settled().await;
    infuser.seed(store.get_state());
    assert_eq!(infuser.collect()["user"], json!({"id": "u1"}));

    loader.update_data("session/userId", json!("u2"));
    assert!(infuser.seed(store.get_state()));
    handle.detach();
    let mut handle = infuser.attach_all(&loader, LoaderOptions::default()).await.unwrap();
    let statuses = handle.settled().await;
    assert_eq!(statuses.get("users/u2"), Some(&FetchStatus::Loaded));

    infuser.seed(store.get_state());
    assert_eq!(infuser.collect()["user"], json!({"id": "u2"}));
    assert!(!infuser.is_loading());
}
