use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use ctxkit::{
    ComponentDefinition, ContextBuilder, ContextHierarchy, LifecycleState, RunOptions,
    ShutdownOptions,
};

#[tokio::test]
async fn token_shutdown_closes_children_before_root() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (o_root, o_child) = (order.clone(), order.clone());

    let root = ContextBuilder::new()
        .display_name("root")
        .component(ComponentDefinition::new("r", Arc::new(())).on_destroy(move || o_root.lock().push("root")))
        .build()
        .unwrap();
    let child = ContextBuilder::new()
        .display_name("child")
        .parent(root.clone())
        .component(ComponentDefinition::new("c", Arc::new(())).on_destroy(move || o_child.lock().push("child")))
        .build()
        .unwrap();

    let mut hierarchy = ContextHierarchy::new(root.clone());
    hierarchy.add_child("child", child.clone()).unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn(ctxkit::run(RunOptions {
        hierarchy,
        shutdown: ShutdownOptions::Token(token.clone()),
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(root.is_active());
    assert!(child.is_active());

    token.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(root.state(), LifecycleState::Closed);
    assert_eq!(child.state(), LifecycleState::Closed);
    assert_eq!(*order.lock(), vec!["child", "root"]);
}

#[tokio::test]
async fn future_shutdown_completes_run() {
    let root = ContextBuilder::new().build().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(ctxkit::run(RunOptions {
        hierarchy: ContextHierarchy::new(root.clone()),
        shutdown: ShutdownOptions::Future(Box::pin(async move {
            let _ = rx.await;
        })),
    }));

    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(root.state(), LifecycleState::Closed);
}

#[tokio::test]
async fn refresh_failure_is_reported() {
    let root = ContextBuilder::new().build().unwrap();
    root.refresh().unwrap();

    let result = ctxkit::run(RunOptions {
        hierarchy: ContextHierarchy::new(root.clone()),
        shutdown: ShutdownOptions::Token(CancellationToken::new()),
    })
    .await;

    assert!(result.is_err());
    assert_eq!(root.state(), LifecycleState::Closed);
}
