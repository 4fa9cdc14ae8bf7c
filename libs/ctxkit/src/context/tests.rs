use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::capabilities::{
    InMemoryResources, Locale, SimpleEventMulticaster, StandardEnvironment, StaticMessageSource,
    TypedListener,
};
use crate::contracts::{ComponentLookup, ComponentLookupExt, EnvironmentCapable};
use crate::errors::LookupKind;

trait Shape: Send + Sync {
    fn area(&self) -> u32;
}

struct Square(u32);

impl Shape for Square {
    fn area(&self) -> u32 {
        self.0 * self.0
    }
}

fn active(builder: ContextBuilder) -> Arc<ContextNode> {
    let node = builder.build().unwrap();
    node.refresh().unwrap();
    node
}

#[test]
fn display_name_is_generated_when_absent() {
    let node = ContextBuilder::new().build().unwrap();
    let name = node.display_name();
    assert!(name.starts_with("ContextNode@"));
    assert_eq!(name.len(), "ContextNode@".len() + 8);
    assert_eq!(node.application_name(), "");
    assert!(node.id().is_none());
    assert!(node.parent().is_none());
}

#[test]
fn startup_date_only_after_refresh() {
    let node = ContextBuilder::new().id("n").build().unwrap();
    assert!(node.startup_date().unwrap_err().is_invalid_state());

    node.refresh().unwrap();
    let first = node.startup_date().unwrap();
    assert_eq!(node.startup_date().unwrap(), first);

    node.close().unwrap();
    assert_eq!(node.startup_date().unwrap(), first);
}

#[test]
fn lookups_are_gated_before_refresh() {
    let node = ContextBuilder::new()
        .component(ComponentDefinition::new("a", Arc::new(1u32)))
        .build()
        .unwrap();

    assert!(node.get_component("a").unwrap_err().is_invalid_state());
    assert!(node.contains_component("a").unwrap_err().is_invalid_state());
    assert!(node.component_names().unwrap_err().is_invalid_state());
    assert!(node.property("x").unwrap_err().is_invalid_state());
    assert!(node.autowire_capable_factory().unwrap_err().is_invalid_state());
}

#[test]
fn register_only_while_unrefreshed() {
    let node = ContextBuilder::new().build().unwrap();
    node.register(ComponentDefinition::new("a", Arc::new(1u32))).unwrap();

    let dup = node
        .register(ComponentDefinition::new("a", Arc::new(2u32)))
        .unwrap_err();
    assert!(matches!(dup, ContextError::DuplicateComponent(ref n) if n == "a"));

    node.refresh().unwrap();
    let err = node
        .register(ComponentDefinition::new("b", Arc::new(2u32)))
        .unwrap_err();
    assert!(err.is_invalid_state());
}

#[test]
fn refresh_is_one_shot() {
    let node = ContextBuilder::new().build().unwrap();
    node.refresh().unwrap();
    assert!(matches!(
        node.refresh().unwrap_err(),
        ContextError::InvalidState {
            reason: InvalidStateReason::AlreadyRefreshed,
            ..
        }
    ));
    node.close().unwrap();
    assert!(node.refresh().unwrap_err().is_invalid_state());
}

#[test]
fn close_from_unrefreshed_makes_node_inert() {
    let node = ContextBuilder::new().build().unwrap();
    assert!(node.close().unwrap());
    assert_eq!(node.state(), LifecycleState::Closed);
    assert!(node.startup_date().unwrap_err().is_invalid_state());
    assert!(node.refresh().unwrap_err().is_invalid_state());
}

#[test]
fn close_twice_is_a_noop() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = destroyed.clone();
    let node = active(ContextBuilder::new().component(
        ComponentDefinition::new("a", Arc::new(1u32)).on_destroy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    ));

    assert!(node.close().unwrap());
    assert!(!node.close().unwrap());
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(node.state(), LifecycleState::Closed);
}

#[test]
fn destroy_callbacks_run_in_reverse_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (o1, o2) = (order.clone(), order.clone());
    let node = active(
        ContextBuilder::new()
            .component(ComponentDefinition::new("first", Arc::new(1u32)).on_destroy(move || o1.lock().push("first")))
            .component(ComponentDefinition::new("second", Arc::new(2u32)).on_destroy(move || o2.lock().push("second"))),
    );
    node.close().unwrap();
    assert_eq!(*order.lock(), vec!["second", "first"]);
}

#[test]
fn by_name_lookup_checks_exposed_type() {
    let node = active(ContextBuilder::new().component(ComponentDefinition::new("a", Arc::new(1u32))));
    assert_eq!(*node.get::<u32>("a").unwrap(), 1);
    assert!(matches!(
        node.get::<String>("a").unwrap_err(),
        ContextError::TypeMismatch { ref name, .. } if name == "a"
    ));
    assert!(matches!(
        node.get_component("missing").unwrap_err(),
        ContextError::NotFound { kind: LookupKind::Component, ref key } if key == "missing"
    ));
}

#[test]
fn trait_object_views_resolve_by_type() {
    let square = Arc::new(Square(3));
    let node = active(ContextBuilder::new().component(
        ComponentDefinition::new("square", square.clone()).expose::<dyn Shape>(square),
    ));

    assert_eq!(node.get_by_type::<dyn Shape>().unwrap().area(), 9);
    assert_eq!(node.names_for_type::<dyn Shape>().unwrap(), vec!["square"]);
    assert!(node.get_by_type::<u64>().unwrap_err().is_not_found());
}

#[test]
fn ambiguous_type_lookup_lists_candidates() {
    let node = active(
        ContextBuilder::new()
            .component(ComponentDefinition::new("x", Arc::new(1u32)))
            .component(ComponentDefinition::new("y", Arc::new(2u32))),
    );
    match node.get_by_type::<u32>().unwrap_err() {
        ContextError::AmbiguousMatch { candidates, .. } => assert_eq!(candidates, vec!["x", "y"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn capabilities_forward_when_active() {
    let messages = StaticMessageSource::new();
    messages.add_message("greet", &Locale::new("en"), "hello {0}");
    let node = active(
        ContextBuilder::new()
            .resources(Arc::new(InMemoryResources::new().with("conf/app.yaml", b"a: 1".to_vec())))
            .messages(Arc::new(messages))
            .environment(Arc::new(
                StandardEnvironment::new()
                    .with_property("server.port", "8080")
                    .with_active_profiles(["dev"]),
            )),
    );

    assert_eq!(node.resource("conf/app.yaml").unwrap().as_str(), Some("a: 1"));
    assert_eq!(node.resources("conf/*.yaml").unwrap().len(), 1);
    assert_eq!(
        node.message("greet", &["bob"], &Locale::new("en_US")).unwrap(),
        "hello bob"
    );
    assert_eq!(node.property("server.port").unwrap().as_deref(), Some("8080"));
    assert_eq!(node.required_property("server.port").unwrap(), "8080");
    assert_eq!(node.active_profiles().unwrap(), vec!["dev"]);
    assert!(node.accepts_profiles(&["dev"]).unwrap());
    assert!(node.contains_property("server.port").unwrap());
    assert!(!node.contains_property("server.host").unwrap());
    assert_eq!(node.default_profiles().unwrap(), vec!["default"]);
    assert!(node.environment().unwrap().contains_property("server.port"));
}

#[test]
fn refresh_and_close_publish_lifecycle_events() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let events = Arc::new(SimpleEventMulticaster::new());
    events
        .subscribe(Arc::new(TypedListener::new(
            move |_: &ApplicationEvent, e: &ContextLifecycleEvent| sink.lock().push(e.clone()),
        )))
        .unwrap();

    let node = active(ContextBuilder::new().display_name("n").events(events));
    node.close().unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            ContextLifecycleEvent::Refreshed { display_name: "n".into() },
            ContextLifecycleEvent::Closed { display_name: "n".into() },
        ]
    );
}

#[test]
fn close_during_refresh_announcement_waits_for_it() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let entered = Arc::new(std::sync::Barrier::new(2));
    let gate = entered.clone();
    let events = Arc::new(SimpleEventMulticaster::new());
    events
        .subscribe(Arc::new(TypedListener::new(
            move |_: &ApplicationEvent, e: &ContextLifecycleEvent| {
                if matches!(e, ContextLifecycleEvent::Refreshed { .. }) {
                    gate.wait();
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
                sink.lock().push(e.clone());
            },
        )))
        .unwrap();

    let node = ContextBuilder::new().display_name("n").events(events).build().unwrap();
    let refreshing = {
        let node = node.clone();
        std::thread::spawn(move || node.refresh())
    };
    entered.wait();
    assert!(node.close().unwrap());
    refreshing.join().unwrap().unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            ContextLifecycleEvent::Refreshed { display_name: "n".into() },
            ContextLifecycleEvent::Closed { display_name: "n".into() },
        ]
    );
}

#[test]
fn closed_node_rejects_capability_access() {
    let node = active(ContextBuilder::new());
    node.close().unwrap();

    assert!(node.resource("x").unwrap_err().is_invalid_state());
    assert!(node
        .publish(&ApplicationEvent::new("t", 1u8))
        .unwrap_err()
        .is_invalid_state());
    assert!(node
        .message("c", &[], &Locale::root())
        .unwrap_err()
        .is_invalid_state());
    assert!(node.environment().err().unwrap().is_invalid_state());
    assert!(node.autowire_capable_factory().unwrap_err().is_invalid_state());
    assert!(node.display_name().starts_with("ContextNode@"));
}

#[test]
fn disabled_autowire_is_invalid_state() {
    let node = active(ContextBuilder::new().autowire_supported(false));
    assert!(matches!(
        node.autowire_capable_factory().unwrap_err(),
        ContextError::InvalidState {
            reason: InvalidStateReason::Unsupported,
            ..
        }
    ));
}

#[test]
fn depth_counts_ancestors() {
    let root = active(ContextBuilder::new());
    let mid = active(ContextBuilder::new().parent(root.clone()));
    let leaf = ContextBuilder::new().parent(mid.clone()).build().unwrap();
    assert_eq!(root.depth(), 0);
    assert_eq!(leaf.depth(), 2);
    assert!(Arc::ptr_eq(leaf.parent().unwrap(), &mid));
}
