//! Builds the context hierarchy described by the host configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ctxkit::{
    ApplicationEvent, ComponentDefinition, ContextBuilder, ContextHierarchy, ContextLifecycleEvent,
    ContextNode, EnvironmentProvider, EventPublisher, InMemoryResources, Locale, MessageResolver,
    SimpleEventMulticaster, StandardEnvironment, StaticMessageSource, TypedListener,
};
use ctxkit_bootstrap::{ConfigProvider, ContextConfig};
use figment::{providers::Serialized, Figment};

/// Registered in the root context as `hostInfo`.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub home_dir: PathBuf,
}

/// Sources a child falls back to.
struct Level {
    node: Arc<ContextNode>,
    environment: Arc<dyn EnvironmentProvider>,
    messages: Arc<dyn MessageResolver>,
}

pub fn build_hierarchy(provider: &dyn ConfigProvider) -> Result<ContextHierarchy> {
    let host = provider
        .get_config_raw("host")
        .unwrap_or_else(|| serde_json::json!({}));
    let home_dir = host
        .get("home_dir")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .unwrap_or_default();

    let root = build_level(
        "root",
        provider.root_context(),
        None,
        Some(serde_json::json!({ "host": host })),
        vec![ComponentDefinition::new("hostInfo", Arc::new(HostInfo { home_dir }))],
    )
    .context("failed to build root context")?;

    let mut hierarchy = ContextHierarchy::new(root.node.clone());
    let mut built: HashMap<String, Level> = HashMap::new();
    let mut pending: Vec<&str> = provider.child_names();

    // Parents before children; stop when a pass makes no progress.
    while !pending.is_empty() {
        let before = pending.len();
        let mut waiting = Vec::new();
        for name in pending {
            let Some(cfg) = provider.child_context(name) else {
                continue;
            };
            let parent = match cfg.parent.as_deref() {
                None => &root,
                Some(p) => match built.get(p) {
                    Some(level) => level,
                    None => {
                        waiting.push(name);
                        continue;
                    }
                },
            };
            let level = build_level(name, cfg, Some(parent), None, Vec::new())
                .with_context(|| format!("failed to build context '{name}'"))?;
            hierarchy.add_child(name, level.node.clone())?;
            built.insert(name.to_string(), level);
        }
        if waiting.len() == before {
            bail!(
                "unresolvable parent for context(s): {} (unknown name or cycle)",
                waiting.join(", ")
            );
        }
        pending = waiting;
    }

    Ok(hierarchy)
}

fn build_level(
    name: &str,
    cfg: &ContextConfig,
    parent: Option<&Level>,
    ambient: Option<serde_json::Value>,
    components: Vec<ComponentDefinition>,
) -> Result<Level> {
    let environment = build_environment(cfg, parent, ambient)?;
    let messages = build_messages(cfg, parent);

    let resources = InMemoryResources::new();
    for (location, text) in &cfg.resources {
        resources.insert(location.clone(), text.clone().into_bytes());
    }

    let events = Arc::new(SimpleEventMulticaster::new());
    events.subscribe(Arc::new(TypedListener::new(
        |event: &ApplicationEvent, payload: &ContextLifecycleEvent| {
            tracing::info!(source = event.source(), event = ?payload, "lifecycle event");
        },
    )))?;

    let display_name = cfg.display_name.clone().unwrap_or_else(|| name.to_string());
    let mut builder = ContextBuilder::new()
        .display_name(display_name)
        .application_name(cfg.application_name.clone())
        .resources(Arc::new(resources))
        .events(events)
        .messages(messages.clone())
        .environment(environment.clone())
        .autowire_supported(cfg.autowire);
    if let Some(id) = &cfg.id {
        builder = builder.id(id.clone());
    }
    if let Some(parent) = parent {
        builder = builder.parent(parent.node.clone());
    }
    for component in components {
        builder = builder.component(component);
    }

    Ok(Level {
        node: builder.build()?,
        environment,
        messages,
    })
}

fn build_environment(
    cfg: &ContextConfig,
    parent: Option<&Level>,
    ambient: Option<serde_json::Value>,
) -> Result<Arc<dyn EnvironmentProvider>> {
    let mut figment = Figment::new();
    if let Some(ambient) = ambient {
        figment = figment.merge(Serialized::defaults(ambient));
    }
    figment = figment.merge(Serialized::defaults(cfg.properties.clone()));

    let mut env = StandardEnvironment::from_figment(&figment)
        .context("invalid context properties")?;
    if !cfg.profiles.is_empty() {
        env = env.with_active_profiles(cfg.profiles.iter().cloned());
    }
    if !cfg.default_profiles.is_empty() {
        env = env.with_default_profiles(cfg.default_profiles.iter().cloned());
    }
    if let Some(parent) = parent {
        env = env.with_parent(parent.environment.clone());
    }
    Ok(Arc::new(env))
}

fn build_messages(cfg: &ContextConfig, parent: Option<&Level>) -> Arc<dyn MessageResolver> {
    let mut source = StaticMessageSource::new();
    if let Some(parent) = parent {
        source = source.with_parent(parent.messages.clone());
    }
    for (locale, entries) in &cfg.messages {
        let locale = match locale.as_str() {
            "root" | "default" => Locale::root(),
            tag => Locale::new(tag),
        };
        source.add_messages(&locale, entries.iter().map(|(c, t)| (c.clone(), t.clone())));
    }
    Arc::new(source)
}
