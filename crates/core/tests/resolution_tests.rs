//! Integration tests for planning and synchronous resolution
//!
//! Covers class graphs, cycle reporting, scopes, constraints, aliases and
//! lifecycle hooks through the public container surface.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bindery_core::container::{inject, Activation, ClassBinding, ClassMetadata, Injectable, InjectedArgs};
use bindery_core::{Container, ContainerError, ContainerOptions, Factory, ServiceIdentifier, Target};

#[derive(Debug)]
struct Katana;

impl Injectable for Katana {
    fn metadata() -> ClassMetadata {
        ClassMetadata::of::<Katana>()
    }

    fn construct(_args: InjectedArgs) -> Result<Self, ContainerError> {
        Ok(Katana)
    }
}

#[derive(Debug)]
struct Shuriken;

impl Injectable for Shuriken {
    fn metadata() -> ClassMetadata {
        ClassMetadata::of::<Shuriken>()
    }

    fn construct(_args: InjectedArgs) -> Result<Self, ContainerError> {
        Ok(Shuriken)
    }
}

#[derive(Debug)]
struct Ninja {
    katana: Arc<Katana>,
    shuriken: Option<Arc<Shuriken>>,
}

impl Injectable for Ninja {
    fn metadata() -> ClassMetadata {
        ClassMetadata::of::<Ninja>()
            .argument(inject("Katana"))
            .property("shuriken", inject("Shuriken").optional())
    }

    fn construct(args: InjectedArgs) -> Result<Self, ContainerError> {
        Ok(Ninja {
            katana: args.arg(0)?,
            shuriken: args.optional_property("shuriken")?,
        })
    }
}

struct Warmup {
    ready: AtomicBool,
}

impl Injectable for Warmup {
    fn metadata() -> ClassMetadata {
        ClassMetadata::of::<Warmup>().post_construct("init")
    }

    fn construct(_args: InjectedArgs) -> Result<Self, ContainerError> {
        Ok(Warmup {
            ready: AtomicBool::new(false),
        })
    }

    fn post_construct(self: Arc<Self>, hook: &str) -> Result<Activation<()>, ContainerError> {
        assert_eq!(hook, "init");
        self.ready.store(true, Ordering::SeqCst);
        Ok(Activation::Ready(()))
    }
}

/// Metadata for a class depending on `deps`, with a construction counter
fn node(name: &str, deps: &[&str]) -> (ClassMetadata, Arc<AtomicUsize>) {
    let metadata = deps
        .iter()
        .fold(ClassMetadata::new(name), |metadata, dep| metadata.argument(inject(*dep)));
    (metadata, Arc::new(AtomicUsize::new(0)))
}

#[test]
fn test_resolves_class_graph() {
    let container = Container::new();
    container.bind("Katana", |b| b.to_type::<Katana>()).unwrap();
    container.bind("Shuriken", |b| b.to_type::<Shuriken>()).unwrap();
    container.bind("Ninja", |b| b.to_type::<Ninja>()).unwrap();

    let ninja = container.get::<Ninja>("Ninja").unwrap();
    assert!(ninja.shuriken.is_some());
    assert!(Arc::strong_count(&ninja.katana) >= 1);
}

#[test]
fn test_optional_property_left_empty() {
    let container = Container::new();
    container.bind("Katana", |b| b.to_type::<Katana>()).unwrap();
    container.bind("Ninja", |b| b.to_type::<Ninja>()).unwrap();

    let ninja = container.get::<Ninja>("Ninja").unwrap();
    assert!(ninja.shuriken.is_none());
}

#[test]
fn test_type_keys_and_to_self() {
    let container = Container::new();
    container
        .bind(ServiceIdentifier::of::<Katana>(), |b| b.to_self::<Katana>())
        .unwrap();

    assert!(container.is_bound(ServiceIdentifier::of::<Katana>()));
    assert!(container.get::<Katana>(ServiceIdentifier::of::<Katana>()).is_ok());
    assert!(container
        .bind("Katana", |b| b.to_self::<Katana>())
        .is_err());
}

#[test]
fn test_circular_dependency_reports_chain_before_any_construction() {
    let container = Container::new();
    let mut counters = Vec::new();
    for (name, deps) in [("A", vec!["B", "C"]), ("B", vec![]), ("C", vec!["D"]), ("D", vec!["A"])] {
        let (metadata, counter) = node(name, &deps);
        let constructed = counter.clone();
        container
            .bind(name, move |b| {
                b.to_constructor(metadata, move |_| {
                    constructed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .unwrap();
        counters.push(counter);
    }

    let err = container.get::<()>("A").unwrap_err();
    assert!(err.is_circular());
    assert_eq!(err.to_string(), "Circular dependency found: A --> C --> D --> A");
    assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 0));
}

#[test]
fn test_unresolved_dependency_names_the_injection_point() {
    let container = Container::new();
    container.bind("Ninja", |b| b.to_type::<Ninja>()).unwrap();

    let err = container.get::<Ninja>("Ninja").unwrap_err();
    assert!(matches!(err, ContainerError::UnresolvedBinding { .. }));
    assert_eq!(
        err.to_string(),
        "No matching bindings found for serviceIdentifier: Katana (constructor argument 0 of Ninja)"
    );
}

#[test]
fn test_ambiguous_binding_lists_candidates() {
    let container = Container::new();
    container.bind("Weapon", |b| b.to_constant_value("katana")).unwrap();
    container.bind("Weapon", |b| b.to_constant_value("shuriken")).unwrap();

    let err = container.get::<&'static str>("Weapon").unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, ContainerError::AmbiguousBinding { .. }));
    assert!(message.starts_with("Ambiguous match found for serviceIdentifier: Weapon"));
    assert!(message.contains("Registered bindings:"));
    assert_eq!(message.matches("Weapon (Constant)").count(), 2);
}

#[test]
fn test_named_constraints_resolve_ambiguity() {
    let container = Container::new();
    container
        .bind("Weapon", |b| b.to_type::<Katana>().when_target_named("katana"))
        .unwrap();
    container
        .bind("Weapon", |b| b.to_type::<Shuriken>().when_target_named("shuriken"))
        .unwrap();

    assert!(container.get_named::<Katana>("Weapon", "katana").is_ok());
    assert!(container.get_named::<Shuriken>("Weapon", "shuriken").is_ok());
    assert!(matches!(
        container.get::<Katana>("Weapon"),
        Err(ContainerError::UnresolvedBinding { .. })
    ));
}

#[test]
fn test_tagged_lookup() {
    let container = Container::new();
    container
        .bind("Weapon", |b| b.to_constant_value("katana").when_target_tagged("canThrow", false))
        .unwrap();
    container
        .bind("Weapon", |b| b.to_constant_value("shuriken").when_target_tagged("canThrow", true))
        .unwrap();

    assert_eq!(*container.get_tagged::<&str>("Weapon", "canThrow", true).unwrap(), "shuriken");
    assert_eq!(*container.get_tagged::<&str>("Weapon", "canThrow", false).unwrap(), "katana");
    assert_eq!(
        container.get_all_tagged::<&str>("Weapon", "canThrow", true).unwrap().len(),
        1
    );
}

#[test]
fn test_default_binding_wins_for_plain_lookups() {
    let container = Container::new();
    container.bind("Weapon", |b| b.to_constant_value("katana")).unwrap();
    container
        .bind("Weapon", |b| b.to_constant_value("shuriken").when(|_| true))
        .unwrap();

    assert_eq!(*container.get::<&str>("Weapon").unwrap(), "katana");
    assert_eq!(*container.get_named::<&str>("Weapon", "anything").unwrap(), "shuriken");

    let strict = Container::with_options(ContainerOptions::default().with_prefer_default_binding(false));
    strict.bind("Weapon", |b| b.to_constant_value("katana")).unwrap();
    strict
        .bind("Weapon", |b| b.to_constant_value("shuriken").when(|_| true))
        .unwrap();
    assert!(matches!(
        strict.get::<&str>("Weapon"),
        Err(ContainerError::AmbiguousBinding { .. })
    ));
}

#[test]
fn test_named_dynamic_value_sees_target_name() {
    let container = Container::new();
    container
        .bind("Weapon", |b| {
            b.to_dynamic_value(|context| {
                Ok(format!("weapon:{}", context.target().named_tag().unwrap_or("none")))
            })
            .when(|request| request.target().is_named())
        })
        .unwrap();

    assert_eq!(*container.get_named::<String>("Weapon", "katana").unwrap(), "weapon:katana");
    assert_eq!(*container.get_named::<String>("Weapon", "bow").unwrap(), "weapon:bow");
}

#[test]
fn test_parent_constraints() {
    let container = Container::new();
    container
        .bind("Weapon", |b| b.to_constant_value("katana").when_injected_into("Samurai"))
        .unwrap();
    container
        .bind("Weapon", |b| b.to_constant_value("shuriken").when_injected_into("Ninja"))
        .unwrap();
    for warrior in ["Samurai", "Ninja"] {
        container
            .bind(warrior, |b| {
                b.to_constructor(ClassMetadata::new(warrior).argument(inject("Weapon")), |args| {
                    Ok(*args.arg::<&'static str>(0)?)
                })
            })
            .unwrap();
    }

    assert_eq!(*container.get::<&str>("Samurai").unwrap(), "katana");
    assert_eq!(*container.get::<&str>("Ninja").unwrap(), "shuriken");
    assert!(container.get::<&str>("Weapon").is_err());
}

#[test]
fn test_singleton_and_transient_scopes() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counted = calls.clone();
    container
        .bind("Singleton", move |b| {
            b.to_dynamic_value(move |_| Ok(counted.fetch_add(1, Ordering::SeqCst)))
                .in_singleton_scope()
        })
        .unwrap();
    container
        .bind("Transient", |b| b.to_dynamic_value(|_| Ok(String::from("fresh"))))
        .unwrap();

    let first = container.get::<usize>("Singleton").unwrap();
    let second = container.get::<usize>("Singleton").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let first = container.get::<String>("Transient").unwrap();
    let second = container.get::<String>("Transient").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

struct Pair {
    left: Arc<usize>,
    right: Arc<usize>,
}

#[test]
fn test_request_scope_shares_within_one_resolution() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    container
        .bind("Token", move |b| {
            b.to_dynamic_value(move |_| Ok(counted.fetch_add(1, Ordering::SeqCst)))
                .in_request_scope()
        })
        .unwrap();
    container
        .bind("Pair", |b| {
            b.to_constructor(
                ClassMetadata::new("Pair")
                    .argument(inject("Token"))
                    .argument(inject("Token")),
                |args| {
                    Ok(Pair {
                        left: args.arg(0)?,
                        right: args.arg(1)?,
                    })
                },
            )
        })
        .unwrap();

    let first = container.get::<Pair>("Pair").unwrap();
    assert!(Arc::ptr_eq(&first.left, &first.right));

    let second = container.get::<Pair>("Pair").unwrap();
    assert!(Arc::ptr_eq(&second.left, &second.right));
    assert!(!Arc::ptr_eq(&first.left, &second.left));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_aliases_share_one_singleton() {
    let container = Container::new();
    container
        .bind("Katana", |b| b.to_type::<Katana>().in_singleton_scope())
        .unwrap();
    let ids = container
        .multi_bind_to_service("Katana", ["Weapon", "Blade"])
        .unwrap();
    assert_eq!(ids.len(), 2);

    let weapon = container.get::<Katana>("Weapon").unwrap();
    let blade = container.get::<Katana>("Blade").unwrap();
    let katana = container.get::<Katana>("Katana").unwrap();
    assert!(Arc::ptr_eq(&weapon, &blade));
    assert!(Arc::ptr_eq(&weapon, &katana));
}

#[test]
fn test_multi_injection_keeps_registration_order() {
    let container = Container::new();
    for name in ["katana", "shuriken", "bow"] {
        container.bind("Weapon", move |b| b.to_constant_value(name)).unwrap();
    }
    container
        .bind("Arsenal", |b| {
            b.to_constructor(
                ClassMetadata::new("Arsenal").argument(inject("Weapon").multi()),
                |args| {
                    Ok(args
                        .all_arg::<&'static str>(0)?
                        .iter()
                        .map(|weapon| weapon.to_string())
                        .collect::<Vec<_>>())
                },
            )
        })
        .unwrap();

    let weapons = container.get_all::<&str>("Weapon").unwrap();
    let weapons = weapons.iter().map(|w| **w).collect::<Vec<_>>();
    assert_eq!(weapons, vec!["katana", "shuriken", "bow"]);

    let arsenal = container.get::<Vec<String>>("Arsenal").unwrap();
    assert_eq!(*arsenal, vec!["katana", "shuriken", "bow"]);

    assert!(matches!(
        container.get_all::<&str>("Armor"),
        Err(ContainerError::UnresolvedBinding { .. })
    ));
}

#[test]
fn test_factory_binding_resolves_to_callable() {
    let container = Container::new();
    container.bind("Katana", |b| b.to_type::<Katana>()).unwrap();
    container
        .bind("KatanaFactory", |b| {
            b.to_factory(|context| {
                let container = context.container().clone();
                Factory::new(move |count: usize| {
                    (0..count)
                        .map(|_| container.get::<Katana>("Katana"))
                        .collect::<Result<Vec<_>, _>>()
                })
            })
        })
        .unwrap();

    let factory = container
        .get::<Factory<usize, Vec<Arc<Katana>>>>("KatanaFactory")
        .unwrap();
    assert_eq!(factory.call(3).unwrap().len(), 3);
}

#[test]
fn test_post_construct_runs_before_instance_is_returned() {
    let container = Container::new();
    container.bind("Warmup", |b| b.to_type::<Warmup>()).unwrap();

    let warmup = container.get::<Warmup>("Warmup").unwrap();
    assert!(warmup.ready.load(Ordering::SeqCst));
}

#[derive(Debug)]
struct Flaky;

#[test]
fn test_post_construct_failure_releases_singleton_slot() {
    let container = Container::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let class = ClassBinding::from_constructor(ClassMetadata::new("Flaky").post_construct("init"), |_| {
        Ok(Flaky)
    })
    .with_post_construct(move |_: Arc<Flaky>, _: &str| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ContainerError::custom("boom"));
        }
        Ok(Activation::Ready(()))
    });
    container
        .bind("Flaky", move |b| b.to_class(class).in_singleton_scope())
        .unwrap();

    let err = container.get::<Flaky>("Flaky").unwrap_err();
    assert!(err.is_activation());
    assert_eq!(
        err.to_string(),
        "Activation failed for serviceIdentifier Flaky: post-construct error in class Flaky: boom"
    );

    let first = container.get::<Flaky>("Flaky").unwrap();
    let second = container.get::<Flaky>("Flaky").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[derive(Debug)]
struct Pool;

impl Injectable for Pool {
    fn metadata() -> ClassMetadata {
        ClassMetadata::of::<Pool>().post_construct("init")
    }

    fn construct(_args: InjectedArgs) -> Result<Self, ContainerError> {
        Ok(Pool)
    }
}

#[test]
fn test_declared_hook_without_runner_fails_for_types() {
    let container = Container::new();
    container.bind("Pool", |b| b.to_type::<Pool>()).unwrap();

    let err = container.get::<Pool>("Pool").unwrap_err();
    assert!(err.is_activation());
    assert!(err.to_string().contains("Post-construct hook init declared on"));
    assert!(err.to_string().contains("has no runner"));
}

#[test]
fn test_declared_hook_without_runner_fails_for_constructors() {
    let container = Container::new();
    container
        .bind("Pool", |b| {
            b.to_constructor(ClassMetadata::new("Pool").post_construct("init"), |_| Ok(Pool))
                .in_singleton_scope()
        })
        .unwrap();

    let err = container.get::<Pool>("Pool").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Activation failed for serviceIdentifier Pool: post-construct error in class Pool: \
         Post-construct hook init declared on Pool has no runner"
    );
    // the failed singleton does not stay cached
    assert!(container.get::<Pool>("Pool").is_err());
}

#[test]
fn test_multiple_post_construct_hooks_rejected() {
    let container = Container::new();
    container
        .bind("Twice", |b| {
            b.to_constructor(
                ClassMetadata::new("Twice").post_construct("a").post_construct("b"),
                |_| Ok(()),
            )
        })
        .unwrap();

    let err = container.get::<()>("Twice").unwrap_err();
    assert!(matches!(err, ContainerError::MultiplePostConstructHooks { .. }));
    assert_eq!(
        err.to_string(),
        "Cannot declare more than one post-construct hook in the same class: Twice"
    );
}

#[test]
fn test_strategy_errors_become_activation_failures() {
    let container = Container::new();
    container
        .bind("Broken", |b| {
            b.to_dynamic_value(|_| -> Result<u8, ContainerError> { Err(ContainerError::custom("no luck")) })
        })
        .unwrap();

    let err = container.get::<u8>("Broken").unwrap_err();
    assert_eq!(
        err,
        ContainerError::activation_failed("Broken", "no luck")
    );
}

#[test]
fn test_on_activation_replaces_instance_once_per_construction() {
    let container = Container::new();
    let activations = Arc::new(AtomicUsize::new(0));
    let seen = activations.clone();
    container
        .bind("Answer", move |b| {
            b.to_dynamic_value(|_| Ok(41u32))
                .in_singleton_scope()
                .on_activation::<u32, _>(move |_, value| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(*value + 1))
                })
        })
        .unwrap();

    assert_eq!(*container.get::<u32>("Answer").unwrap(), 42);
    assert_eq!(*container.get::<u32>("Answer").unwrap(), 42);
    assert_eq!(activations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unbind_runs_deactivation_for_cached_singletons() {
    let container = Container::new();
    let deactivated = Arc::new(AtomicUsize::new(0));
    let seen = deactivated.clone();
    container
        .bind("Katana", move |b| {
            b.to_type::<Katana>()
                .in_singleton_scope()
                .on_deactivation::<Katana, _>(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
        })
        .unwrap();

    let before = container.get::<Katana>("Katana").unwrap();
    container.unbind("Katana").unwrap();
    assert_eq!(deactivated.load(Ordering::SeqCst), 1);
    assert!(!container.is_bound("Katana"));

    container.bind("Katana", |b| b.to_type::<Katana>().in_singleton_scope()).unwrap();
    let after = container.get::<Katana>("Katana").unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn test_unbind_all_clears_registry() {
    let container = Container::new();
    container.bind("Katana", |b| b.to_type::<Katana>()).unwrap();
    container.bind("Shuriken", |b| b.to_type::<Shuriken>()).unwrap();

    container.unbind_all().unwrap();
    assert_eq!(container.binding_count(), 0);
    assert!(container.registered_services().is_empty());
}

#[test]
fn test_plan_is_inspectable_without_resolving() {
    let container = Container::new();
    container.bind("Katana", |b| b.to_type::<Katana>()).unwrap();
    container.bind("Shuriken", |b| b.to_type::<Shuriken>()).unwrap();
    container.bind("Ninja", |b| b.to_type::<Ninja>()).unwrap();

    let plan = container.plan(Target::variable("Ninja")).unwrap();
    assert_eq!(plan.len(), 3);
    let root = plan.root();
    assert_eq!(root.bindings().len(), 1);
    let children = root
        .children()
        .map(|child| child.service_identifier().to_string())
        .collect::<Vec<_>>();
    assert_eq!(children, vec!["Katana", "Shuriken"]);
    assert!(root.children().all(|child| child.parent().map(|p| p.id()) == Some(root.id())));
}
