//! Per-type injection metadata and the lookup the planner reads it through.
//!
//! A type describes its constructor arguments, injected properties and
//! post-construction hook once, through [`Injectable::metadata`]. The table is
//! treated as immutable input: [`MetadataTable`] validates it on first use and
//! caches the result.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::container::activation::{downcast, Activation, Injected, Instance};
use crate::container::identifier::ServiceIdentifier;
use crate::container::target::{Target, TargetKind};
use crate::errors::ContainerError;

/// Start describing an injection point for `id`
pub fn inject(id: impl Into<ServiceIdentifier>) -> Target {
    Target::variable(id)
}

/// Declarative description of a constructable type
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetadata {
    pub type_name: String,
    pub targets: Vec<Target>,
    pub post_construct: Vec<String>,
}

impl ClassMetadata {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            targets: Vec::new(),
            post_construct: Vec::new(),
        }
    }

    /// Metadata named after `T`
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self::new(ServiceIdentifier::of::<T>().to_string())
    }

    /// Append a constructor argument, indexed in declaration order
    pub fn argument(mut self, target: Target) -> Self {
        let index = self
            .targets
            .iter()
            .filter(|t| matches!(t.kind, TargetKind::ConstructorArgument(_)))
            .count();
        self.targets.push(Target {
            kind: TargetKind::ConstructorArgument(index),
            ..target
        });
        self
    }

    /// Append an injected property
    pub fn property(mut self, name: impl Into<String>, target: Target) -> Self {
        self.targets.push(Target {
            kind: TargetKind::ClassProperty(name.into()),
            ..target
        });
        self
    }

    /// Declare a post-construction hook
    pub fn post_construct(mut self, hook: impl Into<String>) -> Self {
        self.post_construct.push(hook.into());
        self
    }
}

/// Validated metadata as seen by the planner
#[derive(Debug, Clone)]
pub struct ResolvedMetadata {
    pub type_name: String,
    pub targets: Arc<[Target]>,
    pub post_construct: Option<String>,
}

impl ResolvedMetadata {
    fn validate(metadata: ClassMetadata) -> Result<Self, ContainerError> {
        if metadata.post_construct.len() > 1 {
            return Err(ContainerError::MultiplePostConstructHooks {
                class: metadata.type_name,
            });
        }
        Ok(Self {
            post_construct: metadata.post_construct.into_iter().next(),
            targets: metadata.targets.into(),
            type_name: metadata.type_name,
        })
    }
}

/// A type the container can construct from injected dependencies
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Injection points and hooks of this type
    fn metadata() -> ClassMetadata;

    /// Build an instance from resolved dependencies
    fn construct(args: InjectedArgs) -> Result<Self, ContainerError>;

    /// Run the post-construction hook named in the metadata
    ///
    /// Types that declare a hook must override this; the default fails.
    fn post_construct(self: Arc<Self>, hook: &str) -> Result<Activation<()>, ContainerError> {
        Err(ContainerError::MissingPostConstruct {
            class: ServiceIdentifier::of::<Self>().to_string(),
            hook: hook.to_string(),
        })
    }
}

/// Cache key for validated metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    Type(TypeId),
    Constructor(Uuid),
}

type MetadataFn = Arc<dyn Fn() -> ClassMetadata + Send + Sync>;
type ConstructFn = Arc<dyn Fn(InjectedArgs) -> Result<Instance, ContainerError> + Send + Sync>;
type PostConstructFn =
    Arc<dyn Fn(&Instance, &str) -> Result<Activation<()>, ContainerError> + Send + Sync>;

/// Everything needed to plan and build one constructable type
#[derive(Clone)]
pub struct ClassBinding {
    pub key: MetadataKey,
    pub type_name: String,
    metadata: MetadataFn,
    construct: ConstructFn,
    post_construct: PostConstructFn,
}

impl ClassBinding {
    /// Class binding driven by an [`Injectable`] type
    pub fn of<T: Injectable>() -> Self {
        Self {
            key: MetadataKey::Type(TypeId::of::<T>()),
            type_name: ServiceIdentifier::of::<T>().to_string(),
            metadata: Arc::new(T::metadata),
            construct: Arc::new(|args: InjectedArgs| Ok(Arc::new(T::construct(args)?) as Instance)),
            post_construct: Arc::new(|instance: &Instance, hook: &str| {
                let typed = downcast::<T>(instance, std::any::type_name::<T>())?;
                typed.post_construct(hook)
            }),
        }
    }

    /// Class binding built from explicit metadata and a constructor closure
    pub fn from_constructor<T, F>(metadata: ClassMetadata, constructor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(InjectedArgs) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let class = metadata.type_name.clone();
        Self {
            key: MetadataKey::Constructor(Uuid::new_v4()),
            type_name: metadata.type_name.clone(),
            metadata: Arc::new(move || metadata.clone()),
            construct: Arc::new(move |args: InjectedArgs| {
                Ok(Arc::new(constructor(args)?) as Instance)
            }),
            post_construct: Arc::new(move |_: &Instance, hook: &str| {
                Err(ContainerError::MissingPostConstruct {
                    class: class.clone(),
                    hook: hook.to_string(),
                })
            }),
        }
    }

    /// Attach a post-construction hook runner to a constructor binding
    pub fn with_post_construct<T, F>(mut self, hook: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>, &str) -> Result<Activation<()>, ContainerError> + Send + Sync + 'static,
    {
        self.post_construct = Arc::new(move |instance: &Instance, name: &str| {
            let typed = downcast::<T>(instance, std::any::type_name::<T>())?;
            hook(typed, name)
        });
        self
    }

    /// Read the raw, unvalidated metadata
    pub fn raw_metadata(&self) -> ClassMetadata {
        (self.metadata)()
    }

    pub(crate) fn construct(&self, args: InjectedArgs) -> Result<Instance, ContainerError> {
        (self.construct)(args)
    }

    pub(crate) fn run_post_construct(
        &self,
        instance: &Instance,
        hook: &str,
    ) -> Result<Activation<()>, ContainerError> {
        (self.post_construct)(instance, hook)
    }
}

impl fmt::Debug for ClassBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBinding")
            .field("key", &self.key)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Read-only lookup of injection metadata
pub trait MetadataReader: Send + Sync {
    /// Validated metadata for a class
    fn class_metadata(&self, class: &ClassBinding) -> Result<Arc<ResolvedMetadata>, ContainerError>;

    /// Ordered injection points of a class
    fn injection_points(&self, class: &ClassBinding) -> Result<Arc<[Target]>, ContainerError> {
        Ok(self.class_metadata(class)?.targets.clone())
    }

    /// Post-construction hook of a class, if any
    fn post_construct_hook(&self, class: &ClassBinding) -> Result<Option<String>, ContainerError> {
        Ok(self.class_metadata(class)?.post_construct.clone())
    }

    /// Forget metadata cached for a class whose binding was removed
    fn evict(&self, _class: &ClassBinding) {}
}

/// Default [`MetadataReader`], validates once and caches per type
#[derive(Debug, Default)]
pub struct MetadataTable {
    entries: RwLock<HashMap<MetadataKey, Arc<ResolvedMetadata>>>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataReader for MetadataTable {
    fn class_metadata(&self, class: &ClassBinding) -> Result<Arc<ResolvedMetadata>, ContainerError> {
        {
            let entries = self
                .entries
                .read()
                .map_err(|_| ContainerError::lock("metadata_table"))?;
            if let Some(entry) = entries.get(&class.key) {
                return Ok(entry.clone());
            }
        }

        let resolved = Arc::new(ResolvedMetadata::validate(class.raw_metadata())?);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ContainerError::lock("metadata_table"))?;
        Ok(entries.entry(class.key).or_insert(resolved).clone())
    }

    /// Only constructor entries are evicted, type entries are shared by every binding of the type
    fn evict(&self, class: &ClassBinding) {
        if !matches!(class.key, MetadataKey::Constructor(_)) {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&class.key);
        }
    }
}

/// Resolved dependencies handed to a constructor
pub struct InjectedArgs {
    class: String,
    targets: Arc<[Target]>,
    values: Vec<Injected>,
}

impl InjectedArgs {
    pub(crate) fn new(class: impl Into<String>, targets: Arc<[Target]>, values: Vec<Injected>) -> Self {
        Self {
            class: class.into(),
            targets,
            values,
        }
    }

    /// Name of the class being constructed
    pub fn class_name(&self) -> &str {
        &self.class
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn find(&self, kind: &TargetKind) -> Result<(&Target, &Injected), ContainerError> {
        self.targets
            .iter()
            .zip(self.values.iter())
            .find(|(target, _)| &target.kind == kind)
            .ok_or_else(|| ContainerError::MissingInjection {
                class: self.class.clone(),
                point: kind.to_string(),
            })
    }

    fn required<T: Send + Sync + 'static>(&self, kind: TargetKind) -> Result<Arc<T>, ContainerError> {
        let (target, value) = self.find(&kind)?;
        value
            .one::<T>(target.service_identifier.full_name())?
            .ok_or_else(|| ContainerError::MissingInjection {
                class: self.class.clone(),
                point: kind.to_string(),
            })
    }

    fn optional<T: Send + Sync + 'static>(&self, kind: TargetKind) -> Result<Option<Arc<T>>, ContainerError> {
        let (target, value) = self.find(&kind)?;
        value.one::<T>(target.service_identifier.full_name())
    }

    fn all<T: Send + Sync + 'static>(&self, kind: TargetKind) -> Result<Vec<Arc<T>>, ContainerError> {
        let (target, value) = self.find(&kind)?;
        value.all::<T>(target.service_identifier.full_name())
    }

    /// Required constructor argument
    pub fn arg<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, ContainerError> {
        self.required(TargetKind::ConstructorArgument(index))
    }

    /// Optional constructor argument
    pub fn optional_arg<T: Send + Sync + 'static>(&self, index: usize) -> Result<Option<Arc<T>>, ContainerError> {
        self.optional(TargetKind::ConstructorArgument(index))
    }

    /// Multi-injected constructor argument
    pub fn all_arg<T: Send + Sync + 'static>(&self, index: usize) -> Result<Vec<Arc<T>>, ContainerError> {
        self.all(TargetKind::ConstructorArgument(index))
    }

    /// Required property
    pub fn property<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        self.required(TargetKind::ClassProperty(name.to_string()))
    }

    /// Optional property
    pub fn optional_property<T: Send + Sync + 'static>(&self, name: &str) -> Result<Option<Arc<T>>, ContainerError> {
        self.optional(TargetKind::ClassProperty(name.to_string()))
    }

    /// Multi-injected property
    pub fn all_property<T: Send + Sync + 'static>(&self, name: &str) -> Result<Vec<Arc<T>>, ContainerError> {
        self.all(TargetKind::ClassProperty(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Katana;

    impl Injectable for Katana {
        fn metadata() -> ClassMetadata {
            ClassMetadata::of::<Katana>().post_construct("sharpen")
        }

        fn construct(_args: InjectedArgs) -> Result<Self, ContainerError> {
            Ok(Katana)
        }
    }

    struct DoubleHooked;

    impl Injectable for DoubleHooked {
        fn metadata() -> ClassMetadata {
            ClassMetadata::of::<DoubleHooked>()
                .post_construct("first")
                .post_construct("second")
        }

        fn construct(_args: InjectedArgs) -> Result<Self, ContainerError> {
            Ok(DoubleHooked)
        }
    }

    #[test]
    fn test_argument_indices_follow_declaration_order() {
        let metadata = ClassMetadata::new("Ninja")
            .argument(inject("Katana"))
            .property("shuriken", inject("Shuriken"))
            .argument(inject("Armor").optional());

        assert_eq!(metadata.targets[0].kind, TargetKind::ConstructorArgument(0));
        assert_eq!(
            metadata.targets[1].kind,
            TargetKind::ClassProperty("shuriken".to_string())
        );
        assert_eq!(metadata.targets[2].kind, TargetKind::ConstructorArgument(1));
        assert!(metadata.targets[2].optional);
    }

    #[test]
    fn test_table_reads_post_construct_hook() {
        let table = MetadataTable::new();
        let class = ClassBinding::of::<Katana>();

        assert_eq!(table.post_construct_hook(&class).unwrap().as_deref(), Some("sharpen"));
        assert!(table.injection_points(&class).unwrap().is_empty());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_multiple_post_construct_hooks_name_the_class() {
        let table = MetadataTable::new();
        let err = table
            .class_metadata(&ClassBinding::of::<DoubleHooked>())
            .unwrap_err();

        assert!(matches!(err, ContainerError::MultiplePostConstructHooks { .. }));
        assert!(err.to_string().contains("DoubleHooked"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_evict_drops_constructor_entries_only() {
        let table = MetadataTable::new();
        let typed = ClassBinding::of::<Katana>();
        let closure = ClassBinding::from_constructor(ClassMetadata::new("Dojo"), |_| Ok(()));
        table.class_metadata(&typed).unwrap();
        table.class_metadata(&closure).unwrap();

        table.evict(&closure);
        table.evict(&typed);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_injected_args_lookup() {
        let metadata = ClassMetadata::new("Ninja")
            .argument(inject("Katana"))
            .property("armor", inject("Armor").optional());
        let args = InjectedArgs::new(
            "Ninja",
            metadata.targets.into(),
            vec![Injected::One(Arc::new(3u8) as Instance), Injected::Missing],
        );

        assert_eq!(*args.arg::<u8>(0).unwrap(), 3);
        assert!(args.optional_property::<u8>("armor").unwrap().is_none());
        assert!(matches!(
            args.arg::<u8>(5),
            Err(ContainerError::MissingInjection { .. })
        ));
        assert!(matches!(
            args.property::<u8>("armor"),
            Err(ContainerError::MissingInjection { .. })
        ));
    }
}
