//! Resolution planning.
//!
//! A [`Plan`] is an arena of [`RequestNode`]s. Children are owned by the arena
//! and referenced by index; the parent link is an index too, so the tree carries
//! no reference cycles. The planner fetches candidate bindings, filters them
//! through their constraints, disambiguates, and recurses into injection points.
//! Cycles are rejected here, before any strategy runs.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::ContainerOptions;
use crate::container::binding::{Binding, BindingId, BindingStrategy};
use crate::container::identifier::ServiceIdentifier;
use crate::container::metadata::MetadataReader;
use crate::container::registry::BindingRegistry;
use crate::container::target::{Target, TargetKind};
use crate::errors::ContainerError;

/// Index of a request inside its plan
pub type RequestId = usize;

/// One node of a resolution plan
#[derive(Debug, Clone)]
pub struct RequestNode {
    pub id: RequestId,
    pub target: Target,
    pub parent: Option<RequestId>,
    pub bindings: Vec<Arc<Binding>>,
    /// Child requests, one list per entry of `bindings`
    pub dependencies: Vec<Vec<RequestId>>,
}

impl RequestNode {
    pub fn new(id: RequestId, target: Target, parent: Option<RequestId>) -> Self {
        Self {
            id,
            target,
            parent,
            bindings: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn service_identifier(&self) -> &ServiceIdentifier {
        &self.target.service_identifier
    }
}

/// Borrowed view of a request with access to its ancestors
#[derive(Clone, Copy)]
pub struct RequestRef<'a> {
    nodes: &'a [RequestNode],
    id: RequestId,
}

impl<'a> RequestRef<'a> {
    pub fn new(nodes: &'a [RequestNode], id: RequestId) -> Self {
        Self { nodes, id }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn node(&self) -> &'a RequestNode {
        &self.nodes[self.id]
    }

    pub fn target(&self) -> &'a Target {
        &self.node().target
    }

    pub fn service_identifier(&self) -> &'a ServiceIdentifier {
        self.node().service_identifier()
    }

    pub fn bindings(&self) -> &'a [Arc<Binding>] {
        &self.node().bindings
    }

    pub fn parent(&self) -> Option<RequestRef<'a>> {
        self.node().parent.map(|id| RequestRef::new(self.nodes, id))
    }

    /// Parent, grandparent, ... up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = RequestRef<'a>> + 'a {
        std::iter::successors(self.parent(), |request| request.parent())
    }

    /// Children of this request
    pub fn children(&self) -> impl Iterator<Item = RequestRef<'a>> + 'a {
        let nodes = self.nodes;
        self.node()
            .dependencies
            .iter()
            .flatten()
            .map(move |id| RequestRef::new(nodes, *id))
    }

    /// Number of ancestors
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }
}

impl fmt::Debug for RequestRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestRef")
            .field("id", &self.id)
            .field("service_identifier", self.service_identifier())
            .finish()
    }
}

/// Immutable resolution plan for one top-level lookup
#[derive(Debug, Clone)]
pub struct Plan {
    id: Uuid,
    nodes: Vec<RequestNode>,
    root: RequestId,
}

impl Plan {
    /// Unique id of the resolution this plan belongs to
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> RequestRef<'_> {
        RequestRef::new(&self.nodes, self.root)
    }

    pub fn request(&self, id: RequestId) -> RequestRef<'_> {
        RequestRef::new(&self.nodes, id)
    }

    pub fn node(&self, id: RequestId) -> &RequestNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub(crate) struct Planner<'a> {
    registry: &'a BindingRegistry,
    metadata: &'a dyn MetadataReader,
    options: &'a ContainerOptions,
    nodes: Vec<RequestNode>,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(
        registry: &'a BindingRegistry,
        metadata: &'a dyn MetadataReader,
        options: &'a ContainerOptions,
    ) -> Self {
        Self {
            registry,
            metadata,
            options,
            nodes: Vec::new(),
        }
    }

    /// Build the complete plan for a root target
    pub(crate) fn build(mut self, target: Target) -> Result<Plan, ContainerError> {
        let root = self.plan_request(target, None, None)?;
        let plan = Plan {
            id: Uuid::new_v4(),
            nodes: self.nodes,
            root,
        };
        tracing::debug!(
            plan = %plan.id,
            service = %plan.root().service_identifier(),
            requests = plan.len(),
            "plan built"
        );
        Ok(plan)
    }

    fn plan_request(
        &mut self,
        target: Target,
        parent: Option<RequestId>,
        owner: Option<&str>,
    ) -> Result<RequestId, ContainerError> {
        let id = self.nodes.len();
        self.nodes.push(RequestNode::new(id, target, parent));

        let depth = RequestRef::new(&self.nodes, id).depth();
        if depth >= self.options.max_plan_depth {
            return Err(ContainerError::PlanTooDeep {
                service: self.nodes[id].service_identifier().to_string(),
                max_depth: self.options.max_plan_depth,
            });
        }

        let candidates = self.registry.get_bindings(self.nodes[id].service_identifier());
        let matched = {
            let request = RequestRef::new(&self.nodes, id);
            candidates
                .iter()
                .filter(|binding| binding.matches(Some(&request)))
                .cloned()
                .collect::<Vec<_>>()
        };
        let selected = self.select(id, matched, &candidates, owner)?;
        self.nodes[id].bindings = selected.clone();

        for binding in &selected {
            let dependencies = match &binding.strategy {
                BindingStrategy::Type(class) | BindingStrategy::Constructor(class) => {
                    self.check_cycle(id, binding.id)?;
                    let metadata = self.metadata.class_metadata(class)?;
                    let mut children = Vec::with_capacity(metadata.targets.len());
                    for point in metadata.targets.iter() {
                        let child = self.plan_request(
                            point.clone(),
                            Some(id),
                            Some(metadata.type_name.as_str()),
                        )?;
                        children.push(child);
                    }
                    children
                }
                BindingStrategy::Service(alias) => {
                    self.check_cycle(id, binding.id)?;
                    let alias_owner = binding.service_identifier.to_string();
                    let target = Target::variable(alias.clone());
                    vec![self.plan_request(target, Some(id), Some(alias_owner.as_str()))?]
                }
                _ => Vec::new(),
            };
            self.nodes[id].dependencies.push(dependencies);
        }

        Ok(id)
    }

    /// Apply the disambiguation policy to constraint-filtered bindings
    fn select(
        &self,
        id: RequestId,
        matched: Vec<Arc<Binding>>,
        candidates: &[Arc<Binding>],
        owner: Option<&str>,
    ) -> Result<Vec<Arc<Binding>>, ContainerError> {
        let target = &self.nodes[id].target;

        if target.multi {
            if matched.is_empty() && !target.optional {
                return Err(self.unresolved(target, owner));
            }
            return Ok(matched);
        }

        match matched.len() {
            0 if target.optional => Ok(Vec::new()),
            0 => Err(self.unresolved(target, owner)),
            1 => Ok(matched),
            _ => {
                if self.options.prefer_default_binding {
                    let wants_constrained = !target.is_default();
                    let narrowed = matched
                        .iter()
                        .filter(|binding| binding.is_constrained() == wants_constrained)
                        .cloned()
                        .collect::<Vec<_>>();
                    if narrowed.len() == 1 {
                        return Ok(narrowed);
                    }
                }
                tracing::debug!(
                    service = %target.service_identifier,
                    matches = matched.len(),
                    registered = candidates.len(),
                    "ambiguous binding"
                );
                Err(ContainerError::AmbiguousBinding {
                    service: target.service_identifier.to_string(),
                    location: location(owner, &target.kind),
                    metadata: target.metadata_description(),
                    candidates: matched
                        .iter()
                        .map(|binding| format!("\n {}", binding.describe()))
                        .collect(),
                })
            }
        }
    }

    fn unresolved(&self, target: &Target, owner: Option<&str>) -> ContainerError {
        ContainerError::UnresolvedBinding {
            service: target.service_identifier.to_string(),
            location: location(owner, &target.kind),
            metadata: target.metadata_description(),
        }
    }

    /// Reject re-entering a binding already being expanded on the current path
    fn check_cycle(&self, id: RequestId, binding: BindingId) -> Result<(), ContainerError> {
        let request = RequestRef::new(&self.nodes, id);
        let mut child = request.id();
        let mut repeated = false;
        for ancestor in request.ancestors() {
            let node = ancestor.node();
            // children of the binding being expanded are not recorded yet
            let via = node
                .dependencies
                .iter()
                .position(|children| children.contains(&child))
                .unwrap_or(node.dependencies.len());
            if node.bindings.get(via).map_or(false, |b| b.id == binding) {
                repeated = true;
                break;
            }
            child = ancestor.id();
        }
        if !repeated {
            return Ok(());
        }

        let mut chain = request
            .ancestors()
            .map(|ancestor| ancestor.service_identifier().to_string())
            .collect::<Vec<_>>();
        chain.reverse();
        chain.push(request.service_identifier().to_string());
        tracing::debug!(chain = %chain.join(" --> "), "circular dependency");
        Err(ContainerError::circular_dependency(chain))
    }
}

fn location(owner: Option<&str>, kind: &TargetKind) -> String {
    match (owner, kind) {
        (None, _) => String::new(),
        (Some(owner), TargetKind::Variable) => format!(" (requested by {})", owner),
        (Some(owner), kind) => format!(" ({} of {})", kind, owner),
    }
}
