use std::sync::Arc;

use uuid::Uuid;

use crate::container::ioc_container::Container;
use crate::container::plan::{Plan, RequestId, RequestRef};
use crate::container::target::Target;

/// What a dynamic value, factory, provider or activation hook sees of the
/// resolution it runs in
#[derive(Clone)]
pub struct Context {
    container: Container,
    plan: Arc<Plan>,
    request: RequestId,
}

impl Context {
    pub(crate) fn new(container: Container, plan: Arc<Plan>, request: RequestId) -> Self {
        Self {
            container,
            plan,
            request,
        }
    }

    /// Container performing the resolution
    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Request currently being activated
    pub fn current_request(&self) -> RequestRef<'_> {
        self.plan.request(self.request)
    }

    /// Target of the current request
    pub fn target(&self) -> &Target {
        &self.plan.node(self.request).target
    }

    /// Id shared by every activation of one top-level lookup
    pub fn resolution_id(&self) -> Uuid {
        self.plan.id()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("resolution_id", &self.plan.id())
            .field("request", &self.request)
            .field("service_identifier", &self.target().service_identifier)
            .finish()
    }
}
