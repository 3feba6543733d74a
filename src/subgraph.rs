use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{RequestError, SchemaError};
use crate::permission::Permission;
use crate::query_executor::{GraphExecutor, QueryExecutor};
use crate::query_planner::{DocumentPlanner, QueryPlanner};
use crate::schema_registry::SchemaRegistry;
use crate::seed::{SeedData, SeedError};
use crate::storage::Storage;
use crate::GraphQLRequest;

/// The publications subgraph: plans each request, gives it a fresh
/// [`RequestContext`] and executes it against the registry.
pub struct Subgraph {
    registry: Arc<SchemaRegistry>,
    query_planner: Arc<Box<dyn QueryPlanner + Send + Sync>>,
    query_executor: Arc<Box<dyn QueryExecutor + Send + Sync>>,
    storage: Arc<dyn Storage>,
    permission: Arc<dyn Permission>,
}

impl Subgraph {
    pub fn new(
        registry: SchemaRegistry,
        query_planner: Box<dyn QueryPlanner + Send + Sync>,
        query_executor: Box<dyn QueryExecutor + Send + Sync>,
        storage: Arc<dyn Storage>,
        permission: Arc<dyn Permission>,
    ) -> Self {
        Subgraph {
            registry: Arc::new(registry),
            query_planner: Arc::new(query_planner),
            query_executor: Arc::new(query_executor),
            storage,
            permission,
        }
    }

    /// The standard registry, planner and executor over `storage`.
    pub fn with_storage(
        storage: Arc<dyn Storage>,
        permission: Arc<dyn Permission>,
    ) -> Result<Self, SchemaError> {
        Ok(Subgraph::new(
            SchemaRegistry::standard()?,
            Box::new(DocumentPlanner::new()),
            Box::new(GraphExecutor::new()),
            storage,
            permission,
        ))
    }

    pub async fn process_request(&self, request: GraphQLRequest) -> Result<Value, RequestError> {
        debug!(
            operation = request.operation_name.as_deref().unwrap_or("<anonymous>"),
            principal = ?request.principal,
            "processing request"
        );

        let plan = self.query_planner.plan_query(&request).await?;

        let ctx = Arc::new(RequestContext::new(
            request.principal,
            Arc::clone(&self.storage),
            Arc::clone(&self.permission),
        ));
        Ok(self
            .query_executor
            .execute_plan(plan, &self.registry, ctx)
            .await)
    }

    pub async fn load_seed(&self, path: &Path) -> Result<usize, SeedError> {
        SeedData::load(path)?.apply(self.storage.as_ref()).await
    }
}
