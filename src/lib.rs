pub mod collection;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod graph_types;
pub mod inputs;
pub mod loader;
pub mod model;
pub mod permission;
#[cfg(feature = "postgres")]
pub mod pg_storage;
pub mod query_executor;
pub mod query_planner;
pub mod reference;
pub mod schema_registry;
pub mod seed;
pub mod server;
pub mod storage;
pub mod subgraph;

pub use context::RequestContext;
pub use error::{GraphError, RequestError, ResolveError, StorageError};
pub use permission::{Action, AllowAll, Authenticated, Permission};
pub use query_executor::GraphExecutor;
pub use query_planner::DocumentPlanner;
pub use schema_registry::SchemaRegistry;
pub use storage::{Filter, InMemoryStorage, Storage, UpdateOutcome};
pub use subgraph::Subgraph;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Option<Value>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
    /// Caller identity, taken from a request header rather than the body.
    #[serde(skip)]
    pub principal: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub fn root_type(&self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
        }
    }
}

/// One operation of a document, with variables substituted and named
/// fragments inlined.
#[derive(Debug, Clone)]
pub struct OperationPlan {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub selection: Vec<Selection>,
}

#[derive(Debug, Clone)]
pub enum Selection {
    Field(FieldPlan),
    Fragment {
        type_condition: Option<String>,
        selection: Vec<Selection>,
    },
}

#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Map<String, Value>,
    pub selection: Vec<Selection>,
}

impl FieldPlan {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}
