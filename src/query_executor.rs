use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::warn;

use crate::context::RequestContext;
use crate::error::{ErrorCode, GraphError, Path, PathSegment, ResolveError};
use crate::graph_types::{Node, Object, ObjectType};
use crate::model::Record;
use crate::schema_registry::SchemaRegistry;
use crate::{FieldPlan, OperationKind, OperationPlan, Selection};

#[async_trait]
pub trait QueryExecutor {
    /// Resolves the plan into a `{"data", "errors"}` response. Field
    /// failures are reported in `errors`; they never fail the call.
    async fn execute_plan(
        &self,
        plan: OperationPlan,
        registry: &SchemaRegistry,
        ctx: Arc<RequestContext>,
    ) -> Value;
}

/// Walks the selection tree against the registry's object types.
///
/// Sibling fields of a query, and the items of a list, are resolved
/// concurrently so their loads land in the same batch. Top-level mutation
/// fields run one after another in document order.
pub struct GraphExecutor;

impl GraphExecutor {
    pub fn new() -> Self {
        GraphExecutor
    }
}

impl Default for GraphExecutor {
    fn default() -> Self {
        GraphExecutor::new()
    }
}

#[async_trait]
impl QueryExecutor for GraphExecutor {
    async fn execute_plan(
        &self,
        plan: OperationPlan,
        registry: &SchemaRegistry,
        ctx: Arc<RequestContext>,
    ) -> Value {
        let root = Object::root(plan.kind.root_type());
        let serial = plan.kind == OperationKind::Mutation;
        let data = Walk {
            registry,
            ctx: &ctx,
        }
        .object(&root, &plan.selection, Vec::new(), serial)
        .await;

        let mut response = json!({ "data": data });
        let errors = ctx.take_errors();
        if !errors.is_empty() {
            response["errors"] = json!(errors);
        }
        response
    }
}

#[derive(Clone, Copy)]
struct Walk<'a> {
    registry: &'a SchemaRegistry,
    ctx: &'a Arc<RequestContext>,
}

fn child(path: &Path, segment: PathSegment) -> Path {
    let mut path = path.clone();
    path.push(segment);
    path
}

/// Fields of `selection` that apply to `type_name`, fragments flattened.
fn collect_fields<'s>(type_name: &str, selection: &'s [Selection], fields: &mut Vec<&'s FieldPlan>) {
    for item in selection {
        match item {
            Selection::Field(field) => fields.push(field),
            Selection::Fragment {
                type_condition,
                selection,
            } => {
                if type_condition.as_deref().is_none_or(|on| on == type_name) {
                    collect_fields(type_name, selection, fields);
                }
            }
        }
    }
}

impl<'a> Walk<'a> {
    fn report(&self, error: &ResolveError, path: Path) {
        if matches!(error, ResolveError::Storage(_) | ResolveError::Internal(_)) {
            warn!(?path, %error, "field failed");
        }
        self.ctx.push_error(GraphError::from_resolve(error, path));
    }

    fn node(self, node: Node, selection: &'a [Selection], path: Path) -> BoxFuture<'a, Value> {
        async move {
            match node {
                Node::Null => Value::Null,
                Node::Value(value) => value,
                Node::Failed(error) => {
                    self.report(&error, path);
                    Value::Null
                }
                Node::List(items) => Value::Array(
                    join_all(items.into_iter().enumerate().map(|(index, item)| {
                        self.node(item, selection, child(&path, PathSegment::Index(index)))
                    }))
                    .await,
                ),
                Node::Object(object) => self.object(&object, selection, path, false).await,
            }
        }
        .boxed()
    }

    async fn object(
        self,
        object: &Object,
        selection: &'a [Selection],
        path: Path,
        serial: bool,
    ) -> Value {
        let Some(object_type) = self.registry.object_type(object.type_name) else {
            self.report(
                &ResolveError::Internal(format!("no resolver for {}", object.type_name)),
                path,
            );
            return Value::Null;
        };
        if selection.is_empty() {
            self.ctx.push_error(GraphError::new(
                ErrorCode::ValidationError,
                format!("field of type {} must have a selection of subfields", object.type_name),
                path,
            ));
            return Value::Null;
        }

        let mut fields = Vec::new();
        collect_fields(object.type_name, selection, &mut fields);

        // Scalars come from one data fetch. A dangling object becomes null.
        let needs_data = fields.iter().any(|field| {
            field.name != "__typename"
                && field.name != "id"
                && !object_type.is_edge(&field.name)
                && self.registry.has_field(object.type_name, &field.name)
        });
        let data = if needs_data {
            match object_type.resolve_fields(self.ctx, object).await {
                Ok(data) => Some(data),
                Err(error) => {
                    self.report(&error, path);
                    return Value::Null;
                }
            }
        } else {
            None
        };

        let mut values = Map::new();
        if serial {
            for field in fields {
                let value = self
                    .field(object_type.as_ref(), object, data.as_ref(), field, &path)
                    .await;
                values.insert(field.response_key().to_string(), value);
            }
        } else {
            let resolved = join_all(fields.iter().map(|field| {
                self.field(object_type.as_ref(), object, data.as_ref(), field, &path)
            }))
            .await;
            for (field, value) in fields.iter().zip(resolved) {
                values.insert(field.response_key().to_string(), value);
            }
        }
        Value::Object(values)
    }

    async fn field(
        self,
        object_type: &dyn ObjectType,
        object: &Object,
        data: Option<&Record>,
        field: &'a FieldPlan,
        path: &Path,
    ) -> Value {
        let path = child(path, PathSegment::Field(field.response_key().to_string()));
        let name = field.name.as_str();

        if name == "__typename" {
            return Value::String(object.type_name.to_string());
        }
        if !self.registry.has_field(object.type_name, name) {
            self.ctx.push_error(GraphError::new(
                ErrorCode::ValidationError,
                format!("cannot query field `{name}` on type `{}`", object.type_name),
                path,
            ));
            return Value::Null;
        }
        if object_type.is_edge(name) {
            return match object_type
                .resolve_edge(self.ctx, object, name, &field.arguments)
                .await
            {
                Ok(node) => self.node(node, &field.selection, path).await,
                Err(error) => {
                    self.report(&error, path);
                    Value::Null
                }
            };
        }
        if name == "id" {
            if let Some(id) = object_type.resolve_id(object) {
                return Value::String(id.to_string());
            }
        }
        data.and_then(|data| data.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }
}
