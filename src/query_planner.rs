use async_trait::async_trait;
use graphql_parser::query::{
    Definition, Directive, FragmentDefinition, OperationDefinition, SelectionSet, TypeCondition,
    Value as QueryValue, VariableDefinition, parse_query,
};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use crate::error::RequestError;
use crate::{FieldPlan, GraphQLRequest, OperationKind, OperationPlan, Selection};

#[async_trait]
pub trait QueryPlanner {
    async fn plan_query(&self, request: &GraphQLRequest) -> Result<OperationPlan, RequestError>;
}

/// Lowers a GraphQL document into an [`OperationPlan`]: picks the
/// operation, binds variables, applies `@skip`/`@include` and inlines
/// named fragments.
pub struct DocumentPlanner;

impl DocumentPlanner {
    pub fn new() -> Self {
        DocumentPlanner
    }
}

impl Default for DocumentPlanner {
    fn default() -> Self {
        DocumentPlanner::new()
    }
}

type Fragments<'d, 'a> = HashMap<&'d str, &'d FragmentDefinition<'a, String>>;

#[async_trait]
impl QueryPlanner for DocumentPlanner {
    async fn plan_query(&self, request: &GraphQLRequest) -> Result<OperationPlan, RequestError> {
        let document =
            parse_query::<String>(&request.query).map_err(|e| RequestError::Syntax(e.to_string()))?;

        let mut operations = Vec::new();
        let mut fragments: Fragments = HashMap::new();
        for definition in &document.definitions {
            match definition {
                Definition::Operation(operation) => operations.push(operation),
                Definition::Fragment(fragment) => {
                    fragments.insert(fragment.name.as_str(), fragment);
                }
            }
        }

        let operation = select_operation(&operations, request.operation_name.as_deref())?;
        let (kind, name, definitions, selection_set) = match operation {
            OperationDefinition::SelectionSet(set) => (OperationKind::Query, None, &[][..], set),
            OperationDefinition::Query(query) => (
                OperationKind::Query,
                query.name.clone(),
                &query.variable_definitions[..],
                &query.selection_set,
            ),
            OperationDefinition::Mutation(mutation) => (
                OperationKind::Mutation,
                mutation.name.clone(),
                &mutation.variable_definitions[..],
                &mutation.selection_set,
            ),
            OperationDefinition::Subscription(_) => {
                return Err(RequestError::Unsupported("subscription"));
            }
        };

        let lowering = Lowering {
            fragments: &fragments,
            variables: bind_variables(definitions, request.variables.as_ref())?,
        };
        let selection = lowering.selection_set(selection_set, &mut Vec::new())?;

        Ok(OperationPlan {
            kind,
            name,
            selection,
        })
    }
}

fn operation_name<'d>(operation: &'d OperationDefinition<'_, String>) -> Option<&'d str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref(),
    }
}

fn select_operation<'d, 'a>(
    operations: &[&'d OperationDefinition<'a, String>],
    requested: Option<&str>,
) -> Result<&'d OperationDefinition<'a, String>, RequestError> {
    match requested {
        Some(requested) => operations
            .iter()
            .find(|operation| operation_name(operation) == Some(requested))
            .copied()
            .ok_or_else(|| RequestError::UnknownOperation(requested.to_string())),
        None => match operations {
            [] => Err(RequestError::NoOperation),
            [operation] => Ok(*operation),
            _ => Err(RequestError::AmbiguousOperation),
        },
    }
}

/// Provided values win; otherwise the declared default, otherwise `null`.
fn bind_variables(
    definitions: &[VariableDefinition<'_, String>],
    provided: Option<&Value>,
) -> Result<Map<String, Value>, RequestError> {
    let provided = match provided {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(values)) => values.clone(),
        Some(_) => {
            return Err(RequestError::Variables(
                "variables must be a JSON object".to_string(),
            ));
        }
    };

    let constants = Lowering {
        fragments: &HashMap::new(),
        variables: Map::new(),
    };
    let mut bound = Map::new();
    for definition in definitions {
        let value = match provided.get(&definition.name) {
            Some(value) => value.clone(),
            None => match &definition.default_value {
                Some(default) => constants.value(default)?,
                None => Value::Null,
            },
        };
        bound.insert(definition.name.clone(), value);
    }
    Ok(bound)
}

struct Lowering<'f, 'd, 'a> {
    fragments: &'f Fragments<'d, 'a>,
    variables: Map<String, Value>,
}

impl Lowering<'_, '_, '_> {
    fn selection_set(
        &self,
        set: &SelectionSet<'_, String>,
        visiting: &mut Vec<String>,
    ) -> Result<Vec<Selection>, RequestError> {
        let mut selection = Vec::new();
        for item in &set.items {
            match item {
                graphql_parser::query::Selection::Field(field) => {
                    if !self.included(&field.directives)? {
                        continue;
                    }
                    let mut arguments = Map::new();
                    for (name, value) in &field.arguments {
                        arguments.insert(name.clone(), self.value(value)?);
                    }
                    selection.push(Selection::Field(FieldPlan {
                        alias: field.alias.clone(),
                        name: field.name.clone(),
                        arguments,
                        selection: self.selection_set(&field.selection_set, visiting)?,
                    }));
                }
                graphql_parser::query::Selection::InlineFragment(fragment) => {
                    if !self.included(&fragment.directives)? {
                        continue;
                    }
                    selection.push(Selection::Fragment {
                        type_condition: fragment.type_condition.as_ref().map(type_name),
                        selection: self.selection_set(&fragment.selection_set, visiting)?,
                    });
                }
                graphql_parser::query::Selection::FragmentSpread(spread) => {
                    if !self.included(&spread.directives)? {
                        continue;
                    }
                    let name = spread.fragment_name.as_str();
                    let fragment = self
                        .fragments
                        .get(name)
                        .ok_or_else(|| RequestError::UnknownFragment(name.to_string()))?;
                    if visiting.iter().any(|seen| seen == name) {
                        return Err(RequestError::Syntax(format!(
                            "fragment `{name}` spreads itself"
                        )));
                    }
                    visiting.push(name.to_string());
                    let inner = self.selection_set(&fragment.selection_set, visiting)?;
                    visiting.pop();
                    selection.push(Selection::Fragment {
                        type_condition: Some(type_name(&fragment.type_condition)),
                        selection: inner,
                    });
                }
            }
        }
        Ok(selection)
    }

    fn included(&self, directives: &[Directive<'_, String>]) -> Result<bool, RequestError> {
        for directive in directives {
            let skip_when = match directive.name.as_str() {
                "skip" => true,
                "include" => false,
                _ => continue,
            };
            let condition = directive
                .arguments
                .iter()
                .find(|(name, _)| name == "if")
                .map(|(_, value)| self.value(value))
                .transpose()?;
            match condition {
                Some(Value::Bool(condition)) if condition == skip_when => return Ok(false),
                Some(Value::Bool(_)) => {}
                _ => {
                    return Err(RequestError::Variables(format!(
                        "@{} requires a boolean `if` argument",
                        directive.name
                    )));
                }
            }
        }
        Ok(true)
    }

    fn value(&self, value: &QueryValue<'_, String>) -> Result<Value, RequestError> {
        Ok(match value {
            QueryValue::Variable(name) => self.variables.get(name).cloned().unwrap_or(Value::Null),
            QueryValue::Int(number) => number
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| RequestError::Variables("integer out of range".to_string()))?,
            QueryValue::Float(number) => Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            QueryValue::String(text) => Value::String(text.clone()),
            QueryValue::Boolean(flag) => Value::Bool(*flag),
            QueryValue::Null => Value::Null,
            QueryValue::Enum(name) => Value::String(name.clone()),
            QueryValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.value(item))
                    .collect::<Result<_, _>>()?,
            ),
            QueryValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, item)| self.value(item).map(|item| (name.clone(), item)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

fn type_name(condition: &TypeCondition<'_, String>) -> String {
    match condition {
        TypeCondition::On(name) => name.clone(),
    }
}

