use graphql_parser::parse_schema;
use graphql_parser::schema::{Definition, TypeDefinition, TypeExtension};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::error::SchemaError;
use crate::graph_types::{
    EntityObject, MutationRoot, ObjectType, QueryRoot, ResultObject, ServiceObject, SubjectObject,
    UserObject,
};
use crate::model::{Author, Publication, PublicationCategory, PublicationType, SubjectLink};

/// SDL this subgraph publishes through `_service`.
pub const SDL: &str = include_str!(concat!(env!("OUT_SCHEMAS"), "/publications.graphql"));

/// Definitions the federation gateway expects every subgraph to serve.
const FEDERATION_SDL: &str = r#"
scalar _Any

union _Entity = Publication | PublicationType | PublicationCategory | PublicationAuthor | PublicationSubject | User | Subject

type _Service {
  sdl: String
}

extend type Query {
  _entities(representations: [_Any!]!): [_Entity]!
  _service: _Service!
}
"#;

/// Object types by name, checked against the SDL they serve.
pub struct SchemaRegistry {
    sdl: String,
    types: HashMap<&'static str, Arc<dyn ObjectType>>,
    fields: HashMap<String, HashSet<String>>,
}

impl SchemaRegistry {
    pub fn builder(sdl: impl Into<String>) -> SchemaRegistryBuilder {
        SchemaRegistryBuilder {
            sdl: sdl.into(),
            types: Vec::new(),
        }
    }

    /// Registry for the publications subgraph.
    pub fn standard() -> Result<SchemaRegistry, SchemaError> {
        let mut builder = SchemaRegistry::builder(SDL)
            .declare(Arc::new(QueryRoot::new(SDL)))
            .declare(Arc::new(MutationRoot))
            .declare(Arc::new(ServiceObject))
            .declare(Arc::new(EntityObject::<Publication>::new()))
            .declare(Arc::new(EntityObject::<PublicationType>::new()))
            .declare(Arc::new(EntityObject::<PublicationCategory>::new()))
            .declare(Arc::new(EntityObject::<Author>::new()))
            .declare(Arc::new(EntityObject::<SubjectLink>::new()))
            .declare(Arc::new(UserObject))
            .declare(Arc::new(SubjectObject));
        for result in ResultObject::all() {
            builder = builder.declare(Arc::new(result));
        }
        builder.build()
    }

    pub fn sdl(&self) -> &str {
        &self.sdl
    }

    pub fn object_type(&self, name: &str) -> Option<&Arc<dyn ObjectType>> {
        self.types.get(name)
    }

    pub fn has_field(&self, type_name: &str, field: &str) -> bool {
        self.fields
            .get(type_name)
            .is_some_and(|fields| fields.contains(field))
    }
}

/// Collects object types first and validates them all at once, so types
/// may refer to each other regardless of declaration order.
pub struct SchemaRegistryBuilder {
    sdl: String,
    types: Vec<Arc<dyn ObjectType>>,
}

impl SchemaRegistryBuilder {
    pub fn declare(mut self, object_type: Arc<dyn ObjectType>) -> Self {
        self.types.push(object_type);
        self
    }

    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut fields: HashMap<String, HashSet<String>> = HashMap::new();
        let mut unions: HashSet<String> = HashSet::new();
        for source in [self.sdl.as_str(), FEDERATION_SDL] {
            collect_definitions(source, &mut fields, &mut unions)?;
        }

        let mut types: HashMap<&'static str, Arc<dyn ObjectType>> = HashMap::new();
        for object_type in self.types {
            let name = object_type.name();
            if types.insert(name, object_type).is_some() {
                return Err(SchemaError::DuplicateType(name.to_string()));
            }
        }

        for (name, object_type) in &types {
            let Some(known) = fields.get(*name) else {
                return Err(SchemaError::MissingType(name.to_string()));
            };
            for edge in object_type.edges() {
                if !known.contains(edge.name) {
                    return Err(SchemaError::MissingField {
                        type_name: name.to_string(),
                        field: edge.name.to_string(),
                    });
                }
                if !types.contains_key(edge.target) && !unions.contains(edge.target) {
                    return Err(SchemaError::UnknownTarget {
                        type_name: name.to_string(),
                        field: edge.name.to_string(),
                        target: edge.target.to_string(),
                    });
                }
            }
        }

        debug!(types = types.len(), "schema registry built");
        Ok(SchemaRegistry {
            sdl: self.sdl,
            types,
            fields,
        })
    }
}

fn collect_definitions(
    source: &str,
    fields: &mut HashMap<String, HashSet<String>>,
    unions: &mut HashSet<String>,
) -> Result<(), SchemaError> {
    let document = parse_schema::<String>(source).map_err(|e| SchemaError::Parse(e.to_string()))?;

    for definition in &document.definitions {
        match definition {
            Definition::TypeDefinition(TypeDefinition::Object(object)) => {
                fields
                    .entry(object.name.clone())
                    .or_default()
                    .extend(object.fields.iter().map(|field| field.name.clone()));
            }
            Definition::TypeExtension(TypeExtension::Object(object)) => {
                fields
                    .entry(object.name.clone())
                    .or_default()
                    .extend(object.fields.iter().map(|field| field.name.clone()));
            }
            Definition::TypeDefinition(TypeDefinition::Union(union_type)) => {
                unions.insert(union_type.name.clone());
            }
            _ => {}
        }
    }
    Ok(())
}
