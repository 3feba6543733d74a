use async_trait::async_trait;
use pubgraph::error::SchemaError;
use pubgraph::graph_types::{Args, Edge, Node, Object, ObjectType};
use pubgraph::{RequestContext, ResolveError, SchemaRegistry};
use std::sync::Arc;

struct Stub {
    name: &'static str,
    edges: &'static [Edge],
}

#[async_trait]
impl ObjectType for Stub {
    fn name(&self) -> &'static str {
        self.name
    }

    fn edges(&self) -> &'static [Edge] {
        self.edges
    }

    async fn resolve_edge(
        &self,
        _: &Arc<RequestContext>,
        _: &Object,
        _: &str,
        _: &Args,
    ) -> Result<Node, ResolveError> {
        Ok(Node::Null)
    }
}

const SDL: &str = r#"
type Shelf {
  id: ID!
  books: [Book!]!
}

type Book {
  id: ID!
  title: String
}
"#;

const SHELF_EDGES: &[Edge] = &[Edge {
    name: "books",
    target: "Book",
}];

const MISSING_EDGES: &[Edge] = &[Edge {
    name: "authors",
    target: "Book",
}];

fn stub(name: &'static str, edges: &'static [Edge]) -> Arc<dyn ObjectType> {
    Arc::new(Stub { name, edges })
}

#[test]
fn test_standard_registry_builds() {
    let registry = SchemaRegistry::standard().unwrap();

    for name in [
        "Query",
        "Mutation",
        "Publication",
        "PublicationType",
        "PublicationCategory",
        "PublicationAuthor",
        "PublicationSubject",
        "User",
        "Subject",
        "PublicationResult",
        "_Service",
    ] {
        assert!(registry.object_type(name).is_some(), "{name} is not registered");
    }
    assert!(registry.has_field("Query", "_entities"));
    assert!(registry.has_field("Publication", "publishedDate"));
    assert!(!registry.has_field("Publication", "publication_type_id"));
    assert!(registry.sdl().contains("type Publication @key"));
}

#[test]
fn test_declaration_order_does_not_matter() {
    let registry = SchemaRegistry::builder(SDL)
        .declare(stub("Shelf", SHELF_EDGES))
        .declare(stub("Book", &[]))
        .build()
        .unwrap();
    assert!(registry.object_type("Shelf").unwrap().is_edge("books"));
}

#[test]
fn test_edges_are_checked_against_the_sdl() {
    let missing = SchemaRegistry::builder(SDL)
        .declare(stub("Shelf", MISSING_EDGES))
        .declare(stub("Book", &[]))
        .build();
    assert!(matches!(
        missing,
        Err(SchemaError::MissingField { ref field, .. }) if field == "authors"
    ));

    let dangling = SchemaRegistry::builder(SDL)
        .declare(stub("Shelf", SHELF_EDGES))
        .build();
    assert!(matches!(
        dangling,
        Err(SchemaError::UnknownTarget { ref target, .. }) if target == "Book"
    ));
}

#[test]
fn test_registry_rejects_bad_declarations() {
    let duplicate = SchemaRegistry::builder(SDL)
        .declare(stub("Book", &[]))
        .declare(stub("Book", &[]))
        .build();
    assert!(matches!(duplicate, Err(SchemaError::DuplicateType(_))));

    let undeclared = SchemaRegistry::builder(SDL)
        .declare(stub("Magazine", &[]))
        .build();
    assert!(matches!(undeclared, Err(SchemaError::MissingType(_))));

    let broken = SchemaRegistry::builder("type {").build();
    assert!(matches!(broken, Err(SchemaError::Parse(_))));
}
