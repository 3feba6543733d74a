mod common;

use common::{SUBJECT, TestSubgraph};
use pretty_assertions::assert_eq;
use pubgraph::InMemoryStorage;
use pubgraph::model::Table;
use pubgraph::seed::{SeedData, SeedError};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn seed_file() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data/seed.yaml")
}

#[tokio::test]
async fn test_seed_file_is_applied_once() {
    let storage = Arc::new(InMemoryStorage::new());

    let written = SeedData::load(&seed_file())
        .unwrap()
        .apply(&*storage)
        .await
        .unwrap();
    assert_eq!(written, 10);
    assert_eq!(storage.len(Table::PublicationAuthors).await, 3);

    let again = SeedData::load(&seed_file())
        .unwrap()
        .apply(&*storage)
        .await
        .unwrap();
    assert_eq!(again, 0);
    assert_eq!(storage.len(Table::Publications).await, 2);
}

#[tokio::test]
async fn test_seeded_rows_are_live_and_linked() {
    let fixture = TestSubgraph::new(Arc::new(InMemoryStorage::new()));
    fixture.subgraph.load_seed(&seed_file()).await.unwrap();

    let result = fixture
        .execute(
            r#"
            query($id: UUID!) {
              publicationById(id: $id) {
                name
                valid
                publicationtype { nameEn category { nameEn } }
                authors { order share }
                subjects { id }
              }
            }
            "#,
            json!({ "id": "5f2e4c8a-8d0b-4a55-b1c6-0c1d2e3f0001" }),
        )
        .await;
    assert_eq!(result.get("errors"), None);
    assert_eq!(
        result["data"]["publicationById"],
        json!({
            "name": "Federated data in practice",
            "valid": true,
            "publicationtype": {
                "nameEn": "Journal article",
                "category": { "nameEn": "Professional publications" },
            },
            "authors": [
                { "order": 1, "share": 0.6 },
                { "order": 2, "share": 0.4 },
            ],
            "subjects": [{ "id": SUBJECT }],
        })
    );
}

#[test]
fn test_seed_rejects_unknown_tables() {
    let parsed = SeedData::from_yaml("publishers:\n  - id: 5f2e4c8a-8d0b-4a55-b1c6-0c1d2e3f0001\n");
    assert!(matches!(parsed, Err(SeedError::Yaml(_))));

    let empty = SeedData::from_yaml("publications: []\n").unwrap();
    assert!(empty.publications.is_empty());
}

#[tokio::test]
async fn test_missing_seed_file() {
    let fixture = TestSubgraph::new(Arc::new(InMemoryStorage::new()));
    let missing = fixture
        .subgraph
        .load_seed(Path::new("/nonexistent/seed.yaml"))
        .await;
    assert!(matches!(missing, Err(SeedError::Io { .. })));
}
