//! Entities persisted by this subgraph.
//!
//! Rows travel between storage and resolvers as [`Record`]s (column name to
//! JSON value); each entity struct round-trips through serde so backends
//! never need to know the concrete types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StorageError;

pub type Record = Map<String, Value>;

static AUDIT_COLUMNS: [&str; 7] = [
    "id",
    "valid",
    "created",
    "lastchange",
    "createdby",
    "changedby",
    "rbacobject",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Publications,
    PublicationTypes,
    PublicationCategories,
    PublicationAuthors,
    PublicationSubjects,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Publications,
        Table::PublicationTypes,
        Table::PublicationCategories,
        Table::PublicationAuthors,
        Table::PublicationSubjects,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Publications => "publications",
            Table::PublicationTypes => "publicationtypes",
            Table::PublicationCategories => "publicationcategories",
            Table::PublicationAuthors => "publication_authors",
            Table::PublicationSubjects => "publication_subjects",
        }
    }

    /// Columns specific to the table, without the shared audit columns.
    fn own_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Publications => &[
                "name",
                "published_date",
                "reference",
                "place",
                "publication_type_id",
            ],
            Table::PublicationTypes => &["name", "name_en", "category_id"],
            Table::PublicationCategories => &["name", "name_en"],
            Table::PublicationAuthors => &["order", "share", "publication_id", "user_id"],
            Table::PublicationSubjects => &["publication_id", "subject_id"],
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> {
        AUDIT_COLUMNS.iter().chain(self.own_columns()).copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().any(|known| known == column)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bookkeeping columns every entity carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub valid: Option<bool>,
    pub created: Option<DateTime<Utc>>,
    pub lastchange: Option<DateTime<Utc>>,
    pub createdby: Option<Uuid>,
    pub changedby: Option<Uuid>,
    pub rbacobject: Option<Uuid>,
}

impl Audit {
    /// Soft-deleted rows stay in storage with `valid = false`.
    pub fn is_tombstone(&self) -> bool {
        self.valid == Some(false)
    }
}

pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;
    /// Name of the GraphQL object type backed by this entity.
    const TYPE_NAME: &'static str;

    fn id(&self) -> Uuid;
    fn audit(&self) -> &Audit;

    fn from_record(record: Record) -> Result<Self, StorageError> {
        serde_json::from_value(Value::Object(record)).map_err(|e| StorageError::Malformed {
            table: Self::TABLE.name(),
            message: e.to_string(),
        })
    }

    fn to_record(&self) -> Result<Record, StorageError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(record)) => Ok(record),
            Ok(_) => Err(StorageError::Malformed {
                table: Self::TABLE.name(),
                message: "entity did not serialize to an object".to_string(),
            }),
            Err(e) => Err(StorageError::Malformed {
                table: Self::TABLE.name(),
                message: e.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub id: Uuid,
    pub name: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub reference: Option<String>,
    pub place: Option<String>,
    pub publication_type_id: Option<Uuid>,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationType {
    pub id: Uuid,
    pub name: Option<String>,
    pub name_en: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationCategory {
    pub id: Uuid,
    pub name: Option<String>,
    pub name_en: Option<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

/// Association of a publication with a principal (user) of another service.
///
/// Neither `order` nor `share` is checked across the authors of one
/// publication: duplicate ranks and shares that do not sum to one are
/// accepted as they come.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub order: Option<i32>,
    pub share: Option<f64>,
    pub publication_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[serde(flatten)]
    pub audit: Audit,
}

/// Association of a publication with a subject of another service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectLink {
    pub id: Uuid,
    pub publication_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    #[serde(flatten)]
    pub audit: Audit,
}

macro_rules! impl_entity {
    ($ty:ty, $table:expr, $type_name:literal) => {
        impl Entity for $ty {
            const TABLE: Table = $table;
            const TYPE_NAME: &'static str = $type_name;

            fn id(&self) -> Uuid {
                self.id
            }

            fn audit(&self) -> &Audit {
                &self.audit
            }
        }
    };
}

impl_entity!(Publication, Table::Publications, "Publication");
impl_entity!(PublicationType, Table::PublicationTypes, "PublicationType");
impl_entity!(
    PublicationCategory,
    Table::PublicationCategories,
    "PublicationCategory"
);
impl_entity!(Author, Table::PublicationAuthors, "PublicationAuthor");
impl_entity!(SubjectLink, Table::PublicationSubjects, "PublicationSubject");

pub fn record_id(record: &Record) -> Option<Uuid> {
    record_uuid(record, "id")
}

pub fn record_uuid(record: &Record, column: &str) -> Option<Uuid> {
    record
        .get(column)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

pub fn record_lastchange(record: &Record) -> Option<DateTime<Utc>> {
    record
        .get("lastchange")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|stamp| stamp.with_timezone(&Utc))
}

pub fn is_tombstone(record: &Record) -> bool {
    record.get("valid") == Some(&Value::Bool(false))
}
