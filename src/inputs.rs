//! Arguments accepted by the mutation and page fields.
//!
//! Inputs deserialize from camelCase GraphQL arguments and serialize to the
//! snake_case storage columns, leaving out every field the caller did not
//! supply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{
    Author, Entity, Publication, PublicationCategory, PublicationType, Record, SubjectLink, Table,
};
use crate::storage::Filter;

/// A foreign-key-shaped value pointing at a row of this subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalReference {
    pub column: &'static str,
    pub table: Table,
    pub id: Uuid,
}

pub trait InsertInput: Send + Sync {
    type Target: Entity;

    fn id(&self) -> Option<Uuid>;
    fn rbacobject(&self) -> Option<Uuid>;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn references(&self) -> Vec<LocalReference> {
        Vec::new()
    }

    fn into_record(self) -> Result<Record, StorageError>;
}

pub trait UpdateInput: Send + Sync {
    type Target: Entity;

    fn id(&self) -> Uuid;
    /// The `lastchange` value the caller last observed.
    fn lastchange(&self) -> DateTime<Utc>;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn references(&self) -> Vec<LocalReference> {
        Vec::new()
    }

    /// Only the columns present in the input.
    fn into_changes(self) -> Result<Record, StorageError>;
}

pub trait WhereInput: Default {
    type Target: Entity;

    fn into_filter(self) -> Result<Filter, StorageError>;
}

fn columns_of<T: Serialize>(input: &T, table: Table) -> Result<Record, StorageError> {
    match serde_json::to_value(input) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(StorageError::Malformed {
            table: table.name(),
            message: "input did not serialize to an object".to_string(),
        }),
        Err(e) => Err(StorageError::Malformed {
            table: table.name(),
            message: e.to_string(),
        }),
    }
}

fn filter_of<T: Serialize>(input: &T, table: Table) -> Result<Filter, StorageError> {
    let filter = columns_of(input, table)?
        .into_iter()
        .fold(Filter::new(), |filter, (column, value)| filter.and(column, value));
    filter.check(table)?;
    Ok(filter)
}

fn require_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        Err("name must not be empty".to_string())
    } else {
        Ok(())
    }
}

fn reference(column: &'static str, table: Table, id: Option<Uuid>) -> Option<LocalReference> {
    id.map(|id| LocalReference { column, table, id })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct PublicationInsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_type_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbacobject: Option<Uuid>,
}

impl InsertInput for PublicationInsert {
    type Target = Publication;

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn rbacobject(&self) -> Option<Uuid> {
        self.rbacobject
    }

    fn validate(&self) -> Result<(), String> {
        require_name(&self.name)
    }

    fn references(&self) -> Vec<LocalReference> {
        reference(
            "publication_type_id",
            Table::PublicationTypes,
            self.publication_type_id,
        )
        .into_iter()
        .collect()
    }

    fn into_record(self) -> Result<Record, StorageError> {
        columns_of(&self, Table::Publications)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct PublicationUpdate {
    #[serde(skip_serializing)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub lastchange: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_type_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

impl UpdateInput for PublicationUpdate {
    type Target = Publication;

    fn id(&self) -> Uuid {
        self.id
    }

    fn lastchange(&self) -> DateTime<Utc> {
        self.lastchange
    }

    fn validate(&self) -> Result<(), String> {
        self.name.as_deref().map_or(Ok(()), require_name)
    }

    fn references(&self) -> Vec<LocalReference> {
        reference(
            "publication_type_id",
            Table::PublicationTypes,
            self.publication_type_id,
        )
        .into_iter()
        .collect()
    }

    fn into_changes(self) -> Result<Record, StorageError> {
        columns_of(&self, Table::Publications)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"), deny_unknown_fields)]
pub struct PublicationWhere {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_type_id: Option<Uuid>,
}

impl WhereInput for PublicationWhere {
    type Target = Publication;

    fn into_filter(self) -> Result<Filter, StorageError> {
        filter_of(&self, Table::Publications)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct PublicationTypeInsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbacobject: Option<Uuid>,
}

impl InsertInput for PublicationTypeInsert {
    type Target = PublicationType;

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn rbacobject(&self) -> Option<Uuid> {
        self.rbacobject
    }

    fn validate(&self) -> Result<(), String> {
        require_name(&self.name)
    }

    fn references(&self) -> Vec<LocalReference> {
        reference("category_id", Table::PublicationCategories, self.category_id)
            .into_iter()
            .collect()
    }

    fn into_record(self) -> Result<Record, StorageError> {
        columns_of(&self, Table::PublicationTypes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct PublicationTypeUpdate {
    #[serde(skip_serializing)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub lastchange: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

impl UpdateInput for PublicationTypeUpdate {
    type Target = PublicationType;

    fn id(&self) -> Uuid {
        self.id
    }

    fn lastchange(&self) -> DateTime<Utc> {
        self.lastchange
    }

    fn validate(&self) -> Result<(), String> {
        self.name.as_deref().map_or(Ok(()), require_name)
    }

    fn references(&self) -> Vec<LocalReference> {
        reference("category_id", Table::PublicationCategories, self.category_id)
            .into_iter()
            .collect()
    }

    fn into_changes(self) -> Result<Record, StorageError> {
        columns_of(&self, Table::PublicationTypes)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"), deny_unknown_fields)]
pub struct PublicationTypeWhere {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
}

impl WhereInput for PublicationTypeWhere {
    type Target = PublicationType;

    fn into_filter(self) -> Result<Filter, StorageError> {
        filter_of(&self, Table::PublicationTypes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct PublicationCategoryInsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbacobject: Option<Uuid>,
}

impl InsertInput for PublicationCategoryInsert {
    type Target = PublicationCategory;

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn rbacobject(&self) -> Option<Uuid> {
        self.rbacobject
    }

    fn validate(&self) -> Result<(), String> {
        require_name(&self.name)
    }

    fn into_record(self) -> Result<Record, StorageError> {
        columns_of(&self, Table::PublicationCategories)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct PublicationCategoryUpdate {
    #[serde(skip_serializing)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub lastchange: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

impl UpdateInput for PublicationCategoryUpdate {
    type Target = PublicationCategory;

    fn id(&self) -> Uuid {
        self.id
    }

    fn lastchange(&self) -> DateTime<Utc> {
        self.lastchange
    }

    fn validate(&self) -> Result<(), String> {
        self.name.as_deref().map_or(Ok(()), require_name)
    }

    fn into_changes(self) -> Result<Record, StorageError> {
        columns_of(&self, Table::PublicationCategories)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"), deny_unknown_fields)]
pub struct PublicationCategoryWhere {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
}

impl WhereInput for PublicationCategoryWhere {
    type Target = PublicationCategory;

    fn into_filter(self) -> Result<Filter, StorageError> {
        filter_of(&self, Table::PublicationCategories)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct AuthorInsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub publication_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbacobject: Option<Uuid>,
}

impl InsertInput for AuthorInsert {
    type Target = Author;

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn rbacobject(&self) -> Option<Uuid> {
        self.rbacobject
    }

    fn references(&self) -> Vec<LocalReference> {
        vec![LocalReference {
            column: "publication_id",
            table: Table::Publications,
            id: self.publication_id,
        }]
    }

    fn into_record(self) -> Result<Record, StorageError> {
        columns_of(&self, Table::PublicationAuthors)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct AuthorUpdate {
    #[serde(skip_serializing)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub lastchange: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

impl UpdateInput for AuthorUpdate {
    type Target = Author;

    fn id(&self) -> Uuid {
        self.id
    }

    fn lastchange(&self) -> DateTime<Utc> {
        self.lastchange
    }

    fn into_changes(self) -> Result<Record, StorageError> {
        columns_of(&self, Table::PublicationAuthors)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"), deny_unknown_fields)]
pub struct AuthorWhere {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_id: Option<Uuid>,
}

impl WhereInput for AuthorWhere {
    type Target = Author;

    fn into_filter(self) -> Result<Filter, StorageError> {
        filter_of(&self, Table::PublicationAuthors)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct SubjectLinkInsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub publication_id: Uuid,
    pub subject_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbacobject: Option<Uuid>,
}

impl InsertInput for SubjectLinkInsert {
    type Target = SubjectLink;

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn rbacobject(&self) -> Option<Uuid> {
        self.rbacobject
    }

    fn references(&self) -> Vec<LocalReference> {
        vec![LocalReference {
            column: "publication_id",
            table: Table::Publications,
            id: self.publication_id,
        }]
    }

    fn into_record(self) -> Result<Record, StorageError> {
        columns_of(&self, Table::PublicationSubjects)
    }
}
