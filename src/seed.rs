//! Demo rows loaded at startup with `--seed <file.yaml>`.

use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::envelope::{now, stamp};
use crate::error::StorageError;
use crate::model::{Record, Table};
use crate::storage::Storage;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse seed data: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Rows keyed by table name, as written in the seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedData {
    #[serde(default)]
    pub publicationcategories: Vec<Record>,
    #[serde(default)]
    pub publicationtypes: Vec<Record>,
    #[serde(default)]
    pub publications: Vec<Record>,
    #[serde(default)]
    pub publication_authors: Vec<Record>,
    #[serde(default)]
    pub publication_subjects: Vec<Record>,
}

impl SeedData {
    pub fn from_yaml(text: &str) -> Result<Self, SeedError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let text = fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        SeedData::from_yaml(&text)
    }

    /// Tables in an order where referenced rows come first.
    fn into_tables(self) -> [(Table, Vec<Record>); 5] {
        [
            (Table::PublicationCategories, self.publicationcategories),
            (Table::PublicationTypes, self.publicationtypes),
            (Table::Publications, self.publications),
            (Table::PublicationAuthors, self.publication_authors),
            (Table::PublicationSubjects, self.publication_subjects),
        ]
    }

    /// Inserts every row, skipping ids that already exist, and returns the
    /// number of rows written.
    pub async fn apply(self, storage: &dyn Storage) -> Result<usize, SeedError> {
        let created = stamp(now());
        let mut written = 0;
        for (table, rows) in self.into_tables() {
            for mut row in rows {
                row.entry("valid").or_insert(Value::Bool(true));
                row.entry("created").or_insert_with(|| created.clone());
                row.entry("lastchange").or_insert_with(|| created.clone());
                match storage.insert(table, row).await {
                    Ok(_) => written += 1,
                    Err(StorageError::Duplicate { id, .. }) => {
                        debug!(%table, %id, "seed row already present");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        info!(rows = written, "seed data applied");
        Ok(written)
    }
}
