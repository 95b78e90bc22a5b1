//! Server-held allow-list of searchable tables and columns.
//!
//! Table and column names cannot be bound as SQL parameters, so the query
//! builder interpolates them. The only identifiers it ever sees are borrowed
//! from this allow-list through a [`ValidatedSelection`]; raw request strings
//! never reach identifier position.

use crate::config::SearchConfig;
use crate::{RegistryError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Identifiers accepted into the allow-list.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// The two text columns a model is searched and ranked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchColumns {
    pub primary: String,
    pub secondary: String,
}

impl Default for SearchColumns {
    fn default() -> Self {
        Self {
            primary: SearchConfig::DEFAULT_PRIMARY_COLUMN.to_string(),
            secondary: SearchConfig::DEFAULT_SECONDARY_COLUMN.to_string(),
        }
    }
}

/// Permitted columns of one model, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelColumns {
    columns: Vec<String>,
    search: SearchColumns,
}

impl ModelColumns {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn search(&self) -> &SearchColumns {
        &self.search
    }
}

/// On-disk shape of one allow-list entry.
#[derive(Debug, Deserialize)]
struct ModelSpec {
    columns: Vec<String>,
    #[serde(default)]
    search: Option<(String, String)>,
}

/// Mapping from model (table) name to its permitted columns.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    models: HashMap<String, ModelColumns>,
}

/// A model and projection that passed [`AllowList::validate`].
///
/// Every identifier here is borrowed from the allow-list itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSelection<'a> {
    table: &'a str,
    fields: Vec<&'a str>,
    search: &'a SearchColumns,
}

impl<'a> ValidatedSelection<'a> {
    pub fn table(&self) -> &'a str {
        self.table
    }

    pub fn fields(&self) -> &[&'a str] {
        &self.fields
    }

    pub fn search(&self) -> &'a SearchColumns {
        self.search
    }
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog served when no allow-list file is configured.
    pub fn default_catalog() -> Self {
        let mut list = Self::new();
        let entries: [(&str, &[&str], (&str, &str)); 3] = [
            (
                "items",
                &["id", "name", "category", "price_ugx", "available"],
                ("name", "category"),
            ),
            ("users", &["id", "email", "role"], ("email", "role")),
            (
                "orders",
                &["id", "user_id", "status", "total_cost"],
                ("status", "user_id"),
            ),
        ];
        for (model, columns, (primary, secondary)) in entries {
            let columns = columns.iter().map(|c| c.to_string()).collect();
            let search = SearchColumns {
                primary: primary.to_string(),
                secondary: secondary.to_string(),
            };
            // Static entries; identifiers are known-good.
            if let Err(e) = list.insert(model, columns, search) {
                debug!("Skipping built-in model {}: {}", model, e);
            }
        }
        list
    }

    /// Parse an allow-list from JSON:
    /// `{"items": {"columns": ["id", "name"], "search": ["name", "category"]}}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let specs: HashMap<String, ModelSpec> = serde_json::from_str(json)?;
        let mut list = Self::new();
        for (model, spec) in specs {
            let search = match spec.search {
                Some((primary, secondary)) => SearchColumns { primary, secondary },
                None => SearchColumns::default(),
            };
            list.insert(&model, spec.columns, search)?;
        }
        Ok(list)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RegistryError::io_with_path(e, path))?;
        Self::from_json_str(&content)
    }

    /// Add a model. Rejects identifiers that are not plain SQL names and
    /// search columns that are not among the permitted columns.
    pub fn insert(
        &mut self,
        model: &str,
        columns: Vec<String>,
        search: SearchColumns,
    ) -> Result<()> {
        check_identifier(model)?;
        if columns.is_empty() {
            return Err(RegistryError::config(format!(
                "model '{}' has no permitted columns",
                model
            )));
        }
        for column in &columns {
            check_identifier(column)?;
        }
        for column in [&search.primary, &search.secondary] {
            if !columns.contains(column) {
                return Err(RegistryError::config(format!(
                    "search column '{}' is not a permitted column of '{}'",
                    column, model
                )));
            }
        }
        self.models
            .insert(model.to_string(), ModelColumns { columns, search });
        Ok(())
    }

    pub fn get(&self, model: &str) -> Option<&ModelColumns> {
        self.models.get(model)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Check a requested model and field list.
    ///
    /// Field order is preserved. An empty field list selects every permitted
    /// column.
    pub fn validate<S: AsRef<str>>(
        &self,
        model: &str,
        fields: &[S],
    ) -> Result<ValidatedSelection<'_>> {
        let (table, entry) =
            self.models
                .get_key_value(model)
                .ok_or_else(|| RegistryError::UnknownModel {
                    model: model.to_string(),
                })?;

        let fields = if fields.is_empty() {
            entry.columns.iter().map(String::as_str).collect()
        } else {
            fields
                .iter()
                .map(|requested| {
                    let requested = requested.as_ref();
                    entry
                        .columns
                        .iter()
                        .find(|c| c.as_str() == requested)
                        .map(String::as_str)
                        .ok_or_else(|| RegistryError::FieldNotAllowed {
                            field: requested.to_string(),
                            model: model.to_string(),
                        })
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(ValidatedSelection {
            table,
            fields,
            search: &entry.search,
        })
    }
}

fn check_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(RegistryError::config(format!(
            "'{}' is not a valid SQL identifier",
            name
        )))
    }
}
