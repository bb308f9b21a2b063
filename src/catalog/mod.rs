//! Catalog and cost-oracle capabilities
//!
//! The planner never owns index metadata or statistics. It asks a
//! [`Catalog`] for the indexes and document count of a keyspace, and
//! optionally a [`CostOracle`] for estimates. Both calls are synchronous.

mod oracle;

pub use oracle::{Cost, CostOracle, JoinMethod, JoinShape};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Availability of an index for planning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    #[default]
    Online,
    Offline,
    Deferred,
}

/// `[DISTINCT] ARRAY <element> FOR <variable> IN <source> END`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayKey {
    pub variable: String,
    pub source: Expr,
    #[serde(default)]
    pub distinct: bool,
}

/// One index key as declared in the catalog, relative to the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexKeyDef {
    /// Key expression. For array keys, written in terms of the variable.
    pub expr: Expr,
    #[serde(default)]
    pub desc: bool,
    #[serde(default)]
    pub array: Option<ArrayKey>,
}

impl IndexKeyDef {
    pub fn scalar(expr: Expr) -> Self {
        Self {
            expr,
            desc: false,
            array: None,
        }
    }

    pub fn array(variable: &str, source: Expr, element: Expr, distinct: bool) -> Self {
        Self {
            expr: element,
            desc: false,
            array: Some(ArrayKey {
                variable: variable.to_string(),
                source,
                distinct,
            }),
        }
    }

    /// Rewrites document-relative paths below `alias`.
    pub fn formalize(&self, alias: &str) -> IndexKey {
        match &self.array {
            None => IndexKey {
                expr: self.expr.formalize(alias),
                desc: self.desc,
                array: None,
            },
            Some(array) => IndexKey {
                expr: self
                    .expr
                    .formalize_except(alias, std::slice::from_ref(&array.variable)),
                desc: self.desc,
                array: Some(ArrayKey {
                    variable: array.variable.clone(),
                    source: array.source.formalize(alias),
                    distinct: array.distinct,
                }),
            },
        }
    }
}

/// An index key bound to one data source alias.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexKey {
    pub expr: Expr,
    pub desc: bool,
    pub array: Option<ArrayKey>,
}

impl IndexKey {
    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    #[serde(default)]
    pub keys: Vec<IndexKeyDef>,
    /// Partial-index filter, relative to the document
    #[serde(default)]
    pub condition: Option<Expr>,
    #[serde(default)]
    pub primary: bool,
    /// Partition-by expressions; informational for the planner
    #[serde(default)]
    pub partition: Vec<Expr>,
    #[serde(default)]
    pub state: IndexState,
}

impl IndexDef {
    pub fn primary(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keys: Vec::new(),
            condition: None,
            primary: true,
            partition: Vec::new(),
            state: IndexState::Online,
        }
    }

    /// Secondary index over scalar keys.
    pub fn secondary(name: &str, keys: Vec<Expr>) -> Self {
        Self::with_keys(name, keys.into_iter().map(IndexKeyDef::scalar).collect())
    }

    pub fn with_keys(name: &str, keys: Vec<IndexKeyDef>) -> Self {
        Self {
            name: name.to_string(),
            keys,
            condition: None,
            primary: false,
            partition: Vec::new(),
            state: IndexState::Online,
        }
    }

    pub fn with_condition(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_state(mut self, state: IndexState) -> Self {
        self.state = state;
        self
    }

    pub fn is_online(&self) -> bool {
        self.state == IndexState::Online
    }

    pub fn formalized_keys(&self, alias: &str) -> Vec<IndexKey> {
        self.keys.iter().map(|k| k.formalize(alias)).collect()
    }

    pub fn formalized_condition(&self, alias: &str) -> Option<Expr> {
        self.condition.as_ref().map(|c| c.formalize(alias))
    }
}

/// Read access to index metadata and document counts.
pub trait Catalog {
    /// Estimated number of documents, `None` when unknown.
    fn document_count(&self, keyspace: &str) -> Option<u64>;

    /// Every index defined on the keyspace, in any state.
    fn indexes(&self, keyspace: &str) -> Vec<IndexDef>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceEntry {
    #[serde(default)]
    pub doc_count: Option<u64>,
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
}

/// Catalog held in memory, deserializable from JSON:
///
/// ```json
/// {"keyspaces": {"orders": {"doc_count": 1000, "indexes": [...]}}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryCatalog {
    #[serde(default)]
    pub keyspaces: BTreeMap<String, KeyspaceEntry>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyspace(mut self, keyspace: &str, doc_count: Option<u64>) -> Self {
        self.keyspaces.entry(keyspace.to_string()).or_default().doc_count = doc_count;
        self
    }

    pub fn with_index(mut self, keyspace: &str, index: IndexDef) -> Self {
        self.keyspaces
            .entry(keyspace.to_string())
            .or_default()
            .indexes
            .push(index);
        self
    }
}

impl Catalog for InMemoryCatalog {
    fn document_count(&self, keyspace: &str) -> Option<u64> {
        self.keyspaces.get(keyspace).and_then(|k| k.doc_count)
    }

    fn indexes(&self, keyspace: &str) -> Vec<IndexDef> {
        self.keyspaces
            .get(keyspace)
            .map(|k| k.indexes.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{field, ident, path};

    #[test]
    fn test_in_memory_catalog_lookup() {
        let catalog = InMemoryCatalog::new()
            .with_keyspace("orders", Some(100))
            .with_index("orders", IndexDef::primary("#primary"))
            .with_index("orders", IndexDef::secondary("ix_x", vec![ident("x")]));
        assert_eq!(catalog.document_count("orders"), Some(100));
        assert_eq!(catalog.indexes("orders").len(), 2);
        assert!(catalog.indexes("missing").is_empty());
        assert_eq!(catalog.document_count("missing"), None);
    }

    #[test]
    fn test_formalize_scalar_and_array_keys() {
        let scalar = IndexKeyDef::scalar(field(ident("x"), "y"));
        assert_eq!(scalar.formalize("o").expr, path("o", "x.y"));

        let array = IndexKeyDef::array("v", ident("tags"), ident("v"), true);
        let key = array.formalize("o");
        assert_eq!(key.expr, ident("v"));
        assert_eq!(key.array.as_ref().unwrap().source, path("o", "tags"));
        assert!(key.is_array());
    }

    #[test]
    fn test_catalog_from_json() {
        let text = r##"{
            "keyspaces": {
                "orders": {
                    "doc_count": 10,
                    "indexes": [
                        {"name": "#primary", "primary": true},
                        {"name": "ix_x", "keys": [{"expr": {"identifier": "x"}}], "state": "offline"}
                    ]
                }
            }
        }"##;
        let catalog: InMemoryCatalog = serde_json::from_str(text).unwrap();
        let indexes = catalog.indexes("orders");
        assert!(indexes[0].primary);
        assert!(!indexes[1].is_online());
    }
}
