use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use super::hashing::{type_hash, TypeHash};

#[derive(Debug, Clone, PartialEq)]
pub struct DefRow {
    pub type_name: String,
    pub hash: TypeHash,
    pub mod_id: String,
    attributes: BTreeMap<String, String>,
}

impl DefRow {
    pub fn new(type_name: impl Into<String>, mod_id: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            hash: type_hash(&type_name),
            type_name,
            mod_id: mod_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn parse_attribute<T: FromStr>(&self, name: &str) -> Option<T> {
        self.attribute(name).and_then(|raw| raw.trim().parse().ok())
    }

    pub fn name(&self) -> Option<&str> {
        self.attribute("Name")
    }
}

#[derive(Debug, Default, Clone)]
pub struct DefTable {
    rows: Vec<DefRow>,
    by_type: HashMap<String, usize>,
    by_hash: HashMap<TypeHash, usize>,
}

impl DefTable {
    fn upsert(&mut self, row: DefRow) {
        if let Some(&index) = self.by_type.get(&row.type_name) {
            self.rows[index] = row;
            return;
        }
        let index = self.rows.len();
        self.by_type.insert(row.type_name.clone(), index);
        self.by_hash.insert(row.hash, index);
        self.rows.push(row);
    }

    pub fn lookup(&self, type_name: &str) -> Option<&DefRow> {
        self.by_type.get(type_name).map(|&index| &self.rows[index])
    }

    pub fn lookup_hash(&self, hash: TypeHash) -> Option<&DefRow> {
        self.by_hash.get(&hash).map(|&index| &self.rows[index])
    }

    pub fn find(&self, mut predicate: impl FnMut(&DefRow) -> bool) -> Option<&DefRow> {
        self.rows.iter().find(|row| predicate(row))
    }

    pub fn rows(&self) -> &[DefRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Definition tables keyed by table name. Rows keep first-seen order; a later
/// mod redefining a type replaces the row in place.
#[derive(Debug, Default, Clone)]
pub struct GameInfo {
    tables: BTreeMap<String, DefTable>,
}

impl GameInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_row(&mut self, table: &str, row: DefRow) {
        self.tables.entry(table.to_string()).or_default().upsert(row);
    }

    pub fn table(&self, name: &str) -> Option<&DefTable> {
        self.tables.get(name)
    }

    pub fn lookup(&self, table: &str, type_name: &str) -> Option<&DefRow> {
        self.table(table).and_then(|rows| rows.lookup(type_name))
    }

    pub fn table_sizes(&self) -> BTreeMap<String, usize> {
        self.tables
            .iter()
            .map(|(name, table)| (name.clone(), table.len()))
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(DefTable::len).sum()
    }
}
