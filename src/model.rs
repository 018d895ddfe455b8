//! Schema graph entities and the persisted project format.

use serde::{Deserialize, Serialize};

/// A `(table, column)` pair. Used for relation endpoints and FK back-references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub table_id: String,
    pub column_id: String,
}

impl Endpoint {
    pub fn new(table_id: impl Into<String>, column_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            column_id: column_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_column_type")]
    pub column_type: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_foreign: bool,
    /// The parent column this FK column stores keys of.
    #[serde(default)]
    pub references: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_column_type() -> String {
    "varchar".to_string()
}

impl Column {
    pub fn new(id: impl Into<String>, name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            column_type: column_type.into(),
            is_primary: false,
            is_unique: false,
            is_nullable: false,
            is_foreign: false,
            references: None,
            enum_values: None,
            default: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn referencing(mut self, parent: Endpoint) -> Self {
        self.is_foreign = true;
        self.references = Some(parent);
        self
    }

    /// Primary and unique columns can be the parent side of a relation.
    pub fn is_key(&self) -> bool {
        self.is_primary || self.is_unique
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub name: String,
    /// Canvas position. Absent when the source carried no coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            x: None,
            y: None,
            columns: Vec::new(),
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// First primary-key column in display order.
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary)
    }

    pub fn has_position(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x.unwrap_or(0.0), self.y.unwrap_or(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    OneToOne,
    #[default]
    OneToMany,
    ManyToMany,
}

impl Cardinality {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "one-to-one" | "1:1" => Some(Self::OneToOne),
            "one-to-many" | "1:n" | "1:*" => Some(Self::OneToMany),
            "many-to-many" | "n:m" | "*:*" => Some(Self::ManyToMany),
            _ => None,
        }
    }

    /// One-to-one and one-to-many keep an FK column on the child table.
    pub fn needs_fk_column(self) -> bool {
        !matches!(self, Self::ManyToMany)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
}

impl ReferentialAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "cascade" => Some(Self::Cascade),
            "restrict" => Some(Self::Restrict),
            "set-null" => Some(Self::SetNull),
            _ => None,
        }
    }
}

/// A link between two columns.
///
/// `from` is the parent (key) side and `to` the child side. For one-to-one and
/// one-to-many, `to.column_id` names the child's FK column, whose `references`
/// points back at `from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: String,
    pub from: Endpoint,
    pub to: Endpoint,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub is_one_to_many_reversed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_rule: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_rule: Option<ReferentialAction>,
}

impl Relation {
    pub fn new(id: impl Into<String>, from: Endpoint, to: Endpoint, cardinality: Cardinality) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            cardinality,
            is_one_to_many_reversed: false,
            delete_rule: None,
            update_rule: None,
        }
    }

    pub fn touches_table(&self, table_id: &str) -> bool {
        self.from.table_id == table_id || self.to.table_id == table_id
    }

    pub fn touches(&self, endpoint: &Endpoint) -> bool {
        self.from == *endpoint || self.to == *endpoint
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

/// The `.dbb` / `.json` document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default)]
    pub viewport: Viewport,
}
