//! The schema graph store: tables, columns, relations, selection, viewport and
//! undo/redo history behind one owned aggregate.
//!
//! Every mutating operation that targets an existing entity pushes a history
//! snapshot first. Operations on unknown ids are no-ops that return `false`
//! (or `None`) and leave history untouched.

mod history;
mod links;
mod viewport;

pub use history::{History, Snapshot};
pub use links::LinkError;
pub use viewport::ScaleRange;

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::ids::{IdSource, UuidIds};
use crate::layout::NodePosition;
use crate::model::{Column, Endpoint, ProjectData, Relation, Table, Viewport};
use crate::naming::fk_column_name;

/// Region new tables are dropped into, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for SpawnRegion {
    fn default() -> Self {
        Self {
            x: 200.0,
            y: 150.0,
            width: 200.0,
            height: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub history_capacity: usize,
    pub scale_range: ScaleRange,
    pub spawn: SpawnRegion,
    pub default_table_name: String,
    pub default_column_type: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_capacity: 60,
            scale_range: ScaleRange::default(),
            spawn: SpawnRegion::default(),
            default_table_name: "new_table".to_string(),
            default_column_type: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFlag {
    Primary,
    Foreign,
    Unique,
    Nullable,
}

impl ColumnFlag {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "isPrimary" | "primary" => Some(Self::Primary),
            "isForeign" | "foreign" => Some(Self::Foreign),
            "isUnique" | "unique" => Some(Self::Unique),
            "isNullable" | "nullable" => Some(Self::Nullable),
            _ => None,
        }
    }
}

/// A single-field column edit.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnEdit {
    Name(String),
    Type(String),
    Default(Option<String>),
    EnumValues(Vec<String>),
}

impl ColumnEdit {
    /// Build an edit from a wire key. `enumValues` takes a comma-separated
    /// list; an empty `default` clears it.
    pub fn from_key(key: &str, value: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name(value.to_string())),
            "type" => Some(Self::Type(value.to_string())),
            "default" if value.trim().is_empty() => Some(Self::Default(None)),
            "default" => Some(Self::Default(Some(value.to_string()))),
            "enumValues" => Some(Self::EnumValues(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            _ => None,
        }
    }
}

/// Partial table update. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableUpdate {
    pub name: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Id -> position lookup. Rebuilt after every structural change; the first
/// occurrence of a duplicated id wins.
#[derive(Debug, Default, Clone)]
struct GraphIndex {
    tables: HashMap<String, usize>,
    columns: HashMap<Endpoint, (usize, usize)>,
    relations: HashMap<String, usize>,
}

impl GraphIndex {
    fn build(tables: &[Table], relations: &[Relation]) -> Self {
        let mut index = Self::default();
        for (ti, table) in tables.iter().enumerate() {
            if index.tables.contains_key(&table.id) {
                continue;
            }
            index.tables.insert(table.id.clone(), ti);
            for (ci, column) in table.columns.iter().enumerate() {
                index
                    .columns
                    .entry(Endpoint::new(&table.id, &column.id))
                    .or_insert((ti, ci));
            }
        }
        for (ri, relation) in relations.iter().enumerate() {
            index.relations.entry(relation.id.clone()).or_insert(ri);
        }
        index
    }
}

pub struct SchemaGraph {
    tables: Vec<Table>,
    relations: Vec<Relation>,
    index: GraphIndex,
    viewport: Viewport,
    selected: Vec<String>,
    selected_relation: Option<String>,
    active_link: Option<Endpoint>,
    history: History,
    config: StoreConfig,
    ids: Box<dyn IdSource>,
}

impl Default for SchemaGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default(), Box::new(UuidIds))
    }

    pub fn with_config(config: StoreConfig, ids: Box<dyn IdSource>) -> Self {
        Self {
            tables: Vec::new(),
            relations: Vec::new(),
            index: GraphIndex::default(),
            viewport: Viewport::default(),
            selected: Vec::new(),
            selected_relation: None,
            active_link: None,
            history: History::new(config.history_capacity),
            config,
            ids,
        }
    }

    pub fn from_project(project: ProjectData) -> Self {
        let mut graph = Self::new();
        graph.load_project(project);
        graph
    }

    // ---- read access -------------------------------------------------------

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn selected_relation(&self) -> Option<&str> {
        self.selected_relation.as_deref()
    }

    /// The pending endpoint of a relation being drawn.
    pub fn active_link(&self) -> Option<&Endpoint> {
        self.active_link.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn table(&self, id: &str) -> Option<&Table> {
        self.index.tables.get(id).map(|&ti| &self.tables[ti])
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn column(&self, endpoint: &Endpoint) -> Option<&Column> {
        self.index
            .columns
            .get(endpoint)
            .map(|&(ti, ci)| &self.tables[ti].columns[ci])
    }

    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.index.relations.get(id).map(|&ri| &self.relations[ri])
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tables: self.tables.clone(),
            relations: self.relations.clone(),
        }
    }

    pub fn project(&self) -> ProjectData {
        ProjectData {
            tables: self.tables.clone(),
            relations: self.relations.clone(),
            viewport: self.viewport,
        }
    }

    // ---- history -----------------------------------------------------------

    /// Checkpoint the current graph. Callers use this before a gesture whose
    /// per-frame updates skip history (table drags).
    pub fn record_history(&mut self) {
        let snapshot = self.snapshot();
        self.history.record(snapshot);
        debug!(depth = self.history.undo_depth(), "history checkpoint");
    }

    pub fn undo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.undo(current) {
            Some(previous) => {
                self.restore(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.redo(current) {
            Some(next) => {
                self.restore(next);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.tables = snapshot.tables;
        self.relations = snapshot.relations;
        self.reindex();
        self.selected.clear();
        self.selected_relation = None;
        self.forget_stale_link();
    }

    // ---- bulk load ---------------------------------------------------------

    /// Replace the whole document. History is kept so a preceding checkpoint
    /// can undo the load.
    pub fn load_project(&mut self, project: ProjectData) {
        self.viewport = project.viewport;
        self.viewport.scale = self.config.scale_range.clamp(self.viewport.scale);
        self.replace_graph(project.tables, project.relations);
    }

    /// Replace tables and relations, keeping the viewport.
    pub fn replace_graph(&mut self, tables: Vec<Table>, relations: Vec<Relation>) {
        self.tables = tables;
        self.relations = relations;
        self.reindex();
        self.heal_foreign_keys();
        self.selected.clear();
        self.selected_relation = None;
        self.active_link = None;
    }

    /// Write layout positions without recording history.
    pub fn apply_layout(&mut self, positions: &[NodePosition]) -> usize {
        let mut moved = 0;
        for node in positions {
            if let Some(&ti) = self.index.tables.get(&node.id) {
                self.tables[ti].x = Some(node.position.x);
                self.tables[ti].y = Some(node.position.y);
                moved += 1;
            }
        }
        moved
    }

    // ---- tables ------------------------------------------------------------

    /// Insert an empty table at a random spot inside the spawn region.
    pub fn add_table(&mut self) -> String {
        self.record_history();

        let (x, y) = self.spawn_point();
        let id = self.ids.next_id();
        let table = Table::new(&id, &self.config.default_table_name).at(x, y);

        self.tables.push(table);
        self.reindex();
        id
    }

    /// Insert a prepared table as one undo step.
    ///
    /// The table and its columns get fresh ids and start with no references.
    /// Missing coordinates are taken from the spawn region.
    pub fn insert_table(&mut self, mut table: Table) -> String {
        self.record_history();

        table.id = self.ids.next_id();
        for column in &mut table.columns {
            column.id = self.ids.next_id();
            column.references = None;
            column.is_foreign = false;
        }
        let (x, y) = self.spawn_point();
        table.x = table.x.or(Some(x));
        table.y = table.y.or(Some(y));

        let id = table.id.clone();
        debug!(table = %id, columns = table.columns.len(), "table inserted");
        self.tables.push(table);
        self.reindex();
        id
    }

    fn spawn_point(&self) -> (f64, f64) {
        let spawn = self.config.spawn;
        let mut rng = rand::rng();
        (
            spawn.x + rng.random::<f64>() * spawn.width,
            spawn.y + rng.random::<f64>() * spawn.height,
        )
    }

    pub fn rename_table(&mut self, id: &str, name: &str) -> bool {
        let Some(&ti) = self.index.tables.get(id) else {
            return false;
        };
        self.record_history();
        self.tables[ti].name = name.to_string();
        self.sync_fk_names(|parent| parent.table_id == id);
        true
    }

    pub fn update_table(&mut self, id: &str, update: TableUpdate) -> bool {
        let Some(&ti) = self.index.tables.get(id) else {
            return false;
        };
        self.record_history();
        let table = &mut self.tables[ti];
        if let Some(x) = update.x {
            table.x = Some(x);
        }
        if let Some(y) = update.y {
            table.y = Some(y);
        }
        if let Some(name) = update.name {
            table.name = name;
            self.sync_fk_names(|parent| parent.table_id == id);
        }
        true
    }

    /// Move a table. Skips history: drags call this every frame and checkpoint
    /// once at gesture start through [`record_history`](Self::record_history).
    pub fn update_table_position(&mut self, id: &str, x: f64, y: f64) -> bool {
        let Some(&ti) = self.index.tables.get(id) else {
            return false;
        };
        self.tables[ti].x = Some(x);
        self.tables[ti].y = Some(y);
        true
    }

    /// Remove a table and every relation touching it. FK columns elsewhere
    /// that pointed into it are kept but lose their reference.
    pub fn remove_table(&mut self, id: &str) -> bool {
        if !self.index.tables.contains_key(id) {
            return false;
        }
        self.record_history();
        self.remove_table_inner(id, false);
        true
    }

    /// Remove a table, every relation touching it, and the FK columns other
    /// tables hold for it.
    pub fn delete_table(&mut self, id: &str) -> bool {
        if !self.index.tables.contains_key(id) {
            return false;
        }
        self.record_history();
        self.remove_table_inner(id, true);
        true
    }

    /// Delete every selected table as one undo step.
    pub fn delete_selected(&mut self) -> usize {
        let doomed: Vec<String> = self
            .selected
            .iter()
            .filter(|id| self.index.tables.contains_key(id.as_str()))
            .cloned()
            .collect();
        if doomed.is_empty() {
            self.selected.clear();
            return 0;
        }

        self.record_history();
        for id in &doomed {
            self.remove_table_inner(id, true);
        }
        self.selected.clear();
        doomed.len()
    }

    fn remove_table_inner(&mut self, id: &str, drop_fk_columns: bool) {
        let dependents: Vec<Endpoint> = if drop_fk_columns {
            self.tables
                .iter()
                .filter(|t| t.id != id)
                .flat_map(|t| {
                    t.columns
                        .iter()
                        .filter(|c| !c.is_primary)
                        .filter(|c| c.references.as_ref().is_some_and(|r| r.table_id == id))
                        .map(|c| Endpoint::new(&t.id, &c.id))
                })
                .collect()
        } else {
            Vec::new()
        };

        self.tables.retain(|t| t.id != id);
        self.relations.retain(|r| !r.touches_table(id));
        self.reindex();
        self.drop_columns(&dependents);
        self.clear_dangling_references();
        self.prune_dangling_relations();

        self.selected.retain(|s| s != id);
        self.forget_stale_link();
        debug!(table = id, fk_columns = dependents.len(), "table removed");
    }

    // ---- columns -----------------------------------------------------------

    pub fn add_column(&mut self, table_id: &str) -> Option<String> {
        let &ti = self.index.tables.get(table_id)?;
        self.record_history();

        let id = self.ids.next_id();
        let table = &mut self.tables[ti];
        let name = format!("column_{}", table.columns.len() + 1);
        table
            .columns
            .push(Column::new(&id, name, &self.config.default_column_type).nullable());
        self.reindex();
        Some(id)
    }

    /// Edit one column field. Renaming a column also renames the FK columns
    /// that reference it, following the `{table}_{column}` convention.
    pub fn update_column(&mut self, table_id: &str, column_id: &str, edit: ColumnEdit) -> bool {
        let endpoint = Endpoint::new(table_id, column_id);
        let Some(&(ti, ci)) = self.index.columns.get(&endpoint) else {
            return false;
        };
        self.record_history();

        let column = &mut self.tables[ti].columns[ci];
        match edit {
            ColumnEdit::Name(name) => {
                column.name = name;
                self.sync_fk_names(|parent| *parent == endpoint);
            }
            ColumnEdit::Type(column_type) => column.column_type = column_type,
            ColumnEdit::Default(default) => column.default = default,
            ColumnEdit::EnumValues(values) => column.enum_values = Some(values),
        }
        true
    }

    pub fn toggle_column_flag(&mut self, table_id: &str, column_id: &str, flag: ColumnFlag) -> bool {
        let Some(&(ti, ci)) = self.index.columns.get(&Endpoint::new(table_id, column_id)) else {
            return false;
        };
        self.record_history();

        let column = &mut self.tables[ti].columns[ci];
        let value = match flag {
            ColumnFlag::Primary => &mut column.is_primary,
            ColumnFlag::Foreign => &mut column.is_foreign,
            ColumnFlag::Unique => &mut column.is_unique,
            ColumnFlag::Nullable => &mut column.is_nullable,
        };
        *value = !*value;
        true
    }

    /// Remove a column. Relations attached to it go too, releasing their FK
    /// columns; references to it elsewhere are cleared.
    pub fn remove_column(&mut self, table_id: &str, column_id: &str) -> bool {
        let endpoint = Endpoint::new(table_id, column_id);
        if !self.index.columns.contains_key(&endpoint) {
            return false;
        }
        self.record_history();

        let (detached, kept): (Vec<Relation>, Vec<Relation>) = std::mem::take(&mut self.relations)
            .into_iter()
            .partition(|r| r.touches(&endpoint));
        self.relations = kept;
        self.reindex();

        self.drop_columns(std::slice::from_ref(&endpoint));
        for relation in &detached {
            self.release_fk(relation);
        }
        self.clear_dangling_references();
        self.prune_dangling_relations();
        true
    }

    // ---- selection & viewport ---------------------------------------------

    /// Single select replaces the selection; additive toggles membership.
    pub fn select_table(&mut self, id: &str, additive: bool) {
        if !additive {
            self.selected = vec![id.to_string()];
        } else if let Some(pos) = self.selected.iter().position(|s| s == id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(id.to_string());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn select_relation(&mut self, id: Option<&str>) {
        self.selected_relation = id.map(str::to_string);
    }

    pub fn set_viewport(&mut self, x: f64, y: f64) {
        self.viewport.x = x;
        self.viewport.y = y;
    }

    /// Zoom around a screen-space cursor point.
    pub fn set_scale(&mut self, scale: f64, cursor_x: f64, cursor_y: f64) {
        self.viewport = self
            .viewport
            .zoom_at(scale, cursor_x, cursor_y, self.config.scale_range);
    }

    pub fn fit_viewport(&mut self, screen_width: f64, screen_height: f64) {
        self.viewport = Viewport::fit(&self.tables, screen_width, screen_height);
    }

    // ---- internal consistency ---------------------------------------------

    fn reindex(&mut self) {
        self.index = GraphIndex::build(&self.tables, &self.relations);
    }

    fn forget_stale_link(&mut self) {
        if let Some(link) = &self.active_link {
            if !self.index.tables.contains_key(&link.table_id) {
                self.active_link = None;
            }
        }
        if let Some(id) = &self.selected_relation {
            if !self.index.relations.contains_key(id) {
                self.selected_relation = None;
            }
        }
    }

    fn drop_columns(&mut self, doomed: &[Endpoint]) {
        if doomed.is_empty() {
            return;
        }
        for table in &mut self.tables {
            let table_id = table.id.clone();
            table.columns.retain(|c| {
                !doomed
                    .iter()
                    .any(|d| d.table_id == table_id && d.column_id == c.id)
            });
        }
        self.reindex();
    }

    /// Clear `references` that no longer resolve.
    fn clear_dangling_references(&mut self) {
        let index = &self.index;
        let dangling: Vec<(usize, usize)> = self
            .tables
            .iter()
            .enumerate()
            .flat_map(|(ti, t)| {
                t.columns.iter().enumerate().filter_map(move |(ci, c)| {
                    let parent = c.references.as_ref()?;
                    (!index.columns.contains_key(parent)).then_some((ti, ci))
                })
            })
            .collect();

        for (ti, ci) in dangling {
            let column = &mut self.tables[ti].columns[ci];
            column.references = None;
            column.is_foreign = false;
        }
    }

    /// Drop relations whose endpoint table or column is gone.
    fn prune_dangling_relations(&mut self) {
        let before = self.relations.len();
        let columns = &self.index.columns;
        self.relations
            .retain(|r| columns.contains_key(&r.from) && columns.contains_key(&r.to));
        if self.relations.len() != before {
            debug!(pruned = before - self.relations.len(), "dangling relations removed");
            self.reindex();
        }
        self.forget_stale_link();
    }

    /// Bring loaded data in line with the FK invariants: relation endpoints
    /// resolve, every one-to-one/one-to-many child endpoint is marked as an FK
    /// referencing its parent, and `isForeign` is set wherever a reference is.
    fn heal_foreign_keys(&mut self) {
        self.clear_dangling_references();
        self.prune_dangling_relations();

        let claims: Vec<((usize, usize), Endpoint)> = self
            .relations
            .iter()
            .filter(|r| r.cardinality.needs_fk_column())
            .filter_map(|r| {
                let &(ti, ci) = self.index.columns.get(&r.to)?;
                let column = &self.tables[ti].columns[ci];
                (!column.is_primary && column.references.is_none() && r.from != r.to)
                    .then(|| ((ti, ci), r.from.clone()))
            })
            .collect();
        for ((ti, ci), parent) in claims {
            self.tables[ti].columns[ci].references = Some(parent);
        }

        for column in self.tables.iter_mut().flat_map(|t| t.columns.iter_mut()) {
            if column.references.is_some() {
                column.is_foreign = true;
            }
        }
    }

    /// Regenerate FK column names for references matching `affected`.
    fn sync_fk_names(&mut self, affected: impl Fn(&Endpoint) -> bool) {
        let mut renames = Vec::new();
        for (ti, table) in self.tables.iter().enumerate() {
            for (ci, column) in table.columns.iter().enumerate() {
                let Some(parent) = column.references.as_ref().filter(|p| affected(*p)) else {
                    continue;
                };
                let (Some(parent_table), Some(parent_column)) =
                    (self.table(&parent.table_id), self.column(parent))
                else {
                    continue;
                };
                renames.push((ti, ci, fk_column_name(&parent_table.name, &parent_column.name)));
            }
        }
        for (ti, ci, name) in renames {
            self.tables[ti].columns[ci].name = name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::layout::Point;
    use crate::model::Cardinality;

    pub(super) fn graph() -> SchemaGraph {
        SchemaGraph::with_config(StoreConfig::default(), Box::new(SequentialIds::new("id")))
    }

    /// users{id pk uuid}, posts{id pk uuid, user_id uuid}, users.id -> posts.user_id.
    pub(super) fn users_posts() -> SchemaGraph {
        let users = Table::new("users", "users")
            .at(0.0, 0.0)
            .with_column(Column::new("users.id", "id", "uuid").primary());
        let posts = Table::new("posts", "posts")
            .at(400.0, 0.0)
            .with_column(Column::new("posts.id", "id", "uuid").primary())
            .with_column(Column::new("posts.user_id", "user_id", "uuid"));
        let relation = Relation::new(
            "rel",
            Endpoint::new("users", "users.id"),
            Endpoint::new("posts", "posts.user_id"),
            Cardinality::OneToMany,
        );

        let mut g = graph();
        g.load_project(ProjectData {
            tables: vec![users, posts],
            relations: vec![relation],
            viewport: Viewport::default(),
        });
        g
    }

    #[test]
    fn test_add_table_defaults() {
        let mut g = graph();
        let id = g.add_table();
        let table = g.table(&id).unwrap();

        assert_eq!(table.name, "new_table");
        assert!(table.columns.is_empty());
        let (x, y) = table.position();
        assert!((200.0..=400.0).contains(&x));
        assert!((150.0..=300.0).contains(&y));
        assert!(g.can_undo());
    }

    #[test]
    fn test_insert_table_is_one_step() {
        let mut g = graph();
        let prepared = Table::new("", "orders")
            .with_column(Column::new("", "id", "int").primary())
            .with_column(Column::new("", "total", "float").referencing(Endpoint::new("x", "y")));
        let id = g.insert_table(prepared);

        assert_eq!(g.history().undo_depth(), 1);
        let table = g.table(&id).unwrap();
        assert!(table.x.is_some() && table.y.is_some());
        assert_eq!(table.columns[0].id, "id2");
        assert_eq!(table.columns[1].id, "id3");
        assert!(table.columns[1].references.is_none());
        assert!(!table.columns[1].is_foreign);

        assert!(g.undo());
        assert!(g.tables().is_empty());
    }

    #[test]
    fn test_load_clamps_scale() {
        let mut g = graph();
        g.load_project(ProjectData {
            viewport: Viewport { x: 10.0, y: 10.0, scale: 0.0 },
            ..ProjectData::default()
        });
        assert_eq!(g.viewport().scale, 0.2);

        g.set_scale(1.0, 0.0, 0.0);
        let viewport = g.viewport();
        assert!(viewport.x.is_finite() && viewport.y.is_finite());
        assert_eq!(viewport.scale, 1.0);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut g = graph();
        assert!(!g.rename_table("missing", "x"));
        assert!(g.add_column("missing").is_none());
        assert!(!g.update_column("missing", "c", ColumnEdit::Name("x".into())));
        assert!(!g.remove_column("missing", "c"));
        assert!(!g.delete_table("missing"));
        assert!(!g.can_undo());
    }

    #[test]
    fn test_add_column_defaults() {
        let mut g = graph();
        let table = g.add_table();
        let first = g.add_column(&table).unwrap();
        g.add_column(&table).unwrap();

        let column = g.column(&Endpoint::new(&table, &first)).unwrap();
        assert_eq!(column.name, "column_1");
        assert_eq!(column.column_type, "text");
        assert!(column.is_nullable);
        assert_eq!(g.table(&table).unwrap().columns[1].name, "column_2");
    }

    #[test]
    fn test_rename_column_syncs_fk_names() {
        let mut g = users_posts();
        g.update_column("users", "users.id", ColumnEdit::Name("uid".into()));

        let fk = g.column(&Endpoint::new("posts", "posts.user_id")).unwrap();
        assert_eq!(fk.name, "users_uid");
    }

    #[test]
    fn test_rename_table_syncs_fk_names() {
        let mut g = users_posts();
        g.rename_table("users", "Accounts");

        let fk = g.column(&Endpoint::new("posts", "posts.user_id")).unwrap();
        assert_eq!(fk.name, "accounts_id");
    }

    #[test]
    fn test_position_updates_skip_history() {
        let mut g = users_posts();
        g.record_history();
        for step in 0..50 {
            g.update_table_position("users", step as f64, 0.0);
        }
        assert_eq!(g.history().undo_depth(), 1);

        g.undo();
        assert_eq!(g.table("users").unwrap().position(), (0.0, 0.0));
    }

    #[test]
    fn test_toggle_flag() {
        let mut g = users_posts();
        g.toggle_column_flag("posts", "posts.user_id", ColumnFlag::Unique);
        assert!(g.column(&Endpoint::new("posts", "posts.user_id")).unwrap().is_unique);
        g.toggle_column_flag("posts", "posts.user_id", ColumnFlag::Unique);
        assert!(!g.column(&Endpoint::new("posts", "posts.user_id")).unwrap().is_unique);
    }

    #[test]
    fn test_load_heals_fk_flags() {
        let g = users_posts();
        let fk = g.column(&Endpoint::new("posts", "posts.user_id")).unwrap();
        assert!(fk.is_foreign);
        assert_eq!(fk.references, Some(Endpoint::new("users", "users.id")));
    }

    #[test]
    fn test_load_prunes_dangling_relations() {
        let mut g = graph();
        g.load_project(ProjectData {
            tables: vec![Table::new("a", "a").with_column(Column::new("a1", "id", "int"))],
            relations: vec![Relation::new(
                "r",
                Endpoint::new("a", "a1"),
                Endpoint::new("ghost", "g1"),
                Cardinality::OneToMany,
            )],
            viewport: Viewport::default(),
        });
        assert!(g.relations().is_empty());
    }

    #[test]
    fn test_remove_table_keeps_fk_column_without_reference() {
        let mut g = users_posts();
        g.remove_table("users");

        assert!(g.relations().is_empty());
        let fk = g.column(&Endpoint::new("posts", "posts.user_id")).unwrap();
        assert_eq!(fk.references, None);
        assert!(!fk.is_foreign);
    }

    #[test]
    fn test_delete_table_drops_fk_columns() {
        let mut g = users_posts();
        g.select_table("users", false);
        g.delete_table("users");

        assert!(g.relations().is_empty());
        assert!(g.column(&Endpoint::new("posts", "posts.user_id")).is_none());
        assert!(g.selected().is_empty());
    }

    #[test]
    fn test_delete_selected_is_one_undo_step() {
        let mut g = users_posts();
        let before = g.snapshot();
        g.select_table("users", false);
        g.select_table("posts", true);

        assert_eq!(g.delete_selected(), 2);
        assert!(g.tables().is_empty());

        g.undo();
        assert_eq!(g.snapshot(), before);
    }

    #[test]
    fn test_remove_parent_column_cascades() {
        let mut g = users_posts();
        g.remove_column("users", "users.id");

        assert!(g.relations().is_empty());
        assert!(g.column(&Endpoint::new("posts", "posts.user_id")).is_none());
    }

    #[test]
    fn test_selection() {
        let mut g = graph();
        g.select_table("a", false);
        g.select_table("b", true);
        assert_eq!(g.selected(), ["a", "b"]);
        g.select_table("a", true);
        assert_eq!(g.selected(), ["b"]);
        g.select_table("c", false);
        assert_eq!(g.selected(), ["c"]);
        g.clear_selection();
        assert!(g.selected().is_empty());
    }

    #[test]
    fn test_undo_clears_selection() {
        let mut g = users_posts();
        g.rename_table("users", "people");
        g.select_table("users", false);
        g.select_relation(Some("rel"));

        assert!(g.undo());
        assert!(g.selected().is_empty());
        assert_eq!(g.selected_relation(), None);
        assert_eq!(g.table("users").unwrap().name, "users");
    }

    #[test]
    fn test_undo_redo_inverse() {
        let mut g = users_posts();
        let s0 = g.snapshot();
        let table = g.add_table();
        let s1 = g.snapshot();
        g.add_column(&table);
        let s2 = g.snapshot();
        g.delete_table("users");
        let s3 = g.snapshot();

        assert!(g.undo());
        assert_eq!(g.snapshot(), s2);
        assert!(g.undo());
        assert_eq!(g.snapshot(), s1);
        assert!(g.undo());
        assert_eq!(g.snapshot(), s0);
        assert!(!g.undo());

        assert!(g.redo());
        assert_eq!(g.snapshot(), s1);
        assert!(g.redo());
        assert!(g.redo());
        assert_eq!(g.snapshot(), s3);
        assert!(!g.redo());
    }

    #[test]
    fn test_history_capacity() {
        let mut g = graph();
        for _ in 0..70 {
            g.add_table();
        }
        assert_eq!(g.history().undo_depth(), 60);
    }

    #[test]
    fn test_viewport_zoom_clamped() {
        let mut g = graph();
        g.set_scale(100.0, 0.0, 0.0);
        assert_eq!(g.viewport().scale, 4.0);
        g.set_viewport(15.0, -5.0);
        assert_eq!((g.viewport().x, g.viewport().y), (15.0, -5.0));
    }

    #[test]
    fn test_apply_layout() {
        let mut g = users_posts();
        let moved = g.apply_layout(&[
            NodePosition { id: "users".into(), position: Point { x: 5.0, y: 6.0 } },
            NodePosition { id: "ghost".into(), position: Point { x: 1.0, y: 1.0 } },
        ]);
        assert_eq!(moved, 1);
        assert_eq!(g.table("users").unwrap().position(), (5.0, 6.0));
        assert!(!g.can_undo());
    }

    #[test]
    fn test_column_edit_from_key() {
        assert_eq!(
            ColumnEdit::from_key("enumValues", "draft, published,"),
            Some(ColumnEdit::EnumValues(vec!["draft".into(), "published".into()]))
        );
        assert_eq!(ColumnEdit::from_key("default", " "), Some(ColumnEdit::Default(None)));
        assert_eq!(ColumnEdit::from_key("color", "red"), None);
    }
}
