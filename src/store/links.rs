//! Drawing, re-typing and deleting relations while keeping FK columns in sync.

use thiserror::Error;
use tracing::{debug, warn};

use super::SchemaGraph;
use crate::model::{Cardinality, Column, Endpoint, ReferentialAction, Relation};
use crate::naming::fk_column_name;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("no relation is being drawn")]
    NoPendingLink,
    #[error("a relation cannot start and end on the same column")]
    SameEndpoint,
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("unknown relation '{0}'")]
    UnknownRelation(String),
    #[error("neither table has a primary key")]
    NoPrimaryKey,
    #[error("table '{table}' has no key column to anchor the relation")]
    MissingKey { table: String },
    #[error("relation '{0}' already links these columns")]
    AlreadyLinked(String),
}

/// Where the child side's FK column comes from.
enum FkSlot {
    /// A user-made column that becomes (or already is) the FK.
    Adopt(String),
    Create,
}

impl SchemaGraph {
    /// Remember the first endpoint of a relation being drawn.
    pub fn start_relation(&mut self, table_id: &str, column_id: &str) {
        self.active_link = Some(Endpoint::new(table_id, column_id));
    }

    pub fn cancel_relation(&mut self) {
        self.active_link = None;
    }

    /// Finish the pending relation on `(table_id, column_id)`.
    ///
    /// The parent is the side whose clicked column is a primary key when
    /// exactly one is; otherwise the initiating table if it has a primary key,
    /// then the target table. The child gets an FK column referencing the
    /// parent key: a column already referencing it, a free column carrying
    /// the conventional name (retyped to the key's type), or a new column.
    /// A clicked ordinary column is left alone.
    /// The pending link is consumed whether or not this succeeds.
    pub fn commit_relation(&mut self, table_id: &str, column_id: &str) -> Result<String, LinkError> {
        let start = self.active_link.take().ok_or(LinkError::NoPendingLink)?;
        let end = Endpoint::new(table_id, column_id);
        if start == end {
            return Err(LinkError::SameEndpoint);
        }
        let start_column = self.require_column(&start)?;
        let end_column = self.require_column(&end)?;

        let (parent, child) = match (start_column.is_primary, end_column.is_primary) {
            (true, false) => (start, end),
            (false, true) => (end, start),
            _ => match (self.primary_endpoint(&start), self.primary_endpoint(&end)) {
                (Some(key), _) => (key, end),
                (None, Some(key)) => (key, start),
                (None, None) => {
                    warn!(from = %start.table_id, to = %end.table_id, "relation rejected: no primary key on either table");
                    return Err(LinkError::NoPrimaryKey);
                }
            },
        };

        let slot = self.fk_slot(&parent, &child.table_id);
        if let FkSlot::Adopt(fk_id) = &slot {
            if let Some(existing) = self.relations.iter().find(|r| {
                r.cardinality.needs_fk_column()
                    && r.from == parent
                    && r.to.table_id == child.table_id
                    && r.to.column_id == *fk_id
            }) {
                return Err(LinkError::AlreadyLinked(existing.id.clone()));
            }
        }

        self.record_history();
        let fk_id = self.place_fk_column(&parent, &child.table_id, slot);
        let relation = Relation {
            id: self.ids.next_id(),
            from: parent,
            to: Endpoint::new(&child.table_id, fk_id),
            cardinality: Cardinality::OneToMany,
            is_one_to_many_reversed: false,
            delete_rule: Some(ReferentialAction::Cascade),
            update_rule: Some(ReferentialAction::Cascade),
        };
        let id = relation.id.clone();
        debug!(relation = %id, parent = %relation.from.table_id, child = %relation.to.table_id, "relation created");

        self.relations.push(relation);
        self.reindex();
        Ok(id)
    }

    /// Change a relation's cardinality and direction, relocating FK columns.
    ///
    /// Endpoints swap only when `reverse` differs from the stored flag, so
    /// applying the same arguments twice changes nothing the second time.
    pub fn update_relation_cardinality(
        &mut self,
        id: &str,
        cardinality: Cardinality,
        reverse: bool,
    ) -> Result<(), LinkError> {
        let &pos = self
            .index
            .relations
            .get(id)
            .ok_or_else(|| LinkError::UnknownRelation(id.to_string()))?;
        let current = self.relations[pos].clone();

        let (from, to) = if reverse != current.is_one_to_many_reversed {
            (current.to.clone(), current.from.clone())
        } else {
            (current.from.clone(), current.to.clone())
        };
        if self.table(&to.table_id).is_none() {
            return Err(LinkError::UnknownTable(to.table_id));
        }

        let parent = self.key_endpoint(&from)?;
        let anchor = if cardinality.needs_fk_column() {
            None
        } else {
            Some(self.key_endpoint(&to)?)
        };

        self.record_history();
        let mut relation = self.relations.remove(pos);
        self.reindex();

        // Old FK columns go unless another relation still uses them or they
        // already are the FK the new shape needs.
        let old = [current.from.clone(), current.to.clone()];
        let keep_fk = cardinality.needs_fk_column();
        let doomed: Vec<Endpoint> = self
            .tables
            .iter()
            .flat_map(|table| table.columns.iter().map(move |c| (table, c)))
            .filter(|(table, c)| {
                let Some(reference) = &c.references else {
                    return false;
                };
                let here = Endpoint::new(&table.id, &c.id);
                old.contains(reference)
                    && !c.is_primary
                    && here != parent
                    && Some(&here) != anchor.as_ref()
                    && !(keep_fk && table.id == to.table_id && *reference == parent)
                    && !self.is_claimed(&table.id, c, &current.id)
            })
            .map(|(table, c)| Endpoint::new(&table.id, &c.id))
            .collect();
        self.drop_columns(&doomed);
        self.clear_dangling_references();
        self.prune_dangling_relations();

        relation.to = match anchor {
            Some(anchor) => anchor,
            None => {
                let slot = self.fk_slot(&parent, &to.table_id);
                Endpoint::new(&to.table_id, self.place_fk_column(&parent, &to.table_id, slot))
            }
        };
        relation.from = parent;
        relation.cardinality = cardinality;
        relation.is_one_to_many_reversed = reverse;
        debug!(relation = id, ?cardinality, reverse, dropped = doomed.len(), "relation re-typed");

        let pos = pos.min(self.relations.len());
        self.relations.insert(pos, relation);
        self.reindex();
        Ok(())
    }

    /// Delete a relation and release its FK column unless something else
    /// still uses it.
    pub fn delete_relation(&mut self, id: &str) -> bool {
        let Some(&pos) = self.index.relations.get(id) else {
            return false;
        };
        self.record_history();

        let relation = self.relations.remove(pos);
        self.reindex();
        self.release_fk(&relation);
        if self.selected_relation.as_deref() == Some(id) {
            self.selected_relation = None;
        }
        true
    }

    /// Drop the FK column a removed relation was using, if no other
    /// one-to-one/one-to-many relation claims it.
    pub(super) fn release_fk(&mut self, relation: &Relation) {
        if !relation.cardinality.needs_fk_column() {
            return;
        }
        let Some(column) = self.column(&relation.to) else {
            return;
        };
        if column.is_primary
            || column.references.as_ref() != Some(&relation.from)
            || self.is_claimed(&relation.to.table_id, column, &relation.id)
        {
            return;
        }

        self.drop_columns(std::slice::from_ref(&relation.to));
        self.clear_dangling_references();
        self.prune_dangling_relations();
    }

    /// Whether a relation other than `except` uses `column` as its FK.
    fn is_claimed(&self, table_id: &str, column: &Column, except: &str) -> bool {
        let Some(parent) = &column.references else {
            return false;
        };
        self.relations.iter().any(|r| {
            r.id != except
                && r.cardinality.needs_fk_column()
                && r.from == *parent
                && r.to.table_id == table_id
                && r.to.column_id == column.id
        })
    }

    fn require_column(&self, endpoint: &Endpoint) -> Result<&Column, LinkError> {
        if self.table(&endpoint.table_id).is_none() {
            return Err(LinkError::UnknownTable(endpoint.table_id.clone()));
        }
        self.column(endpoint).ok_or_else(|| LinkError::UnknownColumn {
            table: endpoint.table_id.clone(),
            column: endpoint.column_id.clone(),
        })
    }

    /// The clicked column if it is a primary key, else the table's first one.
    fn primary_endpoint(&self, endpoint: &Endpoint) -> Option<Endpoint> {
        let table = self.table(&endpoint.table_id)?;
        if table.column(&endpoint.column_id).is_some_and(|c| c.is_primary) {
            return Some(endpoint.clone());
        }
        table.primary_key().map(|pk| Endpoint::new(&table.id, &pk.id))
    }

    /// Like [`primary_endpoint`](Self::primary_endpoint), but a unique column
    /// also counts as a key.
    fn key_endpoint(&self, endpoint: &Endpoint) -> Result<Endpoint, LinkError> {
        let table = self
            .table(&endpoint.table_id)
            .ok_or_else(|| LinkError::UnknownTable(endpoint.table_id.clone()))?;
        if table.column(&endpoint.column_id).is_some_and(Column::is_key) {
            return Ok(endpoint.clone());
        }
        table
            .primary_key()
            .map(|pk| Endpoint::new(&table.id, &pk.id))
            .ok_or_else(|| LinkError::MissingKey {
                table: table.name.clone(),
            })
    }

    fn fk_slot(&self, parent: &Endpoint, child_table: &str) -> FkSlot {
        let Some(table) = self.table(child_table) else {
            return FkSlot::Create;
        };

        if let Some(column) = table
            .columns
            .iter()
            .find(|c| !c.is_primary && c.references.as_ref() == Some(parent))
        {
            return FkSlot::Adopt(column.id.clone());
        }
        let name = self.fk_name(parent);
        match table
            .columns
            .iter()
            .find(|c| c.name == name && !c.is_primary && c.references.is_none())
        {
            Some(column) => FkSlot::Adopt(column.id.clone()),
            None => FkSlot::Create,
        }
    }

    fn fk_name(&self, parent: &Endpoint) -> String {
        match (self.table(&parent.table_id), self.column(parent)) {
            (Some(table), Some(column)) => fk_column_name(&table.name, &column.name),
            _ => fk_column_name(&parent.table_id, &parent.column_id),
        }
    }

    fn place_fk_column(&mut self, parent: &Endpoint, child_table: &str, slot: FkSlot) -> String {
        match slot {
            FkSlot::Adopt(id) => {
                let key_type = self.column(parent).map(|c| c.column_type.clone());
                if let Some(&(ti, ci)) = self.index.columns.get(&Endpoint::new(child_table, &id)) {
                    let column = &mut self.tables[ti].columns[ci];
                    column.is_foreign = true;
                    column.references = Some(parent.clone());
                    if let Some(key_type) = key_type {
                        column.column_type = key_type;
                    }
                }
                id
            }
            FkSlot::Create => {
                let name = self.fk_name(parent);
                let column_type = self
                    .column(parent)
                    .map(|c| c.column_type.clone())
                    .unwrap_or_else(|| self.config.default_column_type.clone());
                let id = self.ids.next_id();
                if let Some(&ti) = self.index.tables.get(child_table) {
                    self.tables[ti].columns.push(
                        Column::new(&id, name, column_type)
                            .nullable()
                            .referencing(parent.clone()),
                    );
                    self.reindex();
                }
                id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{graph, users_posts};
    use super::*;
    use crate::model::{ProjectData, Table, Viewport};

    /// Every one-to-one/one-to-many relation's child column references its
    /// parent, and every reference is backed by a relation.
    fn assert_fk_sync(g: &SchemaGraph) {
        for relation in g.relations().iter().filter(|r| r.cardinality.needs_fk_column()) {
            let fk = g.column(&relation.to).expect("child column exists");
            assert_eq!(fk.references.as_ref(), Some(&relation.from), "{}", relation.id);
            assert!(fk.is_foreign);
        }
        for table in g.tables() {
            for column in &table.columns {
                if let Some(parent) = &column.references {
                    assert!(g.column(parent).is_some(), "dangling reference on {}", column.id);
                }
            }
        }
    }

    fn users_and_posts_unlinked() -> SchemaGraph {
        let mut g = graph();
        g.load_project(ProjectData {
            tables: vec![
                Table::new("users", "users").with_column(Column::new("u.id", "id", "uuid").primary()),
                Table::new("posts", "posts")
                    .with_column(Column::new("p.id", "id", "int").primary())
                    .with_column(Column::new("p.title", "title", "text")),
            ],
            relations: vec![],
            viewport: Viewport::default(),
        });
        g
    }

    #[test]
    fn test_commit_creates_fk_column() {
        let mut g = users_and_posts_unlinked();
        g.start_relation("users", "u.id");
        let id = g.commit_relation("posts", "p.id").unwrap();

        let relation = g.relation(&id).unwrap().clone();
        assert_eq!(relation.from, Endpoint::new("users", "u.id"));
        assert_eq!(relation.to.table_id, "posts");
        assert_eq!(relation.cardinality, Cardinality::OneToMany);
        assert_eq!(relation.delete_rule, Some(ReferentialAction::Cascade));

        let fk = g.column(&relation.to).unwrap();
        assert_eq!(fk.name, "users_id");
        assert_eq!(fk.column_type, "uuid");
        assert!(fk.is_nullable);
        assert_fk_sync(&g);
        assert!(g.active_link().is_none());
    }

    #[test]
    fn test_commit_leaves_clicked_column_alone() {
        let mut g = users_and_posts_unlinked();
        g.start_relation("posts", "p.title");
        let id = g.commit_relation("users", "u.id").unwrap();

        let relation = g.relation(&id).unwrap().clone();
        assert_eq!(relation.from, Endpoint::new("users", "u.id"));
        assert_ne!(relation.to.column_id, "p.title");

        let title = g.column(&Endpoint::new("posts", "p.title")).unwrap();
        assert_eq!(title.name, "title");
        assert_eq!(title.column_type, "text");
        assert!(!title.is_foreign);
        assert!(title.references.is_none());

        let fk = g.column(&relation.to).unwrap();
        assert_eq!(fk.name, "users_id");
        assert_eq!(fk.column_type, "uuid");
        assert!(fk.is_nullable);
        assert_eq!(g.table("posts").unwrap().columns.len(), 3);
        assert_fk_sync(&g);

        g.rename_table("users", "people");
        let names: Vec<&str> = g.table("posts").unwrap().columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "title", "people_id"]);

        let sql = crate::sql::generate_sql_at(g.tables(), g.relations(), "t");
        assert!(sql.contains("FOREIGN KEY (\"people_id\") REFERENCES \"people\"(\"id\")"));
        assert!(!sql.contains("FOREIGN KEY (\"title\")"));
    }

    #[test]
    fn test_commit_adopts_conventionally_named_column() {
        let mut g = graph();
        g.load_project(ProjectData {
            tables: vec![
                Table::new("users", "users").with_column(Column::new("u.id", "id", "uuid").primary()),
                Table::new("posts", "posts")
                    .with_column(Column::new("p.id", "id", "int").primary())
                    .with_column(Column::new("p.users_id", "users_id", "text")),
            ],
            ..ProjectData::default()
        });
        g.start_relation("users", "u.id");
        let id = g.commit_relation("posts", "p.id").unwrap();

        assert_eq!(g.relation(&id).unwrap().to, Endpoint::new("posts", "p.users_id"));
        assert_eq!(g.table("posts").unwrap().columns.len(), 2);
        let fk = g.column(&Endpoint::new("posts", "p.users_id")).unwrap();
        assert_eq!(fk.column_type, "uuid");
        assert_fk_sync(&g);
    }

    #[test]
    fn test_commit_twice_is_rejected() {
        let mut g = users_and_posts_unlinked();
        g.start_relation("users", "u.id");
        let first = g.commit_relation("posts", "p.id").unwrap();
        let depth = g.history().undo_depth();

        g.start_relation("users", "u.id");
        assert_eq!(
            g.commit_relation("posts", "p.id"),
            Err(LinkError::AlreadyLinked(first))
        );
        assert_eq!(g.history().undo_depth(), depth);
        assert_eq!(g.relations().len(), 1);
    }

    #[test]
    fn test_commit_without_primary_keys() {
        let mut g = graph();
        g.load_project(ProjectData {
            tables: vec![
                Table::new("a", "a").with_column(Column::new("a1", "name", "text")),
                Table::new("b", "b").with_column(Column::new("b1", "name", "text")),
            ],
            ..ProjectData::default()
        });
        g.start_relation("a", "a1");

        assert_eq!(g.commit_relation("b", "b1"), Err(LinkError::NoPrimaryKey));
        assert!(g.relations().is_empty());
        assert!(!g.can_undo());
        assert!(g.active_link().is_none());
    }

    #[test]
    fn test_commit_errors() {
        let mut g = users_and_posts_unlinked();
        assert_eq!(g.commit_relation("posts", "p.id"), Err(LinkError::NoPendingLink));

        g.start_relation("users", "u.id");
        assert_eq!(g.commit_relation("users", "u.id"), Err(LinkError::SameEndpoint));

        g.start_relation("users", "u.id");
        assert!(matches!(
            g.commit_relation("posts", "nope"),
            Err(LinkError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_cancel_relation() {
        let mut g = users_and_posts_unlinked();
        g.start_relation("users", "u.id");
        assert!(g.active_link().is_some());
        g.cancel_relation();
        assert!(g.active_link().is_none());
    }

    #[test]
    fn test_flip_moves_fk_to_other_table() {
        let mut g = users_posts();
        g.update_relation_cardinality("rel", Cardinality::OneToMany, true).unwrap();

        let relation = g.relation("rel").unwrap().clone();
        assert_eq!(relation.from, Endpoint::new("posts", "posts.id"));
        assert_eq!(relation.to.table_id, "users");
        assert!(relation.is_one_to_many_reversed);

        assert!(g.column(&Endpoint::new("posts", "posts.user_id")).is_none());
        let fk = g.column(&relation.to).unwrap();
        assert_eq!(fk.name, "posts_id");
        assert_eq!(fk.references, Some(Endpoint::new("posts", "posts.id")));
        assert_fk_sync(&g);
    }

    #[test]
    fn test_flip_is_idempotent() {
        let mut g = users_posts();
        g.update_relation_cardinality("rel", Cardinality::OneToMany, true).unwrap();
        let once = g.snapshot();
        g.update_relation_cardinality("rel", Cardinality::OneToMany, true).unwrap();
        assert_eq!(g.snapshot(), once);
    }

    #[test]
    fn test_flip_back_restores_shape() {
        let mut g = users_posts();
        g.update_relation_cardinality("rel", Cardinality::OneToMany, true).unwrap();
        g.update_relation_cardinality("rel", Cardinality::OneToMany, false).unwrap();

        let relation = g.relation("rel").unwrap().clone();
        assert_eq!(relation.from, Endpoint::new("users", "users.id"));
        assert_eq!(relation.to.table_id, "posts");
        assert_eq!(g.column(&relation.to).unwrap().name, "users_id");
        assert!(g.table("users").unwrap().columns.iter().all(|c| c.references.is_none()));
        assert_fk_sync(&g);
    }

    #[test]
    fn test_many_to_many_drops_fk_column() {
        let mut g = users_posts();
        g.update_relation_cardinality("rel", Cardinality::ManyToMany, false).unwrap();

        let relation = g.relation("rel").unwrap();
        assert_eq!(relation.cardinality, Cardinality::ManyToMany);
        assert_eq!(relation.from, Endpoint::new("users", "users.id"));
        assert_eq!(relation.to, Endpoint::new("posts", "posts.id"));
        assert!(g.column(&Endpoint::new("posts", "posts.user_id")).is_none());
    }

    #[test]
    fn test_cardinality_undo() {
        let mut g = users_posts();
        let before = g.snapshot();
        g.update_relation_cardinality("rel", Cardinality::OneToOne, true).unwrap();
        g.undo();
        assert_eq!(g.snapshot(), before);
    }

    #[test]
    fn test_cardinality_needs_parent_key() {
        let mut g = graph();
        g.load_project(ProjectData {
            tables: vec![
                Table::new("a", "a").with_column(Column::new("a1", "id", "int").primary()),
                Table::new("b", "b").with_column(Column::new("b1", "a_id", "int")),
            ],
            relations: vec![Relation::new(
                "r",
                Endpoint::new("a", "a1"),
                Endpoint::new("b", "b1"),
                Cardinality::OneToMany,
            )],
            viewport: Viewport::default(),
        });

        assert_eq!(
            g.update_relation_cardinality("r", Cardinality::OneToMany, true),
            Err(LinkError::MissingKey { table: "b".into() })
        );
        assert!(!g.can_undo());
        assert!(matches!(
            g.update_relation_cardinality("ghost", Cardinality::OneToOne, false),
            Err(LinkError::UnknownRelation(_))
        ));
    }

    #[test]
    fn test_delete_relation_releases_fk() {
        let mut g = users_posts();
        g.select_relation(Some("rel"));
        assert!(g.delete_relation("rel"));

        assert!(g.relations().is_empty());
        assert!(g.column(&Endpoint::new("posts", "posts.user_id")).is_none());
        assert_eq!(g.selected_relation(), None);
        assert!(!g.delete_relation("rel"));
    }

    #[test]
    fn test_fk_sync_across_edits() {
        let mut g = users_and_posts_unlinked();
        g.start_relation("users", "u.id");
        let rel = g.commit_relation("posts", "p.id").unwrap();
        assert_fk_sync(&g);

        g.update_relation_cardinality(&rel, Cardinality::OneToOne, false).unwrap();
        assert_fk_sync(&g);
        g.update_relation_cardinality(&rel, Cardinality::OneToMany, true).unwrap();
        assert_fk_sync(&g);
        g.update_relation_cardinality(&rel, Cardinality::ManyToMany, true).unwrap();
        assert_fk_sync(&g);
        g.update_relation_cardinality(&rel, Cardinality::OneToMany, false).unwrap();
        assert_fk_sync(&g);

        g.rename_table("users", "members");
        let relation = g.relation(&rel).unwrap().clone();
        assert_eq!(g.column(&relation.to).unwrap().name, "members_id");
        assert_fk_sync(&g);
    }
}
