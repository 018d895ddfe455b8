//! Automatic table placement.
//!
//! [`AutoLayout`] is the seam for external layout engines. [`LayeredLayout`]
//! is the built-in one: parents sit left of their children, one column of
//! tables per dependency level, tables stacked top to bottom inside a level.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::measure::TableMetrics;
use crate::model::{Relation, Table};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: String,
    pub position: Point,
}

pub trait AutoLayout {
    fn layout(&self, tables: &[Table], relations: &[Relation]) -> Vec<NodePosition>;
}

pub struct LayoutConfig {
    /// Horizontal gap between levels.
    pub layer_gap: f64,
    /// Vertical gap between tables of one level.
    pub node_gap: f64,
    pub origin_x: f64,
    pub origin_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            layer_gap: 400.0,
            node_gap: 100.0,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

#[derive(Default)]
pub struct LayeredLayout {
    pub metrics: TableMetrics,
    pub config: LayoutConfig,
}

impl AutoLayout for LayeredLayout {
    fn layout(&self, tables: &[Table], relations: &[Relation]) -> Vec<NodePosition> {
        let levels = arrange(tables, relations);
        let mut positions = Vec::with_capacity(tables.len());
        let mut x = self.config.origin_x;

        for level in levels {
            let mut y = self.config.origin_y;
            let mut widest: f64 = 0.0;
            for table in level {
                let (width, height) = self.metrics.node_size(table);
                positions.push(NodePosition {
                    id: table.id.clone(),
                    position: Point { x, y },
                });
                y += height + self.config.node_gap;
                widest = widest.max(width);
            }
            x += widest + self.config.layer_gap;
        }
        positions
    }
}

/// Group tables into dependency levels.
///
/// Level 0 holds tables that reference nothing; every other table sits one
/// level past its deepest parent. Tables caught in a cycle go to a final
/// level. Tables inside a level are ordered by name, then id.
fn arrange<'a>(tables: &'a [Table], relations: &[Relation]) -> Vec<Vec<&'a Table>> {
    if tables.is_empty() {
        return vec![];
    }

    let mut by_id: HashMap<&str, &Table> = HashMap::new();
    for table in tables {
        by_id.entry(table.id.as_str()).or_insert(table);
    }

    // child -> parents
    let mut parents: HashMap<&str, HashSet<&str>> =
        by_id.keys().map(|id| (*id, HashSet::new())).collect();
    for rel in relations {
        let (parent, child) = (rel.from.table_id.as_str(), rel.to.table_id.as_str());
        if parent == child || !by_id.contains_key(parent) {
            continue;
        }
        if let Some(deps) = parents.get_mut(child) {
            deps.insert(parent);
        }
    }

    let mut levels: HashMap<&str, usize> = parents
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(id, _)| (*id, 0))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for (id, deps) in &parents {
            if levels.contains_key(id) {
                continue;
            }
            let parent_levels: Vec<usize> = deps.iter().filter_map(|p| levels.get(p).copied()).collect();
            if parent_levels.len() == deps.len() {
                let level = parent_levels.iter().max().copied().unwrap_or(0) + 1;
                levels.insert(*id, level);
                changed = true;
            }
        }
    }

    // Cycles
    let max_level = levels.values().copied().max().unwrap_or(0);
    for id in by_id.keys() {
        levels.entry(*id).or_insert(max_level + 1);
    }

    let last = levels.values().copied().max().unwrap_or(0);
    let mut rows: Vec<Vec<&Table>> = vec![vec![]; last + 1];
    for (id, level) in &levels {
        if let Some(table) = by_id.get(id) {
            rows[*level].push(*table);
        }
    }
    for row in &mut rows {
        row.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    }
    rows.into_iter().filter(|r| !r.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, Column, Endpoint};

    fn table(id: &str, columns: usize) -> Table {
        let mut t = Table::new(id, id);
        for i in 0..columns {
            t.columns.push(Column::new(format!("{id}{i}"), format!("c{i}"), "int"));
        }
        t
    }

    fn link(from: &str, to: &str) -> Relation {
        Relation::new(
            format!("{from}-{to}"),
            Endpoint::new(from, "x"),
            Endpoint::new(to, "y"),
            Cardinality::OneToMany,
        )
    }

    fn ids(levels: &[Vec<&Table>]) -> Vec<Vec<String>> {
        levels
            .iter()
            .map(|l| l.iter().map(|t| t.id.clone()).collect())
            .collect()
    }

    #[test]
    fn test_arrange_by_dependency() {
        let tables = vec![table("posts", 0), table("users", 0), table("comments", 0), table("tags", 0)];
        let relations = vec![link("users", "posts"), link("posts", "comments"), link("users", "comments")];
        let levels = arrange(&tables, &relations);

        assert_eq!(
            ids(&levels),
            vec![vec!["tags", "users"], vec!["posts"], vec!["comments"]]
        );
    }

    #[test]
    fn test_cycle_goes_last() {
        let tables = vec![table("a", 0), table("b", 0), table("root", 0)];
        let relations = vec![link("a", "b"), link("b", "a")];
        let levels = arrange(&tables, &relations);
        assert_eq!(ids(&levels), vec![vec!["root"], vec!["a", "b"]]);
    }

    #[test]
    fn test_self_reference_ignored() {
        let tables = vec![table("employees", 0)];
        let levels = arrange(&tables, &[link("employees", "employees")]);
        assert_eq!(ids(&levels), vec![vec!["employees"]]);
    }

    #[test]
    fn test_layered_positions() {
        let tables = vec![table("users", 2), table("posts", 1), table("audit", 0)];
        let relations = vec![link("users", "posts")];
        let positions = LayeredLayout::default().layout(&tables, &relations);
        let at = |id: &str| positions.iter().find(|p| p.id == id).map(|p| p.position).unwrap();

        assert_eq!(at("audit"), Point { x: 0.0, y: 0.0 });
        // audit: 40 + 0 + 20 = 60 tall
        assert_eq!(at("users"), Point { x: 0.0, y: 160.0 });
        assert_eq!(at("posts"), Point { x: 700.0, y: 0.0 });
    }

    #[test]
    fn test_empty() {
        assert!(LayeredLayout::default().layout(&[], &[]).is_empty());
    }
}
