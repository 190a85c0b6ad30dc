//! Schema and relation filtering algebra
//!
//! Stateless predicates over include/exclude name sets. An empty include
//! list on an axis means unrestricted; exclude always wins over include.
//! Relation names are always schema-qualified.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::toc::DataEntry;

/// Result type for filter validation.
pub type FilterResult<T> = Result<T, FilterError>;

/// Contradictory filter combinations, reported before any statement runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    /// The same name appears in both include and exclude on one axis.
    #[error("{axis} '{name}' is both included and excluded")]
    ConflictingName { axis: &'static str, name: String },

    /// An included relation lives in an explicitly excluded schema.
    #[error("relation '{relation}' is included but its schema '{schema}' is excluded")]
    RelationInExcludedSchema { relation: String, schema: String },
}

/// User-supplied (or reconciled) include/exclude sets for one restore run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub include_schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub include_relations: Vec<String>,
    pub exclude_relations: Vec<String>,
}

impl Filters {
    pub fn new(
        include_schemas: &[String],
        exclude_schemas: &[String],
        include_relations: &[String],
        exclude_relations: &[String],
    ) -> Self {
        Self {
            include_schemas: include_schemas.to_vec(),
            exclude_schemas: exclude_schemas.to_vec(),
            include_relations: include_relations.to_vec(),
            exclude_relations: exclude_relations.to_vec(),
        }
    }

    /// Filters that restrict nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// True when no axis restricts anything.
    pub fn is_empty(&self) -> bool {
        self.include_schemas.is_empty()
            && self.exclude_schemas.is_empty()
            && self.include_relations.is_empty()
            && self.exclude_relations.is_empty()
    }

    /// Rejects contradictory combinations: a name on both sides of one
    /// axis, or an included relation inside an excluded schema.
    pub fn validate(&self) -> FilterResult<()> {
        let excluded_schemas: HashSet<&str> =
            self.exclude_schemas.iter().map(String::as_str).collect();
        for schema in &self.include_schemas {
            if excluded_schemas.contains(schema.as_str()) {
                return Err(FilterError::ConflictingName {
                    axis: "schema",
                    name: schema.clone(),
                });
            }
        }

        let excluded_relations: HashSet<&str> =
            self.exclude_relations.iter().map(String::as_str).collect();
        for relation in &self.include_relations {
            if excluded_relations.contains(relation.as_str()) {
                return Err(FilterError::ConflictingName {
                    axis: "relation",
                    name: relation.clone(),
                });
            }
            let schema = crate::toc::schema_of(relation);
            if excluded_schemas.contains(schema) {
                return Err(FilterError::RelationInExcludedSchema {
                    relation: relation.clone(),
                    schema: schema.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Core membership predicate: `name` passes iff it is not excluded and the
/// include list is either empty or contains it.
pub fn included(include: &[String], exclude: &[String], name: &str) -> bool {
    let is_included = include.is_empty() || include.iter().any(|n| n == name);
    let is_excluded = exclude.iter().any(|n| n == name);
    is_included && !is_excluded
}

/// Schema-axis form of the membership predicate.
pub fn schema_is_excluded(include: &[String], exclude: &[String], schema: &str) -> bool {
    !included(include, exclude, schema)
}

/// Relation-axis form, over schema-qualified names.
pub fn relation_is_excluded(include: &[String], exclude: &[String], fqn: &str) -> bool {
    !included(include, exclude, fqn)
}

/// Returns the sublist of `relations` passing both the schema and relation
/// filters, preserving input order. Membership sets are built once so the
/// scan stays linear.
pub fn filter_relations(relations: &[String], filters: &Filters) -> Vec<String> {
    let include_schemas: HashSet<&str> =
        filters.include_schemas.iter().map(String::as_str).collect();
    let exclude_schemas: HashSet<&str> =
        filters.exclude_schemas.iter().map(String::as_str).collect();
    let include_relations: HashSet<&str> = filters
        .include_relations
        .iter()
        .map(String::as_str)
        .collect();
    let exclude_relations: HashSet<&str> = filters
        .exclude_relations
        .iter()
        .map(String::as_str)
        .collect();

    relations
        .iter()
        .filter(|fqn| {
            let schema = crate::toc::schema_of(fqn);
            let schema_ok = (include_schemas.is_empty() || include_schemas.contains(schema))
                && !exclude_schemas.contains(schema);
            let relation_ok = (include_relations.is_empty()
                || include_relations.contains(fqn.as_str()))
                && !exclude_relations.contains(fqn.as_str());
            schema_ok && relation_ok
        })
        .cloned()
        .collect()
}

/// Adds the partition root of every included leaf partition, transitively.
///
/// A child's DDL cannot be restored without its root, so any included
/// relation that appears in `child_to_root` pulls its root in as well,
/// walking nested partitioning up to the top. Idempotent: expanding an
/// already-expanded set adds nothing.
pub fn expand_partition_roots(
    relations: &[String],
    child_to_root: &HashMap<String, String>,
) -> Vec<String> {
    let mut seen: HashSet<String> = relations.iter().cloned().collect();
    let mut expanded: Vec<String> = relations.to_vec();

    let mut frontier: Vec<String> = relations.to_vec();
    while let Some(relation) = frontier.pop() {
        if let Some(root) = child_to_root.get(&relation) {
            if seen.insert(root.clone()) {
                expanded.push(root.clone());
                // The root may itself be a partition child one level up.
                frontier.push(root.clone());
            }
        }
    }
    expanded
}

/// Partition roots pulled in by `included_relations`, taken from a backup's
/// data entries. Returns only the additions, in data-entry order.
pub fn included_partition_roots(
    data_entries: &[DataEntry],
    included_relations: &[String],
) -> Vec<String> {
    let child_to_root: HashMap<String, String> = data_entries
        .iter()
        .filter_map(|entry| {
            entry
                .partition_root
                .as_ref()
                .map(|root| (entry.fqn(), root.clone()))
        })
        .collect();

    let expanded = expand_partition_roots(included_relations, &child_to_root);
    expanded
        .into_iter()
        .filter(|fqn| !included_relations.contains(fqn))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_filters_include_everything() {
        assert!(included(&[], &[], "anything"));
        assert!(!schema_is_excluded(&[], &[], "s1"));
        assert!(!relation_is_excluded(&[], &[], "s1.t1"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let include = strings(&["s1.t1"]);
        let exclude = strings(&["s1.t1"]);
        assert!(!included(&include, &exclude, "s1.t1"));
    }

    #[test]
    fn test_nonempty_include_restricts() {
        let include = strings(&["s1.t1"]);
        assert!(included(&include, &[], "s1.t1"));
        assert!(!included(&include, &[], "s1.t2"));
    }

    #[test]
    fn test_filter_relations_preserves_order() {
        let all = strings(&["s1.a", "s2.b", "s1.c", "s3.d"]);
        let filters = Filters::new(&[], &strings(&["s2"]), &[], &strings(&["s3.d"]));
        assert_eq!(filter_relations(&all, &filters), strings(&["s1.a", "s1.c"]));
    }

    #[test]
    fn test_filter_relations_include_schema_axis() {
        let all = strings(&["s1.a", "s2.b"]);
        let filters = Filters::new(&strings(&["s1"]), &[], &[], &[]);
        assert_eq!(filter_relations(&all, &filters), strings(&["s1.a"]));
    }

    #[test]
    fn test_expand_adds_partition_root() {
        let mut map = HashMap::new();
        map.insert("s1.leaf".to_string(), "s1.root".to_string());

        let expanded = expand_partition_roots(&strings(&["s1.leaf"]), &map);
        assert_eq!(expanded, strings(&["s1.leaf", "s1.root"]));
    }

    #[test]
    fn test_expand_walks_nested_partitions() {
        let mut map = HashMap::new();
        map.insert("s1.leaf".to_string(), "s1.mid".to_string());
        map.insert("s1.mid".to_string(), "s1.root".to_string());

        let expanded = expand_partition_roots(&strings(&["s1.leaf"]), &map);
        assert!(expanded.contains(&"s1.mid".to_string()));
        assert!(expanded.contains(&"s1.root".to_string()));
        assert_eq!(expanded.len(), 3);
    }

    #[test]
    fn test_expand_is_idempotent() {
        let mut map = HashMap::new();
        map.insert("s1.leaf".to_string(), "s1.mid".to_string());
        map.insert("s1.mid".to_string(), "s1.root".to_string());

        let once = expand_partition_roots(&strings(&["s1.leaf", "s1.other"]), &map);
        let twice = expand_partition_roots(&once, &map);
        let once_set: HashSet<_> = once.iter().collect();
        let twice_set: HashSet<_> = twice.iter().collect();
        assert_eq!(once_set, twice_set);
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn test_included_partition_roots_returns_only_additions() {
        let data_entries = vec![
            DataEntry {
                oid: 1,
                schema: "s1".to_string(),
                name: "root".to_string(),
                partition_root: None,
                start_byte: None,
                end_byte: None,
            },
            DataEntry {
                oid: 2,
                schema: "s1".to_string(),
                name: "leaf".to_string(),
                partition_root: Some("s1.root".to_string()),
                start_byte: None,
                end_byte: None,
            },
        ];
        let roots = included_partition_roots(&data_entries, &strings(&["s1.leaf"]));
        assert_eq!(roots, strings(&["s1.root"]));

        // Root already included: nothing to add.
        let roots = included_partition_roots(&data_entries, &strings(&["s1.leaf", "s1.root"]));
        assert!(roots.is_empty());
    }

    #[test]
    fn test_validate_rejects_name_on_both_sides() {
        let filters = Filters::new(&strings(&["s1"]), &strings(&["s1"]), &[], &[]);
        assert_eq!(
            filters.validate(),
            Err(FilterError::ConflictingName {
                axis: "schema",
                name: "s1".to_string()
            })
        );

        let filters = Filters::new(&[], &[], &strings(&["s1.t1"]), &strings(&["s1.t1"]));
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relation_in_excluded_schema() {
        let filters = Filters::new(&[], &strings(&["s1"]), &strings(&["s1.t1"]), &[]);
        assert_eq!(
            filters.validate(),
            Err(FilterError::RelationInExcludedSchema {
                relation: "s1.t1".to_string(),
                schema: "s1".to_string()
            })
        );
    }

    #[test]
    fn test_validate_accepts_disjoint_filters() {
        let filters = Filters::new(&strings(&["s1"]), &strings(&["s2"]), &strings(&["s1.t1"]), &[]);
        assert!(filters.validate().is_ok());
    }

    #[test]
    fn test_filters_empty() {
        assert!(Filters::none().is_empty());
        assert!(!Filters::new(&strings(&["s1"]), &[], &[], &[]).is_empty());
    }
}
