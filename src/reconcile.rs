//! Existing-state reconciliation
//!
//! Compares the relations a restore wants to create against what already
//! exists in the target database and produces the effective filter set:
//! objects already present (or excluded by the user) move into exclude,
//! and only genuinely new objects remain in include. Re-running a restore
//! after a partial prior run is therefore idempotent: created objects are
//! skipped, unfinished ones are retried.

use std::collections::HashSet;

use thiserror::Error;

use crate::filters::{relation_is_excluded, schema_is_excluded, Filters};
use crate::toc::schema_of;

/// Result type for catalog discovery.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Failure while querying the target's catalogs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog query failed: {0}")]
    Query(String),
}

/// Source of the target database's current schemas and tables. The actual
/// catalog queries live behind this seam; discovery uses one connection,
/// acquired and released before the execution pool is built.
pub trait CatalogSource {
    fn existing_schemas(&mut self) -> CatalogResult<Vec<String>>;
    fn existing_table_fqns(&mut self) -> CatalogResult<Vec<String>>;
}

/// Snapshot of what the target database already contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingState {
    pub schemas: Vec<String>,
    pub table_fqns: Vec<String>,
}

impl ExistingState {
    /// Takes a snapshot through a catalog source.
    pub fn discover(source: &mut dyn CatalogSource) -> CatalogResult<Self> {
        Ok(Self {
            schemas: source.existing_schemas()?,
            table_fqns: source.existing_table_fqns()?,
        })
    }
}

/// Builds the effective filters for metadata restore.
///
/// `relations_to_restore` is the full relation list of the backup set
/// (after partition-root expansion). The result partitions it three ways:
/// excluded by the user, already existing in the target, or genuinely new.
/// New relations (and their schemas) become the include lists; everything
/// existing or user-excluded lands in the exclude lists. When nothing new
/// remains on an axis, include stays empty and exclude covers everything
/// existing plus the user exclusions, which reads as "create nothing"
/// rather than "create everything".
pub fn build_restore_metadata_filters(
    relations_to_restore: &[String],
    existing: &ExistingState,
    user_filters: &Filters,
) -> Filters {
    let existing_tables: HashSet<&str> =
        existing.table_fqns.iter().map(String::as_str).collect();

    let mut schemas_to_create: Vec<String> = Vec::new();
    let mut relations_to_create: Vec<String> = Vec::new();
    let mut relations_already_existing: Vec<String> = Vec::new();
    let mut schemas_excluded_by_user: Vec<String> = Vec::new();
    let mut relations_excluded_by_user: Vec<String> = Vec::new();

    for relation in relations_to_restore {
        let schema = schema_of(relation);
        if schema_is_excluded(
            &user_filters.include_schemas,
            &user_filters.exclude_schemas,
            schema,
        ) {
            if !schemas_excluded_by_user.iter().any(|s| s == schema) {
                schemas_excluded_by_user.push(schema.to_string());
            }
            relations_excluded_by_user.push(relation.clone());
            continue;
        }

        if existing_tables.contains(relation.as_str()) {
            relations_already_existing.push(relation.clone());
            continue;
        }

        if relation_is_excluded(
            &user_filters.include_relations,
            &user_filters.exclude_relations,
            relation,
        ) {
            relations_excluded_by_user.push(relation.clone());
        } else {
            if !schemas_to_create.iter().any(|s| s == schema) {
                schemas_to_create.push(schema.to_string());
            }
            relations_to_create.push(relation.clone());
        }
    }

    let (include_schemas, exclude_schemas) = if schemas_to_create.is_empty() {
        // No new schemas: exclude everything existing plus user exclusions.
        let mut exclude = existing.schemas.clone();
        exclude.extend(schemas_excluded_by_user);
        (Vec::new(), exclude)
    } else {
        (schemas_to_create, schemas_excluded_by_user)
    };

    let (include_relations, exclude_relations) = if relations_to_create.is_empty() {
        let mut exclude = existing.table_fqns.clone();
        exclude.extend(relations_excluded_by_user);
        (Vec::new(), exclude)
    } else {
        let mut exclude = relations_already_existing;
        exclude.extend(relations_excluded_by_user);
        (relations_to_create, exclude)
    };

    Filters {
        include_schemas,
        exclude_schemas,
        include_relations,
        exclude_relations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_relations_stay_in_include() {
        let existing = ExistingState {
            schemas: strings(&["s1"]),
            table_fqns: strings(&["s1.t1"]),
        };
        let desired = strings(&["s1.t1", "s1.t2", "s2.t3"]);

        let effective = build_restore_metadata_filters(&desired, &existing, &Filters::none());

        assert_eq!(effective.include_relations, strings(&["s1.t2", "s2.t3"]));
        assert!(effective
            .exclude_relations
            .contains(&"s1.t1".to_string()));
        assert_eq!(effective.include_schemas, strings(&["s1", "s2"]));
    }

    #[test]
    fn test_nothing_new_means_create_nothing() {
        let existing = ExistingState {
            schemas: strings(&["s1", "s2"]),
            table_fqns: strings(&["s1.t1", "s2.t2"]),
        };
        let desired = strings(&["s1.t1", "s2.t2"]);

        let effective = build_restore_metadata_filters(&desired, &existing, &Filters::none());

        assert!(effective.include_schemas.is_empty());
        assert!(effective.include_relations.is_empty());
        assert_eq!(effective.exclude_schemas, strings(&["s1", "s2"]));
        assert_eq!(effective.exclude_relations, strings(&["s1.t1", "s2.t2"]));
    }

    #[test]
    fn test_user_excluded_schema_pulls_its_relations_out() {
        let existing = ExistingState::default();
        let desired = strings(&["s1.t1", "s2.t2"]);
        let user = Filters::new(&[], &strings(&["s2"]), &[], &[]);

        let effective = build_restore_metadata_filters(&desired, &existing, &user);

        assert_eq!(effective.include_relations, strings(&["s1.t1"]));
        assert!(effective
            .exclude_relations
            .contains(&"s2.t2".to_string()));
        assert_eq!(effective.exclude_schemas, strings(&["s2"]));
        assert_eq!(effective.include_schemas, strings(&["s1"]));
    }

    #[test]
    fn test_user_relation_filters_apply_to_new_relations() {
        let existing = ExistingState::default();
        let desired = strings(&["s1.t1", "s1.t2"]);
        let user = Filters::new(&[], &[], &strings(&["s1.t1"]), &[]);

        let effective = build_restore_metadata_filters(&desired, &existing, &user);

        assert_eq!(effective.include_relations, strings(&["s1.t1"]));
        assert!(effective
            .exclude_relations
            .contains(&"s1.t2".to_string()));
    }

    #[test]
    fn test_rerun_after_partial_restore_is_idempotent() {
        let desired = strings(&["s1.t1", "s1.t2"]);

        // First run: empty target, everything is new.
        let first =
            build_restore_metadata_filters(&desired, &ExistingState::default(), &Filters::none());
        assert_eq!(first.include_relations, strings(&["s1.t1", "s1.t2"]));

        // The run died after creating s1 and s1.t1. Second run retries only t2.
        let partial = ExistingState {
            schemas: strings(&["s1"]),
            table_fqns: strings(&["s1.t1"]),
        };
        let second = build_restore_metadata_filters(&desired, &partial, &Filters::none());
        assert_eq!(second.include_relations, strings(&["s1.t2"]));
        assert!(second.exclude_relations.contains(&"s1.t1".to_string()));

        // Third run with everything created: nothing left to do.
        let complete = ExistingState {
            schemas: strings(&["s1"]),
            table_fqns: strings(&["s1.t1", "s1.t2"]),
        };
        let third = build_restore_metadata_filters(&desired, &complete, &Filters::none());
        assert!(third.include_relations.is_empty());
        assert!(third.include_schemas.is_empty());
    }

    struct FakeCatalog {
        schemas: Vec<String>,
        tables: Vec<String>,
    }

    impl CatalogSource for FakeCatalog {
        fn existing_schemas(&mut self) -> CatalogResult<Vec<String>> {
            Ok(self.schemas.clone())
        }
        fn existing_table_fqns(&mut self) -> CatalogResult<Vec<String>> {
            Ok(self.tables.clone())
        }
    }

    #[test]
    fn test_discover_through_catalog_source() {
        let mut catalog = FakeCatalog {
            schemas: strings(&["s1"]),
            tables: strings(&["s1.t1"]),
        };
        let state = ExistingState::discover(&mut catalog).unwrap();
        assert_eq!(state.schemas, strings(&["s1"]));
        assert_eq!(state.table_fqns, strings(&["s1.t1"]));
    }
}
