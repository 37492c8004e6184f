//! Constraint Building - pure functions that express "rows belonging to
//! this source instance" and merge that restriction into caller-supplied
//! data, where clauses and filters
//!
//! Everything here is synchronous and side-effect free; conflicts are
//! detected before any repository call is made.

use serde_json::Value;

use arbor_dao::{canonical_key, Filter, Record, Where};

use crate::error::{OrmError, OrmResult};

/// Constraint binding one key to the owning instance's value
pub fn source_constraint(key: &str, value: Value) -> Record {
    let mut constraint = Record::new();
    constraint.insert(key.to_string(), value);
    constraint
}

/// Where clause selecting rows whose key matches any of `ids`.
///
/// Ids are deduplicated; a single id becomes an equality, several become a
/// set-membership condition.
pub fn target_ids_constraint(key: &str, ids: &[Value]) -> Where {
    let ids = dedupe_values(ids);
    match <[Value; 1]>::try_from(ids) {
        Ok([only]) => Where::eq(key, only),
        Err(ids) => Where::inq(key, ids),
    }
}

/// Deduplicate values, preserving first-encounter order
pub fn dedupe_values(values: &[Value]) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .filter(|value| seen.insert(canonical_key(value)))
        .cloned()
        .collect()
}

/// A record constraint expressed as a where clause
pub fn where_from_constraint(constraint: &Record) -> Where {
    constraint
        .iter()
        .fold(Where::new(), |clause, (key, value)| {
            clause.with_eq(key, value.clone())
        })
}

/// Merge an enforced where clause into a caller-supplied one.
///
/// Disjoint fields merge into one clause; a field constrained to the same
/// value is a no-op; a field constrained to a different value composes the
/// two full clauses with logical AND - neither side is ever dropped.
pub fn combine_where(base: Option<Where>, constraint: Where) -> Where {
    let Some(base) = base else {
        return constraint;
    };
    if base.is_empty() {
        return constraint;
    }

    let conflicts = constraint.conditions.iter().any(|(field, condition)| {
        base.conditions
            .get(field)
            .map_or(false, |existing| existing != condition)
    });
    let composite = !constraint.and.is_empty() || !constraint.or.is_empty();
    if conflicts || composite {
        return Where::and_all(vec![base, constraint]);
    }

    let mut merged = base;
    for (field, condition) in constraint.conditions {
        merged.conditions.entry(field).or_insert(condition);
    }
    merged
}

/// Merge a record constraint into a caller-supplied where clause
pub fn merge_where(base: Option<Where>, constraint: &Record) -> Where {
    combine_where(base, where_from_constraint(constraint))
}

/// Merge a record constraint into a caller-supplied data object.
///
/// A field already present with a different value cannot be changed by the
/// caller; that is a synchronous error, raised before anything is persisted.
pub fn merge_data(mut data: Record, constraint: &Record) -> OrmResult<Record> {
    for (field, value) in constraint {
        match data.get(field) {
            Some(existing) if !existing.is_null() && existing != value => {
                return Err(OrmError::PropertyConstrained {
                    property: field.clone(),
                });
            }
            _ => {
                data.insert(field.clone(), value.clone());
            }
        }
    }
    Ok(data)
}

fn ensure_constrainable(filter: &Filter) -> OrmResult<()> {
    if !filter.order.is_empty() || filter.skip.is_some() || !filter.include.is_empty() {
        return Err(OrmError::Unsupported(
            "filters with \"order\", \"skip\" or \"include\" are not supported when applying a relation constraint"
                .to_string(),
        ));
    }
    Ok(())
}

/// Merge an enforced where clause into a caller-supplied filter.
///
/// Only `where`, `fields` and `limit` can be combined with a constraint;
/// anything else fails loudly instead of being silently ignored.
pub fn merge_filter_where(filter: Option<Filter>, constraint: Where) -> OrmResult<Filter> {
    let filter = filter.unwrap_or_default();
    ensure_constrainable(&filter)?;
    let where_clause = combine_where(filter.where_clause.clone(), constraint);
    Ok(Filter {
        where_clause: Some(where_clause),
        ..filter
    })
}

/// Merge a record constraint into a caller-supplied filter
pub fn merge_filter(filter: Option<Filter>, constraint: &Record) -> OrmResult<Filter> {
    merge_filter_where(filter, where_from_constraint(constraint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_dao::Condition;
    use serde_json::json;

    fn constraint(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn source_constraint_binds_one_key() {
        let c = source_constraint("customerId", json!(1));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get("customerId"), Some(&json!(1)));
    }

    #[test]
    fn target_ids_constraint_picks_eq_or_inq() {
        assert_eq!(
            target_ids_constraint("id", &[json!(1)]),
            Where::eq("id", json!(1))
        );
        assert_eq!(
            target_ids_constraint("id", &[json!(1), json!(2), json!(1)]),
            Where::inq("id", vec![json!(1), json!(2)])
        );
    }

    #[test]
    fn merge_where_unions_disjoint_fields() {
        let base = Where::eq("description", json!("pens"));
        let merged = merge_where(Some(base), &constraint(&[("customerId", json!(1))]));

        assert_eq!(
            merged.conditions.get("description"),
            Some(&Condition::Eq(json!("pens")))
        );
        assert_eq!(
            merged.conditions.get("customerId"),
            Some(&Condition::Eq(json!(1)))
        );
        assert!(merged.and.is_empty());
    }

    #[test]
    fn merge_where_is_commutative_on_disjoint_fields() {
        let base = Where::eq("a", json!(1));
        let c1 = constraint(&[("b", json!(2))]);
        let c2 = constraint(&[("c", json!(3))]);

        let left = merge_where(Some(merge_where(Some(base.clone()), &c1)), &c2);
        let right = merge_where(Some(merge_where(Some(base), &c2)), &c1);
        assert_eq!(left, right);
    }

    #[test]
    fn merge_where_same_value_is_a_noop() {
        let base = Where::eq("customerId", json!(1));
        let merged = merge_where(Some(base.clone()), &constraint(&[("customerId", json!(1))]));
        assert_eq!(merged, base);
    }

    #[test]
    fn merge_where_conflict_becomes_and_composition() {
        let base = Where::eq("customerId", json!(2));
        let merged = merge_where(Some(base.clone()), &constraint(&[("customerId", json!(1))]));

        assert_eq!(
            merged,
            Where::and_all(vec![base, Where::eq("customerId", json!(1))])
        );
    }

    #[test]
    fn merge_data_assigns_constrained_fields() {
        let data = constraint(&[("description", json!("pens"))]);
        let merged = merge_data(data, &constraint(&[("customerId", json!(1))])).unwrap();
        assert_eq!(merged.get("customerId"), Some(&json!(1)));
        assert_eq!(merged.get("description"), Some(&json!("pens")));
    }

    #[test]
    fn merge_data_rejects_conflicting_values() {
        let data = constraint(&[("id", json!(1)), ("description", json!("pens"))]);
        let err = merge_data(data, &constraint(&[("id", json!(2))])).unwrap_err();
        assert_eq!(err.to_string(), "Property \"id\" cannot be changed!");
    }

    #[test]
    fn merge_data_accepts_identical_values() {
        let data = constraint(&[("id", json!(2)), ("description", json!("pens"))]);
        let merged = merge_data(data.clone(), &constraint(&[("id", json!(2))])).unwrap();
        assert_eq!(merged, data);
    }

    #[test]
    fn merge_filter_keeps_fields_and_limit() {
        let filter = Filter::new()
            .with_where(Where::eq("description", json!("pens")))
            .with_fields(vec!["id".to_string()])
            .with_limit(5);
        let merged = merge_filter(Some(filter), &constraint(&[("customerId", json!(1))])).unwrap();

        assert_eq!(merged.limit, Some(5));
        assert_eq!(merged.fields, Some(vec!["id".to_string()]));
        let where_clause = merged.where_clause.unwrap();
        assert_eq!(
            where_clause.conditions.get("customerId"),
            Some(&Condition::Eq(json!(1)))
        );
    }

    #[test]
    fn merge_filter_rejects_unsupported_keys() {
        let filter = Filter::new().with_skip(3);
        let err = merge_filter(Some(filter), &constraint(&[("customerId", json!(1))])).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED");

        let filter = Filter::new().with_order(arbor_dao::Order::asc("id"));
        assert!(merge_filter(Some(filter), &constraint(&[("customerId", json!(1))])).is_err());
    }

    #[test]
    fn dedupe_preserves_first_encounter_order() {
        let values = [json!(3), json!(1), json!(3), json!("3"), json!(1)];
        assert_eq!(dedupe_values(&values), vec![json!(3), json!(1), json!("3")]);
    }
}
