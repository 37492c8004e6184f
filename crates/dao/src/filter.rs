//! Query filter object model: where clauses, ordering, pagination, inclusion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::Record;

/// A single per-field condition inside a where clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Field must equal the value
    Eq(Value),
    /// Field must equal one of the values
    Inq(Vec<Value>),
}

impl Condition {
    /// Whether the condition holds for a field value (absent fields are
    /// treated as null).
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        match self {
            Condition::Eq(expected) => value == expected,
            Condition::Inq(expected) => expected.iter().any(|v| v == value),
        }
    }
}

/// A where clause: a conjunction of per-field conditions plus optional
/// `and`/`or` sub-clause lists.
///
/// All three groups are AND-ed together; an `or` list holds when at least
/// one of its sub-clauses holds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Where {
    /// Per-field conditions (all must hold)
    #[serde(default)]
    pub conditions: BTreeMap<String, Condition>,
    /// Sub-clauses that must all hold
    #[serde(default)]
    pub and: Vec<Where>,
    /// Sub-clauses of which at least one must hold
    #[serde(default)]
    pub or: Vec<Where>,
}

impl Where {
    /// Create an empty where clause
    pub fn new() -> Self {
        Self::default()
    }

    /// Clause requiring `field == value`
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new().with_eq(field, value)
    }

    /// Clause requiring `field` to equal one of `values`
    pub fn inq(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new().with_inq(field, values)
    }

    /// Add an equality condition
    pub fn with_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.insert(field.into(), Condition::Eq(value));
        self
    }

    /// Add a set-membership condition
    pub fn with_inq(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.insert(field.into(), Condition::Inq(values));
        self
    }

    /// Conjunction of several clauses
    pub fn and_all(clauses: Vec<Where>) -> Self {
        Self {
            and: clauses,
            ..Self::default()
        }
    }

    /// Disjunction of several clauses
    pub fn or_all(clauses: Vec<Where>) -> Self {
        Self {
            or: clauses,
            ..Self::default()
        }
    }

    /// Whether the clause constrains anything at all
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.and.is_empty() && self.or.is_empty()
    }

    /// Evaluate the clause against a record
    pub fn matches(&self, record: &Record) -> bool {
        let conditions_hold = self
            .conditions
            .iter()
            .all(|(field, condition)| condition.matches(record.get(field)));
        let and_holds = self.and.iter().all(|clause| clause.matches(record));
        let or_holds = self.or.is_empty() || self.or.iter().any(|clause| clause.matches(record));

        conditions_hold && and_holds && or_holds
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

/// One ordering criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// A request to eager-load one relation alongside a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inclusion {
    /// Relation name as registered on the repository
    pub relation: String,
    /// Optional filter applied to the related rows
    #[serde(default)]
    pub scope: Option<Filter>,
}

impl Inclusion {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: Filter) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// A complete query filter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Row selection
    #[serde(default)]
    pub where_clause: Option<Where>,
    /// Field projection: when present, only these fields are returned
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Ordering criteria, applied in sequence
    #[serde(default)]
    pub order: Vec<Order>,
    /// Maximum number of rows
    #[serde(default)]
    pub limit: Option<u64>,
    /// Number of rows to skip
    #[serde(default)]
    pub skip: Option<u64>,
    /// Relations to eager-load
    #[serde(default)]
    pub include: Vec<Inclusion>,
}

impl Filter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter with only a where clause
    pub fn from_where(where_clause: Where) -> Self {
        Self::new().with_where(where_clause)
    }

    pub fn with_where(mut self, where_clause: Where) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_include(mut self, inclusion: Inclusion) -> Self {
        self.include.push(inclusion);
        self
    }

    /// Whether the filter constrains or shapes anything at all
    pub fn is_empty(&self) -> bool {
        self.where_clause.as_ref().map_or(true, Where::is_empty)
            && self.fields.is_none()
            && self.order.is_empty()
            && self.limit.is_none()
            && self.skip.is_none()
            && self.include.is_empty()
    }
}
