use crate::{Attributes, Condition, Value, ValueMap, truncate_long};
use std::fmt::{self, Display};

/// Column aggregate evaluated by the dispatch channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
    Avg,
    Count,
    /// Any other function the channel understands, by name.
    Func(String),
}

impl Aggregate {
    pub fn name(&self) -> &str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Avg => "avg",
            Aggregate::Count => "count",
            Aggregate::Func(name) => name,
        }
    }
}

/// Operation requested from a dispatch channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Search,
    Count,
    Create,
    Update,
    Delete,
    /// Bulk create.
    Populate,
    Aggregate(Aggregate),
}

impl Operation {
    /// Reads can be served from the dispatch cache, writes invalidate it.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Operation::Search | Operation::Count | Operation::Aggregate(..)
        )
    }

    pub fn name(&self) -> &str {
        match self {
            Operation::Search => "search",
            Operation::Count => "count",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Populate => "populate",
            Operation::Aggregate(aggregate) => aggregate.name(),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a dispatch channel needs to execute one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub source: String,
    pub condition: Condition,
    pub attributes: Attributes,
    /// Column values for `create` and `update`.
    pub data: Option<ValueMap>,
    /// Rows for `populate`.
    pub rows: Vec<ValueMap>,
}

impl Payload {
    pub fn new(source: impl Into<String>, condition: Condition, attributes: Attributes) -> Self {
        Self {
            source: source.into(),
            condition,
            attributes,
            data: None,
            rows: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: ValueMap) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_rows(mut self, rows: Vec<ValueMap>) -> Self {
        self.rows = rows;
        self
    }

    /// Key identifying identical requests, used by the dispatch cache.
    pub fn cache_key(&self, operation: &Operation) -> String {
        format!("{operation}|{self:?}")
    }
}

impl Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = format!(
            "{} WHERE {}{}",
            self.source,
            self.condition,
            self.data
                .as_ref()
                .map(|d| format!(" DATA {}", Value::Map(d.clone())))
                .unwrap_or_default()
        );
        write!(f, "{}", truncate_long!(rendered))
    }
}

/// Raw outcome of a dispatch, before hydration.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows(Vec<ValueMap>),
    /// A single row, typically the stored version of a created or updated row.
    Row(Option<ValueMap>),
    Count(u64),
    Affected(u64),
    Value(Value),
}

impl QueryResult {
    pub fn into_rows(self) -> Vec<ValueMap> {
        match self {
            QueryResult::Rows(rows) => rows,
            QueryResult::Row(row) => row.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Row count carried by the result: counts, affected rows or returned rows.
    pub fn count(&self) -> u64 {
        match self {
            QueryResult::Count(v) | QueryResult::Affected(v) => *v,
            QueryResult::Rows(rows) => rows.len() as u64,
            QueryResult::Row(row) => row.is_some() as u64,
            QueryResult::Value(v) => v.as_i64().unwrap_or(0).max(0) as u64,
        }
    }
}
