use crate::{AsValue, Value, ValueMap};
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

/// Comparison operator of a [`Condition::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Like,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEqual => ">=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// Closed condition tree accumulated by result sets.
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Condition {
    #[default]
    Empty,
    /// Flat column to value equality map, every entry must hold.
    Eq(ValueMap),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    In(String, Vec<Value>),
    Compare(String, CompareOp, Value),
    Not(Box<Condition>),
    /// Raw fragment with bound parameters, opaque to every structural operation.
    Literal { sql: String, binds: Vec<Value> },
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Eq(BTreeMap::from([(column.into(), value.into())]))
    }

    pub fn is_in<V: AsValue>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Condition::In(
            column.into(),
            values.into_iter().map(AsValue::as_value).collect(),
        )
    }

    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::Compare(column.into(), op, value.into())
    }

    pub fn literal(sql: impl Into<String>, binds: impl IntoIterator<Item = Value>) -> Self {
        Condition::Literal {
            sql: sql.into(),
            binds: binds.into_iter().collect(),
        }
    }

    pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::And(conditions.into_iter().collect())
    }

    pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Or(conditions.into_iter().collect())
    }

    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Condition::Empty => true,
            Condition::Eq(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Condition::Literal { .. })
    }

    /// Merge `new` onto `self` the way result set chaining does.
    ///
    /// A literal on either side wins over structural merging: a new literal
    /// replaces whatever was there, and a prior literal is kept when a
    /// structural condition arrives. Two non empty structural conditions
    /// always produce `And(self, new)`, never a flat union of their keys.
    pub fn merge(self, new: Condition) -> Condition {
        if new.is_literal() {
            return new;
        }
        if self.is_literal() {
            if !new.is_empty() {
                log::warn!(
                    "Structural condition {} discarded because the result set already carries a literal condition",
                    new
                );
            }
            return self;
        }
        if new.is_empty() {
            return self;
        }
        if self.is_empty() {
            return new;
        }
        match self {
            Condition::And(mut conditions) => {
                conditions.push(new);
                Condition::And(conditions)
            }
            current => Condition::And(vec![current, new]),
        }
    }

    /// Rename every column key, leaves literals untouched.
    pub fn map_keys(self, f: &impl Fn(&str) -> String) -> Condition {
        match self {
            Condition::Eq(map) => Condition::Eq(map.into_iter().map(|(k, v)| (f(&k), v)).collect()),
            Condition::And(v) => Condition::And(v.into_iter().map(|c| c.map_keys(f)).collect()),
            Condition::Or(v) => Condition::Or(v.into_iter().map(|c| c.map_keys(f)).collect()),
            Condition::In(k, values) => Condition::In(f(&k), values),
            Condition::Compare(k, op, value) => Condition::Compare(f(&k), op, value),
            Condition::Not(c) => Condition::Not(Box::new(c.map_keys(f))),
            c @ (Condition::Empty | Condition::Literal { .. }) => c,
        }
    }

    /// Equality pairs that hold for every match: `Eq` maps, also inside `And`.
    ///
    /// Used to seed new rows created through a result set.
    pub fn equalities(&self) -> ValueMap {
        let mut result = ValueMap::new();
        self.collect_equalities(&mut result);
        result
    }

    fn collect_equalities(&self, out: &mut ValueMap) {
        match self {
            Condition::Eq(map) => {
                out.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Condition::And(conditions) => {
                for c in conditions {
                    c.collect_equalities(out);
                }
            }
            _ => {}
        }
    }
}

impl From<ValueMap> for Condition {
    fn from(value: ValueMap) -> Self {
        if value.is_empty() {
            Condition::Empty
        } else {
            Condition::Eq(value)
        }
    }
}

impl From<Option<Condition>> for Condition {
    fn from(value: Option<Condition>) -> Self {
        value.unwrap_or_default()
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Condition], separator: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, c) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(separator)?;
                }
                write!(f, "{c}")?;
            }
            f.write_str(")")
        }
        match self {
            Condition::Empty => f.write_str("TRUE"),
            Condition::Eq(map) => {
                if map.len() > 1 {
                    f.write_str("(")?;
                }
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    if v.is_null() {
                        write!(f, "{k} IS NULL")?;
                    } else {
                        write!(f, "{k} = {v}")?;
                    }
                }
                if map.len() > 1 {
                    f.write_str(")")?;
                }
                Ok(())
            }
            Condition::And(v) => join(f, v, " AND "),
            Condition::Or(v) => join(f, v, " OR "),
            Condition::In(k, values) => {
                write!(f, "{k} IN (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
            Condition::Compare(k, op, v) => write!(f, "{k} {} {v}", op.symbol()),
            Condition::Not(c) => write!(f, "NOT {c}"),
            Condition::Literal { sql, .. } => f.write_str(sql),
        }
    }
}
