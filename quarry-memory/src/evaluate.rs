use crate::Table;
use quarry_core::{
    Aggregate, CompareOp, Condition, Error, OrderBy, Result, SchemaMetadata, Value, ValueMap,
    split_qualified, strip_alias,
};
use std::{cmp::Ordering, collections::HashMap};

/// Evaluation scope of one payload: the source, its joined aliases and every table.
pub(crate) struct Scope<'a> {
    pub(crate) metadata: &'a dyn SchemaMetadata,
    pub(crate) tables: &'a HashMap<String, Table>,
    pub(crate) source: &'a str,
    pub(crate) joins: &'a [String],
}

impl<'a> Scope<'a> {
    /// Rows of `relationship` related to `row`.
    pub(crate) fn related(&self, row: &ValueMap, relationship: &str) -> Result<Vec<&'a ValueMap>> {
        let def = self.metadata.relationship_info(self.source, relationship)?;
        let local = row.get(&def.join.local).cloned().unwrap_or_default();
        if local.is_null() {
            return Ok(Vec::new());
        }
        let Some(table) = self.tables.get(&def.target) else {
            return Ok(Vec::new());
        };
        Ok(table
            .rows()
            .iter()
            .filter(|r| {
                r.get(&def.join.foreign)
                    .is_some_and(|v| v.loosely_equals(&local))
            })
            .collect())
    }

    /// Values `key` takes for `row`, one per joined row for qualified keys.
    pub(crate) fn resolve(&self, row: &ValueMap, key: &str) -> Result<Vec<Value>> {
        let key = strip_alias(key);
        let Some((alias, column)) = split_qualified(key) else {
            return Ok(vec![row.get(key).cloned().unwrap_or_default()]);
        };
        if !self.joins.iter().any(|j| j == alias) {
            return Err(Error::msg(format!(
                "Column `{key}` refers to `{alias}` which is not joined to `{}`",
                self.source
            )));
        }
        Ok(self
            .related(row, alias)?
            .into_iter()
            .map(|r| r.get(column).cloned().unwrap_or_default())
            .collect())
    }

    /// Joined leaves hold when any joined row satisfies them.
    pub(crate) fn matches(&self, row: &ValueMap, condition: &Condition) -> Result<bool> {
        Ok(match condition {
            Condition::Empty => true,
            Condition::Eq(map) => {
                for (key, expected) in map {
                    if !self.resolve(row, key)?.iter().any(|v| equal(v, expected)) {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::And(conditions) => {
                for c in conditions {
                    if !self.matches(row, c)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Or(conditions) => {
                for c in conditions {
                    if self.matches(row, c)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Not(c) => !self.matches(row, c)?,
            Condition::In(key, values) => self
                .resolve(row, key)?
                .iter()
                .any(|v| !v.is_null() && values.iter().any(|e| v.loosely_equals(e))),
            Condition::Compare(key, op, expected) => self
                .resolve(row, key)?
                .iter()
                .any(|v| compare(v, *op, expected)),
            Condition::Literal { sql, .. } => {
                return Err(Error::msg(format!(
                    "Literal condition `{sql}` cannot be evaluated in memory"
                )));
            }
        })
    }

    /// Output row for the `select` / `as` attributes, the whole row without them.
    pub(crate) fn project(
        &self,
        row: &ValueMap,
        select: Option<&[String]>,
        as_names: Option<&[String]>,
    ) -> Result<ValueMap> {
        let Some(select) = select else {
            return Ok(row.clone());
        };
        select
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let name = as_names
                    .and_then(|names| names.get(i))
                    .unwrap_or(column)
                    .clone();
                let value = self
                    .resolve(row, column)?
                    .into_iter()
                    .next()
                    .unwrap_or_default();
                Ok((name, value))
            })
            .collect()
    }
}

fn equal(value: &Value, expected: &Value) -> bool {
    (value.is_null() && expected.is_null()) || value.loosely_equals(expected)
}

fn compare(value: &Value, op: CompareOp, expected: &Value) -> bool {
    if value.is_null() || expected.is_null() {
        return false;
    }
    if op == CompareOp::Like {
        return match (value.as_str(), expected.as_str()) {
            (Some(text), Some(pattern)) => like(text, pattern),
            _ => false,
        };
    }
    let Some(ordering) = value.compare(expected) else {
        return op == CompareOp::NotEqual && value != expected;
    };
    match op {
        CompareOp::NotEqual => ordering != Ordering::Equal,
        CompareOp::Less => ordering == Ordering::Less,
        CompareOp::LessEqual => ordering != Ordering::Greater,
        CompareOp::Greater => ordering == Ordering::Greater,
        CompareOp::GreaterEqual => ordering != Ordering::Less,
        CompareOp::Like => false,
    }
}

/// SQL `LIKE`: `%` matches any run, `_` any single character.
pub(crate) fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut any = false;
                for i in 0..=text.len() {
                    any |= matched[i];
                    next[i] = any;
                }
            }
            _ => {
                for i in 0..text.len() {
                    next[i + 1] = matched[i] && (*p == '_' || *p == text[i]);
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

/// Nulls first, then by value.
pub(crate) fn sort(rows: &mut [&ValueMap], order_by: &[OrderBy]) {
    rows.sort_by(|a, b| {
        for term in order_by {
            let column = strip_alias(&term.column);
            let (l, r) = (
                a.get(column).unwrap_or(&Value::Null),
                b.get(column).unwrap_or(&Value::Null),
            );
            let ordering = match (l.is_null(), r.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => l.compare(r).unwrap_or(Ordering::Equal),
            };
            let ordering = if term.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Aggregate over the non null `values`, null when there are none (except for counts).
pub(crate) fn aggregate(aggregate: &Aggregate, values: Vec<Value>) -> Result<Value> {
    let values: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
    let function = aggregate.name().to_ascii_lowercase();
    Ok(match function.as_str() {
        "count" => Value::Int64(values.len() as i64),
        _ if values.is_empty() => Value::Null,
        "sum" => {
            if values.iter().all(|v| matches!(v, Value::Int64(..))) {
                Value::Int64(values.iter().filter_map(Value::as_i64).sum())
            } else {
                Value::Float64(numbers(&values)?.into_iter().sum())
            }
        }
        "avg" => {
            let numbers = numbers(&values)?;
            Value::Float64(numbers.iter().sum::<f64>() / numbers.len() as f64)
        }
        "min" => extreme(values, Ordering::Less),
        "max" => extreme(values, Ordering::Greater),
        other => {
            return Err(Error::msg(format!("No such aggregate function `{other}`")));
        }
    })
}

fn numbers(values: &[Value]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| Error::msg(format!("Cannot aggregate non numeric value {v}")))
        })
        .collect()
}

fn extreme(values: Vec<Value>, wanted: Ordering) -> Value {
    values
        .into_iter()
        .reduce(|best, v| {
            if v.compare(&best) == Some(wanted) {
                v
            } else {
                best
            }
        })
        .unwrap_or_default()
}
