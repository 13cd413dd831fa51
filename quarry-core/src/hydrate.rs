use crate::{
    ErrorKind, Related, Result, Row, Schema, Value, ValueMap, error, split_qualified,
};
use std::{collections::BTreeMap, future::Future};

/// Type a result set hydrates its rows into.
///
/// Domain types compose a [`Row`] rather than extend it: the row keeps the
/// persistence state and the type adds whatever it needs around it. The
/// library only ever reaches the persistence capabilities through
/// [`ResultClass::row_mut`], so a method defined on the domain type cannot
/// replace them. Usually derived with `#[derive(ResultClass)]`.
pub trait ResultClass: Sized + Send + Sync {
    fn from_row(row: Row) -> Result<Self>;
    fn row(&self) -> &Row;
    fn row_mut(&mut self) -> &mut Row;
    fn into_row(self) -> Row;
}

impl ResultClass for Row {
    fn from_row(row: Row) -> Result<Self> {
        Ok(row)
    }
    fn row(&self) -> &Row {
        self
    }
    fn row_mut(&mut self) -> &mut Row {
        self
    }
    fn into_row(self) -> Row {
        self
    }
}

/// Row capabilities available on every [`ResultClass`].
pub trait RowCapabilities: ResultClass {
    fn get_column(&self, name: &str) -> Result<&Value> {
        self.row().get_column(name)
    }

    fn set_column(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.row_mut().set_column(name, value).map(|_| ())
    }

    fn in_storage(&self) -> bool {
        self.row().in_storage()
    }

    fn is_dirty(&self) -> bool {
        self.row().is_dirty()
    }

    fn update(&mut self, data: Option<ValueMap>) -> impl Future<Output = Result<()>> + Send {
        async move { self.row_mut().update(data).await.map(|_| ()) }
    }

    fn delete(&mut self) -> impl Future<Output = Result<u64>> + Send {
        async move { self.row_mut().delete().await }
    }

    fn insert(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { self.row_mut().insert().await.map(|_| ()) }
    }

    fn discard_changes(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { self.row_mut().discard_changes().await.map(|_| ()) }
    }
}

impl<T: ResultClass> RowCapabilities for T {}

/// Cache seed of a result set: rows are either raw or already hydrated.
#[derive(Debug, Clone)]
pub enum Seed<R> {
    Raw(ValueMap),
    Object(R),
}

impl<R: ResultClass> From<ValueMap> for Seed<R> {
    fn from(value: ValueMap) -> Self {
        Seed::Raw(value)
    }
}

impl<R: ResultClass> From<R> for Seed<R> {
    fn from(value: R) -> Self {
        Seed::Object(value)
    }
}

/// Turns raw rows into [`ResultClass`] instances marked as in storage.
pub(crate) struct Hydrator<'a> {
    schema: &'a Schema,
    source: &'a str,
    prefetch: &'a [String],
}

impl<'a> Hydrator<'a> {
    pub(crate) fn new(schema: &'a Schema, source: &'a str, prefetch: &'a [String]) -> Self {
        Self {
            schema,
            source,
            prefetch,
        }
    }

    pub(crate) fn hydrate<R: ResultClass>(&self, raw: ValueMap) -> Result<R> {
        R::from_row(self.row(raw)?)
    }

    pub(crate) fn hydrate_seed<R: ResultClass>(&self, seed: Seed<R>) -> Result<R> {
        match seed {
            Seed::Raw(raw) => self.hydrate(raw),
            Seed::Object(object) => Ok(object),
        }
    }

    /// Prefetched relationships arrive either nested under the relationship
    /// name (a map for single rows, a list for many) or flattened as
    /// `relationship.column` keys.
    fn row(&self, mut raw: ValueMap) -> Result<Row> {
        let mut related = Vec::new();
        for name in self.prefetch {
            let info = self.schema.metadata().relationship_info(self.source, name)?;
            let prefix = format!("{name}.");
            let flattened: ValueMap = {
                let keys: Vec<String> = raw
                    .keys()
                    .filter(|k| k.starts_with(&prefix))
                    .cloned()
                    .collect();
                keys.into_iter()
                    .filter_map(|k| {
                        let value = raw.remove(&k)?;
                        let column = split_qualified(&k).map(|(_, c)| c.to_string())?;
                        Some((column, value))
                    })
                    .collect()
            };
            let nested = raw.remove(name);
            let entry = match nested {
                Some(Value::List(rows)) => Related::Rows(
                    rows.into_iter()
                        .map(|v| self.related_row(&info.target, v))
                        .collect::<Result<Vec<_>>>()?
                        .into_iter()
                        .flatten()
                        .collect(),
                ),
                Some(value) => Related::Row(self.related_row(&info.target, value)?.map(Box::new)),
                None if !flattened.is_empty() => Related::Row(
                    self.related_row(&info.target, Value::Map(flattened))?
                        .map(Box::new),
                ),
                None => {
                    log::trace!(
                        "Prefetched relationship `{}` of `{}` missing from the raw row",
                        name,
                        self.source
                    );
                    continue;
                }
            };
            related.push((name.clone(), entry));
        }
        log::trace!("Hydrating a `{}` row", self.source);
        let mut row = Row::hydrated(self.schema.clone(), self.source, raw);
        for (name, entry) in related {
            row.set_related(name, entry);
        }
        Ok(row)
    }

    /// `None` when every primary key column of the related row is null or absent.
    fn related_row(&self, target: &str, value: Value) -> Result<Option<Row>> {
        let data: BTreeMap<String, Value> = match value {
            Value::Null => return Ok(None),
            Value::Map(map) => map,
            other => {
                return Err(error(
                    ErrorKind::Validation,
                    format!("Prefetched `{target}` row must be a map, got {other:?}"),
                ));
            }
        };
        let pk = self.schema.metadata().primary_key_columns(target)?;
        let present = if pk.is_empty() {
            data.values().any(|v| !v.is_null())
        } else {
            pk.iter().any(|c| data.get(c).is_some_and(|v| !v.is_null()))
        };
        Ok(present.then(|| Row::hydrated(self.schema.clone(), target, data)))
    }
}

/// Apply the deflators of `source` and reject structured values left without one.
pub(crate) fn deflate(schema: &Schema, source: &str, data: ValueMap) -> Result<ValueMap> {
    let inflators = schema.metadata().inflators(source)?;
    data.into_iter()
        .map(|(column, value)| {
            let value = match inflators.get(&column) {
                Some(inflator) if !value.is_null() => (inflator.deflate)(value)?,
                _ => value,
            };
            if !value.is_scalar() {
                return Err(error(
                    ErrorKind::Validation,
                    format!(
                        "Column `{source}.{column}` received a structured value and has no deflator"
                    ),
                ));
            }
            Ok((column, value))
        })
        .collect()
}
