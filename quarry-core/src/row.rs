use crate::{
    AsValue, Attributes, Condition, ErrorContext, ErrorKind, NULL, Operation, Payload,
    QueryResult, RelationshipDef, Result, ResultSet, Schema, Value, ValueMap, deflate, error,
    strip_aliases,
};
use std::{
    collections::{BTreeSet, HashMap},
    fmt::{self, Debug},
};

/// Relationship data attached to a row, by prefetch or by a previous access.
#[derive(Debug, Clone)]
pub enum Related {
    /// Single relationship, `None` when no related row exists.
    Row(Option<Box<Row>>),
    Rows(Vec<Row>),
}

impl Related {
    pub fn rows(&self) -> Vec<Row> {
        match self {
            Related::Row(row) => row.iter().map(|r| (**r).clone()).collect(),
            Related::Rows(rows) => rows.clone(),
        }
    }
}

/// What a name resolves to on a row.
#[derive(Debug)]
pub enum Accessor<'a> {
    Column(&'a Value),
    Relationship(&'a RelationshipDef),
}

/// One record of a source, with dirty tracking and persistence.
#[derive(Clone)]
pub struct Row {
    schema: Schema,
    source: String,
    data: ValueMap,
    dirty: BTreeSet<String>,
    in_storage: bool,
    /// Primary key as last seen in storage, so that updates of key columns still target the stored row.
    stored_ident: Option<ValueMap>,
    related: HashMap<String, Related>,
    result_sets: HashMap<String, ResultSet<Row>>,
}

impl Row {
    /// Unsaved row of `source`, every column given is dirty.
    pub fn new(schema: Schema, source: &str, data: ValueMap) -> Result<Row> {
        schema.metadata().source_def(source)?;
        let mut row = Row {
            schema,
            source: source.to_string(),
            data: ValueMap::new(),
            dirty: BTreeSet::new(),
            in_storage: false,
            stored_ident: None,
            related: HashMap::new(),
            result_sets: HashMap::new(),
        };
        for (column, value) in strip_aliases(data) {
            row.set_column(&column, value)?;
        }
        Ok(row)
    }

    pub(crate) fn hydrated(schema: Schema, source: &str, data: ValueMap) -> Row {
        let mut row = Row {
            schema,
            source: source.to_string(),
            data,
            dirty: BTreeSet::new(),
            in_storage: true,
            stored_ident: None,
            related: HashMap::new(),
            result_sets: HashMap::new(),
        };
        row.capture_ident();
        row
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn data(&self) -> &ValueMap {
        &self.data
    }

    pub fn into_data(self) -> ValueMap {
        self.data
    }

    pub fn in_storage(&self) -> bool {
        self.in_storage
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn is_column_changed(&self, column: &str) -> bool {
        self.dirty.contains(column)
    }

    /// Dirty columns with their current values.
    pub fn dirty_columns(&self) -> ValueMap {
        self.dirty
            .iter()
            .map(|c| (c.clone(), self.data.get(c).cloned().unwrap_or_default()))
            .collect()
    }

    /// Raw value of a column, null when the column is declared but was not fetched.
    pub fn get_column(&self, column: &str) -> Result<&Value> {
        if let Some(value) = self.data.get(column) {
            return Ok(value);
        }
        if self.schema.metadata().source_def(&self.source)?.has_column(column) {
            return Ok(&NULL);
        }
        Err(error(
            ErrorKind::NoSuchAccessor,
            format!("`{}` has no column named `{}`", self.source, column),
        ))
    }

    pub fn get_as<T: AsValue>(&self, column: &str) -> Result<T> {
        T::try_from_value(self.get_column(column)?.clone())
            .with_context(|| format!("While reading `{}.{}`", self.source, column))
    }

    /// Column value passed through its inflator, if the column has one.
    pub fn get_inflated(&self, column: &str) -> Result<Value> {
        let value = self.get_column(column)?.clone();
        match self.schema.metadata().inflators(&self.source)?.get(column) {
            Some(inflator) if !value.is_null() => (inflator.inflate)(value)
                .with_context(|| format!("While inflating `{}.{}`", self.source, column)),
            _ => Ok(value),
        }
    }

    /// Set a column and mark it dirty when the value changes.
    ///
    /// Cached relationships joined through the column are dropped.
    pub fn set_column(&mut self, column: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        let def = self.schema.metadata().source_def(&self.source)?;
        if !def.columns.is_empty() && !def.has_column(column) {
            let e = error(
                ErrorKind::NoSuchAccessor,
                format!("`{}` has no column named `{}`", self.source, column),
            );
            log::error!("{:#}", e);
            return Err(e);
        }
        if self.in_storage && self.data.get(column) == Some(&value) {
            return Ok(self);
        }
        let stale: Vec<String> = def
            .relationships
            .iter()
            .filter(|r| r.join.local == column)
            .map(|r| r.name.clone())
            .collect();
        for name in stale {
            self.related.remove(&name);
            self.result_sets.remove(&name);
        }
        self.data.insert(column.to_string(), value);
        self.dirty.insert(column.to_string());
        Ok(self)
    }

    pub fn set_columns(&mut self, data: ValueMap) -> Result<&mut Self> {
        for (column, value) in strip_aliases(data) {
            self.set_column(&column, value)?;
        }
        Ok(self)
    }

    /// Column or relationship named `name`.
    pub fn lookup(&self, name: &str) -> Result<Accessor<'_>> {
        let def = self.schema.metadata().source_def(&self.source)?;
        if let Some(relationship) = def.relationship_def(name) {
            return Ok(Accessor::Relationship(relationship));
        }
        self.get_column(name).map(Accessor::Column)
    }

    /// Relationship named `name`, the relationship half of [`Row::lookup`].
    pub fn get_relationship(&self, name: &str) -> Result<&RelationshipDef> {
        self.schema.metadata().relationship_info(&self.source, name)
    }

    /// Primary key values identifying the row in storage.
    pub fn ident(&self) -> Result<ValueMap> {
        let pk = self.schema.metadata().primary_key_columns(&self.source)?;
        if pk.is_empty() {
            return Err(error(
                ErrorKind::Validation,
                format!(
                    "Source `{}` has no primary key, its rows cannot be identified",
                    self.source
                ),
            ));
        }
        pk.iter()
            .map(|column| {
                let value = self
                    .stored_ident
                    .as_ref()
                    .and_then(|s| s.get(column))
                    .or_else(|| self.data.get(column));
                match value {
                    Some(v) if !v.is_null() => Ok((column.clone(), v.clone())),
                    _ => Err(error(
                        ErrorKind::Validation,
                        format!(
                            "Primary key column `{}.{}` is not set",
                            self.source, column
                        ),
                    )),
                }
            })
            .collect()
    }

    fn capture_ident(&mut self) {
        let Ok(pk) = self.schema.metadata().primary_key_columns(&self.source) else {
            return;
        };
        let ident: Option<ValueMap> = pk
            .iter()
            .map(|c| {
                self.data
                    .get(c)
                    .filter(|v| !v.is_null())
                    .map(|v| (c.clone(), v.clone()))
            })
            .collect();
        self.stored_ident = ident.filter(|i| !i.is_empty());
    }

    fn merge_stored(&mut self, sent: ValueMap, result: QueryResult) {
        let stored = result.into_rows().into_iter().next();
        self.data.extend(sent);
        if let Some(stored) = stored {
            self.data.extend(stored);
        }
        self.dirty.clear();
        self.capture_ident();
    }

    /// Persist the dirty columns, after applying `data` if given.
    ///
    /// Nothing is dispatched when no column is dirty.
    pub async fn update(&mut self, data: Option<ValueMap>) -> Result<&mut Self> {
        if !self.in_storage {
            let e = error(
                ErrorKind::NotInStorage,
                format!("Cannot update a `{}` row that is not in storage", self.source),
            );
            log::error!("{:#}", e);
            return Err(e);
        }
        if let Some(data) = data {
            self.set_columns(data)?;
        }
        if self.dirty.is_empty() {
            log::trace!("Update of a clean `{}` row skipped", self.source);
            return Ok(self);
        }
        let ident = Condition::Eq(self.ident()?);
        let changes = deflate(&self.schema, &self.source, self.dirty_columns())?;
        let payload =
            Payload::new(&self.source, ident, Attributes::new()).with_data(changes.clone());
        let result = self
            .schema
            .dispatcher()
            .dispatch(Operation::Update, payload)
            .await?;
        self.merge_stored(changes, result);
        Ok(self)
    }

    /// Store an unsaved row, no op when it is already in storage.
    pub async fn insert(&mut self) -> Result<&mut Self> {
        if self.in_storage {
            return Ok(self);
        }
        let data = deflate(&self.schema, &self.source, self.data.clone())?;
        let payload =
            Payload::new(&self.source, Condition::Empty, Attributes::new()).with_data(data.clone());
        let result = self
            .schema
            .dispatcher()
            .dispatch(Operation::Create, payload)
            .await?;
        self.merge_stored(data, result);
        self.in_storage = true;
        Ok(self)
    }

    /// Delete the row from storage, returns the affected count (0 when it was not stored).
    pub async fn delete(&mut self) -> Result<u64> {
        if !self.in_storage {
            log::debug!("Delete of a `{}` row not in storage skipped", self.source);
            return Ok(0);
        }
        let ident = Condition::Eq(self.ident()?);
        let result = self
            .schema
            .dispatcher()
            .dispatch(
                Operation::Delete,
                Payload::new(&self.source, ident, Attributes::new()),
            )
            .await?;
        self.in_storage = false;
        self.stored_ident = None;
        Ok(result.count())
    }

    /// Reload the row from storage, dropping local changes and cached relationships.
    pub async fn discard_changes(&mut self) -> Result<&mut Self> {
        let ident = Condition::Eq(self.ident()?);
        let payload = Payload::new(&self.source, ident, Attributes::new().rows(1).cache(false));
        let result = self
            .schema
            .dispatcher()
            .dispatch(Operation::Search, payload)
            .await?;
        let Some(raw) = result.into_rows().into_iter().next() else {
            let e = error(
                ErrorKind::RowVanished,
                format!("The `{}` row is no longer in storage", self.source),
            );
            log::error!("{:#}", e);
            return Err(e);
        };
        self.data = raw;
        self.dirty.clear();
        self.related.clear();
        self.result_sets.clear();
        self.in_storage = true;
        self.capture_ident();
        Ok(self)
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.in_storage = false;
        self.stored_ident = None;
    }

    pub(crate) fn set_related(&mut self, name: String, related: Related) {
        self.result_sets.remove(&name);
        self.related.insert(name, related);
    }

    /// Relationship data already attached to the row, without dispatching.
    pub fn prefetched(&self, name: &str) -> Option<&Related> {
        self.related.get(name)
    }

    fn relationship(&self, name: &str) -> Result<RelationshipDef> {
        Ok(self
            .schema
            .metadata()
            .relationship_info(&self.source, name)?
            .clone())
    }

    fn build_related(&self, relationship: &RelationshipDef) -> Result<ResultSet<Row>> {
        let value = self
            .data
            .get(&relationship.join.local)
            .cloned()
            .unwrap_or_default();
        Ok(ResultSet::new(self.schema.clone(), &relationship.target)?.search(
            Condition::eq(format!("me.{}", relationship.join.foreign), value),
            Attributes::new(),
        ))
    }

    /// Result set of the rows related through `name`, cached on the row.
    ///
    /// Prefetched rows seed the result set, which then does not dispatch.
    pub fn related_resultset(&mut self, name: &str) -> Result<&mut ResultSet<Row>> {
        if !self.result_sets.contains_key(name) {
            let relationship = self.relationship(name)?;
            let mut result_set = self.build_related(&relationship)?;
            if let Some(prefetched) = self.related.get(name) {
                result_set.set_cache(prefetched.rows());
            }
            self.result_sets.insert(name.to_string(), result_set);
        }
        self.result_sets.get_mut(name).ok_or_else(|| {
            error(
                ErrorKind::NoSuchRelationship,
                format!("`{}` has no relationship named `{}`", self.source, name),
            )
        })
    }

    /// The row related through a single relationship, fetched at most once.
    pub async fn related_row(&mut self, name: &str) -> Result<Option<&Row>> {
        let relationship = self.relationship(name)?;
        if !relationship.kind.is_single() {
            return Err(error(
                ErrorKind::Validation,
                format!(
                    "Relationship `{}.{}` has many rows, use related_resultset",
                    self.source, name
                ),
            ));
        }
        if !self.related.contains_key(name) {
            let joined = self
                .data
                .get(&relationship.join.local)
                .is_some_and(|v| !v.is_null());
            let row = if joined {
                self.build_related(&relationship)?.single().await?
            } else {
                None
            };
            self.related
                .insert(name.to_string(), Related::Row(row.map(Box::new)));
        }
        Ok(match self.related.get(name) {
            Some(Related::Row(row)) => row.as_deref(),
            Some(Related::Rows(rows)) => rows.first(),
            None => None,
        })
    }
}

impl Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("source", &self.source)
            .field("data", &self.data)
            .field("dirty", &self.dirty)
            .field("in_storage", &self.in_storage)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.data == other.data && self.in_storage == other.in_storage
    }
}
