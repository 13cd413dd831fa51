use crate::{
    AsValue, Attributes, Condition, DEFAULT_PAGE_SIZE, ErrorKind, Hydrator, Operation, Pager,
    Payload, QuarryError, Result, ResultClass, ResultSetColumn, Row, Schema, Seed, Value,
    ValueMap, deflate, error, is_unique_violation, pivot, resolve_unique, strip_aliases,
};
use async_stream::try_stream;
use futures::{Stream, future};
use std::fmt::{self, Debug};

/// Argument of [`ResultSet::find`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Value of a single column primary key, null finds nothing.
    Key(Value),
    Condition(Condition),
}

impl<T: AsValue> From<T> for Lookup {
    fn from(value: T) -> Self {
        Lookup::Key(value.as_value())
    }
}

impl From<&'static str> for Lookup {
    fn from(value: &'static str) -> Self {
        Lookup::Key(value.into())
    }
}

impl From<Value> for Lookup {
    fn from(value: Value) -> Self {
        Lookup::Key(value)
    }
}

impl From<Condition> for Lookup {
    fn from(value: Condition) -> Self {
        Lookup::Condition(value)
    }
}

/// Query state over one source, hydrating rows into `R`.
///
/// Chaining methods (`search`, `page`, `slice`, ...) never touch the
/// receiver, they return a fresh result set. Terminal methods dispatch
/// through the schema's dispatcher. Once materialized the rows stay
/// buffered: `all` and `next` never dispatch twice on the same instance.
pub struct ResultSet<R: ResultClass = Row> {
    schema: Schema,
    source: String,
    condition: Condition,
    attributes: Attributes,
    buffer: Option<Vec<R>>,
    cursor: usize,
    manual: Option<Vec<Seed<R>>>,
    is_prefetched: bool,
    pager: Option<Pager>,
}

impl<R: ResultClass> ResultSet<R> {
    pub(crate) fn new(schema: Schema, source: &str) -> Result<Self> {
        if source.is_empty() {
            return Err(error(
                ErrorKind::Validation,
                "A result set requires a source name",
            ));
        }
        schema.metadata().source_def(source)?;
        Ok(Self::from_parts(
            schema,
            source.to_string(),
            Condition::Empty,
            Attributes::new(),
        ))
    }

    fn from_parts(
        schema: Schema,
        source: String,
        condition: Condition,
        attributes: Attributes,
    ) -> Self {
        Self {
            schema,
            source,
            condition,
            attributes,
            buffer: None,
            cursor: 0,
            manual: None,
            is_prefetched: false,
            pager: None,
        }
    }

    fn derive<T: ResultClass>(&self, condition: Condition, attributes: Attributes) -> ResultSet<T> {
        ResultSet::from_parts(self.schema.clone(), self.source.clone(), condition, attributes)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn is_materialized(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn cursor_position(&self) -> usize {
        self.cursor
    }

    /// New result set with `condition` merged in and `attributes` overriding the current ones.
    pub fn search(&self, condition: impl Into<Condition>, attributes: Attributes) -> ResultSet<R> {
        self.derive(
            self.condition.clone().merge(condition.into()),
            self.attributes.clone().merge(attributes),
        )
    }

    /// Page `page` (1 based, 0 is taken as 1), `rows` defaults to [`DEFAULT_PAGE_SIZE`].
    pub fn page(&self, page: u64) -> ResultSet<R> {
        let mut result = self.search(Condition::Empty, Attributes::new().page(page.max(1)));
        result.attributes.rows.get_or_insert(DEFAULT_PAGE_SIZE);
        result
    }

    /// Rows `first..=last` (0 based) of the current selection.
    pub fn slice(&self, first: u64, last: u64) -> Result<ResultSet<R>> {
        if last < first {
            let e = error(
                ErrorKind::Validation,
                format!("Invalid slice bounds {first}..={last}"),
            );
            log::error!("{:#}", e);
            return Err(e);
        }
        let mut result = self.search(
            Condition::Empty,
            Attributes::new()
                .offset(first)
                .rows((last - first).saturating_add(1)),
        );
        result.attributes.page = None;
        Ok(result)
    }

    pub fn prefetch<S: Into<String>>(&self, relationships: impl IntoIterator<Item = S>) -> ResultSet<R> {
        self.search(Condition::Empty, Attributes::new().prefetch(relationships))
    }

    /// Same query state, hydrating into another type.
    pub fn result_class<T: ResultClass>(&self) -> ResultSet<T> {
        self.derive(self.condition.clone(), self.attributes.clone())
    }

    /// Payload of the selection, as handed to the dispatch channel.
    pub fn payload(&self) -> Payload {
        Payload::new(
            &self.source,
            self.condition.clone(),
            self.attributes.clone().resolve_page(),
        )
    }

    /// Payload of [`ResultSet::count`], bounded selections are marked to be counted as a subquery.
    pub fn count_payload(&self) -> Payload {
        let mut attributes = self.attributes.clone().resolve_page();
        attributes.prefetch = None;
        if attributes.rows.is_some() || attributes.offset.is_some() {
            attributes.alias = Some("subquery_for_count".into());
            attributes.is_subquery = true;
        } else {
            attributes.order_by = None;
        }
        Payload::new(&self.source, self.condition.clone(), attributes)
    }

    /// Payload of [`ResultSet::count_total`], without pagination and ordering.
    pub fn count_total_payload(&self) -> Payload {
        let mut attributes = self.attributes.without_bounds();
        attributes.prefetch = None;
        attributes.alias = None;
        attributes.is_subquery = false;
        Payload::new(&self.source, self.condition.clone(), attributes)
    }

    /// Seed the result set with rows it will serve instead of dispatching.
    pub fn set_cache<S: Into<Seed<R>>>(&mut self, entries: impl IntoIterator<Item = S>) {
        self.manual = Some(entries.into_iter().map(Into::into).collect());
        self.is_prefetched = true;
        self.buffer = None;
        self.cursor = 0;
    }

    /// Seeded entries not hydrated yet.
    pub fn get_cache(&self) -> Option<&[Seed<R>]> {
        self.manual.as_deref()
    }

    pub fn is_prefetched(&self) -> bool {
        self.is_prefetched
    }

    /// Drop buffered and seeded rows, the next read dispatches again.
    pub fn clear_cache(&mut self) {
        self.manual = None;
        self.is_prefetched = false;
        self.buffer = None;
        self.cursor = 0;
    }

    async fn materialize(&mut self) -> Result<()> {
        if self.buffer.is_some() {
            log::trace!("Serving `{}` rows from the buffer", self.source);
            return Ok(());
        }
        let prefetch = self.attributes.prefetch.clone().unwrap_or_default();
        let hydrator = Hydrator::new(&self.schema, &self.source, &prefetch);
        let rows = if let Some(seeds) = self.manual.take() {
            seeds
                .into_iter()
                .map(|seed| hydrator.hydrate_seed(seed))
                .collect::<Result<Vec<R>>>()?
        } else {
            let payload = Payload::new(
                &self.source,
                self.condition.clone(),
                self.attributes.clone().resolve_page(),
            );
            self.schema
                .dispatcher()
                .dispatch(Operation::Search, payload)
                .await?
                .into_rows()
                .into_iter()
                .map(|raw| hydrator.hydrate(raw))
                .collect::<Result<Vec<R>>>()?
        };
        self.buffer = Some(rows);
        self.cursor = 0;
        Ok(())
    }

    /// Every row of the selection, dispatched at most once per instance.
    pub async fn all(&mut self) -> Result<&[R]> {
        self.materialize().await?;
        Ok(self.buffer.as_deref().unwrap_or_default())
    }

    pub async fn all_mut(&mut self) -> Result<&mut [R]> {
        self.materialize().await?;
        Ok(self.buffer.as_deref_mut().unwrap_or_default())
    }

    /// Materialized rows, consuming the result set.
    pub async fn into_all(mut self) -> Result<Vec<R>> {
        self.materialize().await?;
        Ok(self.into_rows())
    }

    fn into_rows(self) -> Vec<R> {
        self.buffer.unwrap_or_default()
    }

    /// Row at the cursor, advancing it. Materializes on first use.
    pub async fn next(&mut self) -> Result<Option<&mut R>> {
        self.materialize().await?;
        let position = self.cursor;
        let Some(buffer) = self.buffer.as_mut() else {
            return Ok(None);
        };
        if position >= buffer.len() {
            return Ok(None);
        }
        self.cursor += 1;
        Ok(buffer.get_mut(position))
    }

    /// Rewind the cursor, the buffer is kept.
    pub fn reset(&mut self) -> &mut Self {
        self.cursor = 0;
        self
    }

    /// Rows matched, a bounded selection counts only the rows it would return.
    pub async fn count(&self) -> Result<u64> {
        Ok(self
            .schema
            .dispatcher()
            .dispatch(Operation::Count, self.count_payload())
            .await?
            .count())
    }

    pub async fn count_where(
        &self,
        condition: impl Into<Condition>,
        attributes: Attributes,
    ) -> Result<u64> {
        self.search(condition, attributes).count().await
    }

    /// Rows matched regardless of pagination.
    pub async fn count_total(&self) -> Result<u64> {
        Ok(self
            .schema
            .dispatcher()
            .dispatch(Operation::Count, self.count_total_payload())
            .await?
            .count())
    }

    /// First row, from the buffer when materialized.
    ///
    /// A buffered row is handed out as a fresh `R` built by [`ResultClass::from_row`]
    /// over a copy of its [`Row`]: fields a domain type keeps besides the row start
    /// from their defaults again, the buffered instance is left untouched.
    pub async fn single(&self) -> Result<Option<R>> {
        if let Some(buffer) = self.buffer.as_ref() {
            if buffer.len() > 1 {
                log::warn!(
                    "single() on a `{}` result set holding {} rows returns the first one",
                    self.source,
                    buffer.len()
                );
            }
            if let Some(first) = buffer.first() {
                return R::from_row(first.row().clone()).map(Some);
            }
        }
        let mut child: ResultSet<R> = self.search(Condition::Empty, Attributes::new().rows(1));
        child.materialize().await?;
        Ok(child.into_rows().into_iter().next())
    }

    pub async fn first(&self) -> Result<Option<R>> {
        self.single().await
    }

    /// Row by primary key value or by condition.
    pub async fn find(&self, lookup: impl Into<Lookup>) -> Result<Option<R>> {
        let condition = match lookup.into() {
            Lookup::Key(Value::Null) => return Ok(None),
            Lookup::Key(value) => {
                let pk = self.schema.metadata().primary_key_columns(&self.source)?;
                match pk {
                    [column] => Condition::eq(column.clone(), value),
                    _ => {
                        return Err(error(
                            ErrorKind::Validation,
                            format!(
                                "`{}` does not have a single column primary key, find it by condition",
                                self.source
                            ),
                        ));
                    }
                }
            }
            Lookup::Condition(condition) => condition,
        };
        self.search(condition, Attributes::new().rows(1))
            .single()
            .await
    }

    /// The result set's own equalities under the given data, aliases stripped.
    fn new_row(&self, data: ValueMap) -> Result<Row> {
        let mut seeded: ValueMap = strip_aliases(self.condition.equalities())
            .into_iter()
            .filter(|(k, v)| !k.contains('.') && v.is_scalar())
            .collect();
        seeded.extend(strip_aliases(data));
        Row::new(self.schema.clone(), &self.source, seeded)
    }

    /// Local row not in storage yet, see [`Row::insert`].
    pub fn new_result(&self, data: ValueMap) -> Result<R> {
        R::from_row(self.new_row(data)?)
    }

    /// Store a new row and return it as stored.
    pub async fn create(&self, data: ValueMap) -> Result<R> {
        let mut row = self.new_row(data)?;
        row.insert().await?;
        R::from_row(row)
    }

    /// Store many rows in one dispatch.
    pub async fn populate(&self, rows: Vec<ValueMap>) -> Result<Vec<R>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let rows = rows
            .into_iter()
            .map(|data| deflate(&self.schema, &self.source, self.new_row(data)?.into_data()))
            .collect::<Result<Vec<_>>>()?;
        let payload = Payload::new(&self.source, Condition::Empty, Attributes::new())
            .with_rows(rows.clone());
        let stored = self
            .schema
            .dispatcher()
            .dispatch(Operation::Populate, payload)
            .await?
            .into_rows();
        let stored = if stored.len() == rows.len() {
            stored
        } else {
            rows
        };
        stored
            .into_iter()
            .map(|raw| R::from_row(Row::hydrated(self.schema.clone(), &self.source, raw)))
            .collect()
    }

    fn must_pin_rows(&self) -> bool {
        self.attributes.is_bounded() || self.attributes.has_join()
    }

    /// Primary keys of the buffered rows as a condition, `None` when there are none.
    async fn buffered_ident(&mut self) -> Result<Option<Condition>> {
        self.materialize().await?;
        let rows = self.buffer.as_deref().unwrap_or_default();
        if rows.is_empty() {
            return Ok(None);
        }
        let pk = self.schema.metadata().primary_key_columns(&self.source)?;
        let idents = rows
            .iter()
            .map(|r| r.row().ident())
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(match pk {
            [column] => Condition::In(
                column.clone(),
                idents
                    .into_iter()
                    .filter_map(|mut ident| ident.remove(column))
                    .collect(),
            ),
            _ => Condition::or(idents.into_iter().map(Condition::Eq)),
        }))
    }

    /// Update every matched row, returns the affected count.
    ///
    /// A bounded or joined selection is materialized first and the update
    /// targets exactly the buffered rows by primary key.
    pub async fn update(&mut self, data: ValueMap) -> Result<u64> {
        let data = deflate(&self.schema, &self.source, strip_aliases(data))?;
        if data.is_empty() {
            return Err(error(
                ErrorKind::Validation,
                "Update requires at least one column",
            ));
        }
        let condition = if self.must_pin_rows() {
            let Some(condition) = self.buffered_ident().await? else {
                log::debug!("Update of an empty `{}` selection skipped", self.source);
                return Ok(0);
            };
            condition
        } else {
            self.condition.clone()
        };
        let payload = Payload::new(&self.source, condition, Attributes::new()).with_data(data);
        Ok(self
            .schema
            .dispatcher()
            .dispatch(Operation::Update, payload)
            .await?
            .count())
    }

    pub async fn update_where(&self, data: ValueMap, condition: impl Into<Condition>) -> Result<u64> {
        self.search(condition, Attributes::new()).update(data).await
    }

    /// Update row by row through [`Row::update`], returns the number of rows.
    pub async fn update_all(&mut self, data: ValueMap) -> Result<u64> {
        let mut updated = 0;
        for row in self.all_mut().await? {
            row.row_mut().update(Some(data.clone())).await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Delete every matched row, with the same row pinning as [`ResultSet::update`].
    pub async fn delete(&mut self) -> Result<u64> {
        let condition = if self.must_pin_rows() {
            let Some(condition) = self.buffered_ident().await? else {
                log::debug!("Delete of an empty `{}` selection skipped", self.source);
                return Ok(0);
            };
            condition
        } else {
            self.condition.clone()
        };
        let payload = Payload::new(&self.source, condition, Attributes::new());
        let affected = self
            .schema
            .dispatcher()
            .dispatch(Operation::Delete, payload)
            .await?
            .count();
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.iter_mut().for_each(|r| r.row_mut().mark_deleted());
        }
        Ok(affected)
    }

    /// Delete row by row, returns the number of rows targeted.
    pub async fn delete_all(&mut self) -> Result<u64> {
        let mut targeted = 0;
        for row in self.all_mut().await? {
            row.row_mut().delete().await?;
            targeted += 1;
        }
        Ok(targeted)
    }

    /// Lookup condition for the `*_or_*` family.
    fn unique_lookup(&self, data: &ValueMap) -> Result<Condition> {
        let def = self.schema.metadata().source_def(&self.source)?;
        resolve_unique(data, self.attributes.key.as_deref(), def)
    }

    /// Create, and when a concurrent writer won the uniqueness race, find its row instead.
    ///
    /// The flag tells whether the row was recovered rather than created.
    async fn create_or_recover(&self, data: ValueMap, lookup: Condition) -> Result<(R, bool)> {
        match self.create(data).await {
            Ok(created) => Ok((created, false)),
            Err(e) if is_unique_violation(&e) => {
                self.schema.stats().record_retry();
                log::warn!(
                    "Create on `{}` lost a uniqueness race, looking the row up again",
                    self.source
                );
                let found = self
                    .search(Condition::Empty, Attributes::new().cache(false))
                    .find(lookup)
                    .await?;
                match found {
                    Some(found) => Ok((found, true)),
                    None => {
                        let e = e.context(QuarryError::new(
                            ErrorKind::MissingAfterConflict,
                            format!(
                                "`{}` row still missing after a uniqueness conflict",
                                self.source
                            ),
                        ));
                        log::error!("{:#}", e);
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn find_or_new(&self, data: ValueMap) -> Result<R> {
        let lookup = self.unique_lookup(&data)?;
        match self.find(lookup).await? {
            Some(found) => Ok(found),
            None => self.new_result(data),
        }
    }

    pub async fn find_or_create(&self, data: ValueMap) -> Result<R> {
        let lookup = self.unique_lookup(&data)?;
        if let Some(found) = self.find(lookup.clone()).await? {
            return Ok(found);
        }
        self.create_or_recover(data, lookup)
            .await
            .map(|(row, _)| row)
    }

    pub async fn update_or_new(&self, data: ValueMap) -> Result<R> {
        let lookup = self.unique_lookup(&data)?;
        match self.find(lookup).await? {
            Some(mut found) => {
                found.row_mut().update(Some(data)).await?;
                Ok(found)
            }
            None => self.new_result(data),
        }
    }

    pub async fn update_or_create(&self, data: ValueMap) -> Result<R> {
        let lookup = self.unique_lookup(&data)?;
        if let Some(mut found) = self.find(lookup.clone()).await? {
            found.row_mut().update(Some(data)).await?;
            return Ok(found);
        }
        let (mut row, recovered) = self.create_or_recover(data.clone(), lookup).await?;
        if recovered {
            row.row_mut().update(Some(data)).await?;
        }
        Ok(row)
    }

    /// Pager of a paged result set, memoized.
    pub fn pager(&mut self) -> Result<&mut Pager> {
        let Some(rows) = self.attributes.rows else {
            let e = error(
                ErrorKind::Validation,
                format!(
                    "The `{}` result set is not paged, set `rows` before asking for a pager",
                    self.source
                ),
            );
            log::error!("{:#}", e);
            return Err(e);
        };
        let pager = match self.pager.take() {
            Some(pager) => pager,
            None => {
                let offset = self.attributes.offset.unwrap_or(0);
                let current_page = self
                    .attributes
                    .page
                    .unwrap_or_else(|| (offset / rows.max(1)).saturating_add(1));
                Pager::new(
                    self.schema.clone(),
                    self.count_total_payload(),
                    rows,
                    current_page,
                )
            }
        };
        Ok(self.pager.insert(pager))
    }

    /// Rows of the page together with its pager, fetched concurrently.
    ///
    /// Page 1 is selected when the result set is not paged already.
    pub async fn search_with_pager(
        &self,
        condition: impl Into<Condition>,
        attributes: Attributes,
    ) -> Result<(Vec<R>, Pager)> {
        let mut result = self.search(condition, attributes);
        if result.attributes.page.is_none() {
            result.attributes.page = Some(1);
        }
        result.attributes.rows.get_or_insert(DEFAULT_PAGE_SIZE);
        let mut pager = result.pager()?.clone();
        future::try_join(result.materialize(), pager.total_entries()).await?;
        Ok((result.into_rows(), pager))
    }

    pub fn get_column(&self, column: impl Into<String>) -> ResultSetColumn {
        ResultSetColumn::new(
            self.schema.clone(),
            self.source.clone(),
            self.condition.clone(),
            self.attributes.clone(),
            column.into(),
        )
    }

    /// The rows related through `relationship` to the rows this result set matches.
    pub fn related_resultset(&self, relationship: &str) -> Result<ResultSet<Row>> {
        let pivot = pivot(
            self.schema.metadata(),
            &self.source,
            relationship,
            self.condition.clone(),
        )?;
        Ok(ResultSet::<Row>::new(self.schema.clone(), &pivot.target)?
            .search(pivot.condition, Attributes::new().join([pivot.reverse])))
    }

    pub fn into_stream(mut self) -> impl Stream<Item = Result<R>> + Send
    where
        R: 'static,
    {
        try_stream! {
            self.materialize().await?;
            for row in self.into_rows() {
                yield row;
            }
        }
    }
}

impl<R: ResultClass + Clone> Clone for ResultSet<R> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            source: self.source.clone(),
            condition: self.condition.clone(),
            attributes: self.attributes.clone(),
            buffer: self.buffer.clone(),
            cursor: self.cursor,
            manual: self.manual.clone(),
            is_prefetched: self.is_prefetched,
            pager: self.pager.clone(),
        }
    }
}

impl<R: ResultClass> Debug for ResultSet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("source", &self.source)
            .field("condition", &self.condition)
            .field("attributes", &self.attributes)
            .field("buffered", &self.buffer.as_ref().map(Vec::len))
            .field("cursor", &self.cursor)
            .field("is_prefetched", &self.is_prefetched)
            .finish_non_exhaustive()
    }
}
