use crate::{
    Table,
    evaluate::{Scope, aggregate, sort},
};
use futures::{FutureExt, future::BoxFuture};
use quarry_core::{
    DispatchChannel, Error, ErrorContext, ErrorKind, Operation, Payload, QueryResult, Result,
    SchemaMetadata, SourceDef, Value, ValueMap, error,
};
use std::{collections::HashMap, env, sync::Arc, time::Duration};
use tokio::sync::{Mutex, RwLock};
use url::Url;
use urlencoding::decode;

/// Dispatch channel keeping every source in process memory.
///
/// Primary keys and unique constraints of the metadata are enforced, a
/// single integer primary key left null is generated on create. Conditions
/// on joined aliases hold when any joined row satisfies them.
pub struct MemoryChannel {
    metadata: Arc<dyn SchemaMetadata>,
    tables: RwLock<HashMap<String, Table>>,
    latency: Duration,
    failures: Mutex<Vec<(Operation, String)>>,
    races: Mutex<Vec<(String, ValueMap)>>,
    history: Mutex<Vec<(Operation, Payload)>>,
}

impl MemoryChannel {
    pub const SCHEME: &'static str = "memory";

    pub fn new(metadata: Arc<dyn SchemaMetadata>) -> Self {
        Self {
            metadata,
            tables: Default::default(),
            latency: Duration::ZERO,
            failures: Default::default(),
            races: Default::default(),
            history: Default::default(),
        }
    }

    /// Open `memory://?latency_ms=5`.
    ///
    /// `latency_ms` delays every operation, it falls back to the environment
    /// variable `QUARRY_MEMORY_LATENCY_MS`.
    pub fn connect(url: &str, metadata: Arc<dyn SchemaMetadata>) -> Result<MemoryChannel> {
        let context = || format!("While trying to connect to `{}`", url);
        let url = decode(url).with_context(context)?;
        let prefix = format!("{}://", Self::SCHEME);
        if !url.starts_with(&prefix) {
            let e = Error::msg(format!(
                "Memory channel url must start with `{}`",
                &prefix
            ))
            .context(context());
            log::error!("{:#}", e);
            return Err(e);
        }
        let url = Url::parse(&url).with_context(context)?;
        let mut latency_ms = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "latency_ms" => latency_ms = Some(value.into_owned()),
                other => {
                    let e = error(
                        ErrorKind::Validation,
                        format!("Unknown memory channel parameter `{other}`"),
                    )
                    .context(context());
                    log::error!("{:#}", e);
                    return Err(e);
                }
            }
        }
        let latency_ms = latency_ms.or_else(|| env::var("QUARRY_MEMORY_LATENCY_MS").ok());
        let mut channel = MemoryChannel::new(metadata);
        if let Some(v) = latency_ms {
            let ms = v
                .parse::<u64>()
                .with_context(|| format!("`latency_ms` must be an integer, found `{v}`"))
                .with_context(context)?;
            channel.latency = Duration::from_millis(ms);
        }
        Ok(channel)
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// The next `operation` fails with `message`, without any classification attached.
    pub async fn fail_next(&self, operation: Operation, message: impl Into<String>) {
        self.failures.lock().await.push((operation, message.into()));
    }

    /// Right before the next create on `source`, store `data` as if another client did.
    pub async fn race_next_create(&self, source: impl Into<String>, data: ValueMap) {
        self.races.lock().await.push((source.into(), data));
    }

    /// Every operation executed so far, in order.
    pub async fn history(&self) -> Vec<(Operation, Payload)> {
        self.history.lock().await.clone()
    }

    /// How many times `operation` was executed.
    pub async fn executed(&self, operation: &Operation) -> usize {
        self.history
            .lock()
            .await
            .iter()
            .filter(|(o, _)| o == operation)
            .count()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Stored rows of `source`, bypassing result sets and the dispatch layer.
    pub async fn rows(&self, source: &str) -> Vec<ValueMap> {
        self.tables
            .read()
            .await
            .get(source)
            .map(|t| t.rows().to_vec())
            .unwrap_or_default()
    }

    fn def(&self, source: &str) -> Result<&SourceDef> {
        self.metadata.source_def(source)
    }

    /// Indexes of the matching rows in table order, then the rows ordered and bounded.
    fn select<'t>(
        &self,
        tables: &'t HashMap<String, Table>,
        payload: &Payload,
        bounded: bool,
    ) -> Result<(Vec<usize>, Vec<&'t ValueMap>)> {
        let scope = Scope {
            metadata: self.metadata.as_ref(),
            tables,
            source: &payload.source,
            joins: payload.attributes.join.as_deref().unwrap_or_default(),
        };
        let rows = tables
            .get(&payload.source)
            .map(Table::rows)
            .unwrap_or(&[]);
        let mut indexes = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            if scope.matches(row, &payload.condition)? {
                indexes.push(i);
            }
        }
        let mut selected: Vec<&ValueMap> = indexes.iter().map(|&i| &rows[i]).collect();
        if let Some(order_by) = payload.attributes.order_by.as_deref() {
            sort(&mut selected, order_by);
        }
        if bounded {
            let offset = payload.attributes.offset.unwrap_or(0);
            let offset = usize::try_from(offset).unwrap_or(usize::MAX);
            selected = selected.into_iter().skip(offset).collect();
            if let Some(rows) = payload.attributes.rows {
                selected.truncate(usize::try_from(rows).unwrap_or(usize::MAX));
            }
        }
        Ok((indexes, selected))
    }

    fn search(&self, tables: &HashMap<String, Table>, payload: &Payload) -> Result<QueryResult> {
        let (_, rows) = self.select(tables, payload, true)?;
        let scope = Scope {
            metadata: self.metadata.as_ref(),
            tables,
            source: &payload.source,
            joins: payload.attributes.join.as_deref().unwrap_or_default(),
        };
        let prefetch = payload.attributes.prefetch.as_deref().unwrap_or_default();
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let mut output = scope.project(
                row,
                payload.attributes.select.as_deref(),
                payload.attributes.as_names.as_deref(),
            )?;
            for name in prefetch {
                let info = self.metadata.relationship_info(&payload.source, name)?;
                let related = scope.related(row, name)?;
                let value = if info.kind.is_single() {
                    related
                        .first()
                        .map(|r| Value::Map((*r).clone()))
                        .unwrap_or_default()
                } else {
                    Value::List(related.into_iter().map(|r| Value::Map(r.clone())).collect())
                };
                output.insert(name.clone(), value);
            }
            result.push(output);
        }
        Ok(QueryResult::Rows(result))
    }

    async fn run(&self, operation: Operation, payload: Payload) -> Result<QueryResult> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.history
            .lock()
            .await
            .push((operation.clone(), payload.clone()));
        {
            let mut failures = self.failures.lock().await;
            if let Some(i) = failures.iter().position(|(o, _)| *o == operation) {
                let (_, message) = failures.remove(i);
                return Err(Error::msg(message));
            }
        }
        match operation {
            Operation::Search => {
                let tables = self.tables.read().await;
                self.search(&tables, &payload)
            }
            Operation::Count => {
                let tables = self.tables.read().await;
                let bounded = payload.attributes.is_subquery;
                let (_, rows) = self.select(&tables, &payload, bounded)?;
                Ok(QueryResult::Count(rows.len() as u64))
            }
            Operation::Aggregate(function) => {
                let tables = self.tables.read().await;
                let bounded = payload.attributes.is_subquery;
                let (_, rows) = self.select(&tables, &payload, bounded)?;
                let Some(column) = payload.attributes.select.as_ref().and_then(|s| s.first())
                else {
                    return Err(Error::msg(format!(
                        "Aggregate `{}` requires a selected column",
                        function.name()
                    )));
                };
                let scope = Scope {
                    metadata: self.metadata.as_ref(),
                    tables: &tables,
                    source: &payload.source,
                    joins: payload.attributes.join.as_deref().unwrap_or_default(),
                };
                let mut values = Vec::with_capacity(rows.len());
                for row in rows {
                    values.push(scope.resolve(row, column)?.into_iter().next().unwrap_or_default());
                }
                Ok(QueryResult::Value(aggregate(&function, values)?))
            }
            Operation::Create => {
                let def = self.def(&payload.source)?;
                let data = payload.data.unwrap_or_default();
                let mut tables = self.tables.write().await;
                let table = tables.entry(payload.source.clone()).or_default();
                let race = {
                    let mut races = self.races.lock().await;
                    races
                        .iter()
                        .position(|(s, _)| *s == payload.source)
                        .map(|i| races.remove(i).1)
                };
                if let Some(concurrent) = race {
                    log::debug!("Concurrent create on `{}` before this one", def.name);
                    table.insert(def, concurrent)?;
                }
                Ok(QueryResult::Row(Some(table.insert(def, data)?)))
            }
            Operation::Populate => {
                let def = self.def(&payload.source)?;
                let mut tables = self.tables.write().await;
                let table = tables.entry(payload.source.clone()).or_default();
                let mut updated = table.clone();
                let stored = payload
                    .rows
                    .into_iter()
                    .map(|row| updated.insert(def, row))
                    .collect::<Result<Vec<_>>>()?;
                *table = updated;
                Ok(QueryResult::Rows(stored))
            }
            Operation::Update => {
                let def = self.def(&payload.source)?;
                let Some(data) = payload.data.as_ref() else {
                    return Err(Error::msg("Update without data"));
                };
                let mut tables = self.tables.write().await;
                let (indexes, _) = self.select(&tables, &payload, false)?;
                let table = tables.entry(payload.source.clone()).or_default();
                Ok(QueryResult::Affected(table.update(def, &indexes, data)?))
            }
            Operation::Delete => {
                let mut tables = self.tables.write().await;
                let (indexes, _) = self.select(&tables, &payload, false)?;
                let table = tables.entry(payload.source.clone()).or_default();
                Ok(QueryResult::Affected(table.delete(&indexes)))
            }
        }
    }
}

impl DispatchChannel for MemoryChannel {
    fn execute(&self, operation: Operation, payload: Payload) -> BoxFuture<'_, Result<QueryResult>> {
        self.run(operation, payload).boxed()
    }
}
