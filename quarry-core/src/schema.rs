use crate::{
    Config, DispatchChannel, Dispatcher, ErrorKind, Result, ResultSet, Row, Stats, Value, error,
};
use std::{
    collections::{BTreeMap, HashMap},
    fmt::{self, Debug},
    sync::Arc,
};

type ConvertFn = dyn Fn(Value) -> Result<Value> + Send + Sync;

/// Column level conversion between what callers hold and what gets stored.
#[derive(Clone)]
pub struct Inflator {
    /// Stored value to caller value.
    pub inflate: Arc<ConvertFn>,
    /// Caller value to stored value, applied before anything leaves the process.
    pub deflate: Arc<ConvertFn>,
}

impl Inflator {
    pub fn new(
        inflate: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
        deflate: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inflate: Arc::new(inflate),
            deflate: Arc::new(deflate),
        }
    }
}

impl Debug for Inflator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Inflator { .. }")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    /// This source holds the foreign key.
    BelongsTo,
    HasOne,
    /// Optional single related row.
    MightHave,
    HasMany,
}

impl RelationshipKind {
    pub fn is_single(&self) -> bool {
        !matches!(self, RelationshipKind::HasMany)
    }
}

/// `foreign.<foreign> = self.<local>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCondition {
    /// Column on the target source.
    pub foreign: String,
    /// Column on the declaring source.
    pub local: String,
}

impl JoinCondition {
    pub fn new(foreign: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            foreign: foreign.into(),
            local: local.into(),
        }
    }

    /// The same column pair seen from the other side.
    pub fn mirrors(&self, other: &JoinCondition) -> bool {
        self.foreign == other.local && self.local == other.foreign
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDef {
    pub name: String,
    pub target: String,
    pub join: JoinCondition,
    pub kind: RelationshipKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

/// Metadata of one source (table, view or anything the channel can query).
#[derive(Debug, Clone, Default)]
pub struct SourceDef {
    pub name: String,
    pub columns: Vec<String>,
    pub primary_key: Vec<String>,
    /// In declaration order, lookups adopt the first satisfied one.
    pub unique_constraints: Vec<UniqueConstraint>,
    pub relationships: Vec<RelationshipDef>,
    pub inflators: BTreeMap<String, Inflator>,
}

impl SourceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn primary_key<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn unique<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.unique_constraints.push(UniqueConstraint {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    fn relationship(
        mut self,
        kind: RelationshipKind,
        name: impl Into<String>,
        target: impl Into<String>,
        join: JoinCondition,
    ) -> Self {
        self.relationships.push(RelationshipDef {
            name: name.into(),
            target: target.into(),
            join,
            kind,
        });
        self
    }

    /// `local` on this source references `foreign` on `target`.
    pub fn belongs_to(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        local: impl Into<String>,
        foreign: impl Into<String>,
    ) -> Self {
        let join = JoinCondition::new(foreign, local);
        self.relationship(RelationshipKind::BelongsTo, name, target, join)
    }

    /// `foreign` on `target` references `local` on this source.
    pub fn has_many(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        let join = JoinCondition::new(foreign, local);
        self.relationship(RelationshipKind::HasMany, name, target, join)
    }

    pub fn has_one(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        let join = JoinCondition::new(foreign, local);
        self.relationship(RelationshipKind::HasOne, name, target, join)
    }

    pub fn might_have(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        let join = JoinCondition::new(foreign, local);
        self.relationship(RelationshipKind::MightHave, name, target, join)
    }

    pub fn inflate(mut self, column: impl Into<String>, inflator: Inflator) -> Self {
        self.inflators.insert(column.into(), inflator);
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn relationship_def(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

/// Provider of source metadata, owned by whatever generates the queries.
pub trait SchemaMetadata: Send + Sync {
    fn source(&self, name: &str) -> Option<&SourceDef>;

    fn source_def(&self, name: &str) -> Result<&SourceDef> {
        self.source(name)
            .ok_or_else(|| error(ErrorKind::NoSuchSource, format!("No source named `{name}`")))
    }

    fn primary_key_columns(&self, source: &str) -> Result<&[String]> {
        Ok(&self.source_def(source)?.primary_key)
    }

    fn unique_constraints(&self, source: &str) -> Result<&[UniqueConstraint]> {
        Ok(&self.source_def(source)?.unique_constraints)
    }

    fn relationship_info(&self, source: &str, name: &str) -> Result<&RelationshipDef> {
        self.source_def(source)?.relationship_def(name).ok_or_else(|| {
            error(
                ErrorKind::NoSuchRelationship,
                format!("Source `{source}` has no relationship named `{name}`"),
            )
        })
    }

    fn relationships(&self, source: &str) -> Result<Vec<&str>> {
        Ok(self
            .source_def(source)?
            .relationships
            .iter()
            .map(|r| r.name.as_str())
            .collect())
    }

    fn inflators(&self, source: &str) -> Result<&BTreeMap<String, Inflator>> {
        Ok(&self.source_def(source)?.inflators)
    }
}

/// In memory [`SchemaMetadata`].
#[derive(Debug, Clone, Default)]
pub struct SchemaDef {
    sources: HashMap<String, SourceDef>,
}

impl SchemaDef {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_source(mut self, source: SourceDef) -> Self {
        self.sources.insert(source.name.clone(), source);
        self
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceDef> {
        self.sources.values()
    }
}

impl SchemaMetadata for SchemaDef {
    fn source(&self, name: &str) -> Option<&SourceDef> {
        self.sources.get(name)
    }
}

pub(crate) struct SchemaInner {
    pub(crate) metadata: Arc<dyn SchemaMetadata>,
    pub(crate) dispatcher: Dispatcher,
}

/// Entry point: metadata plus the dispatch layer, cheap to clone.
///
/// Every result set and row created from a schema shares its dispatcher and
/// therefore its [`Stats`].
#[derive(Clone)]
pub struct Schema {
    pub(crate) inner: Arc<SchemaInner>,
}

impl Schema {
    pub fn new(
        metadata: Arc<dyn SchemaMetadata>,
        channel: Arc<dyn DispatchChannel>,
    ) -> Schema {
        Self::from_parts(metadata, channel, Config::default(), Arc::new(Stats::new()))
    }

    pub fn builder() -> SchemaBuilder {
        Default::default()
    }

    fn from_parts(
        metadata: Arc<dyn SchemaMetadata>,
        channel: Arc<dyn DispatchChannel>,
        config: Config,
        stats: Arc<Stats>,
    ) -> Schema {
        Schema {
            inner: Arc::new(SchemaInner {
                metadata,
                dispatcher: Dispatcher::new(channel, stats, config),
            }),
        }
    }

    /// Fresh result set over `source`, with no condition and no attributes.
    pub fn result_set(&self, source: &str) -> Result<ResultSet<Row>> {
        ResultSet::new(self.clone(), source)
    }

    pub fn metadata(&self) -> &dyn SchemaMetadata {
        self.inner.metadata.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn stats(&self) -> &Arc<Stats> {
        self.inner.dispatcher.stats()
    }

    pub fn config(&self) -> &Config {
        self.inner.dispatcher.config()
    }
}

impl Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("config", self.config())
            .field("stats", &self.stats().snapshot())
            .finish_non_exhaustive()
    }
}

/// Builder of a [`Schema`], metadata and channel are required.
#[derive(Default)]
pub struct SchemaBuilder {
    metadata: Option<Arc<dyn SchemaMetadata>>,
    channel: Option<Arc<dyn DispatchChannel>>,
    config: Option<Config>,
    stats: Option<Arc<Stats>>,
}

impl SchemaBuilder {
    pub fn metadata(mut self, metadata: Arc<dyn SchemaMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn channel(mut self, channel: Arc<dyn DispatchChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing metrics sink, for example between two schemas.
    pub fn stats(mut self, stats: Arc<Stats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn build(self) -> Result<Schema> {
        let Some(metadata) = self.metadata else {
            return Err(error(ErrorKind::Validation, "A schema requires its metadata"));
        };
        let Some(channel) = self.channel else {
            return Err(error(
                ErrorKind::Validation,
                "A schema requires a dispatch channel",
            ));
        };
        Ok(Schema::from_parts(
            metadata,
            channel,
            self.config.unwrap_or_default(),
            self.stats.unwrap_or_default(),
        ))
    }
}
