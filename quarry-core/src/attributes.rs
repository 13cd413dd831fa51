use crate::{AsValue, ErrorKind, Result, Value, error};
use std::fmt::{self, Display};

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    /// Parse `"column"`, `"column ASC"`, `"column DESC"` or `"-column"`.
    pub fn parse(term: &str) -> Result<Self> {
        let term = term.trim();
        if let Some(column) = term.strip_prefix('-') {
            return Ok(Self::desc(column.trim()));
        }
        let mut parts = term.split_whitespace();
        let (Some(column), direction, None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(error(
                ErrorKind::Validation,
                format!("Malformed order_by term `{term}`"),
            ));
        };
        match direction.map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Ok(Self::asc(column)),
            Some("desc") => Ok(Self::desc(column)),
            Some(other) => Err(error(
                ErrorKind::Validation,
                format!("Unknown order_by direction `{other}` in `{term}`"),
            )),
        }
    }
}

impl Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.column,
            if self.descending { "DESC" } else { "ASC" }
        )
    }
}

/// Typed attribute set of a result set.
///
/// Every field is optional: merging is a shallow override where the fields
/// set on the newer attributes win.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Attributes {
    /// Row limit.
    pub rows: Option<u64>,
    pub offset: Option<u64>,
    /// 1 based page, combined with `rows` when the payload is built.
    pub page: Option<u64>,
    pub order_by: Option<Vec<OrderBy>>,
    /// Relationship aliases joined to the source.
    pub join: Option<Vec<String>>,
    /// Relationships fetched with the rows and hydrated into the relationship cache.
    pub prefetch: Option<Vec<String>>,
    pub select: Option<Vec<String>>,
    /// Output names of `select` entries, positionally.
    pub as_names: Option<Vec<String>>,
    /// Named unique constraint used for lookups by `find_or_*` / `update_or_*`.
    pub key: Option<String>,
    /// Per result set override of the dispatch cache.
    pub cache: Option<bool>,
    /// Alias of the selection, set by the bounded count rewrite.
    pub alias: Option<String>,
    /// The selection must be wrapped before it is aggregated.
    pub is_subquery: bool,
}

impl Attributes {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn rows(mut self, rows: u64) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn order_by(mut self, terms: impl IntoIterator<Item = OrderBy>) -> Self {
        self.order_by = Some(terms.into_iter().collect());
        self
    }

    pub fn join<S: Into<String>>(mut self, aliases: impl IntoIterator<Item = S>) -> Self {
        self.join = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    pub fn prefetch<S: Into<String>>(mut self, relationships: impl IntoIterator<Item = S>) -> Self {
        self.prefetch = Some(relationships.into_iter().map(Into::into).collect());
        self
    }

    pub fn select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn as_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.as_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn key(mut self, constraint: impl Into<String>) -> Self {
        self.key = Some(constraint.into());
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build from loosely typed pairs, rejecting unknown keys.
    ///
    /// Recognized keys: `rows` (or `limit`), `offset`, `page`, `order_by`,
    /// `join`, `prefetch`, `select` (or `columns`), `as`, `key`, `cache`.
    pub fn from_pairs<K: AsRef<str>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Result<Self> {
        let mut result = Attributes::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let context = |e: crate::Error| {
                error(
                    ErrorKind::Validation,
                    format!("Invalid value for attribute `{key}`: {e:#}"),
                )
            };
            match key {
                "rows" | "limit" => result.rows = Some(u64::try_from_value(value).map_err(context)?),
                "offset" => result.offset = Some(u64::try_from_value(value).map_err(context)?),
                "page" => result.page = Some(u64::try_from_value(value).map_err(context)?),
                "order_by" => {
                    result.order_by = Some(
                        string_list(value)
                            .map_err(context)?
                            .iter()
                            .flat_map(|v| v.split(','))
                            .map(OrderBy::parse)
                            .collect::<Result<_>>()?,
                    )
                }
                "join" => result.join = Some(string_list(value).map_err(context)?),
                "prefetch" => result.prefetch = Some(string_list(value).map_err(context)?),
                "select" | "columns" => result.select = Some(string_list(value).map_err(context)?),
                "as" => result.as_names = Some(string_list(value).map_err(context)?),
                "key" => result.key = Some(String::try_from_value(value).map_err(context)?),
                "cache" => result.cache = Some(bool::try_from_value(value).map_err(context)?),
                _ => {
                    return Err(error(
                        ErrorKind::UnknownAttribute,
                        format!("Unknown result set attribute `{key}`"),
                    ));
                }
            }
        }
        if result.page == Some(0) {
            return Err(error(ErrorKind::Validation, "Pages are numbered from 1"));
        }
        Ok(result)
    }

    /// Shallow override merge, fields set on `new` win.
    pub fn merge(self, new: Attributes) -> Attributes {
        Attributes {
            rows: new.rows.or(self.rows),
            offset: new.offset.or(self.offset),
            page: new.page.or(self.page),
            order_by: new.order_by.or(self.order_by),
            join: new.join.or(self.join),
            prefetch: new.prefetch.or(self.prefetch),
            select: new.select.or(self.select),
            as_names: new.as_names.or(self.as_names),
            key: new.key.or(self.key),
            cache: new.cache.or(self.cache),
            alias: new.alias.or(self.alias),
            is_subquery: new.is_subquery || self.is_subquery,
        }
    }

    /// The selection is limited by `rows`, `offset` or `page`.
    pub fn is_bounded(&self) -> bool {
        self.rows.is_some() || self.offset.is_some() || self.page.is_some()
    }

    pub fn has_join(&self) -> bool {
        self.join.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// Copy without pagination and ordering, for counting the whole match set.
    pub fn without_bounds(&self) -> Attributes {
        Attributes {
            rows: None,
            offset: None,
            page: None,
            order_by: None,
            ..self.clone()
        }
    }

    /// Resolve `page` into an absolute `offset`, the form handed to dispatch channels.
    ///
    /// Offsets past `u64::MAX` saturate, such a page is simply empty.
    pub fn resolve_page(mut self) -> Attributes {
        if let Some(page) = self.page.take() {
            let rows = self.rows.unwrap_or(crate::DEFAULT_PAGE_SIZE);
            self.rows = Some(rows);
            let skipped = rows.saturating_mul(page.saturating_sub(1));
            self.offset = Some(self.offset.unwrap_or(0).saturating_add(skipped));
        }
        self
    }
}

fn string_list(value: Value) -> Result<Vec<String>> {
    match value {
        Value::Varchar(v) => Ok(vec![v]),
        v => Vec::<String>::try_from_value(v),
    }
}
