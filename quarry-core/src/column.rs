use crate::{
    Aggregate, Attributes, Condition, ErrorKind, Operation, Payload, QueryResult, Result, Schema,
    Value, error,
};

/// Aggregates over one column of a result set.
#[derive(Debug, Clone)]
pub struct ResultSetColumn {
    schema: Schema,
    source: String,
    condition: Condition,
    attributes: Attributes,
    column: String,
}

impl ResultSetColumn {
    pub(crate) fn new(
        schema: Schema,
        source: String,
        condition: Condition,
        attributes: Attributes,
        column: String,
    ) -> Self {
        let mut attributes = attributes.resolve_page();
        attributes.select = Some(vec![column.clone()]);
        attributes.as_names = None;
        attributes.prefetch = None;
        Self {
            schema,
            source,
            condition,
            attributes,
            column,
        }
    }

    pub fn name(&self) -> &str {
        &self.column
    }

    fn payload(&self) -> Payload {
        let mut attributes = self.attributes.clone();
        if attributes.is_bounded() {
            attributes.alias = Some("subquery_for_column".into());
            attributes.is_subquery = true;
        } else {
            attributes.order_by = None;
        }
        Payload::new(&self.source, self.condition.clone(), attributes)
    }

    async fn aggregate(&self, aggregate: Aggregate) -> Result<Value> {
        let result = self
            .schema
            .dispatcher()
            .dispatch(Operation::Aggregate(aggregate), self.payload())
            .await?;
        Ok(match result {
            QueryResult::Value(v) => v,
            QueryResult::Count(v) | QueryResult::Affected(v) => Value::from(v),
            QueryResult::Row(row) => row
                .and_then(|r| r.into_values().next())
                .unwrap_or_default(),
            QueryResult::Rows(rows) => rows
                .into_iter()
                .next()
                .and_then(|r| r.into_values().next())
                .unwrap_or_default(),
        })
    }

    /// Null over an empty set.
    pub async fn sum(&self) -> Result<Value> {
        self.aggregate(Aggregate::Sum).await
    }

    pub async fn min(&self) -> Result<Value> {
        self.aggregate(Aggregate::Min).await
    }

    pub async fn max(&self) -> Result<Value> {
        self.aggregate(Aggregate::Max).await
    }

    pub async fn avg(&self) -> Result<Value> {
        self.aggregate(Aggregate::Avg).await
    }

    /// Non null values of the column.
    pub async fn count(&self) -> Result<u64> {
        let value = self.aggregate(Aggregate::Count).await?;
        value.as_i64().map(|v| v.max(0) as u64).ok_or_else(|| {
            error(
                ErrorKind::Database,
                format!("Count of `{}` returned {value:?}", self.column),
            )
        })
    }

    /// Arbitrary aggregate function known to the dispatch channel.
    pub async fn func(&self, function: &str) -> Result<Value> {
        if function.is_empty() || !function.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(error(
                ErrorKind::Validation,
                format!("`{function}` is not a valid aggregate function name"),
            ));
        }
        self.aggregate(Aggregate::Func(function.to_string())).await
    }

    /// Every value of the column, in result set order.
    pub async fn all(&self) -> Result<Vec<Value>> {
        let mut attributes = self.attributes.clone();
        attributes.alias = None;
        attributes.is_subquery = false;
        let payload = Payload::new(&self.source, self.condition.clone(), attributes);
        let rows = self
            .schema
            .dispatcher()
            .dispatch(Operation::Search, payload)
            .await?
            .into_rows();
        Ok(rows
            .into_iter()
            .map(|mut r| r.remove(&self.column).unwrap_or_default())
            .collect())
    }
}
