use crate::silent_logs;
use quarry::{
    Attributes, CompareOp, Condition, ErrorKind, OrderBy, Schema, Value, error_kind, values,
};

pub async fn counting(schema: &Schema) {
    let entries = schema.result_set("entries").expect("Failed to open entries");
    entries
        .populate((1..=6).map(|n| values! { "n" => n }).collect())
        .await
        .expect("Failed to populate entries");

    // Counts
    assert_eq!(entries.count().await.unwrap(), 6);
    assert_eq!(
        entries
            .count_where(
                Condition::compare("n", CompareOp::Greater, 2),
                Attributes::new()
            )
            .await
            .unwrap(),
        4
    );

    // A bounded count is the size of what the selection returns
    let bounded = entries.search(Condition::Empty, Attributes::new().rows(4));
    assert_eq!(bounded.count().await.unwrap(), 4);
    let payload = bounded.count_payload();
    assert!(payload.attributes.is_subquery);
    assert_eq!(payload.attributes.alias.as_deref(), Some("subquery_for_count"));
    let few = entries.search(
        Condition::compare("n", CompareOp::Greater, 4),
        Attributes::new().rows(4),
    );
    assert_eq!(few.count().await.unwrap(), 2);
    let tail = entries.search(Condition::Empty, Attributes::new().offset(5).rows(4));
    assert_eq!(tail.count().await.unwrap(), 1);
    let unbounded = entries.search(
        Condition::Empty,
        Attributes::new().order_by([OrderBy::desc("n")]),
    );
    let payload = unbounded.count_payload();
    assert!(!payload.attributes.is_subquery);
    assert_eq!(payload.attributes.order_by, None);

    // count_total ignores pagination
    let paged = entries
        .search(Condition::Empty, Attributes::new().rows(2))
        .page(2);
    assert_eq!(paged.count().await.unwrap(), 2);
    assert_eq!(paged.count_total().await.unwrap(), 6);
    let payload = paged.count_total_payload();
    assert_eq!(payload.attributes.rows, None);
    assert_eq!(payload.attributes.offset, None);
    assert_eq!(payload.attributes.page, None);

    // Column aggregates
    let n = entries.get_column("n");
    assert_eq!(n.name(), "n");
    assert_eq!(n.sum().await.unwrap(), Value::Int64(21));
    assert_eq!(n.min().await.unwrap(), Value::Int64(1));
    assert_eq!(n.max().await.unwrap(), Value::Int64(6));
    assert_eq!(n.avg().await.unwrap(), Value::Float64(3.5));
    assert_eq!(n.count().await.unwrap(), 6);
    assert_eq!(n.func("max").await.unwrap(), Value::Int64(6));
    let values: Vec<i64> = entries
        .search(Condition::Empty, Attributes::new().order_by([OrderBy::asc("n")]))
        .get_column("n")
        .all()
        .await
        .expect("Failed to fetch the column")
        .into_iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    assert_eq!(values, [1, 2, 3, 4, 5, 6]);

    // Over the bounded selection only
    let top_two = entries
        .search(
            Condition::Empty,
            Attributes::new().order_by([OrderBy::desc("n")]).rows(2),
        )
        .get_column("n");
    assert_eq!(top_two.sum().await.unwrap(), Value::Int64(11));
    assert_eq!(top_two.count().await.unwrap(), 2);
    let none = entries
        .search(
            Condition::compare("n", CompareOp::Greater, 100),
            Attributes::new(),
        )
        .get_column("n");
    assert_eq!(none.sum().await.unwrap(), Value::Null);
    assert_eq!(none.count().await.unwrap(), 0);

    silent_logs! {
        let queries = schema.stats().queries();
        let error = n.func("max(n); --").await.expect_err("Function names are validated");
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        assert_eq!(schema.stats().queries(), queries);
        let error = n.func("median").await.expect_err("The channel knows no median");
        assert_eq!(error_kind(&error), Some(ErrorKind::Database));
        assert!(schema.stats().errors() > 0);
    }
}
