use crate::silent_logs;
use quarry::{
    Attributes, CompareOp, Condition, ErrorKind, OrderBy, Schema, Value, error_kind, values,
};

pub async fn chaining(schema: &Schema) {
    let items = schema
        .result_set("chain_items")
        .expect("Failed to open chain_items");

    // Setup
    items
        .populate(vec![
            values! { "name" => "kite", "color" => "red", "size" => 3 },
            values! { "name" => "ball", "color" => "red", "size" => 1 },
            values! { "name" => "kite", "color" => "blue", "size" => 5 },
            values! { "name" => "top", "color" => "red", "size" => 4 },
        ])
        .await
        .expect("Failed to populate chain_items");

    // Chained searches nest, they never fold into one map
    let red = Condition::eq("color", "red");
    let big = Condition::compare("size", CompareOp::Greater, 2);
    let kite = Condition::eq("name", "kite");
    let mut chained = items
        .search(red.clone(), Attributes::new())
        .search(big.clone(), Attributes::new())
        .search(kite.clone(), Attributes::new());
    assert_eq!(
        *chained.condition(),
        Condition::And(vec![red.clone(), big, kite])
    );
    assert!(items.condition().is_empty());
    let rows = chained.all().await.expect("Failed to fetch the chained search");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_as::<i64>("size").unwrap(), 3);

    // The same column twice is a conjunction, not an override
    let mut contradiction = items
        .search(red.clone(), Attributes::new())
        .search(Condition::eq("color", "blue"), Attributes::new());
    assert!(matches!(contradiction.condition(), Condition::And(v) if v.len() == 2));
    assert_eq!(contradiction.all().await.unwrap().len(), 0);

    // Literal conditions win in both directions
    let literal = Condition::literal("size % 2 = ?", [Value::from(1)]);
    let replaced = items
        .search(red.clone(), Attributes::new())
        .search(literal.clone(), Attributes::new());
    assert_eq!(*replaced.condition(), literal);
    let kept = replaced.search(Condition::eq("name", "ball"), Attributes::new());
    assert_eq!(*kept.condition(), literal);

    // Attributes are a shallow override
    let mut ordered = items
        .search(
            Condition::Empty,
            Attributes::new().rows(5).order_by([OrderBy::desc("size")]),
        )
        .search(Condition::Empty, Attributes::new().rows(2));
    assert_eq!(ordered.attributes().rows, Some(2));
    assert_eq!(
        ordered.attributes().order_by,
        Some(vec![OrderBy::desc("size")])
    );
    let sizes: Vec<i64> = ordered
        .all()
        .await
        .expect("Failed to fetch the ordered items")
        .iter()
        .map(|r| r.get_as::<i64>("size").unwrap())
        .collect();
    assert_eq!(sizes, [5, 4]);

    // Validation errors, nothing is dispatched
    silent_logs! {
        let queries = schema.stats().queries();
        let error = items.slice(3, 1).expect_err("A reversed slice must fail");
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        let mut unpaged = items.search(red, Attributes::new());
        let error = unpaged.pager().expect_err("An unpaged result set has no pager");
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        let error = Attributes::from_pairs([("rows", Value::from(5)), ("colour", Value::from("red"))])
            .expect_err("Unknown attributes must be rejected");
        assert_eq!(error_kind(&error), Some(ErrorKind::UnknownAttribute));
        let error = schema
            .result_set("no_such_source")
            .expect_err("Unknown sources must be rejected");
        assert_eq!(error_kind(&error), Some(ErrorKind::NoSuchSource));
        assert_eq!(schema.stats().queries(), queries);
    }

    // Slices are offset and rows
    let mut slice = items
        .search(Condition::Empty, Attributes::new().order_by([OrderBy::asc("size")]))
        .slice(1, 2)
        .expect("Failed to slice");
    assert_eq!(slice.attributes().offset, Some(1));
    assert_eq!(slice.attributes().rows, Some(2));
    let names: Vec<String> = slice
        .all()
        .await
        .expect("Failed to fetch the slice")
        .iter()
        .map(|r| r.get_as::<String>("name").unwrap())
        .collect();
    assert_eq!(names, ["kite", "top"]);

    // A slice reaching the end of the key space
    let mut tail = items.slice(2, u64::MAX).expect("Failed to slice up to u64::MAX");
    assert_eq!(tail.attributes().offset, Some(2));
    assert_eq!(tail.attributes().rows, Some(u64::MAX - 1));
    let whole = items.slice(0, u64::MAX).expect("Failed to slice the whole range");
    assert_eq!(whole.attributes().offset, Some(0));
    assert_eq!(whole.attributes().rows, Some(u64::MAX));
    let total = items.count().await.expect("Failed to count the items");
    assert_eq!(
        tail.all().await.expect("Failed to fetch the tail").len() as u64,
        total - 2
    );
}
