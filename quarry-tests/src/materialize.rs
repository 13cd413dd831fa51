use quarry::{
    Attributes, Condition, OrderBy, ResultClass, Row, RowCapabilities, Schema, Seed,
    stream::TryStreamExt, values,
};

#[derive(ResultClass)]
struct Reading {
    row: Row,
    label: String,
}

impl Reading {
    fn value(&self) -> i64 {
        self.row.get_as("value").expect("Reading without a value")
    }

    fn describe(&mut self) -> &str {
        if self.label.is_empty() {
            self.label = format!(
                "{}={}",
                self.row.get_as::<String>("sensor").unwrap_or_default(),
                self.value()
            );
        }
        &self.label
    }
}

pub async fn materialize(schema: &Schema) {
    let readings = schema
        .result_set("readings")
        .expect("Failed to open readings");
    readings
        .populate(vec![
            values! { "sensor" => "north", "value" => 10 },
            values! { "sensor" => "south", "value" => 20 },
            values! { "sensor" => "east", "value" => 30 },
        ])
        .await
        .expect("Failed to populate readings");
    let ordered = readings.search(
        Condition::Empty,
        Attributes::new().order_by([OrderBy::asc("value")]),
    );

    // Dispatched once, then served from the buffer
    let mut rs = ordered.clone();
    assert!(!rs.is_materialized());
    let queries = schema.stats().queries();
    let first = rs.all().await.expect("Failed to fetch the readings").as_ptr();
    let second = rs.all().await.expect("Failed to fetch the readings").as_ptr();
    assert_eq!(first, second);
    assert_eq!(schema.stats().queries(), queries + 1);
    assert!(rs.is_materialized());

    // The cursor shares the buffer
    let mut values = Vec::new();
    while let Some(row) = rs.next().await.expect("Failed to advance") {
        values.push(row.get_as::<i64>("value").unwrap());
    }
    assert_eq!(values, [10, 20, 30]);
    assert!(rs.next().await.unwrap().is_none());
    rs.reset();
    assert_eq!(rs.cursor_position(), 0);
    let row = rs.next().await.unwrap().expect("A row after reset");
    assert_eq!(row.get_as::<String>("sensor").unwrap(), "north");
    assert_eq!(schema.stats().queries(), queries + 1);

    // Iterating a fresh result set materializes it
    let mut fresh = ordered.clone();
    fresh.next().await.expect("Failed to advance").expect("A first row");
    assert_eq!(fresh.cursor_position(), 1);
    assert!(fresh.is_materialized());
    assert_eq!(schema.stats().queries(), queries + 2);

    // single on a materialized result set stays local
    let single = rs
        .single()
        .await
        .expect("Failed to get the single reading")
        .expect("A buffered reading");
    assert_eq!(single.get_as::<i64>("value").unwrap(), 10);
    assert_eq!(schema.stats().queries(), queries + 2);
    let first = ordered
        .first()
        .await
        .expect("Failed to get the first reading")
        .expect("A first reading");
    assert_eq!(first.get_as::<String>("sensor").unwrap(), "north");
    assert_eq!(schema.stats().queries(), queries + 3);

    // Seeded rows are served without dispatching
    let mut seeded = readings.search(Condition::eq("sensor", "nowhere"), Attributes::new());
    seeded.set_cache([
        values! { "id" => 100, "sensor" => "west", "value" => 40 },
        values! { "id" => 101, "sensor" => "up", "value" => 50 },
    ]);
    assert!(seeded.is_prefetched());
    assert_eq!(seeded.get_cache().map(<[_]>::len), Some(2));
    assert!(matches!(seeded.get_cache().unwrap()[0], Seed::Raw(..)));
    let rows = seeded.all().await.expect("Failed to read the seeded rows");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(Row::in_storage));
    assert_eq!(rows[1].get_as::<String>("sensor").unwrap(), "up");
    assert_eq!(schema.stats().queries(), queries + 3);
    seeded.clear_cache();
    assert!(!seeded.is_prefetched());
    assert!(seeded.all().await.unwrap().is_empty());
    assert_eq!(schema.stats().queries(), queries + 4);

    // Domain types compose the row
    let mut typed = ordered.result_class::<Reading>();
    let rows = typed.all_mut().await.expect("Failed to fetch the typed readings");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].describe(), "east=30");
    assert!(rows[2].in_storage());
    let mut south = typed
        .find(Condition::eq("sensor", "south"))
        .await
        .expect("Failed to find the south reading")
        .expect("The south reading exists");
    assert_eq!(south.value(), 20);
    RowCapabilities::set_column(&mut south, "value", 25).expect("Failed to set the value");
    assert!(south.is_dirty());
    RowCapabilities::update(&mut south, None)
        .await
        .expect("Failed to update the south reading");
    assert!(!south.is_dirty());
    let stored = readings
        .find(south.row().get_column("id").unwrap().clone())
        .await
        .unwrap()
        .expect("The south reading is still stored");
    assert_eq!(stored.get_as::<i64>("value").unwrap(), 25);

    // Objects seed as they are
    let mut objects = readings.result_class::<Reading>();
    objects.set_cache([south]);
    assert!(matches!(objects.get_cache().unwrap()[0], Seed::Object(..)));
    let queries = schema.stats().queries();
    let all = objects.into_all().await.expect("Failed to read the seeded objects");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].value(), 25);
    assert_eq!(schema.stats().queries(), queries);

    // Streaming
    let sensors: Vec<String> = ordered
        .clone()
        .into_stream()
        .map_ok(|row| row.get_as::<String>("sensor").unwrap())
        .try_collect()
        .await
        .expect("Failed to stream the readings");
    assert_eq!(sensors, ["north", "south", "east"]);
}
