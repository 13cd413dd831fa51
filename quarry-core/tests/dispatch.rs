#[cfg(test)]
mod tests {
    use quarry_core::{
        Aggregate, Attributes, Condition, Config, DispatchChannel, Error, ErrorKind, Operation,
        OrderBy, Payload, QueryResult, Related, Result, Row, Schema, SchemaDef, SourceDef, Value,
        error, error_kind,
        future::{BoxFuture, FutureExt},
        values,
    };
    use std::sync::{Arc, Mutex};

    type Handler = Box<dyn Fn(&Operation, &Payload) -> Result<QueryResult> + Send + Sync>;

    /// Answers every operation through `handler` and remembers what it was asked.
    struct Scripted {
        handler: Handler,
        calls: Mutex<Vec<(Operation, Payload)>>,
    }

    impl Scripted {
        fn new(
            handler: impl Fn(&Operation, &Payload) -> Result<QueryResult> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Operation, Payload)> {
            self.calls.lock().unwrap().clone()
        }

        fn last(&self) -> (Operation, Payload) {
            self.calls().pop().expect("Nothing was dispatched")
        }
    }

    impl DispatchChannel for Scripted {
        fn execute(
            &self,
            operation: Operation,
            payload: Payload,
        ) -> BoxFuture<'_, Result<QueryResult>> {
            let result = (self.handler)(&operation, &payload);
            self.calls.lock().unwrap().push((operation, payload));
            async move { result }.boxed()
        }
    }

    fn metadata() -> Arc<SchemaDef> {
        Arc::new(
            SchemaDef::new()
                .with_source(
                    SourceDef::new("users")
                        .columns(["id", "email", "name"])
                        .primary_key(["id"])
                        .unique("users_email", ["email"]),
                )
                .with_source(
                    SourceDef::new("artists")
                        .columns(["id", "name"])
                        .primary_key(["id"])
                        .has_many("albums", "albums", "artist_id", "id"),
                )
                .with_source(
                    SourceDef::new("albums")
                        .columns(["id", "artist_id", "title"])
                        .primary_key(["id"])
                        .belongs_to("artist", "artists", "artist_id", "id"),
                ),
        )
    }

    fn schema(channel: Arc<Scripted>, config: Config) -> Schema {
        Schema::builder()
            .metadata(metadata())
            .channel(channel)
            .config(config)
            .build()
            .expect("Failed to build the schema")
    }

    fn users_search(condition: Condition) -> Payload {
        Payload::new("users", condition, Attributes::new())
    }

    #[tokio::test]
    async fn untagged_errors_are_classified() {
        let channel = Scripted::new(|operation, _| match operation {
            Operation::Create => Err(Error::msg(
                "duplicate key value violates unique constraint \"users_email\"",
            )),
            Operation::Delete => Err(error(ErrorKind::RowVanished, "Already gone")),
            _ => Err(Error::msg("connection reset by peer")),
        });
        let schema = schema(channel.clone(), Config::default());
        let users = schema.result_set("users").unwrap();

        let e = users
            .create(values! { "email" => "ada@example.com" })
            .await
            .expect_err("The channel rejects the create");
        assert_eq!(error_kind(&e), Some(ErrorKind::UniqueViolation));
        let message = format!("{e:#}");
        assert!(message.contains("While dispatching create on `users`"));
        assert!(message.contains("duplicate key value"));

        let e = users.count().await.expect_err("The channel is down");
        assert_eq!(error_kind(&e), Some(ErrorKind::Database));

        let e = schema
            .dispatcher()
            .dispatch(Operation::Delete, users_search(Condition::Empty))
            .await
            .expect_err("Tagged errors pass through");
        assert_eq!(error_kind(&e), Some(ErrorKind::RowVanished));

        let snapshot = schema.stats().snapshot();
        assert_eq!(snapshot.queries, 3);
        assert_eq!(snapshot.errors, 3);
        assert_eq!(channel.calls().len(), 3);
    }

    #[tokio::test]
    async fn cache_capacity_and_invalidation() {
        let channel = Scripted::new(|operation, _| {
            Ok(match operation {
                Operation::Search => QueryResult::Rows(Vec::new()),
                _ => QueryResult::Affected(0),
            })
        });
        let schema = schema(
            channel.clone(),
            Config {
                cache: true,
                cache_capacity: 1,
                ..Default::default()
            },
        );
        let dispatcher = schema.dispatcher();
        let a = users_search(Condition::eq("id", 1));
        let b = users_search(Condition::eq("id", 2));
        for payload in [&a, &b, &a, &a] {
            dispatcher
                .dispatch(Operation::Search, payload.clone())
                .await
                .unwrap();
        }
        assert_eq!(channel.calls().len(), 3);
        assert_eq!(schema.stats().snapshot().cache_hits, 1);

        // Writes never go through the cache and drop the reads of their source
        dispatcher
            .dispatch(Operation::Update, a.clone().with_data(values! { "name" => "x" }))
            .await
            .unwrap();
        dispatcher.dispatch(Operation::Search, a).await.unwrap();
        let operations: Vec<Operation> = channel.calls().into_iter().map(|(o, _)| o).collect();
        assert_eq!(
            operations,
            [
                Operation::Search,
                Operation::Search,
                Operation::Search,
                Operation::Update,
                Operation::Search,
            ]
        );
        assert_eq!(schema.stats().snapshot().cache_hits, 1);
    }

    #[test]
    fn payload_rendering() {
        let payload = Payload::new("users", Condition::eq("id", 1), Attributes::new())
            .with_data(values! { "name" => "Ada" });
        assert_eq!(payload.to_string(), "users WHERE id = 1 DATA {name: 'Ada'}");
        let long = users_search(Condition::is_in("id", 0..300i64)).to_string();
        assert_eq!(long.chars().count(), 500);
        assert!(long.starts_with("users WHERE id IN (0, 1, 2"));
        assert!(long.ends_with("..."));
        assert_ne!(
            a_key(&Operation::Search),
            a_key(&Operation::Count),
            "Operations are part of the cache key"
        );
    }

    fn a_key(operation: &Operation) -> String {
        users_search(Condition::eq("id", 1)).cache_key(operation)
    }

    #[test]
    fn operations_and_results() {
        assert!(Operation::Search.is_read());
        assert!(Operation::Aggregate(Aggregate::Max).is_read());
        assert!(!Operation::Populate.is_read());
        assert_eq!(Operation::Aggregate(Aggregate::Avg).name(), "avg");
        assert_eq!(
            Operation::Aggregate(Aggregate::Func("median".into())).to_string(),
            "median"
        );
        let row = values! { "id" => 1 };
        assert_eq!(QueryResult::Rows(vec![row.clone(), row.clone()]).count(), 2);
        assert_eq!(QueryResult::Row(None).count(), 0);
        assert_eq!(QueryResult::Affected(4).count(), 4);
        assert_eq!(QueryResult::Value(Value::from(-3)).count(), 0);
        assert_eq!(QueryResult::Row(Some(row.clone())).into_rows(), [row]);
        assert!(QueryResult::Count(9).into_rows().is_empty());
    }

    #[tokio::test]
    async fn flattened_prefetch() {
        let channel = Scripted::new(|_, _| {
            Ok(QueryResult::Rows(vec![
                values! {
                    "id" => 1, "title" => "Court", "artist_id" => 7,
                    "artist.id" => 7, "artist.name" => "Joni",
                },
                values! {
                    "id" => 2, "title" => "Orphan", "artist_id" => Value::Null,
                    "artist.id" => Value::Null, "artist.name" => Value::Null,
                },
            ]))
        });
        let schema = schema(channel.clone(), Config::default());
        let mut albums = schema
            .result_set("albums")
            .unwrap()
            .search(
                Condition::Empty,
                Attributes::new().order_by([OrderBy::asc("id")]),
            )
            .prefetch(["artist"]);
        assert_eq!(
            albums.payload().attributes.prefetch,
            Some(vec!["artist".to_string()])
        );
        let rows = albums.all_mut().await.expect("Failed to hydrate the albums");
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].data().contains_key("artist.name"));
        let Some(Related::Row(Some(artist))) = rows[0].prefetched("artist") else {
            panic!("The artist of Court is prefetched");
        };
        assert_eq!(artist.source(), "artists");
        assert!(artist.in_storage());
        assert_eq!(artist.get_as::<String>("name").unwrap(), "Joni");
        assert!(matches!(
            rows[1].prefetched("artist"),
            Some(Related::Row(None))
        ));
        let artist = rows[0].related_row("artist").await.unwrap().unwrap();
        assert_eq!(artist.ident().unwrap(), values! { "id" => 7 });
        assert_eq!(channel.calls().len(), 1);
    }

    #[tokio::test]
    async fn nested_prefetch_must_be_a_map() {
        let channel = Scripted::new(|_, _| {
            Ok(QueryResult::Rows(vec![
                values! { "id" => 1, "artist_id" => 7, "artist" => 7 },
            ]))
        });
        let schema = schema(channel, Config::default());
        let mut albums = schema.result_set("albums").unwrap().prefetch(["artist"]);
        let e = albums.all().await.expect_err("A number is not a row");
        assert_eq!(error_kind(&e), Some(ErrorKind::Validation));
        assert!(!albums.is_materialized());
    }

    #[tokio::test]
    async fn primary_key_changes() {
        let channel = Scripted::new(|operation, _| {
            Ok(match operation {
                Operation::Search => {
                    QueryResult::Rows(vec![values! { "id" => 1, "name" => "Ada" }])
                }
                _ => QueryResult::Affected(1),
            })
        });
        let schema = schema(channel.clone(), Config::default());
        let users = schema.result_set("users").unwrap();
        let mut row = users.find(1).await.unwrap().expect("Ada is stored");
        let (operation, payload) = channel.last();
        assert_eq!(operation, Operation::Search);
        assert_eq!(payload.condition, Condition::eq("id", 1));
        assert_eq!(payload.attributes.rows, Some(1));

        // The update still targets the stored key
        row.set_column("id", 5).unwrap();
        assert_eq!(row.ident().unwrap(), values! { "id" => 1 });
        row.update(None).await.unwrap();
        let (operation, payload) = channel.last();
        assert_eq!(operation, Operation::Update);
        assert_eq!(payload.condition, Condition::eq("id", 1));
        assert_eq!(payload.data, Some(values! { "id" => 5 }));
        assert_eq!(row.ident().unwrap(), values! { "id" => 5 });
        assert!(!row.is_dirty());

        assert_eq!(row.delete().await.unwrap(), 1);
        let (operation, payload) = channel.last();
        assert_eq!(operation, Operation::Delete);
        assert_eq!(payload.condition, Condition::eq("id", 5));
    }

    #[tokio::test]
    async fn column_payloads() {
        let channel = Scripted::new(|operation, _| {
            Ok(match operation {
                Operation::Aggregate(Aggregate::Count) => QueryResult::Count(3),
                _ => QueryResult::Value(Value::from(42)),
            })
        });
        let schema = schema(channel.clone(), Config::default());
        let users = schema.result_set("users").unwrap();

        let ordered = users.search(
            Condition::Empty,
            Attributes::new().order_by([OrderBy::asc("name")]),
        );
        assert_eq!(ordered.get_column("id").sum().await.unwrap(), Value::from(42));
        let (operation, payload) = channel.last();
        assert_eq!(operation, Operation::Aggregate(Aggregate::Sum));
        assert_eq!(payload.attributes.select, Some(vec!["id".to_string()]));
        assert_eq!(payload.attributes.order_by, None);
        assert!(!payload.attributes.is_subquery);

        let bounded = ordered.search(Condition::Empty, Attributes::new().rows(2).page(2));
        assert_eq!(bounded.get_column("id").count().await.unwrap(), 3);
        let (_, payload) = channel.last();
        assert!(payload.attributes.is_subquery);
        assert_eq!(payload.attributes.alias.as_deref(), Some("subquery_for_column"));
        assert_eq!(payload.attributes.rows, Some(2));
        assert_eq!(payload.attributes.offset, Some(2));
        assert_eq!(payload.attributes.page, None);
        assert!(payload.attributes.order_by.is_some());

        let column = users.get_column("id");
        assert_eq!(column.name(), "id");
        assert_eq!(column.func("max").await.unwrap(), Value::from(42));
        let calls = channel.calls().len();
        let e = column
            .func("max(id); --")
            .await
            .expect_err("Not a function name");
        assert_eq!(error_kind(&e), Some(ErrorKind::Validation));
        assert_eq!(channel.calls().len(), calls);
    }

    #[tokio::test]
    async fn schema_entry_points() {
        let channel = Scripted::new(|_, _| Ok(QueryResult::Rows(Vec::new())));
        let schema = schema(channel.clone(), Config::default());
        let e = schema.result_set("songs").unwrap_err();
        assert_eq!(error_kind(&e), Some(ErrorKind::NoSuchSource));
        let e = Row::new(schema.clone(), "songs", values! {}).unwrap_err();
        assert_eq!(error_kind(&e), Some(ErrorKind::NoSuchSource));
        let row = Row::new(
            schema.clone(),
            "users",
            values! { "me.email" => "ada@example.com", "name" => "Ada" },
        )
        .unwrap();
        assert!(!row.in_storage());
        assert!(row.is_column_changed("email"));
        assert!(row.is_column_changed("name"));
        assert!(row.get_column("id").unwrap().is_null());
        let e = Schema::builder()
            .channel(channel)
            .build()
            .expect_err("Metadata is required");
        assert_eq!(error_kind(&e), Some(ErrorKind::Validation));
        assert!(format!("{schema:?}").starts_with("Schema"));
    }
}
