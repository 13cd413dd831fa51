#[cfg(test)]
mod tests {
    use quarry::{
        Attributes, Condition, ErrorKind, ResultClass, Row, RowCapabilities, Schema, Seed,
        error_kind, values,
    };
    use quarry_memory::MemoryChannel;
    use quarry_tests::{init_logs, schema_def};
    use std::sync::Arc;

    #[derive(ResultClass)]
    struct User {
        row: Row,
        greeted: bool,
    }

    impl User {
        fn greet(&mut self) -> String {
            self.greeted = true;
            format!("Hello {}", self.row.get_as::<String>("name").unwrap_or_default())
        }
    }

    #[derive(ResultClass)]
    struct Tagged<T: Default + Send + Sync> {
        #[row]
        stored: Row,
        backup: Option<Row>,
        tag: T,
    }

    fn schema() -> (Schema, Arc<MemoryChannel>) {
        init_logs();
        let metadata = Arc::new(schema_def());
        let channel = Arc::new(MemoryChannel::new(metadata.clone()));
        (Schema::new(metadata, channel.clone()), channel)
    }

    #[tokio::test]
    async fn derived_types() {
        let (schema, _) = schema();
        let users = schema.result_set("users").unwrap();
        users
            .populate(vec![
                values! { "email" => "ada@example.com", "name" => "Ada" },
                values! { "email" => "bob@example.com", "name" => "Bob" },
            ])
            .await
            .unwrap();

        let mut typed = users
            .search(Condition::eq("name", "Ada"), Attributes::new())
            .result_class::<User>();
        let ada = typed.next().await.unwrap().expect("Ada is stored");
        assert!(!ada.greeted);
        assert_eq!(ada.greet(), "Hello Ada");
        assert!(ada.greeted);
        ada.set_column("name", "Ada L.").unwrap();
        assert!(ada.is_dirty());
        ada.update(None).await.unwrap();
        assert!(!ada.is_dirty());
        let stored = users
            .find(Condition::eq("email", "ada@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_as::<String>("name").unwrap(), "Ada L.");

        let tagged = users
            .result_class::<Tagged<u32>>()
            .find(Condition::eq("name", "Bob"))
            .await
            .unwrap()
            .expect("Bob is stored");
        assert_eq!(tagged.tag, 0);
        assert!(tagged.backup.is_none());
        assert_eq!(tagged.row().get_as::<String>("email").unwrap(), "bob@example.com");
        let row: Row = tagged.into_row();
        assert!(row.in_storage());
    }

    #[tokio::test]
    async fn single_rebuilds_from_the_row() {
        let (schema, _) = schema();
        let users = schema.result_set("users").unwrap();
        users
            .create(values! { "email" => "dan@example.com", "name" => "Dan" })
            .await
            .unwrap();
        let mut typed = users
            .search(Condition::eq("name", "Dan"), Attributes::new())
            .result_class::<User>();
        let buffered = typed.all_mut().await.unwrap();
        assert_eq!(buffered[0].greet(), "Hello Dan");
        buffered[0].set_column("name", "Daniel").unwrap();

        // Row data comes from the buffer, the other fields are rebuilt
        let single = typed.single().await.unwrap().expect("Dan is buffered");
        assert_eq!(single.row().get_as::<String>("name").unwrap(), "Daniel");
        assert!(single.is_dirty());
        assert!(!single.greeted);
        assert!(typed.all_mut().await.unwrap()[0].greeted);
    }

    #[tokio::test]
    async fn seeded_objects() {
        let (schema, channel) = schema();
        let users = schema.result_set("users").unwrap().result_class::<User>();
        let carol = users
            .new_result(values! { "email" => "carol@example.com", "name" => "Carol" })
            .unwrap();
        assert!(!carol.in_storage());
        let mut seeded = users.search(Condition::Empty, Attributes::new());
        seeded.set_cache([carol]);
        assert!(matches!(seeded.get_cache(), Some([Seed::Object(..)])));
        let all = seeded.all_mut().await.unwrap();
        assert_eq!(all.len(), 1);
        all[0].insert().await.expect("Failed to insert Carol");
        assert!(all[0].in_storage());
        assert_eq!(channel.rows("users").await.len(), 1);
        let e = all[0]
            .set_column("nickname", "C")
            .expect_err("Users have no nickname");
        assert_eq!(error_kind(&e), Some(ErrorKind::NoSuchAccessor));
    }
}
