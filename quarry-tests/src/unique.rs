use crate::silent_logs;
use quarry::{Attributes, Condition, ErrorKind, Schema, error_kind, values};

pub async fn unique(schema: &Schema) {
    let users = schema.result_set("users").expect("Failed to open users");

    // find_or_create creates once
    let queries = schema.stats().queries();
    let ada = users
        .find_or_create(values! { "email" => "ada@example.com", "name" => "Ada", "logins" => 0 })
        .await
        .expect("Failed to create Ada");
    assert!(ada.in_storage());
    assert_eq!(schema.stats().queries(), queries + 2);
    let again = users
        .find_or_create(values! { "email" => "ada@example.com", "name" => "Someone else" })
        .await
        .expect("Failed to find Ada");
    assert_eq!(schema.stats().queries(), queries + 3);
    assert_eq!(again.get_column("id").unwrap(), ada.get_column("id").unwrap());
    assert_eq!(again.get_as::<String>("name").unwrap(), "Ada");
    assert_eq!(users.count().await.unwrap(), 1);

    // update_or_create converges on one row
    let first = users
        .update_or_create(values! { "me.email" => "bob@example.com", "name" => "A" })
        .await
        .expect("Failed to create Bob");
    let second = users
        .update_or_create(values! { "email" => "bob@example.com", "name" => "B" })
        .await
        .expect("Failed to update Bob");
    assert_eq!(first.get_column("id").unwrap(), second.get_column("id").unwrap());
    assert_eq!(second.get_as::<String>("name").unwrap(), "B");
    assert!(!second.is_dirty());
    let bobs = users.search(Condition::eq("email", "bob@example.com"), Attributes::new());
    assert_eq!(bobs.count().await.unwrap(), 1);
    let stored = bobs.single().await.unwrap().expect("Bob is stored");
    assert_eq!(stored.get_as::<String>("name").unwrap(), "B");

    // The *_or_new variants never store a missing row
    let mut carol = users
        .find_or_new(values! { "email" => "carol@example.com", "name" => "Carol" })
        .await
        .expect("Failed to look Carol up");
    assert!(!carol.in_storage());
    assert!(carol.is_column_changed("email"));
    assert_eq!(users.count().await.unwrap(), 2);
    carol.insert().await.expect("Failed to insert Carol");
    let found = users
        .find_or_new(values! { "email" => "carol@example.com" })
        .await
        .unwrap();
    assert!(found.in_storage());
    assert_eq!(found.get_as::<String>("name").unwrap(), "Carol");
    let dave = users
        .update_or_new(values! { "email" => "dave@example.com", "name" => "Dave" })
        .await
        .unwrap();
    assert!(!dave.in_storage());
    let carol = users
        .update_or_new(values! { "email" => "carol@example.com", "logins" => 3 })
        .await
        .unwrap();
    assert!(carol.in_storage());
    assert!(!carol.is_dirty());
    let stored = users
        .find(Condition::eq("email", "carol@example.com"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.get_as::<i64>("logins").unwrap(), 3);
    assert_eq!(users.count().await.unwrap(), 3);

    // Lookups by a named constraint
    let ada_id = ada.get_as::<i64>("id").unwrap();
    let ada = users
        .search(Condition::Empty, Attributes::new().key("users_email"))
        .update_or_create(values! { "email" => "ada@example.com", "logins" => 1 })
        .await
        .expect("Failed to update Ada by email");
    assert_eq!(ada.get_as::<i64>("id").unwrap(), ada_id);
    assert_eq!(ada.get_as::<i64>("logins").unwrap(), 1);
    let by_primary = users
        .search(Condition::Empty, Attributes::new().key("primary"))
        .find_or_new(values! { "id" => ada_id, "email" => "other@example.com" })
        .await
        .unwrap();
    assert!(by_primary.in_storage());
    assert_eq!(by_primary.get_as::<String>("email").unwrap(), "ada@example.com");
    silent_logs! {
        let error = users
            .search(Condition::Empty, Attributes::new().key("users_name"))
            .find_or_create(values! { "name" => "Ada" })
            .await
            .expect_err("There is no users_name constraint");
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
    }

    // A conflict on another constraint leaves nothing to recover
    silent_logs! {
        let retries = schema.stats().snapshot().retries;
        let error = users
            .find_or_create(values! { "id" => ada_id + 500, "email" => "ada@example.com" })
            .await
            .expect_err("The email is taken by another id");
        assert_eq!(error_kind(&error), Some(ErrorKind::MissingAfterConflict));
        assert_eq!(schema.stats().snapshot().retries, retries + 1);
    }
    assert_eq!(users.count().await.unwrap(), 3);

    // Composite keys
    let memberships = schema
        .result_set("memberships")
        .expect("Failed to open memberships");
    let data = values! { "user_id" => 3, "team" => "green", "role" => "owner" };
    let created = memberships.find_or_create(data.clone()).await.unwrap();
    let found = memberships.find_or_create(data).await.unwrap();
    assert_eq!(created, found);
    assert_eq!(
        memberships
            .count_where(Condition::eq("user_id", 3), Attributes::new())
            .await
            .unwrap(),
        1
    );
}
