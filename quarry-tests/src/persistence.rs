use crate::silent_logs;
use quarry::{
    Attributes, Condition, ErrorKind, OrderBy, Schema, Value, error_kind, values,
};

fn tags(tags: &[&'static str]) -> Value {
    Value::List(tags.iter().map(|t| Value::from(*t)).collect())
}

pub async fn persistence(schema: &Schema) {
    let tasks = schema.result_set("tasks").expect("Failed to open tasks");

    // Create through a result set: aliases stripped, equalities seeded
    let pending = tasks.search(Condition::eq("me.done", false), Attributes::new());
    let write = pending
        .create(values! { "me.title" => "write", "priority" => 2 })
        .await
        .expect("Failed to create the task");
    assert!(write.in_storage());
    assert!(!write.is_dirty());
    assert_eq!(write.get_as::<String>("title").unwrap(), "write");
    assert!(!write.get_as::<bool>("done").unwrap());
    let id: i64 = write.get_as("id").expect("The created task has an id");

    // Structured values go through the deflator
    let albums = schema.result_set("albums").expect("Failed to open albums");
    let album = albums
        .create(values! { "title" => "Blue", "year" => 1971, "tags" => tags(&["folk", "live"]) })
        .await
        .expect("Failed to create the album");
    assert_eq!(*album.get_column("tags").unwrap(), Value::from("folk,live"));
    assert_eq!(album.get_inflated("tags").unwrap(), tags(&["folk", "live"]));
    let stored = albums
        .find(album.get_column("id").unwrap().clone())
        .await
        .unwrap()
        .expect("The album is stored");
    assert_eq!(stored.get_inflated("tags").unwrap(), tags(&["folk", "live"]));
    assert_eq!(stored.get_column("artist_id").unwrap(), &Value::Null);

    // Lookups
    let found = tasks
        .find(id)
        .await
        .expect("Failed to find the task")
        .expect("The task exists");
    assert_eq!(found, write);
    let found = tasks
        .find(Condition::eq("title", "write"))
        .await
        .unwrap()
        .expect("The task is found by title");
    assert_eq!(found.get_as::<i64>("id").unwrap(), id);
    assert!(tasks.find(id + 1000).await.unwrap().is_none());
    let queries = schema.stats().queries();
    assert!(tasks.find(None::<i64>).await.unwrap().is_none());
    assert_eq!(schema.stats().queries(), queries);

    // Row updates send the dirty columns only
    let mut row = found;
    row.set_column("title", "rewrite").unwrap();
    row.set_column("priority", 2).unwrap();
    assert!(row.is_column_changed("title"));
    assert!(!row.is_column_changed("priority"));
    assert_eq!(row.dirty_columns(), values! { "title" => "rewrite" });
    row.update(None).await.expect("Failed to update the task");
    assert!(!row.is_dirty());
    let queries = schema.stats().queries();
    row.update(None).await.expect("A clean update is a no op");
    assert_eq!(schema.stats().queries(), queries);
    row.update(Some(values! { "priority" => 5 }))
        .await
        .expect("Failed to update the priority");
    let stored = tasks.find(id).await.unwrap().unwrap();
    assert_eq!(stored.get_as::<String>("title").unwrap(), "rewrite");
    assert_eq!(stored.get_as::<i64>("priority").unwrap(), 5);

    // Discard local changes
    row.set_column("title", "scratch").unwrap();
    row.discard_changes().await.expect("Failed to discard the changes");
    assert_eq!(row.get_as::<String>("title").unwrap(), "rewrite");
    assert!(!row.is_dirty());

    // Unsaved rows
    let mut later = tasks
        .new_result(values! { "title" => "later", "done" => false })
        .expect("Failed to build the task");
    assert!(!later.in_storage());
    assert!(later.is_column_changed("title"));
    assert!(later.get_column("id").unwrap().is_null());
    silent_logs! {
        let error = later
            .update(Some(values! { "priority" => 1 }))
            .await
            .expect_err("A row not in storage cannot be updated");
        assert_eq!(error_kind(&error), Some(ErrorKind::NotInStorage));
    }
    assert_eq!(later.delete().await.unwrap(), 0);
    later.insert().await.expect("Failed to insert the task");
    assert!(later.in_storage());
    assert!(!later.is_dirty());
    assert!(later.get_as::<i64>("id").unwrap() > id);

    // Accessors
    silent_logs! {
        let error = row.set_column("colour", "red").expect_err("Unknown columns are rejected");
        assert_eq!(error_kind(&error), Some(ErrorKind::NoSuchAccessor));
        let error = row.get_column("colour").expect_err("Unknown columns are rejected");
        assert_eq!(error_kind(&error), Some(ErrorKind::NoSuchAccessor));
        let queries = schema.stats().queries();
        let error = tasks
            .create(values! { "title" => tags(&["not", "scalar"]) })
            .await
            .expect_err("Structured values without a deflator are rejected");
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        assert_eq!(schema.stats().queries(), queries);
    }

    // Deletes
    let mut doomed = tasks
        .create(values! { "title" => "doomed", "done" => false })
        .await
        .unwrap();
    assert_eq!(doomed.delete().await.expect("Failed to delete the task"), 1);
    assert!(!doomed.in_storage());
    assert_eq!(doomed.delete().await.unwrap(), 0);
    silent_logs! {
        let error = doomed
            .discard_changes()
            .await
            .expect_err("The task is gone");
        assert_eq!(error_kind(&error), Some(ErrorKind::RowVanished));
    }

    // Bulk insert
    let created = tasks
        .populate(vec![
            values! { "title" => "a", "done" => false, "priority" => 1 },
            values! { "title" => "b", "done" => false, "priority" => 1 },
            values! { "title" => "c", "done" => true, "priority" => 3 },
        ])
        .await
        .expect("Failed to populate the tasks");
    assert_eq!(created.len(), 3);
    assert!(created.iter().all(|r| r.in_storage() && !r.get_column("id").unwrap().is_null()));
    assert!(tasks.populate(Vec::new()).await.unwrap().is_empty());

    // Unbounded updates and deletes dispatch the condition as is
    let queries = schema.stats().queries();
    let mut low = tasks.search(Condition::eq("priority", 1), Attributes::new());
    assert_eq!(low.update(values! { "me.priority" => 2 }).await.unwrap(), 2);
    assert_eq!(schema.stats().queries(), queries + 1);
    assert!(!low.is_materialized());
    assert_eq!(
        tasks
            .update_where(values! { "done" => true }, Condition::eq("title", "a"))
            .await
            .unwrap(),
        1
    );
    silent_logs! {
        let error = low.update(values! {}).await.expect_err("Nothing to update");
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
    }

    // Row by row
    let mut open = tasks.search(
        Condition::eq("done", false),
        Attributes::new().order_by([OrderBy::asc("id")]),
    );
    let open_count = open.count().await.unwrap();
    assert_eq!(
        open.update_all(values! { "priority" => 9 }).await.unwrap(),
        open_count
    );
    assert!(open.all().await.unwrap().iter().all(|r| {
        r.get_as::<i64>("priority").unwrap() == 9 && !r.is_dirty()
    }));
    assert_eq!(
        tasks
            .count_where(Condition::eq("priority", 9), Attributes::new())
            .await
            .unwrap(),
        open_count
    );
    let mut finished = tasks.search(Condition::eq("done", true), Attributes::new());
    let finished_count = finished.count().await.unwrap();
    assert_eq!(finished.delete_all().await.unwrap(), finished_count);
    assert!(finished.all().await.unwrap().iter().all(|r| !r.in_storage()));
    assert_eq!(
        tasks
            .count_where(Condition::eq("done", true), Attributes::new())
            .await
            .unwrap(),
        0
    );
    let mut everything = tasks.search(Condition::Empty, Attributes::new());
    everything.delete().await.expect("Failed to delete the tasks");
    assert_eq!(tasks.count().await.unwrap(), 0);
}

pub async fn bounded_writes(schema: &Schema) {
    let tasks = schema.result_set("tasks").expect("Failed to open tasks");
    tasks
        .populate(vec![
            values! { "title" => "batch", "done" => false, "priority" => 1 },
            values! { "title" => "batch", "done" => false, "priority" => 2 },
            values! { "title" => "batch", "done" => false, "priority" => 3 },
        ])
        .await
        .expect("Failed to populate the batch");
    let batch = tasks.search(
        Condition::eq("title", "batch"),
        Attributes::new().order_by([OrderBy::asc("priority")]),
    );

    // A bounded update targets the rows the selection returned
    let mut first = batch.search(Condition::Empty, Attributes::new().rows(1));
    let buffered = first.all().await.expect("Failed to fetch the first task");
    assert_eq!(buffered.len(), 1);
    assert_eq!(buffered[0].get_as::<i64>("priority").unwrap(), 1);
    tasks
        .create(values! { "title" => "batch", "done" => false, "priority" => 0 })
        .await
        .expect("Failed to create the task");
    assert_eq!(first.update(values! { "done" => true }).await.unwrap(), 1);
    let done: Vec<i64> = tasks
        .search(
            Condition::eq("done", true),
            Attributes::new().order_by([OrderBy::asc("priority")]),
        )
        .into_all()
        .await
        .unwrap()
        .iter()
        .map(|r| r.get_as("priority").unwrap())
        .collect();
    assert_eq!(done, [1]);

    // Never more rows than the selection holds
    let mut two = batch.search(Condition::Empty, Attributes::new().rows(2));
    assert_eq!(two.delete().await.unwrap(), 2);
    assert!(two.all().await.unwrap().iter().all(|r| !r.in_storage()));
    let left: Vec<i64> = batch
        .clone()
        .into_all()
        .await
        .unwrap()
        .iter()
        .map(|r| r.get_as("priority").unwrap())
        .collect();
    assert_eq!(left, [2, 3]);

    // Composite primary keys are pinned column by column
    let memberships = schema
        .result_set("memberships")
        .expect("Failed to open memberships");
    memberships
        .populate(vec![
            values! { "user_id" => 1, "team" => "red", "role" => "member" },
            values! { "user_id" => 1, "team" => "blue", "role" => "member" },
            values! { "user_id" => 2, "team" => "red", "role" => "member" },
        ])
        .await
        .expect("Failed to populate memberships");
    let mut first_user = memberships.search(Condition::eq("user_id", 1), Attributes::new().rows(5));
    assert_eq!(
        first_user
            .update(values! { "role" => "admin" })
            .await
            .unwrap(),
        2
    );
    let roles: Vec<(i64, String)> = memberships
        .search(
            Condition::Empty,
            Attributes::new().order_by([OrderBy::asc("user_id"), OrderBy::asc("team")]),
        )
        .into_all()
        .await
        .unwrap()
        .iter()
        .map(|r| (r.get_as("user_id").unwrap(), r.get_as("role").unwrap()))
        .collect();
    assert_eq!(
        roles,
        [
            (1, "admin".to_string()),
            (1, "admin".to_string()),
            (2, "member".to_string()),
        ]
    );
    silent_logs! {
        let error = memberships.find(1).await.expect_err("Composite keys need a condition");
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
    }
    let membership = memberships
        .find(Condition::Eq(values! { "user_id" => 2, "team" => "red" }))
        .await
        .unwrap()
        .expect("The membership exists");
    assert_eq!(membership.ident().unwrap(), values! { "team" => "red", "user_id" => 2 });

    // Empty bounded selections dispatch their search only
    let mut nothing = tasks.search(Condition::eq("title", "nothing"), Attributes::new().rows(3));
    let queries = schema.stats().queries();
    assert_eq!(nothing.delete().await.unwrap(), 0);
    assert_eq!(nothing.update(values! { "done" => true }).await.unwrap(), 0);
    assert_eq!(nothing.delete_all().await.unwrap(), 0);
    assert_eq!(schema.stats().queries(), queries + 1);
}
