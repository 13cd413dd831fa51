use quarry::{Inflator, Result, SchemaDef, SourceDef, Value};

/// Comma separated list stored in a single column.
fn tags_inflator() -> Inflator {
    Inflator::new(
        |stored: Value| {
            Ok(match stored {
                Value::Varchar(v) if v.is_empty() => Value::List(Vec::new()),
                Value::Varchar(v) => {
                    Value::List(v.split(',').map(|t| Value::Varchar(t.into())).collect())
                }
                other => other,
            })
        },
        |value: Value| -> Result<Value> {
            Ok(match value {
                Value::List(tags) => Value::Varchar(
                    tags.iter()
                        .filter_map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(","),
                ),
                other => other,
            })
        },
    )
}

/// Metadata of every source the suite works on.
pub fn schema_def() -> SchemaDef {
    SchemaDef::new()
        .with_source(
            SourceDef::new("chain_items")
                .columns(["id", "name", "color", "size"])
                .primary_key(["id"]),
        )
        .with_source(
            SourceDef::new("readings")
                .columns(["id", "sensor", "value"])
                .primary_key(["id"]),
        )
        .with_source(
            SourceDef::new("artists")
                .columns(["id", "name", "email"])
                .primary_key(["id"])
                .unique("artists_email", ["email"])
                .has_many("albums", "albums", "artist_id", "id")
                .might_have("profile", "profiles", "artist_id", "id"),
        )
        .with_source(
            SourceDef::new("albums")
                .columns(["id", "artist_id", "title", "year", "tags"])
                .primary_key(["id"])
                .belongs_to("artist", "artists", "artist_id", "id")
                .inflate("tags", tags_inflator()),
        )
        .with_source(
            SourceDef::new("profiles")
                .columns(["id", "artist_id", "bio"])
                .primary_key(["id"])
                .belongs_to("artist", "artists", "artist_id", "id"),
        )
        .with_source(
            SourceDef::new("users")
                .columns(["id", "email", "name", "logins"])
                .primary_key(["id"])
                .unique("users_email", ["email"]),
        )
        .with_source(
            SourceDef::new("memberships")
                .columns(["user_id", "team", "role"])
                .primary_key(["user_id", "team"]),
        )
        .with_source(
            SourceDef::new("tasks")
                .columns(["id", "title", "done", "priority"])
                .primary_key(["id"]),
        )
        .with_source(
            SourceDef::new("entries")
                .columns(["id", "n"])
                .primary_key(["id"]),
        )
}
