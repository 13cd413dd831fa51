#[cfg(test)]
mod tests {
    use quarry_core::{
        CompareOp, Condition, ErrorKind, SchemaDef, SchemaMetadata, SourceDef, error_kind, pivot,
        reverse_relationship,
    };

    fn schema() -> SchemaDef {
        SchemaDef::new()
            .with_source(
                SourceDef::new("artists")
                    .columns(["id", "name"])
                    .primary_key(["id"])
                    .has_many("albums", "albums", "artist_id", "id")
                    .has_many("produced", "albums", "producer_id", "id"),
            )
            .with_source(
                SourceDef::new("albums")
                    .columns(["id", "artist_id", "producer_id", "title"])
                    .primary_key(["id"])
                    .belongs_to("producer", "artists", "producer_id", "id")
                    .belongs_to("artist", "artists", "artist_id", "id"),
            )
            .with_source(
                SourceDef::new("venues")
                    .columns(["id", "city"])
                    .primary_key(["id"])
                    .has_many("gigs", "gigs", "venue_id", "id")
                    .has_many("tickets", "tickets", "venue_id", "id"),
            )
            .with_source(
                SourceDef::new("gigs")
                    .columns(["id", "venue_id", "host_id"])
                    .primary_key(["id"])
                    .belongs_to("host", "venues", "host_id", "id"),
            )
            .with_source(
                SourceDef::new("tickets")
                    .columns(["id", "venue_id"])
                    .primary_key(["id"]),
            )
    }

    #[test]
    fn mirrored_join_wins() {
        let schema = schema();
        let forward = schema.relationship_info("artists", "albums").unwrap();
        let reverse = reverse_relationship(&schema, "artists", forward).unwrap();
        assert_eq!(reverse.name, "artist");
        let forward = schema.relationship_info("artists", "produced").unwrap();
        let reverse = reverse_relationship(&schema, "artists", forward).unwrap();
        assert_eq!(reverse.name, "producer");
    }

    #[test]
    fn fallback_and_unresolved() {
        let schema = schema();
        let forward = schema.relationship_info("venues", "gigs").unwrap();
        assert_eq!(
            reverse_relationship(&schema, "venues", forward).unwrap().name,
            "host"
        );
        let error = pivot(&schema, "venues", "tickets", Condition::Empty).unwrap_err();
        assert_eq!(
            error_kind(&error),
            Some(ErrorKind::UnresolvedReverseRelationship)
        );
        let error = pivot(&schema, "venues", "seats", Condition::Empty).unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::NoSuchRelationship));
        let error = pivot(&schema, "halls", "gigs", Condition::Empty).unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::NoSuchSource));
    }

    #[test]
    fn condition_is_requalified() {
        let schema = schema();
        let condition = Condition::and([
            Condition::eq("name", "Joni"),
            Condition::eq("me.id", 1),
            Condition::compare("label.year", CompareOp::Greater, 1970),
        ]);
        let moved = pivot(&schema, "artists", "albums", condition).unwrap();
        assert_eq!(moved.target, "albums");
        assert_eq!(moved.reverse, "artist");
        assert_eq!(
            moved.condition,
            Condition::and([
                Condition::eq("artist.name", "Joni"),
                Condition::eq("artist.id", 1),
                Condition::compare("label.year", CompareOp::Greater, 1970),
            ])
        );
        let moved = pivot(&schema, "albums", "artist", Condition::Empty).unwrap();
        assert!(moved.condition.is_empty());
        assert_eq!(moved.target, "artists");
        assert_eq!(moved.reverse, "albums");
    }
}
