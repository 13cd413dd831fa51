use crate::silent_logs;
use quarry::{
    Accessor, Attributes, Condition, ErrorKind, OrderBy, Related, RelationshipKind, Row, Schema,
    Value, error_kind, values,
};

fn titles(rows: &[Row]) -> Vec<String> {
    let mut titles: Vec<String> = rows
        .iter()
        .map(|r| r.get_as::<String>("title").unwrap())
        .collect();
    titles.sort();
    titles
}

pub async fn relationships(schema: &Schema) {
    let artists = schema.result_set("artists").expect("Failed to open artists");
    let albums = schema.result_set("albums").expect("Failed to open albums");
    let profiles = schema.result_set("profiles").expect("Failed to open profiles");

    // Setup
    let stored = artists
        .populate(vec![
            values! { "name" => "Joni", "email" => "joni@example.com" },
            values! { "name" => "Nick", "email" => "nick@example.com" },
            values! { "name" => "Solo", "email" => "solo@example.com" },
        ])
        .await
        .expect("Failed to populate artists");
    let ids: Vec<i64> = stored.iter().map(|r| r.get_as("id").unwrap()).collect();
    let (joni, nick) = (ids[0], ids[1]);
    albums
        .populate(vec![
            values! { "artist_id" => joni, "title" => "Court", "year" => 1974 },
            values! { "artist_id" => joni, "title" => "Hejira", "year" => 1976 },
            values! { "artist_id" => nick, "title" => "Murder", "year" => 1996 },
        ])
        .await
        .expect("Failed to populate albums");
    profiles
        .create(values! { "artist_id" => joni, "bio" => "Canadian" })
        .await
        .expect("Failed to create the profile");

    // Pivoting a condition through a relationship
    let joni_albums = artists
        .search(Condition::eq("name", "Joni"), Attributes::new())
        .related_resultset("albums")
        .expect("Failed to pivot onto albums");
    assert_eq!(joni_albums.source(), "albums");
    assert_eq!(*joni_albums.condition(), Condition::eq("artist.name", "Joni"));
    assert_eq!(joni_albums.attributes().join, Some(vec!["artist".to_string()]));
    assert_eq!(
        titles(&joni_albums.into_all().await.unwrap()),
        ["Court", "Hejira"]
    );
    let qualified = artists
        .search(Condition::eq("me.name", "Nick"), Attributes::new())
        .related_resultset("albums")
        .unwrap();
    assert_eq!(*qualified.condition(), Condition::eq("artist.name", "Nick"));
    assert_eq!(titles(&qualified.into_all().await.unwrap()), ["Murder"]);
    let nineties = albums
        .search(Condition::eq("year", 1996), Attributes::new())
        .related_resultset("artist")
        .unwrap();
    assert_eq!(nineties.attributes().join, Some(vec!["albums".to_string()]));
    let names: Vec<String> = nineties
        .into_all()
        .await
        .unwrap()
        .iter()
        .map(|r| r.get_as("name").unwrap())
        .collect();
    assert_eq!(names, ["Nick"]);
    let bios = artists
        .search(Condition::eq("name", "Joni"), Attributes::new())
        .related_resultset("profile")
        .unwrap()
        .get_column("bio")
        .all()
        .await
        .unwrap();
    assert_eq!(bios, [Value::from("Canadian")]);
    silent_logs! {
        let error = artists
            .related_resultset("songs")
            .expect_err("Artists have no songs");
        assert_eq!(error_kind(&error), Some(ErrorKind::NoSuchRelationship));
    }

    // Relationships of a row
    let mut joni_row = artists
        .find(joni)
        .await
        .unwrap()
        .expect("Joni is stored");
    let queries = schema.stats().queries();
    let related = joni_row
        .related_resultset("albums")
        .expect("Failed to get the albums of Joni");
    assert!(!related.is_prefetched());
    assert_eq!(titles(related.all().await.unwrap()), ["Court", "Hejira"]);
    let related = joni_row.related_resultset("albums").unwrap();
    assert!(related.is_materialized());
    assert_eq!(related.all().await.unwrap().len(), 2);
    assert_eq!(schema.stats().queries(), queries + 1);
    let profile = joni_row
        .related_row("profile")
        .await
        .unwrap()
        .expect("Joni has a profile");
    assert_eq!(profile.get_as::<String>("bio").unwrap(), "Canadian");
    silent_logs! {
        let error = joni_row
            .related_row("albums")
            .await
            .expect_err("Albums are many");
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
    }
    let mut solo = artists
        .find(Condition::eq("name", "Solo"))
        .await
        .unwrap()
        .unwrap();
    assert!(solo.related_row("profile").await.unwrap().is_none());

    // Single relationships are fetched once, unless the key changes
    let mut court = albums
        .find(Condition::eq("title", "Court"))
        .await
        .unwrap()
        .unwrap();
    let queries = schema.stats().queries();
    let artist = court.related_row("artist").await.unwrap().expect("Court has an artist");
    assert_eq!(artist.get_as::<String>("name").unwrap(), "Joni");
    court.related_row("artist").await.unwrap();
    assert_eq!(schema.stats().queries(), queries + 1);
    court.set_column("artist_id", nick).unwrap();
    assert!(court.prefetched("artist").is_none());
    let artist = court.related_row("artist").await.unwrap().unwrap();
    assert_eq!(artist.get_as::<String>("name").unwrap(), "Nick");
    court.discard_changes().await.unwrap();
    court.set_column("artist_id", Value::Null).unwrap();
    let queries = schema.stats().queries();
    assert!(court.related_row("artist").await.unwrap().is_none());
    assert_eq!(schema.stats().queries(), queries);

    // Prefetched relationships never dispatch again
    let mut with_artist = albums
        .search(
            Condition::eq("artist_id", joni),
            Attributes::new().order_by([OrderBy::asc("year")]),
        )
        .prefetch(["artist"]);
    let rows = with_artist.all_mut().await.expect("Failed to prefetch the artists");
    assert_eq!(rows.len(), 2);
    let queries = schema.stats().queries();
    for row in rows.iter_mut() {
        assert!(matches!(row.prefetched("artist"), Some(Related::Row(Some(..)))));
        let artist = row.related_row("artist").await.unwrap().unwrap();
        assert_eq!(artist.get_as::<String>("name").unwrap(), "Joni");
        assert!(artist.in_storage());
    }
    assert_eq!(schema.stats().queries(), queries);

    let mut with_albums = artists
        .search(
            Condition::Empty,
            Attributes::new().order_by([OrderBy::asc("name")]),
        )
        .prefetch(["albums", "profile"]);
    let rows = with_albums.all_mut().await.unwrap();
    let queries = schema.stats().queries();
    let joni_row = rows
        .iter_mut()
        .find(|r| r.get_as::<String>("name").unwrap() == "Joni")
        .expect("Joni is among the artists");
    assert!(matches!(joni_row.prefetched("albums"), Some(Related::Rows(v)) if v.len() == 2));
    let related = joni_row.related_resultset("albums").unwrap();
    assert!(related.is_prefetched());
    assert_eq!(titles(related.all().await.unwrap()), ["Court", "Hejira"]);
    assert!(joni_row.related_row("profile").await.unwrap().is_some());
    let solo_row = rows
        .iter_mut()
        .find(|r| r.get_as::<String>("name").unwrap() == "Solo")
        .expect("Solo is among the artists");
    assert!(matches!(solo_row.prefetched("albums"), Some(Related::Rows(v)) if v.is_empty()));
    assert!(matches!(solo_row.prefetched("profile"), Some(Related::Row(None))));
    assert!(solo_row.related_row("profile").await.unwrap().is_none());
    assert!(
        solo_row
            .related_resultset("albums")
            .unwrap()
            .all()
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(schema.stats().queries(), queries);

    // Accessors
    let row = artists.find(nick).await.unwrap().unwrap();
    assert!(matches!(row.lookup("name").unwrap(), Accessor::Column(Value::Varchar(v)) if v == "Nick"));
    assert!(matches!(
        row.lookup("albums").unwrap(),
        Accessor::Relationship(r) if r.kind == RelationshipKind::HasMany
    ));
    assert_eq!(row.get_relationship("profile").unwrap().target, "profiles");
    silent_logs! {
        let error = row.lookup("songs").expect_err("Neither a column nor a relationship");
        assert_eq!(error_kind(&error), Some(ErrorKind::NoSuchAccessor));
        let error = row.get_relationship("songs").expect_err("Not a relationship");
        assert_eq!(error_kind(&error), Some(ErrorKind::NoSuchRelationship));
    }
}
