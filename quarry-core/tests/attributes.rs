#[cfg(test)]
mod tests {
    use quarry_core::{Attributes, ErrorKind, OrderBy, Value, error_kind};

    #[test]
    fn merge_is_shallow() {
        let base = Attributes::new()
            .rows(5)
            .order_by([OrderBy::desc("size")])
            .join(["artist"]);
        let merged = base.clone().merge(Attributes::new().rows(2).join(["label"]));
        assert_eq!(merged.rows, Some(2));
        assert_eq!(merged.order_by, Some(vec![OrderBy::desc("size")]));
        assert_eq!(merged.join, Some(vec!["label".to_string()]));
        assert_eq!(base.clone().merge(Attributes::new()), base);
    }

    #[test]
    fn bounds() {
        assert!(!Attributes::new().is_bounded());
        assert!(Attributes::new().rows(1).is_bounded());
        assert!(Attributes::new().offset(3).is_bounded());
        assert!(Attributes::new().page(2).is_bounded());
        assert!(!Attributes::new().join(Vec::<String>::new()).has_join());
        assert!(Attributes::new().join(["artist"]).has_join());
        let unbounded = Attributes::new()
            .rows(10)
            .offset(20)
            .page(3)
            .order_by([OrderBy::asc("id")])
            .select(["id"])
            .without_bounds();
        assert_eq!(unbounded, Attributes::new().select(["id"]));
    }

    #[test]
    fn order_by() {
        assert_eq!(OrderBy::parse("name").unwrap(), OrderBy::asc("name"));
        assert_eq!(OrderBy::parse(" name ASC ").unwrap(), OrderBy::asc("name"));
        assert_eq!(OrderBy::parse("year desc").unwrap(), OrderBy::desc("year"));
        assert_eq!(OrderBy::parse("-year").unwrap(), OrderBy::desc("year"));
        assert_eq!(OrderBy::desc("year").to_string(), "year DESC");
        let error = OrderBy::parse("year sideways").unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        assert!(OrderBy::parse("a b c").is_err());
        assert!(OrderBy::parse("").is_err());
    }

    #[test]
    fn from_pairs() {
        let attributes = Attributes::from_pairs([
            ("limit", Value::from(5)),
            ("offset", Value::from(10)),
            ("order_by", Value::from("name, -year")),
            ("join", Value::from("artist")),
            ("prefetch", Value::from(vec!["artist".to_string(), "label".to_string()])),
            ("columns", Value::from(vec!["id".to_string(), "name".to_string()])),
            ("as", Value::from(vec!["key".to_string(), "label".to_string()])),
            ("key", Value::from("primary")),
            ("cache", Value::from(true)),
        ])
        .expect("Valid attributes");
        assert_eq!(
            attributes,
            Attributes::new()
                .rows(5)
                .offset(10)
                .order_by([OrderBy::asc("name"), OrderBy::desc("year")])
                .join(["artist"])
                .prefetch(["artist", "label"])
                .select(["id", "name"])
                .as_names(["key", "label"])
                .key("primary")
                .cache(true)
        );
        let error = Attributes::from_pairs([("colour", Value::from("red"))]).unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::UnknownAttribute));
        assert!(error_kind(&error).unwrap().is_validation());
        let error = Attributes::from_pairs([("rows", Value::from("many"))]).unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        let error = Attributes::from_pairs([("page", Value::from(0))]).unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        assert_eq!(
            Attributes::from_pairs(Vec::<(&str, Value)>::new()).unwrap(),
            Attributes::new()
        );
    }

    #[test]
    fn resolve_page() {
        let resolved = Attributes::new().rows(10).page(3).resolve_page();
        assert_eq!(resolved, Attributes::new().rows(10).offset(20));
        let resolved = Attributes::new().page(2).offset(4).resolve_page();
        assert_eq!(resolved, Attributes::new().rows(10).offset(14));
        assert_eq!(Attributes::new().rows(7).resolve_page(), Attributes::new().rows(7));

        // Far pages saturate instead of wrapping back to the start
        let resolved = Attributes::new().rows(10).page(u64::MAX / 2).resolve_page();
        assert_eq!(resolved.offset, Some(u64::MAX));
        assert_eq!(resolved.rows, Some(10));
        assert_eq!(resolved.page, None);
        let resolved = Attributes::new()
            .rows(u64::MAX)
            .offset(5)
            .page(2)
            .resolve_page();
        assert_eq!(resolved.offset, Some(u64::MAX));
    }
}
