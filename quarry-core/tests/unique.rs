#[cfg(test)]
mod tests {
    use quarry_core::{Condition, ErrorKind, SourceDef, error_kind, resolve_unique, values};

    fn users() -> SourceDef {
        SourceDef::new("users")
            .columns(["id", "email", "name"])
            .primary_key(["id"])
            .unique("users_email", ["email"])
    }

    #[test]
    fn primary_key_first() {
        let data = values! { "id" => 1, "email" => "ada@example.com" };
        assert_eq!(
            resolve_unique(&data, None, &users()).unwrap(),
            Condition::Eq(values! { "id" => 1 })
        );
        let memberships = SourceDef::new("memberships")
            .columns(["user_id", "team", "role"])
            .primary_key(["user_id", "team"]);
        let data = values! { "user_id" => 1, "role" => "owner" };
        assert_eq!(
            resolve_unique(&data, None, &memberships).unwrap(),
            Condition::Eq(values! { "user_id" => 1 })
        );
    }

    #[test]
    fn unique_constraint() {
        let data = values! { "email" => "ada@example.com", "name" => "Ada" };
        assert_eq!(
            resolve_unique(&data, None, &users()).unwrap(),
            Condition::Eq(values! { "email" => "ada@example.com" })
        );
        let data = values! { "me.email" => "ada@example.com", "name" => "Ada" };
        assert_eq!(
            resolve_unique(&data, None, &users()).unwrap(),
            Condition::Eq(values! { "email" => "ada@example.com" })
        );
    }

    #[test]
    fn named_constraint() {
        let data = values! { "id" => 1, "email" => "ada@example.com" };
        assert_eq!(
            resolve_unique(&data, Some("users_email"), &users()).unwrap(),
            Condition::Eq(values! { "email" => "ada@example.com" })
        );
        assert_eq!(
            resolve_unique(&data, Some("primary"), &users()).unwrap(),
            Condition::Eq(values! { "id" => 1 })
        );
        let error = resolve_unique(&data, Some("users_name"), &users()).unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
    }

    #[test]
    fn whole_data_fallback() {
        let data = values! { "name" => "Ada" };
        assert_eq!(
            resolve_unique(&data, None, &users()).unwrap(),
            Condition::from(data.clone())
        );
        let data = values! { "email" => "ada@example.com" };
        assert_eq!(
            resolve_unique(&data, Some("primary"), &users()).unwrap(),
            Condition::from(data.clone())
        );
    }
}
