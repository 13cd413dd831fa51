#[cfg(test)]
mod tests {
    use quarry_core::{CompareOp, Condition, Value, values};

    #[test]
    fn merge_structural() {
        let a = Condition::eq("color", "red");
        let b = Condition::compare("size", CompareOp::Greater, 2);
        let c = Condition::eq("color", "blue");
        assert_eq!(Condition::Empty.merge(a.clone()), a);
        assert_eq!(a.clone().merge(Condition::Empty), a);
        assert_eq!(a.clone().merge(Condition::Eq(values! {})), a);
        let merged = a.clone().merge(b.clone()).merge(c.clone());
        assert_eq!(merged, Condition::And(vec![a.clone(), b.clone(), c.clone()]));

        // An explicit And on the right is nested, not flattened
        let nested = a.clone().merge(Condition::and([b.clone(), c.clone()]));
        assert_eq!(
            nested,
            Condition::And(vec![a, Condition::And(vec![b, c])])
        );
    }

    #[test]
    fn merge_literal() {
        let literal = Condition::literal("size % 2 = ?", [Value::from(1)]);
        let eq = Condition::eq("name", "kite");
        assert_eq!(eq.clone().merge(literal.clone()), literal);
        assert_eq!(literal.clone().merge(eq), literal);
        let other = Condition::literal("1 = 1", []);
        assert_eq!(literal.merge(other.clone()), other);
        assert!(other.is_literal());
        assert!(!other.is_empty());
    }

    #[test]
    fn map_keys() {
        let condition = Condition::and([
            Condition::eq("me.name", "Joni"),
            Condition::or([
                Condition::is_in("id", [1, 2]),
                Condition::not(Condition::compare("year", CompareOp::Less, 1970)),
            ]),
            Condition::literal("x = 1", []),
        ]);
        let mapped = condition.map_keys(&|k: &str| format!("artist.{}", k.trim_start_matches("me.")));
        assert_eq!(
            mapped,
            Condition::and([
                Condition::eq("artist.name", "Joni"),
                Condition::or([
                    Condition::is_in("artist.id", [1, 2]),
                    Condition::not(Condition::compare("artist.year", CompareOp::Less, 1970)),
                ]),
                Condition::literal("x = 1", []),
            ])
        );
    }

    #[test]
    fn equalities() {
        let condition = Condition::eq("a", 1)
            .merge(Condition::Eq(values! { "b" => 2, "c" => Value::Null }))
            .merge(Condition::or([Condition::eq("d", 4), Condition::eq("e", 5)]))
            .merge(Condition::compare("f", CompareOp::Greater, 6));
        assert_eq!(
            condition.equalities(),
            values! { "a" => 1, "b" => 2, "c" => Value::Null }
        );
        assert!(Condition::Empty.equalities().is_empty());
    }

    #[test]
    fn conversions() {
        assert_eq!(Condition::from(values! {}), Condition::Empty);
        assert_eq!(
            Condition::from(values! { "a" => 1 }),
            Condition::eq("a", 1)
        );
        assert_eq!(Condition::from(None::<Condition>), Condition::Empty);
    }

    #[test]
    fn display() {
        assert_eq!(Condition::Empty.to_string(), "TRUE");
        assert_eq!(
            Condition::Eq(values! { "a" => 1, "b" => Value::Null }).to_string(),
            "(a = 1 AND b IS NULL)"
        );
        assert_eq!(
            Condition::or([
                Condition::is_in("id", [1, 2]),
                Condition::compare("name", CompareOp::Like, "J%"),
            ])
            .to_string(),
            "(id IN (1, 2) OR name LIKE 'J%')"
        );
        assert_eq!(
            Condition::not(Condition::eq("done", true)).to_string(),
            "NOT done = true"
        );
    }
}
