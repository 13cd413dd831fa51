#[cfg(test)]
mod tests {
    use quarry_core::{AsValue, Value, values};
    use rust_decimal::Decimal;
    use std::{borrow::Cow, cmp::Ordering, collections::BTreeMap};
    use time::macros::{date, datetime};
    use uuid::Uuid;

    #[test]
    fn value_null() {
        assert_eq!(Value::Null, Value::default());
        assert!(Value::Null.is_null());
        assert_eq!(Option::<i32>::None.as_value(), Value::Null);
        assert_eq!(Option::<i32>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert!(!Value::Null.loosely_equals(&Value::Int64(0)));
    }

    #[test]
    fn value_bool() {
        let val: Value = true.into();
        assert_eq!(val, Value::Boolean(true));
        assert!(bool::try_from_value(val).unwrap());
        assert!(bool::try_from_value(Value::Int64(3)).unwrap());
        assert!(!bool::try_from_value(Value::Int64(0)).unwrap());
        assert!(bool::try_from_value(Value::from("true")).is_err());
    }

    #[test]
    fn value_integers() {
        assert_eq!(Value::from(7i8), Value::Int64(7));
        assert_eq!(Value::from(-7i32), Value::Int64(-7));
        assert_eq!(u8::try_from_value(Value::Int64(255)).unwrap(), 255);
        assert!(u8::try_from_value(Value::Int64(256)).is_err());
        assert!(u32::try_from_value(Value::Int64(-1)).is_err());
        assert_eq!(i64::try_from_value(Value::Float64(3.0)).unwrap(), 3);
        assert!(i64::try_from_value(Value::Float64(3.5)).is_err());
        assert_eq!(
            i32::try_from_value(Value::Decimal(Decimal::new(4200, 2))).unwrap(),
            42
        );
        assert_eq!(u64::MAX.as_value(), Value::Decimal(Decimal::from(u64::MAX)));
        assert_eq!(u64::try_from_value(u64::MAX.as_value()).unwrap(), u64::MAX);
        assert!(u64::try_from_value(Value::Int64(-2)).is_err());
    }

    #[test]
    fn value_floats() {
        assert_eq!(Value::from(1.5f64), Value::Float64(1.5));
        assert_eq!(f64::try_from_value(Value::Int64(2)).unwrap(), 2.0);
        assert_eq!(f32::try_from_value(Value::Float64(0.25)).unwrap(), 0.25);
        assert_eq!(
            Decimal::try_from_value(Value::Int64(5)).unwrap(),
            Decimal::from(5)
        );
        assert!(f64::try_from_value(Value::from("1.5")).is_err());
    }

    #[test]
    fn value_strings() {
        assert_eq!(Value::from("hello"), Value::Varchar("hello".into()));
        assert_eq!(
            String::try_from_value(Value::from("hello")).unwrap(),
            "hello"
        );
        assert_eq!(
            Cow::<'static, str>::try_from_value(Value::from("x")).unwrap(),
            "x"
        );
        assert!(String::try_from_value(Value::Int64(1)).is_err());
        assert_eq!(Value::from("hello").as_str(), Some("hello"));
        assert_eq!(
            &*Box::<[u8]>::try_from_value(Value::from("ab")).unwrap(),
            b"ab"
        );
    }

    #[test]
    fn value_temporal() {
        let day = date!(2024 - 02 - 29);
        assert_eq!(Value::from(day), Value::Date(day));
        let moment = datetime!(2024 - 02 - 29 13:45:00);
        assert_eq!(
            time::Date::try_from_value(Value::Timestamp(moment)).unwrap(),
            day
        );
        assert!(time::PrimitiveDateTime::try_from_value(Value::Date(day)).is_err());
        assert_eq!(
            Value::Date(day).compare(&Value::Date(date!(2024 - 03 - 01))),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn value_uuid() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(Value::from(id), Value::Uuid(id));
        assert_eq!(
            Uuid::try_from_value(Value::from("67e55044-10b1-426f-9247-bb680e5fe0c8")).unwrap(),
            id
        );
        assert!(Uuid::try_from_value(Value::from("not a uuid")).is_err());
    }

    #[test]
    fn value_structured() {
        let list = vec![1, 2, 3].as_value();
        assert_eq!(
            list,
            Value::List(vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)])
        );
        assert!(!list.is_scalar());
        assert_eq!(Vec::<i32>::try_from_value(list).unwrap(), [1, 2, 3]);
        let map = BTreeMap::from([("a".to_string(), 1)]).as_value();
        assert_eq!(map, Value::Map(values! { "a" => 1 }));
        assert!(Value::Int64(1).is_scalar());
    }

    #[test]
    fn value_comparison() {
        assert!(Value::Int64(2).loosely_equals(&Value::Float64(2.0)));
        assert!(Value::Int64(2).loosely_equals(&Value::Decimal(Decimal::from(2))));
        assert!(!Value::Int64(2).loosely_equals(&Value::from("2")));
        assert_eq!(
            Value::Int64(1).compare(&Value::Float64(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("b").compare(&Value::Int64(1)), None);
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from("it's").to_string(), "'it''s'");
        assert_eq!(Value::from(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(Value::Blob(Box::new([1, 2, 3])).to_string(), "<3 bytes>");
        assert_eq!(Value::Map(values! { "k" => true }).to_string(), "{k: true}");
    }
}
