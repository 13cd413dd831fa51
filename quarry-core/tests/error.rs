#[cfg(test)]
mod tests {
    use quarry_core::{
        Error, ErrorContext, ErrorKind, QuarryError, Result, classify_message, error, error_kind,
        is_unique_violation,
    };

    fn failing() -> Result<()> {
        Err(error(ErrorKind::RowVanished, "The row is gone"))
    }

    #[test]
    fn classification() {
        assert_eq!(
            classify_message("UNIQUE constraint failed: users.email"),
            ErrorKind::UniqueViolation
        );
        assert_eq!(
            classify_message("ERROR: duplicate key value violates constraint"),
            ErrorKind::UniqueViolation
        );
        assert_eq!(classify_message("disk I/O error"), ErrorKind::Database);
    }

    #[test]
    fn kind_survives_context() {
        let e = failing()
            .context("While reloading the row")
            .context("While running the report")
            .unwrap_err();
        assert_eq!(error_kind(&e), Some(ErrorKind::RowVanished));
        assert!(format!("{e:#}").contains("[row_vanished] The row is gone"));
        assert_eq!(error_kind(&Error::msg("plain")), None);
    }

    #[test]
    fn outermost_kind_wins() {
        let e = error(ErrorKind::UniqueViolation, "UNIQUE constraint failed")
            .context("While dispatching create on `users`")
            .context(QuarryError::new(
                ErrorKind::MissingAfterConflict,
                "Still missing",
            ));
        assert_eq!(error_kind(&e), Some(ErrorKind::MissingAfterConflict));
        assert!(!is_unique_violation(&e));
        assert!(is_unique_violation(
            &error(ErrorKind::UniqueViolation, "x").context("wrapped")
        ));
    }

    #[test]
    fn tags() {
        assert_eq!(ErrorKind::Validation.tag(), "validation_error");
        assert_eq!(ErrorKind::UnknownAttribute.tag(), "validation_error");
        assert_eq!(ErrorKind::Database.to_string(), "db_error");
        assert_eq!(ErrorKind::MissingAfterConflict.tag(), "logic_error");
        assert!(ErrorKind::UniqueViolation.is_dispatch());
        assert!(!ErrorKind::NoSuchSource.is_dispatch());
        assert!(ErrorKind::UnknownAttribute.is_validation());
    }
}
