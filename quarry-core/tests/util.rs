#[cfg(test)]
mod tests {
    use quarry_core::{qualify, split_qualified, strip_alias, strip_aliases, truncate_long, values};

    #[test]
    fn aliases() {
        assert_eq!(strip_alias("me.name"), "name");
        assert_eq!(strip_alias("self.name"), "name");
        assert_eq!(strip_alias("foreign.name"), "name");
        assert_eq!(strip_alias("artist.name"), "artist.name");
        assert_eq!(strip_alias("name"), "name");
        assert_eq!(
            strip_aliases(values! { "me.a" => 1, "b" => 2, "artist.c" => 3 }),
            values! { "a" => 1, "b" => 2, "artist.c" => 3 }
        );
    }

    #[test]
    fn qualification() {
        assert_eq!(qualify("artist", "name"), "artist.name");
        assert_eq!(qualify("artist", "me.name"), "artist.name");
        assert_eq!(qualify("artist", "label.name"), "label.name");
        assert_eq!(split_qualified("artist.name"), Some(("artist", "name")));
        assert_eq!(split_qualified("name"), None);
    }

    #[test]
    fn truncation() {
        let short = "SELECT 1";
        assert_eq!(format!("{}", truncate_long!(short)), "SELECT 1");
        let long = "x".repeat(600);
        let truncated = format!("{}", truncate_long!(long));
        assert_eq!(truncated.len(), 500);
        assert!(truncated.ends_with("..."));
    }
}
