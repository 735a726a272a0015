// tag.rs — Hierarchical data-tag matching.
//
// Tags are dot-hierarchical strings: `personal.pii.email` is a descendant
// of `personal.pii`, which is a descendant of `personal`. A rule or
// clearance entry targeting a parent tag covers every descendant without
// enumeration.
//
// Matching is a prefix-segment test, not a substring test: `person` must
// not match `personal`.

/// Does `rule_tag` cover `tag`?
///
/// True when the tags are equal, when `tag` is a dot-descendant of
/// `rule_tag`, or when `rule_tag` is the `*` wildcard.
pub fn tag_matches(rule_tag: &str, tag: &str) -> bool {
    if rule_tag == "*" {
        return true;
    }
    if rule_tag == tag {
        return true;
    }
    tag.len() > rule_tag.len()
        && tag.starts_with(rule_tag)
        && tag.as_bytes()[rule_tag.len()] == b'.'
}

/// First tag in `tags` not covered by any entry in `covering`, if any.
///
/// Used for clearance and contract checks, where the caller needs the exact
/// offending tag for the denial reason.
pub fn first_uncovered<'a>(tags: &'a [String], covering: &[String]) -> Option<&'a str> {
    tags.iter()
        .find(|tag| !covering.iter().any(|c| tag_matches(c, tag)))
        .map(|s| s.as_str())
}

/// Whether any tag in `rule_tags` covers any tag in `tags`.
pub fn any_tag_matches(rule_tags: &[String], tags: &[String]) -> bool {
    rule_tags
        .iter()
        .any(|rule_tag| tags.iter().any(|tag| tag_matches(rule_tag, tag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match() {
        assert!(tag_matches("personal.pii.email", "personal.pii.email"));
    }

    #[test]
    fn parent_covers_descendants() {
        assert!(tag_matches("personal", "personal.pii"));
        assert!(tag_matches("personal", "personal.pii.email"));
        assert!(tag_matches("secret", "secret.database_url"));
    }

    #[test]
    fn child_does_not_cover_parent() {
        assert!(!tag_matches("personal.pii.email", "personal.pii"));
        assert!(!tag_matches("personal.pii", "personal"));
    }

    #[test]
    fn prefix_must_end_on_segment_boundary() {
        // `person` is a string prefix of `personal` but not a tag parent.
        assert!(!tag_matches("person", "personal"));
        assert!(!tag_matches("person", "personal.pii"));
        assert!(!tag_matches("secret.api", "secret.api_key"));
    }

    #[test]
    fn wildcard_covers_everything() {
        assert!(tag_matches("*", "personal.pii.email"));
        assert!(tag_matches("*", "secret"));
    }

    #[test]
    fn unrelated_tags_do_not_match() {
        assert!(!tag_matches("personal", "secret.api_key"));
        assert!(!tag_matches("secret", "personal.financial"));
    }

    #[test]
    fn first_uncovered_names_the_offender() {
        let clearance = strings(&["personal.pii.email"]);
        let tags = strings(&["personal.pii.email", "personal.financial"]);
        assert_eq!(first_uncovered(&tags, &clearance), Some("personal.financial"));
    }

    #[test]
    fn first_uncovered_none_when_all_covered() {
        let clearance = strings(&["personal", "secret"]);
        let tags = strings(&["personal.pii.ssn", "secret.jwt"]);
        assert_eq!(first_uncovered(&tags, &clearance), None);
    }

    #[test]
    fn any_tag_matches_hierarchically() {
        let rule_tags = strings(&["secret"]);
        let detected = strings(&["secret.database_url"]);
        assert!(any_tag_matches(&rule_tags, &detected));
        assert!(!any_tag_matches(&rule_tags, &strings(&["personal.pii"])));
    }
}
