//! # Event Types
//!
//! GitLab names the same kind of event differently in three places: the hook
//! setting (`confidential_issues_events`), the delivery header
//! (`Confidential Issue Hook`) and the payload `object_kind` (`issue`). The
//! canonical CloudEvent type follows the payload kind, so several settings
//! and headers collapse onto one type.

use crate::constants::EVENT_TYPE_PREFIX;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Hook setting name to canonical event type
const WEBHOOK_CATEGORIES: &[(&str, &str)] = &[
    ("confidential_issues_events", "issue"),
    ("confidential_note_events", "note"),
    ("deployment_events", "deployment"),
    ("issues_events", "issue"),
    ("job_events", "build"),
    ("merge_requests_events", "merge_request"),
    ("note_events", "note"),
    ("pipeline_events", "pipeline"),
    ("push_events", "push"),
    ("releases_events", "release"),
    ("tag_push_events", "tag_push"),
    ("wiki_page_events", "wiki_page"),
];

/// Header tokens that name the same payload as another token
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("confidential_issue", "issue"),
    ("confidential_note", "note"),
    ("job", "build"),
];

static HOOK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9]*(?: [A-Za-z][A-Za-z0-9]*)*) Hook$")
        .expect("Failed to compile HOOK_HEADER regex - this should never happen")
});

/// Canonical event type for a hook setting name, `None` when unknown
#[must_use]
pub fn canonical_type_for_category(category: &str) -> Option<&'static str> {
    WEBHOOK_CATEGORIES
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, ty)| *ty)
}

/// Fully qualified CloudEvent type for a canonical token
#[must_use]
pub fn event_type(token: &str) -> String {
    format!("{EVENT_TYPE_PREFIX}.{token}")
}

/// CloudEvent types a source subscribed to `categories` will emit
///
/// Deduplicated and sorted; unknown categories are skipped.
#[must_use]
pub fn event_types<S: AsRef<str>>(categories: &[S]) -> Vec<String> {
    categories
        .iter()
        .filter_map(|c| canonical_type_for_category(c.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(event_type)
        .collect()
}

/// Derive the canonical token from an `X-Gitlab-Event` header value
///
/// `"Merge Request Hook"` becomes `merge_request`. The header must be one or
/// more space separated words followed by ` Hook`; anything else is `None`.
#[must_use]
pub fn category_from_header(header: &str) -> Option<String> {
    let words = HOOK_HEADER.captures(header)?.get(1)?.as_str();
    let token = words.replace(' ', "_").to_lowercase();
    let canonical = HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map_or(token, |(_, ty)| (*ty).to_string());
    Some(canonical)
}

/// Whether a canonical token names a payload the adapter knows how to forward
#[must_use]
pub fn is_known_event_type(token: &str) -> bool {
    WEBHOOK_CATEGORIES.iter().any(|(_, ty)| *ty == token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_mapping() {
        assert_eq!(category_from_header("Push Hook").as_deref(), Some("push"));
        assert_eq!(
            category_from_header("Merge Request Hook").as_deref(),
            Some("merge_request")
        );
        assert_eq!(
            category_from_header("Confidential Issue Hook").as_deref(),
            Some("issue")
        );
        assert_eq!(category_from_header("Job Hook").as_deref(), Some("build"));
        assert_eq!(
            category_from_header("Legit Event Type Hook").as_deref(),
            Some("legit_event_type")
        );
    }

    #[test]
    fn test_header_rejects_malformed_values() {
        assert_eq!(category_from_header("Missing The Suffix"), None);
        assert_eq!(category_from_header(""), None);
        assert_eq!(category_from_header(" Hook"), None);
        assert_eq!(category_from_header("Hook"), None);
        assert_eq!(category_from_header("Push  Hook"), None);
        assert_eq!(category_from_header("Push Hook "), None);
    }

    #[test]
    fn test_event_types_deduplicated_and_sorted() {
        let types = event_types(&[
            "push_events",
            "issues_events",
            "confidential_issues_events",
            "not_a_category",
            "push_events",
        ]);
        assert_eq!(
            types,
            vec![
                "dev.knative.sources.gitlab.issue".to_string(),
                "dev.knative.sources.gitlab.push".to_string(),
            ]
        );
    }

    #[test]
    fn test_known_event_types() {
        assert!(is_known_event_type("push"));
        assert!(is_known_event_type("build"));
        assert!(!is_known_event_type("legit_event_type"));
        assert!(!is_known_event_type("confidential_issue"));
    }
}
