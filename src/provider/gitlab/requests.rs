//! # Request Types
//!
//! GitLab REST API v4 request bodies for project and group hooks.
//!
//! References:
//! - [Project webhooks API](https://docs.gitlab.com/ee/api/project_webhooks.html)
//! - [Group webhooks API](https://docs.gitlab.com/ee/api/group_webhooks.html)

use crate::provider::HookOptions;
use serde::Serialize;

/// Body of `POST /hooks` and `PUT /hooks/:hook_id`
///
/// Both verbs take the same fields; every field is always sent so an edit
/// overwrites whatever was changed on GitLab.
#[derive(Serialize)]
pub struct HookRequest<'a> {
    pub url: &'a str,
    /// Empty when no secret token is configured, which clears it on edit
    pub token: &'a str,
    pub enable_ssl_verification: bool,
    pub push_events: bool,
    pub tag_push_events: bool,
    pub issues_events: bool,
    pub confidential_issues_events: bool,
    pub note_events: bool,
    pub confidential_note_events: bool,
    pub merge_requests_events: bool,
    pub job_events: bool,
    pub pipeline_events: bool,
    pub wiki_page_events: bool,
    pub deployment_events: bool,
    pub releases_events: bool,
}

impl<'a> From<&'a HookOptions> for HookRequest<'a> {
    fn from(options: &'a HookOptions) -> Self {
        let events = &options.events;
        Self {
            url: &options.url,
            token: options.token.as_str(),
            enable_ssl_verification: options.enable_ssl_verification,
            push_events: events.push_events,
            tag_push_events: events.tag_push_events,
            issues_events: events.issues_events,
            confidential_issues_events: events.confidential_issues_events,
            note_events: events.note_events,
            confidential_note_events: events.confidential_note_events,
            merge_requests_events: events.merge_requests_events,
            job_events: events.job_events,
            pipeline_events: events.pipeline_events,
            wiki_page_events: events.wiki_page_events,
            deployment_events: events.deployment_events,
            releases_events: events.releases_events,
        }
    }
}
