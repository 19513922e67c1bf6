//! Platform Gateway: the coordinator's sole collaborator surface onto the
//! code-hosting platform's issue/PR API.

mod cache;
mod client;
mod error;
mod types;

pub use client::{HttpPlatformGateway, PlatformGateway};
pub use error::GatewayError;
pub use types::{Comment, IssueDraft, LabelPatch, Milestone, PullRequest, PullRequestDraft, PullRequestPage, RateLimitStatus, WorkItemPage};
