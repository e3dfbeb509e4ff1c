//! GitHub REST client: typed activity records and the paginated fetch loop.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use octocrab::{Octocrab, Page};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::{AppConfig, RepoId};
use crate::error::ReportError;

/// An issue as returned by the `/issues` listing. Pull requests show up in
/// this listing too and are counted as issues, matching the listing itself.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Issue {
    pub id: u64,
    pub number: u64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Comment count reported by the listing; comments themselves require a
    /// follow-up fetch of `comments_url`.
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub comments_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PullRequest {
    pub id: u64,
    pub number: u64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommitRecord {
    pub sha: String,
    /// The associated platform account, absent when the commit author has no
    /// account on the platform.
    #[serde(default)]
    pub author: Option<Account>,
    pub commit: CommitDetail,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Account {
    pub login: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommitDetail {
    pub author: GitSignature,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GitSignature {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub date: Option<DateTime<Utc>>,
}

/// A comment on an issue. The timestamp parses strictly: a comment without a
/// usable `created_at` cannot anchor a response-time sample, so it fails the
/// enclosing report as a malformed response.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Comment {
    pub id: u64,
    pub created_at: DateTime<Utc>,
}

impl CommitRecord {
    /// Login of the associated account, else the raw git author name.
    pub fn author_identity(&self) -> &str {
        self.author
            .as_ref()
            .map(|account| account.login.as_str())
            .unwrap_or(self.commit.author.name.as_str())
    }
}

/// Timestamps that are absent or unparsable deserialize to `None`, so the
/// record is excluded by the window filter instead of failing the report.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse::<DateTime<Utc>>().ok()))
}

fn fetch_error(url: &str, err: octocrab::Error) -> ReportError {
    match err {
        octocrab::Error::Serde { source, .. } => ReportError::MalformedResponse {
            url: url.to_string(),
            source: Box::new(source),
        },
        octocrab::Error::Json { source, .. } => ReportError::MalformedResponse {
            url: url.to_string(),
            source: Box::new(source),
        },
        other => ReportError::FetchFailed {
            url: url.to_string(),
            source: other,
        },
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    page_size: u8,
    max_pages: u32,
}

impl GitHubClient {
    pub fn new(token: &str, config: &AppConfig) -> Result<Self, ReportError> {
        let mut builder = Octocrab::builder()
            .personal_token(token.to_string())
            .set_connect_timeout(Some(config.request_timeout()))
            .set_read_timeout(Some(config.request_timeout()));

        if let Some(root) = &config.github_api_root {
            builder = builder
                .base_uri(root.as_str())
                .map_err(ReportError::ClientInit)?;
        }

        Ok(Self {
            octocrab: builder.build().map_err(ReportError::ClientInit)?,
            page_size: config.page_size,
            max_pages: config.max_pages,
        })
    }

    /// Issues for the repository, newest first. `since` narrows the listing
    /// server-side; callers still window-filter locally because `since`
    /// matches on update time.
    pub async fn fetch_issues(
        &self,
        repo: &RepoId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Issue>, ReportError> {
        let route = format!("/repos/{}/{}/issues", repo.owner, repo.repo);
        let mut params = self.list_params();
        params.insert("state", "all".to_string());
        params.insert("sort", "created".to_string());
        params.insert("direction", "desc".to_string());
        if let Some(since) = since {
            params.insert("since", iso_timestamp(since));
        }
        self.fetch_records(&route, &params).await
    }

    /// Closed pull requests, most recently updated first. Merge state is
    /// decided per record via `merged_at`.
    pub async fn fetch_pulls(&self, repo: &RepoId) -> Result<Vec<PullRequest>, ReportError> {
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.repo);
        let mut params = self.list_params();
        params.insert("state", "closed".to_string());
        params.insert("sort", "updated".to_string());
        params.insert("direction", "desc".to_string());
        self.fetch_records(&route, &params).await
    }

    pub async fn fetch_commits(
        &self,
        repo: &RepoId,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<CommitRecord>, ReportError> {
        let route = format!("/repos/{}/{}/commits", repo.owner, repo.repo);
        let mut params = self.list_params();
        if let Some(since) = since {
            params.insert("since", iso_timestamp(since));
        }
        if let Some(until) = until {
            params.insert("until", iso_timestamp(until));
        }
        self.fetch_records(&route, &params).await
    }

    /// Comments for one issue, via the `comments_url` the listing handed us.
    pub async fn fetch_issue_comments(
        &self,
        repo: &RepoId,
        issue: &Issue,
    ) -> Result<Vec<Comment>, ReportError> {
        let route = match issue.comments_url.find("/repos/") {
            Some(idx) => issue.comments_url[idx..].to_string(),
            None => format!(
                "/repos/{}/{}/issues/{}/comments",
                repo.owner, repo.repo, issue.number
            ),
        };
        let params = self.list_params();
        self.fetch_records(&route, &params).await
    }

    fn list_params(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("per_page", self.page_size.to_string());
        params
    }

    async fn fetch_records<T: DeserializeOwned>(
        &self,
        route: &str,
        params: &BTreeMap<&'static str, String>,
    ) -> Result<Vec<T>, ReportError> {
        let raw = self.fetch_all(route, params).await?;
        raw.into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|err| ReportError::MalformedResponse {
                    url: route.to_string(),
                    source: Box::new(err),
                })
            })
            .collect()
    }

    /// Fetches every page of a list endpoint into one ordered sequence.
    ///
    /// The first request carries the query parameters; every later request
    /// follows the server's next-page link verbatim, since the link already
    /// embeds them. Stops when the server omits the link, or at `max_pages`
    /// against an endpoint that never does.
    async fn fetch_all(
        &self,
        route: &str,
        params: &BTreeMap<&'static str, String>,
    ) -> Result<Vec<Value>, ReportError> {
        let mut page: Page<Value> = self
            .octocrab
            .get(route, Some(params))
            .await
            .map_err(|err| fetch_error(route, err))?;

        let mut records = std::mem::take(&mut page.items);
        let mut page_count = 1u32;

        while page.next.is_some() {
            if page_count >= self.max_pages {
                tracing::warn!(
                    route,
                    max_pages = self.max_pages,
                    "hit page cap before pagination was exhausted; results may be incomplete"
                );
                break;
            }

            let next_url = page
                .next
                .as_ref()
                .map(|url| url.to_string())
                .unwrap_or_default();

            match self
                .octocrab
                .get_page::<Value>(&page.next)
                .await
                .map_err(|err| fetch_error(&next_url, err))?
            {
                Some(mut next_page) => {
                    records.append(&mut next_page.items);
                    page = next_page;
                    page_count += 1;
                }
                None => break,
            }
        }

        Ok(records)
    }
}

fn iso_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_timestamp_tolerates_garbage() {
        let issue: Issue = serde_json::from_value(serde_json::json!({
            "id": 1,
            "number": 7,
            "created_at": "not-a-timestamp",
            "comments": 0,
            "comments_url": ""
        }))
        .expect("record should deserialize");

        assert!(issue.created_at.is_none());
        assert!(issue.closed_at.is_none());
    }

    #[test]
    fn test_strict_comment_timestamp_fails() {
        let result: Result<Comment, _> = serde_json::from_value(serde_json::json!({
            "id": 1,
            "created_at": "not-a-timestamp"
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_author_identity_falls_back_to_git_name() {
        let with_account: CommitRecord = serde_json::from_value(serde_json::json!({
            "sha": "abc",
            "author": {"login": "octocat"},
            "commit": {"author": {"name": "Octo Cat", "date": "2024-01-01T00:00:00Z"}}
        }))
        .unwrap();
        let without_account: CommitRecord = serde_json::from_value(serde_json::json!({
            "sha": "def",
            "author": null,
            "commit": {"author": {"name": "Octo Cat", "date": "2024-01-01T00:00:00Z"}}
        }))
        .unwrap();

        assert_eq!(with_account.author_identity(), "octocat");
        assert_eq!(without_account.author_identity(), "Octo Cat");
    }
}
