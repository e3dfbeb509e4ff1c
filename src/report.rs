//! Report operations: fetch raw activity records and reduce them to
//! display-ready aggregates.
//!
//! These functions separate the logic of data retrieval and processing from
//! the HTTP layer. Each one runs to completion or fails with a typed
//! `ReportError`; a fetch failure on any page aborts the whole report rather
//! than returning a truncated aggregate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RepoId;
use crate::error::ReportError;
use crate::github::GitHubClient;
use crate::metrics::{
    bucket_by_month, filter_since, format_duration, mean_duration, merge_monthly,
    tally_commit_authors, AuthorTally, MonthlyIssueCounts, TimeWindow,
};

/// Headline counts for the trailing window.
#[derive(Debug, Serialize, Clone)]
pub struct ActivityReport {
    pub issues_created: usize,
    pub prs_merged: usize,
}

/// Mean response durations, formatted for display. `None` means the window
/// held no eligible samples, which is not the same as a zero duration.
#[derive(Debug, Serialize, Clone)]
pub struct ResponseMetrics {
    pub issue_response_time: Option<String>,
    pub pr_merge_time: Option<String>,
}

/// Counts issues created and pull requests merged within the trailing window.
pub async fn activity_report(
    client: &GitHubClient,
    repo: &RepoId,
    window_days: u32,
    now: DateTime<Utc>,
) -> Result<ActivityReport, ReportError> {
    let since = TimeWindow::trailing_days(window_days, now).start;

    let issues = client.fetch_issues(repo, Some(since)).await?;
    let issues_created = filter_since(issues, |issue| issue.created_at, window_days, now).len();

    let pulls = client.fetch_pulls(repo).await?;
    let prs_merged = filter_since(pulls, |pull| pull.merged_at, window_days, now).len();

    Ok(ActivityReport {
        issues_created,
        prs_merged,
    })
}

/// Commit counts per author, ordered most active first.
///
/// `since`/`until` are passed through to the commit listing; an empty
/// listing is reported as `NoData` so the dashboard can tell "no commits"
/// apart from a table of zeros.
pub async fn contribution_tally(
    client: &GitHubClient,
    repo: &RepoId,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> Result<Vec<AuthorTally>, ReportError> {
    let commits = client.fetch_commits(repo, since, until).await?;
    if commits.is_empty() {
        return Err(ReportError::NoData("commits"));
    }
    Ok(tally_commit_authors(&commits))
}

/// Mean time-to-first-comment for issues and mean time-to-merge for pull
/// requests within the trailing window.
///
/// Comments are fetched one issue at a time; that sequential fan-out is the
/// dominant cost of this report.
pub async fn response_metrics(
    client: &GitHubClient,
    repo: &RepoId,
    window_days: u32,
    now: DateTime<Utc>,
) -> Result<ResponseMetrics, ReportError> {
    let since = TimeWindow::trailing_days(window_days, now).start;

    let issues = client.fetch_issues(repo, Some(since)).await?;
    let issues = filter_since(issues, |issue| issue.created_at, window_days, now);

    let mut response_pairs = Vec::new();
    for issue in issues.iter().filter(|issue| issue.comments > 0) {
        let comments = client.fetch_issue_comments(repo, issue).await?;
        let first_comment = comments.iter().map(|comment| comment.created_at).min();
        if let (Some(created), Some(first)) = (issue.created_at, first_comment) {
            response_pairs.push((created, first));
        }
    }

    let pulls = client.fetch_pulls(repo).await?;
    let pulls = filter_since(pulls, |pull| pull.merged_at, window_days, now);
    let merge_pairs: Vec<_> = pulls
        .iter()
        .filter_map(|pull| Some((pull.created_at?, pull.merged_at?)))
        .collect();

    Ok(ResponseMetrics {
        issue_response_time: mean_duration(&response_pairs).map(format_duration),
        pr_merge_time: mean_duration(&merge_pairs).map(format_duration),
    })
}

/// Issues opened and closed per calendar month, across the full history the
/// listing returns. Months seen on only one side are zero-filled.
pub async fn monthly_issue_summary(
    client: &GitHubClient,
    repo: &RepoId,
) -> Result<BTreeMap<String, MonthlyIssueCounts>, ReportError> {
    let issues = client.fetch_issues(repo, None).await?;
    let opened = bucket_by_month(&issues, |issue| issue.created_at);
    let closed = bucket_by_month(&issues, |issue| issue.closed_at);
    Ok(merge_monthly(opened, closed))
}

/// Pull requests merged per calendar month, keyed by merge time.
pub async fn monthly_pr_summary(
    client: &GitHubClient,
    repo: &RepoId,
) -> Result<BTreeMap<String, u64>, ReportError> {
    let pulls = client.fetch_pulls(repo).await?;
    Ok(bucket_by_month(&pulls, |pull| pull.merged_at))
}
