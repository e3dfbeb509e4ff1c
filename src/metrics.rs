//! Pure reductions over fetched activity records: window filtering,
//! by-author and by-month tallies, and duration averaging.
//!
//! Every function takes `now` (where relevant) as an argument rather than
//! reading the clock, so callers control the reference point and tests are
//! deterministic.

use crate::github::CommitRecord;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const SECS_PER_DAY: i64 = 86_400;
const SECS_PER_HOUR: i64 = 3_600;

/// The trailing time range over which activity is counted.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn trailing_days(days: u32, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(i64::from(days)),
            end: now,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Keeps the records whose selected timestamp falls within the trailing
/// window, preserving input order. Records without a usable timestamp are
/// dropped, never an error.
pub fn filter_since<T>(
    records: Vec<T>,
    timestamp: impl Fn(&T) -> Option<DateTime<Utc>>,
    window_days: u32,
    now: DateTime<Utc>,
) -> Vec<T> {
    let window = TimeWindow::trailing_days(window_days, now);
    records
        .into_iter()
        .filter(|record| timestamp(record).is_some_and(|ts| window.contains(ts)))
        .collect()
}

/// One row of the contribution table.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AuthorTally {
    pub author: String,
    pub commits: u64,
}

/// Counts commits per author identity, ordered by count descending.
///
/// The sort is stable, so authors with equal counts keep first-seen order.
pub fn tally_commit_authors(commits: &[CommitRecord]) -> Vec<AuthorTally> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut tallies: Vec<AuthorTally> = Vec::new();

    for commit in commits {
        let author = commit.author_identity();
        match index.get(author) {
            Some(&at) => tallies[at].commits += 1,
            None => {
                index.insert(author, tallies.len());
                tallies.push(AuthorTally {
                    author: author.to_string(),
                    commits: 1,
                });
            }
        }
    }

    tallies.sort_by(|a, b| b.commits.cmp(&a.commits));
    tallies
}

pub fn month_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m").to_string()
}

/// Groups records into "YYYY-MM" buckets by their selected timestamp.
/// Records without one are skipped. `BTreeMap` keeps the months
/// chronological, since the keys sort lexicographically.
pub fn bucket_by_month<T>(
    records: &[T],
    timestamp: impl Fn(&T) -> Option<DateTime<Utc>>,
) -> BTreeMap<String, u64> {
    let mut buckets = BTreeMap::new();
    for record in records {
        if let Some(ts) = timestamp(record) {
            *buckets.entry(month_key(ts)).or_insert(0) += 1;
        }
    }
    buckets
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthlyIssueCounts {
    pub opened: u64,
    pub closed: u64,
}

/// Combines opened and closed bucketings over the union of their months. A
/// month present on only one side gets 0 on the other, never omitted.
pub fn merge_monthly(
    opened: BTreeMap<String, u64>,
    closed: BTreeMap<String, u64>,
) -> BTreeMap<String, MonthlyIssueCounts> {
    let mut merged: BTreeMap<String, MonthlyIssueCounts> = BTreeMap::new();
    for (month, count) in opened {
        merged.entry(month).or_default().opened = count;
    }
    for (month, count) in closed {
        merged.entry(month).or_default().closed = count;
    }
    merged
}

/// Arithmetic mean of the elapsed time across (start, end) pairs, or `None`
/// when there are no pairs. "No samples" is a representable state, not a
/// zero and not a crash.
pub fn mean_duration(pairs: &[(DateTime<Utc>, DateTime<Utc>)]) -> Option<Duration> {
    if pairs.is_empty() {
        return None;
    }
    let total: i64 = pairs
        .iter()
        .map(|(start, end)| (*end - *start).num_seconds())
        .sum();
    Some(Duration::seconds(total / pairs.len() as i64))
}

/// Renders a duration as `D day(s), HH:MM:SS`, dropping the day component
/// entirely when it is zero.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / 60;
    let seconds = total % 60;

    if days > 0 {
        let unit = if days == 1 { "day" } else { "days" };
        format!("{days} {unit}, {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}
