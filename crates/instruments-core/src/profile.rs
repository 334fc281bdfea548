//! Query profiling summaries built from timed work.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

const TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    UseKeyspace,
    Select,
    Update,
    Delete,
    Batch,
    Unknown,
}

impl QueryKind {
    pub fn classify(query: &str) -> Self {
        if query.starts_with("USE") {
            QueryKind::UseKeyspace
        } else if query.starts_with("SELECT") {
            QueryKind::Select
        } else if query.starts_with("UPDATE") {
            QueryKind::Update
        } else if query.starts_with("DELETE") {
            QueryKind::Delete
        } else if query.contains("BATCH") {
            QueryKind::Batch
        } else {
            QueryKind::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::UseKeyspace => "use_keyspace",
            QueryKind::Select => "select",
            QueryKind::Update => "update",
            QueryKind::Delete => "delete",
            QueryKind::Batch => "batch",
            QueryKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySample {
    pub query: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryUsage {
    pub query: String,
    pub used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileReport {
    pub total_time: Duration,
    /// Most frequently issued queries, most used first.
    pub top_used: Vec<QueryUsage>,
    /// Slowest individual samples, ascending by elapsed time.
    pub top_time: Vec<QuerySample>,
}

pub fn summarize_queries(samples: &[QuerySample]) -> ProfileReport {
    let total_time = samples.iter().map(|s| s.elapsed).sum();

    // first-seen order breaks ties in the usage ranking
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut usage: Vec<QueryUsage> = Vec::new();
    for s in samples {
        match index.get(s.query.as_str()) {
            Some(&i) => usage[i].used += 1,
            None => {
                index.insert(&s.query, usage.len());
                usage.push(QueryUsage {
                    query: s.query.clone(),
                    used: 1,
                });
            }
        }
    }
    usage.sort_by(|a, b| b.used.cmp(&a.used));
    usage.truncate(TOP_N);

    let mut by_time = samples.to_vec();
    by_time.sort_by_key(|s| s.elapsed);
    let top_time = by_time.split_off(by_time.len().saturating_sub(TOP_N));

    ProfileReport {
        total_time,
        top_used: usage,
        top_time,
    }
}
