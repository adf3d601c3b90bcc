use serde::{Deserialize, Serialize};

/// An open issue as fetched from the tracker. Timestamps keep the API's
/// RFC 3339 text so unparseable values can be rendered unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub body: String,
    pub comment_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub author: String,
    pub created_at: String,
    pub body: String,
}
