//! Request and response bodies shared by the HTTP handlers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ForceQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLogsQuery {
    pub account_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub is_hidden: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeAccountsRequest {
    pub account_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollapseBalancesRequest {
    pub account_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummaryQuery {
    pub since_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecordedResponse {
    pub recorded: usize,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}
