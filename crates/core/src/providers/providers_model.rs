//! Typed results returned by the aggregator, independent of its wire format.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of exchanging a short-lived public token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenExchange {
    pub access_token: String,
    pub item_id: String,
}

/// Remote item (one authorised login at one institution).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    pub item_id: String,
    pub institution_id: Option<String>,
    pub consent_expiration_time: Option<String>,
    /// Error code the aggregator currently reports for the item, if any.
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBalances {
    pub current: Option<Decimal>,
    pub available: Option<Decimal>,
    pub limit: Option<Decimal>,
    pub currency: Option<String>,
}

/// An account as the aggregator currently reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccount {
    pub remote_account_id: String,
    pub name: String,
    pub official_name: Option<String>,
    pub account_type: String,
    pub subtype: Option<String>,
    pub mask: Option<String>,
    pub balances: RemoteBalances,
}

/// A transaction as reported; credit and loan amounts use the inverted sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTransaction {
    pub remote_transaction_id: String,
    pub remote_account_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub name: String,
    pub merchant_name: Option<String>,
    pub pending: bool,
    pub category: Option<String>,
}

/// Parameters for one `transactions/sync` page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionsSyncRequest {
    /// `None` requests full history.
    pub cursor: Option<String>,
    pub count: u32,
    pub remote_account_id: Option<String>,
}

/// One page of a cursor-based transaction sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionsSyncPage {
    pub added: Vec<RemoteTransaction>,
    pub modified: Vec<RemoteTransaction>,
    /// Remote transaction ids deleted upstream.
    pub removed: Vec<String>,
    pub next_cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiabilityKind {
    Credit,
    Student,
    Mortgage,
}

/// Liability details for one remote account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLiability {
    pub remote_account_id: String,
    pub kind: LiabilityKind,
    pub last_statement_balance: Option<Decimal>,
    pub minimum_payment_amount: Option<Decimal>,
    pub next_payment_due_date: Option<NaiveDate>,
    pub interest_rate_percentage: Option<Decimal>,
    pub is_overdue: Option<bool>,
}
