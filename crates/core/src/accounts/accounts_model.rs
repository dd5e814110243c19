//! Account domain models.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::accounts_constants::SIGN_INVERTED_ACCOUNT_TYPES;
use crate::providers::RemoteAccount;
use crate::{errors::ValidationError, Error, Result};

/// Domain model representing a linked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    /// Connection that currently owns the account.
    pub connection_id: String,
    /// Aggregator account id. Unique across non-archived accounts.
    pub remote_account_id: String,
    pub name: String,
    pub official_name: Option<String>,
    pub account_type: String,
    pub subtype: Option<String>,
    /// Last four digits of the account number
    pub mask: Option<String>,
    pub is_archived: bool,
    pub is_hidden: bool,
    /// Opaque transaction sync cursor; `None` means never synced.
    pub sync_cursor: Option<String>,
    pub last_synced_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Account {
    pub fn identity(&self) -> AccountIdentity {
        AccountIdentity::new(
            &self.name,
            &self.account_type,
            self.subtype.as_deref(),
            self.mask.as_deref(),
        )
    }

    /// Credit and loan amounts are stored with the sign flipped.
    pub fn is_sign_inverted(&self) -> bool {
        is_sign_inverted(&self.account_type)
    }
}

pub fn is_sign_inverted(account_type: &str) -> bool {
    let account_type = account_type.trim().to_ascii_lowercase();
    SIGN_INVERTED_ACCOUNT_TYPES.contains(&account_type.as_str())
}

/// Normalized `(name, type, subtype, mask)` used to recognise the same physical
/// account across links.
///
/// Comparison ignores case and surrounding whitespace. A blank mask counts as
/// missing, and two identities with missing masks on both sides compare equal
/// when the rest matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub name: String,
    pub account_type: String,
    pub subtype: Option<String>,
    pub mask: Option<String>,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalize_opt(value: Option<&str>) -> Option<String> {
    value.map(normalize).filter(|v| !v.is_empty())
}

impl AccountIdentity {
    pub fn new(name: &str, account_type: &str, subtype: Option<&str>, mask: Option<&str>) -> Self {
        Self {
            name: normalize(name),
            account_type: normalize(account_type),
            subtype: normalize_opt(subtype),
            mask: normalize_opt(mask),
        }
    }

    pub fn of_remote(account: &RemoteAccount) -> Self {
        Self::new(
            &account.name,
            &account.account_type,
            account.subtype.as_deref(),
            account.mask.as_deref(),
        )
    }
}

/// Input model for creating an account under a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub connection_id: String,
    pub remote_account_id: String,
    pub name: String,
    pub official_name: Option<String>,
    pub account_type: String,
    pub subtype: Option<String>,
    pub mask: Option<String>,
}

impl NewAccount {
    pub fn from_remote(connection_id: &str, remote: &RemoteAccount) -> Self {
        Self {
            id: None,
            connection_id: connection_id.to_string(),
            remote_account_id: remote.remote_account_id.clone(),
            name: remote.name.clone(),
            official_name: remote.official_name.clone(),
            account_type: remote.account_type.clone(),
            subtype: remote.subtype.clone(),
            mask: remote.mask.clone(),
        }
    }

    /// Validates the new account data.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Account name cannot be empty".to_string(),
            )));
        }
        if self.remote_account_id.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "remoteAccountId".to_string(),
            )));
        }
        if self.connection_id.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "connectionId".to_string(),
            )));
        }
        Ok(())
    }
}

/// Descriptive fields refreshed from the aggregator on an existing account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetailsUpdate {
    pub name: String,
    pub official_name: Option<String>,
    pub account_type: String,
    pub subtype: Option<String>,
    pub mask: Option<String>,
}

impl From<&RemoteAccount> for AccountDetailsUpdate {
    fn from(remote: &RemoteAccount) -> Self {
        Self {
            name: remote.name.clone(),
            official_name: remote.official_name.clone(),
            account_type: remote.account_type.clone(),
            subtype: remote.subtype.clone(),
            mask: remote.mask.clone(),
        }
    }
}

/// History facts used to rank accounts against each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountActivity {
    pub latest_transaction_date: Option<NaiveDate>,
    pub transaction_count: i64,
    pub balance_count: i64,
}
