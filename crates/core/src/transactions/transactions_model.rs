//! Transaction domain models.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounts::is_sign_inverted;
use crate::providers::RemoteTransaction;

/// A stored transaction. Negative amounts are outflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub remote_transaction_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub name: String,
    pub merchant_name: Option<String>,
    pub pending: bool,
    pub category: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Insert-or-update keyed by `(account, remote transaction id)`.
///
/// `amount` is already in stored sign convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpsert {
    pub remote_transaction_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub name: String,
    pub merchant_name: Option<String>,
    pub pending: bool,
    pub category: Option<String>,
}

impl TransactionUpsert {
    /// Converts an aggregator transaction for an account of `account_type`.
    pub fn from_remote(account_type: &str, remote: RemoteTransaction) -> Self {
        Self {
            amount: normalize_amount(account_type, remote.amount),
            remote_transaction_id: remote.remote_transaction_id,
            date: remote.date,
            currency: remote.currency,
            name: remote.name,
            merchant_name: remote.merchant_name,
            pending: remote.pending,
            category: remote.category,
        }
    }
}

/// Converts an aggregator amount to stored convention (negative = outflow).
///
/// Credit and loan accounts report charges as positive amounts, so their sign
/// is inverted; every other account type is stored as reported.
pub fn normalize_amount(account_type: &str, amount: Decimal) -> Decimal {
    if is_sign_inverted(account_type) {
        -amount
    } else {
        amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn depository_amounts_are_stored_as_reported() {
        assert_eq!(normalize_amount("depository", dec!(-12.50)), dec!(-12.50));
        assert_eq!(normalize_amount("depository", dec!(1000)), dec!(1000));
    }

    #[test]
    fn credit_and_loan_amounts_are_inverted() {
        // A card purchase arrives positive and is stored as an outflow.
        assert_eq!(normalize_amount("credit", dec!(12.50)), dec!(-12.50));
        assert_eq!(normalize_amount("loan", dec!(-250)), dec!(250));
        assert_eq!(normalize_amount("Credit", dec!(40)), dec!(-40));
    }

    #[test]
    fn upsert_from_remote_applies_the_account_convention() {
        let remote = RemoteTransaction {
            remote_transaction_id: "tx-1".to_string(),
            remote_account_id: "remote-1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            amount: dec!(89.40),
            currency: Some("USD".to_string()),
            name: "Grocer".to_string(),
            merchant_name: None,
            pending: false,
            category: None,
        };
        let upsert = TransactionUpsert::from_remote("credit", remote);
        assert_eq!(upsert.amount, dec!(-89.40));
        assert_eq!(upsert.remote_transaction_id, "tx-1");
    }
}
