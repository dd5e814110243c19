//! Aggregator wire format and its mapping onto the engine's remote types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use finlink_core::providers::{
    LiabilityKind, RemoteAccount, RemoteBalances, RemoteItem, RemoteLiability, RemoteTransaction,
    TokenExchange, TransactionsSyncPage,
};

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct PublicTokenExchangeRequest<'a> {
    pub public_token: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AccessTokenRequest<'a> {
    pub access_token: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TransactionsSyncBody<'a> {
    pub access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<&'a str>,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<&'a str>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub display_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTokenExchange {
    pub access_token: String,
    pub item_id: String,
}

impl From<ApiTokenExchange> for TokenExchange {
    fn from(api: ApiTokenExchange) -> Self {
        Self {
            access_token: api.access_token,
            item_id: api.item_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiItemResponse {
    pub item: ApiItem,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiItem {
    pub item_id: String,
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub consent_expiration_time: Option<String>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

impl From<ApiItem> for RemoteItem {
    fn from(api: ApiItem) -> Self {
        Self {
            item_id: api.item_id,
            institution_id: api.institution_id,
            consent_expiration_time: api.consent_expiration_time,
            error_code: api.error.and_then(|e| e.error_code),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiAccountsResponse {
    #[serde(default)]
    pub accounts: Vec<ApiAccount>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiAccount {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub official_name: Option<String>,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub balances: ApiBalances,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiBalances {
    #[serde(default)]
    pub current: Option<Decimal>,
    #[serde(default)]
    pub available: Option<Decimal>,
    #[serde(default)]
    pub limit: Option<Decimal>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    #[serde(default)]
    pub unofficial_currency_code: Option<String>,
}

impl From<ApiAccount> for RemoteAccount {
    fn from(api: ApiAccount) -> Self {
        Self {
            remote_account_id: api.account_id,
            name: api.name,
            official_name: api.official_name,
            account_type: api.account_type,
            subtype: api.subtype,
            mask: api.mask,
            balances: RemoteBalances {
                current: api.balances.current,
                available: api.balances.available,
                limit: api.balances.limit,
                currency: api
                    .balances
                    .iso_currency_code
                    .or(api.balances.unofficial_currency_code),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTransactionsSync {
    #[serde(default)]
    pub added: Vec<ApiTransaction>,
    #[serde(default)]
    pub modified: Vec<ApiTransaction>,
    #[serde(default)]
    pub removed: Vec<ApiRemovedTransaction>,
    pub next_cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    #[serde(default)]
    pub unofficial_currency_code: Option<String>,
    #[serde(default)]
    pub personal_finance_category: Option<ApiCategory>,
    #[serde(default)]
    pub category: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCategory {
    pub primary: String,
    #[serde(default)]
    pub detailed: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRemovedTransaction {
    pub transaction_id: String,
}

impl From<ApiTransaction> for RemoteTransaction {
    fn from(api: ApiTransaction) -> Self {
        let category = api
            .personal_finance_category
            .map(|c| c.detailed.unwrap_or(c.primary))
            .or_else(|| api.category.and_then(|path| path.last().cloned()));
        Self {
            remote_transaction_id: api.transaction_id,
            remote_account_id: api.account_id,
            date: api.date,
            amount: api.amount,
            currency: api.iso_currency_code.or(api.unofficial_currency_code),
            name: api.name,
            merchant_name: api.merchant_name,
            pending: api.pending,
            category,
        }
    }
}

impl From<ApiTransactionsSync> for TransactionsSyncPage {
    fn from(api: ApiTransactionsSync) -> Self {
        Self {
            added: api.added.into_iter().map(RemoteTransaction::from).collect(),
            modified: api.modified.into_iter().map(RemoteTransaction::from).collect(),
            removed: api.removed.into_iter().map(|r| r.transaction_id).collect(),
            next_cursor: api.next_cursor,
            has_more: api.has_more,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiLiabilitiesResponse {
    pub liabilities: ApiLiabilities,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiLiabilities {
    #[serde(default)]
    pub credit: Option<Vec<ApiCreditLiability>>,
    #[serde(default)]
    pub student: Option<Vec<ApiStudentLiability>>,
    #[serde(default)]
    pub mortgage: Option<Vec<ApiMortgageLiability>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCreditLiability {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub last_statement_balance: Option<Decimal>,
    #[serde(default)]
    pub minimum_payment_amount: Option<Decimal>,
    #[serde(default)]
    pub next_payment_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_overdue: Option<bool>,
    #[serde(default)]
    pub aprs: Vec<ApiApr>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiApr {
    pub apr_percentage: Decimal,
    pub apr_type: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiStudentLiability {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub last_statement_balance: Option<Decimal>,
    #[serde(default)]
    pub minimum_payment_amount: Option<Decimal>,
    #[serde(default)]
    pub next_payment_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub interest_rate_percentage: Option<Decimal>,
    #[serde(default)]
    pub is_overdue: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMortgageLiability {
    pub account_id: String,
    #[serde(default)]
    pub next_monthly_payment: Option<Decimal>,
    #[serde(default)]
    pub next_payment_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub interest_rate: Option<ApiInterestRate>,
    #[serde(default)]
    pub past_due_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiInterestRate {
    #[serde(default)]
    pub percentage: Option<Decimal>,
}

impl ApiLiabilities {
    /// Flattens the per-kind lists. Entries without an account id are dropped.
    pub fn into_remote(self) -> Vec<RemoteLiability> {
        let mut out = Vec::new();

        for credit in self.credit.unwrap_or_default() {
            let Some(remote_account_id) = credit.account_id else {
                continue;
            };
            let purchase_apr = credit
                .aprs
                .iter()
                .find(|apr| apr.apr_type == "purchase_apr")
                .or_else(|| credit.aprs.first())
                .map(|apr| apr.apr_percentage);
            out.push(RemoteLiability {
                remote_account_id,
                kind: LiabilityKind::Credit,
                last_statement_balance: credit.last_statement_balance,
                minimum_payment_amount: credit.minimum_payment_amount,
                next_payment_due_date: credit.next_payment_due_date,
                interest_rate_percentage: purchase_apr,
                is_overdue: credit.is_overdue,
            });
        }

        for student in self.student.unwrap_or_default() {
            let Some(remote_account_id) = student.account_id else {
                continue;
            };
            out.push(RemoteLiability {
                remote_account_id,
                kind: LiabilityKind::Student,
                last_statement_balance: student.last_statement_balance,
                minimum_payment_amount: student.minimum_payment_amount,
                next_payment_due_date: student.next_payment_due_date,
                interest_rate_percentage: student.interest_rate_percentage,
                is_overdue: student.is_overdue,
            });
        }

        for mortgage in self.mortgage.unwrap_or_default() {
            let overdue = mortgage.past_due_amount.map(|d| d > Decimal::ZERO);
            out.push(RemoteLiability {
                remote_account_id: mortgage.account_id,
                kind: LiabilityKind::Mortgage,
                last_statement_balance: None,
                minimum_payment_amount: mortgage.next_monthly_payment,
                next_payment_due_date: mortgage.next_payment_due_date,
                interest_rate_percentage: mortgage.interest_rate.and_then(|r| r.percentage),
                is_overdue: overdue,
            });
        }

        out
    }
}
