/// Account type constants, as reported by the aggregator.
pub mod account_types {
    pub const DEPOSITORY: &str = "depository";
    pub const CREDIT: &str = "credit";
    pub const LOAN: &str = "loan";
    pub const INVESTMENT: &str = "investment";
    pub const OTHER: &str = "other";
}

/// Account types whose aggregator amounts use the inverted sign convention.
pub const SIGN_INVERTED_ACCOUNT_TYPES: [&str; 2] = [account_types::CREDIT, account_types::LOAN];
