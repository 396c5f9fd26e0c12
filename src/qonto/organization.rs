use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Organization {
    pub slug: String,
    #[serde(default)]
    pub bank_accounts: Vec<BankAccount>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BankAccount {
    pub slug: String,
    pub iban: String,
    pub bic: String,
    pub currency: String,
    pub balance: f64,
    pub balance_cents: i64,
    pub authorized_balance: f64,
    pub authorized_balance_cents: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrganizationRes {
    pub organization: Organization,
}

impl fmt::Display for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.slug)?;
        for account in &self.bank_accounts {
            write!(f, "{account}")?;
        }
        Ok(())
    }
}

impl fmt::Display for BankAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    Slug: {}", self.slug)?;
        writeln!(f, "    IBAN: {}", self.iban)?;
        writeln!(f, "    BIC: {}", self.bic)?;
        writeln!(f, "    Currency: {}", self.currency)?;
        writeln!(f, "    Balance: {:.2}", self.balance)?;
        writeln!(f, "    Balance (cents): {}", self.balance_cents)?;
        writeln!(f, "    Authorized Balance: {:.2}", self.authorized_balance)?;
        writeln!(
            f,
            "    Authorized Balance (cents): {}",
            self.authorized_balance_cents
        )
    }
}
