use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prepaid balance used by the balance checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub phone: String,
    pub holder_name: Option<String>,
    /// Balance in paise.
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTransaction {
    pub phone: String,
    /// Signed amount in paise; debits are negative.
    pub amount: i64,
    pub description: String,
    pub booking_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}
