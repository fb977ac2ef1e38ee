//! Payment method chosen at checkout.

use serde::{Deserialize, Serialize};

/// Error returned when a payment method string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown payment method: {0:?}")]
pub struct PaymentMethodError(pub String);

/// How an order is paid for.
///
/// Stored as `TEXT` (`COD` / `CARD`) in `shop.customer_order.payment_method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    /// Paid in cash when the parcel arrives. Orders are marked paid at creation.
    #[default]
    #[serde(rename = "COD")]
    CashOnDelivery,
    /// Paid by card through the payment processor; confirmed by webhook.
    #[serde(rename = "CARD")]
    Card,
}

impl PaymentMethod {
    /// Stored code for this method.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "COD",
            Self::Card => "CARD",
        }
    }

    /// Human-readable label for order pages and the CLI.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Cash on Delivery",
            Self::Card => "Credit/Debit Card",
        }
    }

    /// Whether an order placed with this method counts as paid immediately.
    #[must_use]
    pub const fn paid_on_creation(self) -> bool {
        matches!(self, Self::CashOnDelivery)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = PaymentMethodError;

    /// Accepts the stored codes in any case, plus `stripe` from older forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" => Ok(Self::CashOnDelivery),
            "card" | "stripe" => Ok(Self::Card),
            _ => Err(PaymentMethodError(s.to_owned())),
        }
    }
}

// SQLx support (with postgres feature): stored as its code in a TEXT column.
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PaymentMethod {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PaymentMethod {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PaymentMethod {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.code(), buf)
    }
}
