use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The database string doubles as the serde name.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    Patient => "patient",
    Doctor => "doctor",
    Admin => "admin",
});

str_enum!(AppointmentType {
    Virtual => "virtual",
    InPerson => "in-person",
});

str_enum!(AppointmentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(PaymentStatus {
    Unpaid => "unpaid",
    Paid => "paid",
});

str_enum!(TransactionKind {
    Deposit => "Deposit",
    Payment => "Payment",
});

impl AppointmentStatus {
    /// Transitions an administrator may apply. Rescheduling bypasses this
    /// and always lands on `Pending`.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        self == next
            || matches!(
                (self, next),
                (Pending, Confirmed)
                    | (Confirmed, Completed)
                    | (Pending, Cancelled)
                    | (Confirmed, Cancelled)
            )
    }

    /// Pending and confirmed appointments still lie ahead of the patient.
    pub fn is_upcoming(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        !(self == PaymentStatus::Paid && next == PaymentStatus::Unpaid)
    }
}

/// How money moves in or out of a wallet. Card and blockchain are external
/// rails; `Wallet` spends the stored balance.
///
/// Stored capitalised; request bodies may use the lowercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "Card", alias = "card")]
    Card,
    #[serde(rename = "Blockchain", alias = "blockchain")]
    Blockchain,
    #[serde(rename = "Wallet", alias = "wallet")]
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "Card",
            Self::Blockchain => "Blockchain",
            Self::Wallet => "Wallet",
        }
    }

    /// External rails settle outside the stored balance.
    pub fn is_external(&self) -> bool {
        !matches!(self, Self::Wallet)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "card" => Ok(Self::Card),
            "blockchain" => Ok(Self::Blockchain),
            "wallet" => Ok(Self::Wallet),
            _ => Err(DatabaseError::InvalidEnum {
                field: "PaymentMethod".into(),
                value: s.into(),
            }),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
