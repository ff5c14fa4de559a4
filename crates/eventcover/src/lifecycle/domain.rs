use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::{GuestRange, LiabilityOption, PremiumBreakdown, PremiumInputs, UnknownKey};

/// Row identifier for child records (events, venues, policy holders, payments).
pub type RecordId = i64;

/// Human-readable quote identifier, e.g. `QC-20261016-482913`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteNumber(pub String);

impl fmt::Display for QuoteNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable policy identifier, e.g. `PC-20261016-0003`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyNumber(pub String);

impl fmt::Display for PolicyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! keyed_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $key:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownKey;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($key => Ok($name::$variant),)+
                    other => Err(UnknownKey::new($kind, other)),
                }
            }
        }
    };
}

/// Channel that originated a quote; carried through to the policy number prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    #[default]
    Customer,
    Admin,
}

keyed_enum!(QuoteSource, "quote source", {
    Customer => "customer",
    Admin => "admin",
});

/// Wizard progress. Ordering follows the wizard, so saves only ever raise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Step1,
    Step2,
    Step3,
    Complete,
}

keyed_enum!(QuoteStatus, "quote status", {
    Step1 => "step1",
    Step2 => "step2",
    Step3 => "step3",
    Complete => "complete",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    #[default]
    Active,
    Cancelled,
}

keyed_enum!(PolicyStatus, "policy status", {
    Active => "active",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Check,
    Ach,
}

keyed_enum!(PaymentMethod, "payment method", {
    Card => "card",
    Check => "check",
    Ach => "ach",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Completed,
    Failed,
}

keyed_enum!(PaymentStatus, "payment status", {
    Completed => "completed",
    Failed => "failed",
});

/// Step one of the wizard: everything needed to price the quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDetails {
    pub resident_state: String,
    pub event_type: String,
    pub event_date: NaiveDate,
    pub guest_range: GuestRange,
    pub coverage_level: u8,
    #[serde(default)]
    pub liability_option: LiabilityOption,
    #[serde(default)]
    pub liquor_liability: bool,
    #[serde(default)]
    pub covid_disclosure: bool,
    #[serde(default)]
    pub special_activities: bool,
    pub email: String,
}

impl QuoteDetails {
    pub fn premium_inputs(&self) -> PremiumInputs {
        PremiumInputs {
            coverage_level: self.coverage_level,
            liability_option: self.liability_option,
            guest_range: self.guest_range,
            liquor_liability: self.liquor_liability,
        }
    }

    pub fn premium(&self) -> PremiumBreakdown {
        self.premium_inputs().premium()
    }
}

/// Payload accepted when a quote is first created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSubmission {
    #[serde(default)]
    pub source: QuoteSource,
    #[serde(flatten)]
    pub details: QuoteDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub quote_number: QuoteNumber,
    pub source: QuoteSource,
    pub status: QuoteStatus,
    #[serde(flatten)]
    pub details: QuoteDetails,
    #[serde(flatten)]
    pub premium: PremiumBreakdown,
    pub converted_to_policy: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query-string filter for quote listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct QuoteFilter {
    pub status: Option<QuoteStatus>,
    pub source: Option<QuoteSource>,
    pub converted: Option<bool>,
}

impl QuoteFilter {
    pub fn matches(&self, quote: &QuoteRecord) -> bool {
        self.status.map_or(true, |status| quote.status == status)
            && self.source.map_or(true, |source| quote.source == source)
            && self
                .converted
                .map_or(true, |converted| quote.converted_to_policy == converted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    pub honoree1_first_name: String,
    pub honoree1_last_name: String,
    #[serde(default)]
    pub honoree2_first_name: Option<String>,
    #[serde(default)]
    pub honoree2_last_name: Option<String>,
    pub ceremony_location_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueDetails {
    pub name: String,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    #[serde(default)]
    pub as_insured: bool,
}

/// Step two of the wizard: the event and the venue hosting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubmission {
    pub quote_number: QuoteNumber,
    #[serde(flatten)]
    pub event: EventDetails,
    pub venue: VenueDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: RecordId,
    pub quote_number: QuoteNumber,
    #[serde(flatten)]
    pub details: EventDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueRecord {
    pub id: RecordId,
    pub event_id: RecordId,
    #[serde(flatten)]
    pub details: VenueDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyHolderDetails {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub relationship: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    #[serde(default)]
    pub hear_about_us: Option<String>,
    #[serde(default)]
    pub legal_notices_accepted: bool,
}

/// Step three of the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyHolderSubmission {
    pub quote_number: QuoteNumber,
    #[serde(flatten)]
    pub details: PolicyHolderDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyHolderRecord {
    pub id: RecordId,
    pub quote_number: QuoteNumber,
    #[serde(flatten)]
    pub details: PolicyHolderDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub policy_number: PolicyNumber,
    pub quote_number: QuoteNumber,
    pub source: QuoteSource,
    pub status: PolicyStatus,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PolicyStatusUpdate {
    pub status: PolicyStatus,
}

/// Payment instruction received from checkout or the admin portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub quote_number: QuoteNumber,
    /// Whole US dollars.
    pub amount: u32,
    pub method: PaymentMethod,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Payment row before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub policy_number: PolicyNumber,
    pub amount: u32,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: RecordId,
    pub policy_number: PolicyNumber,
    pub amount: u32,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaymentFilter {
    pub policy_number: Option<PolicyNumber>,
}

/// A quote together with every record hanging off it, as shown in the admin portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteView {
    #[serde(flatten)]
    pub quote: QuoteRecord,
    pub event: Option<EventRecord>,
    pub venue: Option<VenueRecord>,
    pub policy_holder: Option<PolicyHolderRecord>,
    pub policy: Option<PolicyRecord>,
}

/// Result of an issuance attempt; conversion is idempotent per quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "policy", rename_all = "snake_case")]
pub enum PolicyIssue {
    Created(PolicyRecord),
    Existing(PolicyRecord),
}

impl PolicyIssue {
    pub fn policy(&self) -> &PolicyRecord {
        match self {
            PolicyIssue::Created(policy) | PolicyIssue::Existing(policy) => policy,
        }
    }

    pub fn into_policy(self) -> PolicyRecord {
        match self {
            PolicyIssue::Created(policy) | PolicyIssue::Existing(policy) => policy,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, PolicyIssue::Created(_))
    }
}

/// Response body for a recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub payment: PaymentRecord,
    pub policy: PolicyRecord,
    pub policy_created: bool,
}
