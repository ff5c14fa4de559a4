use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    EventDetails, EventRecord, NewPayment, PaymentRecord, PolicyHolderDetails,
    PolicyHolderRecord, PolicyIssue, PolicyNumber, PolicyRecord, QuoteFilter, QuoteNumber,
    QuoteRecord, RecordId, VenueDetails, VenueRecord,
};

/// Relational storage for the quote → policy aggregate.
///
/// Implementations own referential integrity: deleting a quote removes its
/// event, venue, policy holder, policy and payments, and [`issue_policy`]
/// runs as one transaction. `update_quote` never writes
/// `converted_to_policy`; only [`issue_policy`] sets it.
///
/// [`issue_policy`]: InsuranceRepository::issue_policy
pub trait InsuranceRepository: Send + Sync {
    fn insert_quote(&self, quote: QuoteRecord) -> Result<QuoteRecord, StoreError>;
    fn update_quote(&self, quote: &QuoteRecord) -> Result<(), StoreError>;
    fn fetch_quote(&self, number: &QuoteNumber) -> Result<Option<QuoteRecord>, StoreError>;
    fn list_quotes(&self, filter: &QuoteFilter) -> Result<Vec<QuoteRecord>, StoreError>;
    fn delete_quote(&self, number: &QuoteNumber) -> Result<(), StoreError>;

    /// Create or replace the event and venue attached to a quote.
    fn save_event(
        &self,
        quote: &QuoteNumber,
        event: EventDetails,
        venue: VenueDetails,
    ) -> Result<(EventRecord, VenueRecord), StoreError>;
    fn fetch_event(&self, id: RecordId) -> Result<Option<EventRecord>, StoreError>;
    fn event_for_quote(&self, quote: &QuoteNumber) -> Result<Option<EventRecord>, StoreError>;
    fn update_event(&self, id: RecordId, details: EventDetails) -> Result<EventRecord, StoreError>;
    fn delete_event(&self, id: RecordId) -> Result<(), StoreError>;

    fn fetch_venue(&self, id: RecordId) -> Result<Option<VenueRecord>, StoreError>;
    fn venue_for_event(&self, event_id: RecordId) -> Result<Option<VenueRecord>, StoreError>;
    fn update_venue(&self, id: RecordId, details: VenueDetails) -> Result<VenueRecord, StoreError>;
    fn delete_venue(&self, id: RecordId) -> Result<(), StoreError>;

    /// Create or replace the policy holder attached to a quote.
    fn save_policy_holder(
        &self,
        quote: &QuoteNumber,
        details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError>;
    fn fetch_policy_holder(&self, id: RecordId) -> Result<Option<PolicyHolderRecord>, StoreError>;
    fn policy_holder_for_quote(
        &self,
        quote: &QuoteNumber,
    ) -> Result<Option<PolicyHolderRecord>, StoreError>;
    fn update_policy_holder(
        &self,
        id: RecordId,
        details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError>;
    fn delete_policy_holder(&self, id: RecordId) -> Result<(), StoreError>;

    /// Atomically link `policy` to its quote and flag the quote as converted.
    ///
    /// Returns the already-linked policy untouched when the quote was converted
    /// earlier, `NotFound` when the quote is missing and `Conflict` when the
    /// policy number is taken.
    fn issue_policy(&self, policy: PolicyRecord) -> Result<PolicyIssue, StoreError>;
    fn fetch_policy(&self, number: &PolicyNumber) -> Result<Option<PolicyRecord>, StoreError>;
    fn policy_for_quote(&self, quote: &QuoteNumber) -> Result<Option<PolicyRecord>, StoreError>;
    fn list_policies(&self) -> Result<Vec<PolicyRecord>, StoreError>;
    fn update_policy(&self, policy: &PolicyRecord) -> Result<(), StoreError>;
    /// Removes the policy together with its payments, quote and the quote's children.
    fn delete_policy(&self, number: &PolicyNumber) -> Result<(), StoreError>;
    fn count_policies_issued_on(&self, day: NaiveDate) -> Result<u32, StoreError>;

    fn insert_payment(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError>;
    fn fetch_payment(&self, id: RecordId) -> Result<Option<PaymentRecord>, StoreError>;
    fn list_payments(
        &self,
        policy: Option<&PolicyNumber>,
    ) -> Result<Vec<PaymentRecord>, StoreError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("constraint violated: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound customer messaging (quote e-mails, policy documents).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    QuoteCreated,
    PolicyIssued,
}

impl NotificationTemplate {
    pub fn label(self) -> &'static str {
        match self {
            NotificationTemplate::QuoteCreated => "quote_created",
            NotificationTemplate::PolicyIssued => "policy_issued",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: NotificationTemplate,
    pub recipient: String,
    pub reference: String,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
