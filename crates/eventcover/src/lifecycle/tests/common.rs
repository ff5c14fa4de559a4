use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::lifecycle::domain::{
    EventDetails, EventRecord, EventSubmission, NewPayment, PaymentRecord, PolicyHolderDetails,
    PolicyHolderRecord, PolicyHolderSubmission, PolicyIssue, PolicyNumber, PolicyRecord,
    QuoteDetails, QuoteFilter, QuoteNumber, QuoteRecord, QuoteSource, QuoteSubmission, RecordId,
    VenueDetails, VenueRecord,
};
use crate::lifecycle::repository::{
    InsuranceRepository, Notification, NotificationError, NotificationPublisher, StoreError,
};
use crate::lifecycle::QuoteLifecycleService;
use crate::pricing::{GuestRange, LiabilityOption};
use crate::storage::InMemoryRepository;

pub(super) type MemoryService = QuoteLifecycleService<InMemoryRepository, MemoryNotifier>;

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn event_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 12).expect("valid date")
}

pub(super) fn quote_details() -> QuoteDetails {
    QuoteDetails {
        resident_state: "IA".to_string(),
        event_type: "wedding".to_string(),
        event_date: event_date(),
        guest_range: GuestRange::UpTo150,
        coverage_level: 5,
        liability_option: LiabilityOption::Option2,
        liquor_liability: true,
        covid_disclosure: true,
        special_activities: false,
        email: "jordan.ellis@example.com".to_string(),
    }
}

pub(super) fn quote_submission(source: QuoteSource) -> QuoteSubmission {
    QuoteSubmission {
        source,
        details: quote_details(),
    }
}

pub(super) fn event_details() -> EventDetails {
    EventDetails {
        honoree1_first_name: "Jordan".to_string(),
        honoree1_last_name: "Ellis".to_string(),
        honoree2_first_name: Some("Riley".to_string()),
        honoree2_last_name: Some("Park".to_string()),
        ceremony_location_type: "indoor".to_string(),
    }
}

pub(super) fn venue_details() -> VenueDetails {
    VenueDetails {
        name: "Terrace Hill".to_string(),
        address1: "2300 Grand Ave".to_string(),
        address2: None,
        city: "Des Moines".to_string(),
        state: "IA".to_string(),
        zip: "50312".to_string(),
        country: "US".to_string(),
        as_insured: true,
    }
}

pub(super) fn event_submission(quote_number: &QuoteNumber) -> EventSubmission {
    EventSubmission {
        quote_number: quote_number.clone(),
        event: event_details(),
        venue: venue_details(),
    }
}

pub(super) fn holder_details() -> PolicyHolderDetails {
    PolicyHolderDetails {
        first_name: "Jordan".to_string(),
        last_name: "Ellis".to_string(),
        phone: "515-555-0142".to_string(),
        relationship: "honoree".to_string(),
        address: "812 Locust St".to_string(),
        city: "Des Moines".to_string(),
        state: "IA".to_string(),
        zip: "50309".to_string(),
        country: "US".to_string(),
        hear_about_us: Some("venue referral".to_string()),
        legal_notices_accepted: true,
    }
}

pub(super) fn holder_submission(quote_number: &QuoteNumber) -> PolicyHolderSubmission {
    PolicyHolderSubmission {
        quote_number: quote_number.clone(),
        details: holder_details(),
    }
}

pub(super) fn build_service() -> (MemoryService, Arc<InMemoryRepository>, Arc<MemoryNotifier>) {
    let repository = Arc::new(InMemoryRepository::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service =
        QuoteLifecycleService::new(repository.clone(), notifier.clone()).with_clock(fixed_now);
    (service, repository, notifier)
}

/// Walks a quote through every wizard step and marks it complete.
pub(super) fn completed_quote<R>(
    service: &QuoteLifecycleService<R, MemoryNotifier>,
    source: QuoteSource,
) -> QuoteRecord
where
    R: InsuranceRepository + 'static,
{
    let quote = service
        .create_quote(quote_submission(source))
        .expect("quote created");
    service
        .save_event(event_submission(&quote.quote_number))
        .expect("event saved");
    service
        .save_policy_holder(holder_submission(&quote.quote_number))
        .expect("holder saved");
    service
        .complete_quote(&quote.quote_number)
        .expect("quote completes")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is json")
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationPublisher for MemoryNotifier {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationPublisher for FailingNotifier {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

fn unavailable<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

impl InsuranceRepository for UnavailableRepository {
    fn insert_quote(&self, _quote: QuoteRecord) -> Result<QuoteRecord, StoreError> {
        unavailable()
    }
    fn update_quote(&self, _quote: &QuoteRecord) -> Result<(), StoreError> {
        unavailable()
    }
    fn fetch_quote(&self, _number: &QuoteNumber) -> Result<Option<QuoteRecord>, StoreError> {
        unavailable()
    }
    fn list_quotes(&self, _filter: &QuoteFilter) -> Result<Vec<QuoteRecord>, StoreError> {
        unavailable()
    }
    fn delete_quote(&self, _number: &QuoteNumber) -> Result<(), StoreError> {
        unavailable()
    }
    fn save_event(
        &self,
        _quote: &QuoteNumber,
        _event: EventDetails,
        _venue: VenueDetails,
    ) -> Result<(EventRecord, VenueRecord), StoreError> {
        unavailable()
    }
    fn fetch_event(&self, _id: RecordId) -> Result<Option<EventRecord>, StoreError> {
        unavailable()
    }
    fn event_for_quote(&self, _quote: &QuoteNumber) -> Result<Option<EventRecord>, StoreError> {
        unavailable()
    }
    fn update_event(&self, _id: RecordId, _details: EventDetails) -> Result<EventRecord, StoreError> {
        unavailable()
    }
    fn delete_event(&self, _id: RecordId) -> Result<(), StoreError> {
        unavailable()
    }
    fn fetch_venue(&self, _id: RecordId) -> Result<Option<VenueRecord>, StoreError> {
        unavailable()
    }
    fn venue_for_event(&self, _event_id: RecordId) -> Result<Option<VenueRecord>, StoreError> {
        unavailable()
    }
    fn update_venue(&self, _id: RecordId, _details: VenueDetails) -> Result<VenueRecord, StoreError> {
        unavailable()
    }
    fn delete_venue(&self, _id: RecordId) -> Result<(), StoreError> {
        unavailable()
    }
    fn save_policy_holder(
        &self,
        _quote: &QuoteNumber,
        _details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError> {
        unavailable()
    }
    fn fetch_policy_holder(&self, _id: RecordId) -> Result<Option<PolicyHolderRecord>, StoreError> {
        unavailable()
    }
    fn policy_holder_for_quote(
        &self,
        _quote: &QuoteNumber,
    ) -> Result<Option<PolicyHolderRecord>, StoreError> {
        unavailable()
    }
    fn update_policy_holder(
        &self,
        _id: RecordId,
        _details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError> {
        unavailable()
    }
    fn delete_policy_holder(&self, _id: RecordId) -> Result<(), StoreError> {
        unavailable()
    }
    fn issue_policy(&self, _policy: PolicyRecord) -> Result<PolicyIssue, StoreError> {
        unavailable()
    }
    fn fetch_policy(&self, _number: &PolicyNumber) -> Result<Option<PolicyRecord>, StoreError> {
        unavailable()
    }
    fn policy_for_quote(&self, _quote: &QuoteNumber) -> Result<Option<PolicyRecord>, StoreError> {
        unavailable()
    }
    fn list_policies(&self) -> Result<Vec<PolicyRecord>, StoreError> {
        unavailable()
    }
    fn update_policy(&self, _policy: &PolicyRecord) -> Result<(), StoreError> {
        unavailable()
    }
    fn delete_policy(&self, _number: &PolicyNumber) -> Result<(), StoreError> {
        unavailable()
    }
    fn count_policies_issued_on(&self, _day: NaiveDate) -> Result<u32, StoreError> {
        unavailable()
    }
    fn insert_payment(&self, _payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        unavailable()
    }
    fn fetch_payment(&self, _id: RecordId) -> Result<Option<PaymentRecord>, StoreError> {
        unavailable()
    }
    fn list_payments(
        &self,
        _policy: Option<&PolicyNumber>,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        unavailable()
    }
}

/// In-memory store where another writer links a policy to the quote just
/// before the first `issue_policy` call lands, which then sees a conflict.
#[derive(Default)]
pub(super) struct RacingRepository {
    pub(super) inner: InMemoryRepository,
    raced: AtomicBool,
}

pub(super) const RACED_POLICY: &str = "PC-20260601-0777";

impl InsuranceRepository for RacingRepository {
    fn insert_quote(&self, quote: QuoteRecord) -> Result<QuoteRecord, StoreError> {
        self.inner.insert_quote(quote)
    }
    fn update_quote(&self, quote: &QuoteRecord) -> Result<(), StoreError> {
        self.inner.update_quote(quote)
    }
    fn fetch_quote(&self, number: &QuoteNumber) -> Result<Option<QuoteRecord>, StoreError> {
        self.inner.fetch_quote(number)
    }
    fn list_quotes(&self, filter: &QuoteFilter) -> Result<Vec<QuoteRecord>, StoreError> {
        self.inner.list_quotes(filter)
    }
    fn delete_quote(&self, number: &QuoteNumber) -> Result<(), StoreError> {
        self.inner.delete_quote(number)
    }
    fn save_event(
        &self,
        quote: &QuoteNumber,
        event: EventDetails,
        venue: VenueDetails,
    ) -> Result<(EventRecord, VenueRecord), StoreError> {
        self.inner.save_event(quote, event, venue)
    }
    fn fetch_event(&self, id: RecordId) -> Result<Option<EventRecord>, StoreError> {
        self.inner.fetch_event(id)
    }
    fn event_for_quote(&self, quote: &QuoteNumber) -> Result<Option<EventRecord>, StoreError> {
        self.inner.event_for_quote(quote)
    }
    fn update_event(&self, id: RecordId, details: EventDetails) -> Result<EventRecord, StoreError> {
        self.inner.update_event(id, details)
    }
    fn delete_event(&self, id: RecordId) -> Result<(), StoreError> {
        self.inner.delete_event(id)
    }
    fn fetch_venue(&self, id: RecordId) -> Result<Option<VenueRecord>, StoreError> {
        self.inner.fetch_venue(id)
    }
    fn venue_for_event(&self, event_id: RecordId) -> Result<Option<VenueRecord>, StoreError> {
        self.inner.venue_for_event(event_id)
    }
    fn update_venue(&self, id: RecordId, details: VenueDetails) -> Result<VenueRecord, StoreError> {
        self.inner.update_venue(id, details)
    }
    fn delete_venue(&self, id: RecordId) -> Result<(), StoreError> {
        self.inner.delete_venue(id)
    }
    fn save_policy_holder(
        &self,
        quote: &QuoteNumber,
        details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError> {
        self.inner.save_policy_holder(quote, details)
    }
    fn fetch_policy_holder(&self, id: RecordId) -> Result<Option<PolicyHolderRecord>, StoreError> {
        self.inner.fetch_policy_holder(id)
    }
    fn policy_holder_for_quote(
        &self,
        quote: &QuoteNumber,
    ) -> Result<Option<PolicyHolderRecord>, StoreError> {
        self.inner.policy_holder_for_quote(quote)
    }
    fn update_policy_holder(
        &self,
        id: RecordId,
        details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError> {
        self.inner.update_policy_holder(id, details)
    }
    fn delete_policy_holder(&self, id: RecordId) -> Result<(), StoreError> {
        self.inner.delete_policy_holder(id)
    }
    fn issue_policy(&self, policy: PolicyRecord) -> Result<PolicyIssue, StoreError> {
        if self.raced.swap(true, Ordering::SeqCst) {
            return self.inner.issue_policy(policy);
        }
        let winner = PolicyRecord {
            policy_number: PolicyNumber(RACED_POLICY.to_string()),
            ..policy
        };
        self.inner.issue_policy(winner)?;
        Err(StoreError::Conflict("policy already linked".to_string()))
    }
    fn fetch_policy(&self, number: &PolicyNumber) -> Result<Option<PolicyRecord>, StoreError> {
        self.inner.fetch_policy(number)
    }
    fn policy_for_quote(&self, quote: &QuoteNumber) -> Result<Option<PolicyRecord>, StoreError> {
        self.inner.policy_for_quote(quote)
    }
    fn list_policies(&self) -> Result<Vec<PolicyRecord>, StoreError> {
        self.inner.list_policies()
    }
    fn update_policy(&self, policy: &PolicyRecord) -> Result<(), StoreError> {
        self.inner.update_policy(policy)
    }
    fn delete_policy(&self, number: &PolicyNumber) -> Result<(), StoreError> {
        self.inner.delete_policy(number)
    }
    fn count_policies_issued_on(&self, day: NaiveDate) -> Result<u32, StoreError> {
        self.inner.count_policies_issued_on(day)
    }
    fn insert_payment(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        self.inner.insert_payment(payment)
    }
    fn fetch_payment(&self, id: RecordId) -> Result<Option<PaymentRecord>, StoreError> {
        self.inner.fetch_payment(id)
    }
    fn list_payments(
        &self,
        policy: Option<&PolicyNumber>,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.inner.list_payments(policy)
    }
}
