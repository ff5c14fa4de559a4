use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::lifecycle::domain::{
    EventDetails, EventRecord, NewPayment, PaymentRecord, PolicyHolderDetails,
    PolicyHolderRecord, PolicyIssue, PolicyNumber, PolicyRecord, QuoteFilter, QuoteNumber,
    QuoteRecord, RecordId, VenueDetails, VenueRecord,
};
use crate::lifecycle::repository::{InsuranceRepository, StoreError};

#[derive(Debug, Default)]
struct Tables {
    next_id: RecordId,
    quotes: BTreeMap<QuoteNumber, QuoteRecord>,
    events: BTreeMap<RecordId, EventRecord>,
    venues: BTreeMap<RecordId, VenueRecord>,
    holders: BTreeMap<RecordId, PolicyHolderRecord>,
    policies: BTreeMap<PolicyNumber, PolicyRecord>,
    payments: BTreeMap<RecordId, PaymentRecord>,
}

impl Tables {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }

    fn event_id_for_quote(&self, quote: &QuoteNumber) -> Option<RecordId> {
        self.events
            .values()
            .find(|event| &event.quote_number == quote)
            .map(|event| event.id)
    }

    fn remove_event(&mut self, id: RecordId) {
        self.events.remove(&id);
        self.venues.retain(|_, venue| venue.event_id != id);
    }

    fn remove_policy(&mut self, number: &PolicyNumber) {
        self.policies.remove(number);
        self.payments
            .retain(|_, payment| &payment.policy_number != number);
    }

    fn remove_quote(&mut self, quote: &QuoteNumber) {
        if let Some(event_id) = self.event_id_for_quote(quote) {
            self.remove_event(event_id);
        }
        self.holders
            .retain(|_, holder| &holder.quote_number != quote);
        let linked: Vec<PolicyNumber> = self
            .policies
            .values()
            .filter(|policy| &policy.quote_number == quote)
            .map(|policy| policy.policy_number.clone())
            .collect();
        for number in linked {
            self.remove_policy(&number);
        }
        self.quotes.remove(quote);
    }

    fn require_quote(&self, quote: &QuoteNumber) -> Result<(), StoreError> {
        if self.quotes.contains_key(quote) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}

/// Relational store held in process memory.
///
/// A single mutex guards every table, so each trait call is one transaction.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl InsuranceRepository for InMemoryRepository {
    fn insert_quote(&self, quote: QuoteRecord) -> Result<QuoteRecord, StoreError> {
        let mut tables = self.lock()?;
        if tables.quotes.contains_key(&quote.quote_number) {
            return Err(StoreError::Conflict(format!(
                "quote number {} already exists",
                quote.quote_number
            )));
        }
        tables
            .quotes
            .insert(quote.quote_number.clone(), quote.clone());
        Ok(quote)
    }

    fn update_quote(&self, quote: &QuoteRecord) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        match tables.quotes.get_mut(&quote.quote_number) {
            Some(existing) => {
                // The conversion flag only moves inside issue_policy.
                let converted = existing.converted_to_policy;
                *existing = quote.clone();
                existing.converted_to_policy = converted;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn fetch_quote(&self, number: &QuoteNumber) -> Result<Option<QuoteRecord>, StoreError> {
        Ok(self.lock()?.quotes.get(number).cloned())
    }

    fn list_quotes(&self, filter: &QuoteFilter) -> Result<Vec<QuoteRecord>, StoreError> {
        let tables = self.lock()?;
        let mut quotes: Vec<QuoteRecord> = tables
            .quotes
            .values()
            .filter(|quote| filter.matches(quote))
            .cloned()
            .collect();
        quotes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quotes)
    }

    fn delete_quote(&self, number: &QuoteNumber) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.require_quote(number)?;
        tables.remove_quote(number);
        Ok(())
    }

    fn save_event(
        &self,
        quote: &QuoteNumber,
        event: EventDetails,
        venue: VenueDetails,
    ) -> Result<(EventRecord, VenueRecord), StoreError> {
        let mut tables = self.lock()?;
        tables.require_quote(quote)?;
        if let Some(existing) = tables.event_id_for_quote(quote) {
            tables.remove_event(existing);
        }

        let event = EventRecord {
            id: tables.allocate_id(),
            quote_number: quote.clone(),
            details: event,
        };
        let venue = VenueRecord {
            id: tables.allocate_id(),
            event_id: event.id,
            details: venue,
        };
        tables.events.insert(event.id, event.clone());
        tables.venues.insert(venue.id, venue.clone());
        Ok((event, venue))
    }

    fn fetch_event(&self, id: RecordId) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.lock()?.events.get(&id).cloned())
    }

    fn event_for_quote(&self, quote: &QuoteNumber) -> Result<Option<EventRecord>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .event_id_for_quote(quote)
            .and_then(|id| tables.events.get(&id).cloned()))
    }

    fn update_event(&self, id: RecordId, details: EventDetails) -> Result<EventRecord, StoreError> {
        let mut tables = self.lock()?;
        let event = tables.events.get_mut(&id).ok_or(StoreError::NotFound)?;
        event.details = details;
        Ok(event.clone())
    }

    fn delete_event(&self, id: RecordId) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if !tables.events.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        tables.remove_event(id);
        Ok(())
    }

    fn fetch_venue(&self, id: RecordId) -> Result<Option<VenueRecord>, StoreError> {
        Ok(self.lock()?.venues.get(&id).cloned())
    }

    fn venue_for_event(&self, event_id: RecordId) -> Result<Option<VenueRecord>, StoreError> {
        Ok(self
            .lock()?
            .venues
            .values()
            .find(|venue| venue.event_id == event_id)
            .cloned())
    }

    fn update_venue(&self, id: RecordId, details: VenueDetails) -> Result<VenueRecord, StoreError> {
        let mut tables = self.lock()?;
        let venue = tables.venues.get_mut(&id).ok_or(StoreError::NotFound)?;
        venue.details = details;
        Ok(venue.clone())
    }

    fn delete_venue(&self, id: RecordId) -> Result<(), StoreError> {
        self.lock()?
            .venues
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn save_policy_holder(
        &self,
        quote: &QuoteNumber,
        details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError> {
        let mut tables = self.lock()?;
        tables.require_quote(quote)?;
        tables
            .holders
            .retain(|_, holder| &holder.quote_number != quote);

        let holder = PolicyHolderRecord {
            id: tables.allocate_id(),
            quote_number: quote.clone(),
            details,
        };
        tables.holders.insert(holder.id, holder.clone());
        Ok(holder)
    }

    fn fetch_policy_holder(&self, id: RecordId) -> Result<Option<PolicyHolderRecord>, StoreError> {
        Ok(self.lock()?.holders.get(&id).cloned())
    }

    fn policy_holder_for_quote(
        &self,
        quote: &QuoteNumber,
    ) -> Result<Option<PolicyHolderRecord>, StoreError> {
        Ok(self
            .lock()?
            .holders
            .values()
            .find(|holder| &holder.quote_number == quote)
            .cloned())
    }

    fn update_policy_holder(
        &self,
        id: RecordId,
        details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError> {
        let mut tables = self.lock()?;
        let holder = tables.holders.get_mut(&id).ok_or(StoreError::NotFound)?;
        holder.details = details;
        Ok(holder.clone())
    }

    fn delete_policy_holder(&self, id: RecordId) -> Result<(), StoreError> {
        self.lock()?
            .holders
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn issue_policy(&self, policy: PolicyRecord) -> Result<PolicyIssue, StoreError> {
        let mut tables = self.lock()?;
        tables.require_quote(&policy.quote_number)?;

        if let Some(existing) = tables
            .policies
            .values()
            .find(|candidate| candidate.quote_number == policy.quote_number)
        {
            return Ok(PolicyIssue::Existing(existing.clone()));
        }
        if tables.policies.contains_key(&policy.policy_number) {
            return Err(StoreError::Conflict(format!(
                "policy number {} already exists",
                policy.policy_number
            )));
        }

        if let Some(quote) = tables.quotes.get_mut(&policy.quote_number) {
            quote.converted_to_policy = true;
            quote.updated_at = policy.issued_at;
        }
        tables
            .policies
            .insert(policy.policy_number.clone(), policy.clone());
        Ok(PolicyIssue::Created(policy))
    }

    fn fetch_policy(&self, number: &PolicyNumber) -> Result<Option<PolicyRecord>, StoreError> {
        Ok(self.lock()?.policies.get(number).cloned())
    }

    fn policy_for_quote(&self, quote: &QuoteNumber) -> Result<Option<PolicyRecord>, StoreError> {
        Ok(self
            .lock()?
            .policies
            .values()
            .find(|policy| &policy.quote_number == quote)
            .cloned())
    }

    fn list_policies(&self) -> Result<Vec<PolicyRecord>, StoreError> {
        let tables = self.lock()?;
        let mut policies: Vec<PolicyRecord> = tables.policies.values().cloned().collect();
        policies.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(policies)
    }

    fn update_policy(&self, policy: &PolicyRecord) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        match tables.policies.get_mut(&policy.policy_number) {
            Some(existing) => {
                *existing = policy.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn delete_policy(&self, number: &PolicyNumber) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let quote = tables
            .policies
            .get(number)
            .map(|policy| policy.quote_number.clone())
            .ok_or(StoreError::NotFound)?;
        tables.remove_policy(number);
        tables.remove_quote(&quote);
        Ok(())
    }

    fn count_policies_issued_on(&self, day: NaiveDate) -> Result<u32, StoreError> {
        let tables = self.lock()?;
        let count = tables
            .policies
            .values()
            .filter(|policy| policy.issued_at.date_naive() == day)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn insert_payment(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        let mut tables = self.lock()?;
        if !tables.policies.contains_key(&payment.policy_number) {
            return Err(StoreError::NotFound);
        }
        let record = PaymentRecord {
            id: tables.allocate_id(),
            policy_number: payment.policy_number,
            amount: payment.amount,
            method: payment.method,
            status: payment.status,
            reference: payment.reference,
            paid_at: payment.paid_at,
        };
        tables.payments.insert(record.id, record.clone());
        Ok(record)
    }

    fn fetch_payment(&self, id: RecordId) -> Result<Option<PaymentRecord>, StoreError> {
        Ok(self.lock()?.payments.get(&id).cloned())
    }

    fn list_payments(
        &self,
        policy: Option<&PolicyNumber>,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        Ok(self
            .lock()?
            .payments
            .values()
            .filter(|payment| policy.map_or(true, |number| &payment.policy_number == number))
            .cloned()
            .collect())
    }
}
