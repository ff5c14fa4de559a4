use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::domain::{
    EventDetails, EventRecord, EventSubmission, PolicyHolderDetails, PolicyHolderRecord,
    PolicyHolderSubmission, PolicyNumber, QuoteDetails, QuoteFilter, QuoteNumber, QuoteRecord,
    QuoteStatus, QuoteSubmission, QuoteView, RecordId, VenueDetails, VenueRecord,
};
use super::identifiers::generate_quote_number;
use super::repository::{
    InsuranceRepository, Notification, NotificationPublisher, NotificationTemplate, StoreError,
};
use super::validation::{
    validate_event, validate_event_details, validate_policy_holder, validate_quote,
    validate_venue, ValidationError,
};

/// Source of "now" for booking windows, timestamps and number dates.
pub type Clock = fn() -> DateTime<Utc>;

/// Service driving a quote from the first wizard step through to an issued policy.
pub struct QuoteLifecycleService<R, N> {
    pub(super) repository: Arc<R>,
    pub(super) notifier: Arc<N>,
    pub(super) clock: Clock,
}

impl<R, N> QuoteLifecycleService<R, N>
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            notifier,
            clock: Utc::now,
        }
    }

    /// Pin the service to a fixed clock (tests, demos).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Price and persist the first wizard step.
    pub fn create_quote(&self, submission: QuoteSubmission) -> Result<QuoteRecord, LifecycleError> {
        let now = self.now();
        validate_quote(&submission.details, now)?;

        let premium = submission.details.premium();
        let mut quote = QuoteRecord {
            quote_number: generate_quote_number(
                submission.source,
                now.date_naive(),
                &mut rand::thread_rng(),
            ),
            source: submission.source,
            status: QuoteStatus::Step1,
            details: submission.details,
            premium,
            converted_to_policy: false,
            created_at: now,
            updated_at: now,
        };

        let stored = match self.repository.insert_quote(quote.clone()) {
            Err(StoreError::Conflict(_)) => {
                debug!(quote_number = %quote.quote_number, "quote number collision, regenerating");
                quote.quote_number = generate_quote_number(
                    quote.source,
                    now.date_naive(),
                    &mut rand::thread_rng(),
                );
                self.repository.insert_quote(quote)?
            }
            other => other?,
        };

        info!(
            quote_number = %stored.quote_number,
            source = %stored.source,
            total_premium = stored.premium.total_premium,
            "quote created"
        );

        let mut details = BTreeMap::new();
        details.insert(
            "total_premium".to_string(),
            stored.premium.total_premium.to_string(),
        );
        details.insert("event_date".to_string(), stored.details.event_date.to_string());
        self.notify(Notification {
            template: NotificationTemplate::QuoteCreated,
            recipient: stored.details.email.clone(),
            reference: stored.quote_number.0.clone(),
            details,
        });

        Ok(stored)
    }

    pub fn get_quote(&self, number: &QuoteNumber) -> Result<QuoteRecord, LifecycleError> {
        self.repository
            .fetch_quote(number)?
            .ok_or_else(|| LifecycleError::QuoteNotFound(number.clone()))
    }

    /// Quote plus its event, venue, policy holder and policy.
    pub fn quote_view(&self, number: &QuoteNumber) -> Result<QuoteView, LifecycleError> {
        let quote = self.get_quote(number)?;
        let event = self.repository.event_for_quote(number)?;
        let venue = match &event {
            Some(event) => self.repository.venue_for_event(event.id)?,
            None => None,
        };
        let policy_holder = self.repository.policy_holder_for_quote(number)?;
        let policy = self.repository.policy_for_quote(number)?;

        Ok(QuoteView {
            quote,
            event,
            venue,
            policy_holder,
            policy,
        })
    }

    pub fn list_quotes(&self, filter: &QuoteFilter) -> Result<Vec<QuoteRecord>, LifecycleError> {
        Ok(self.repository.list_quotes(filter)?)
    }

    /// Replace the pricing inputs and re-price. Bound quotes are immutable.
    pub fn update_quote(
        &self,
        number: &QuoteNumber,
        details: QuoteDetails,
    ) -> Result<QuoteRecord, LifecycleError> {
        let mut quote = self.mutable_quote(number)?;
        let now = self.now();
        validate_quote(&details, now)?;

        quote.premium = details.premium();
        quote.details = details;
        quote.updated_at = now;
        self.repository.update_quote(&quote)?;

        info!(
            quote_number = %quote.quote_number,
            total_premium = quote.premium.total_premium,
            "quote re-priced"
        );
        Ok(quote)
    }

    /// Delete a quote and everything attached to it, policy included.
    pub fn delete_quote(&self, number: &QuoteNumber) -> Result<(), LifecycleError> {
        match self.repository.delete_quote(number) {
            Ok(()) => {
                info!(quote_number = %number, "quote deleted");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(LifecycleError::QuoteNotFound(number.clone())),
            Err(other) => Err(other.into()),
        }
    }

    /// Second wizard step: attach (or replace) the event and its venue.
    pub fn save_event(
        &self,
        submission: EventSubmission,
    ) -> Result<(EventRecord, VenueRecord), LifecycleError> {
        let EventSubmission {
            quote_number,
            event,
            venue,
        } = submission;
        validate_event(&event, &venue)?;
        let quote = self.mutable_quote(&quote_number)?;

        let saved = self.repository.save_event(&quote_number, event, venue)?;
        self.advance(quote, QuoteStatus::Step2)?;
        debug!(quote_number = %quote_number, event_id = saved.0.id, "event saved");
        Ok(saved)
    }

    pub fn get_event(&self, id: RecordId) -> Result<EventRecord, LifecycleError> {
        self.repository
            .fetch_event(id)?
            .ok_or(LifecycleError::NotFound { entity: "event", id })
    }

    pub fn update_event(
        &self,
        id: RecordId,
        details: EventDetails,
    ) -> Result<EventRecord, LifecycleError> {
        validate_event_details(&details)?;
        let event = self.get_event(id)?;
        self.mutable_quote(&event.quote_number)?;
        let updated = self.repository.update_event(id, details)?;
        self.touch(&updated.quote_number)?;
        Ok(updated)
    }

    pub fn delete_event(&self, id: RecordId) -> Result<(), LifecycleError> {
        let event = self.get_event(id)?;
        self.mutable_quote(&event.quote_number)?;
        self.repository.delete_event(id)?;
        self.rewind(&event.quote_number, QuoteStatus::Step1)?;
        Ok(())
    }

    pub fn get_venue(&self, id: RecordId) -> Result<VenueRecord, LifecycleError> {
        self.repository
            .fetch_venue(id)?
            .ok_or(LifecycleError::NotFound { entity: "venue", id })
    }

    pub fn update_venue(
        &self,
        id: RecordId,
        details: VenueDetails,
    ) -> Result<VenueRecord, LifecycleError> {
        validate_venue(&details)?;
        let venue = self.get_venue(id)?;
        let event = self.get_event(venue.event_id)?;
        self.mutable_quote(&event.quote_number)?;
        let updated = self.repository.update_venue(id, details)?;
        self.touch(&event.quote_number)?;
        Ok(updated)
    }

    pub fn delete_venue(&self, id: RecordId) -> Result<(), LifecycleError> {
        let venue = self.get_venue(id)?;
        let event = self.get_event(venue.event_id)?;
        self.mutable_quote(&event.quote_number)?;
        self.repository.delete_venue(id)?;
        self.rewind(&event.quote_number, QuoteStatus::Step1)?;
        Ok(())
    }

    /// Third wizard step: attach (or replace) the policy holder.
    pub fn save_policy_holder(
        &self,
        submission: PolicyHolderSubmission,
    ) -> Result<PolicyHolderRecord, LifecycleError> {
        let PolicyHolderSubmission {
            quote_number,
            details,
        } = submission;
        validate_policy_holder(&details)?;
        let quote = self.mutable_quote(&quote_number)?;

        let saved = self.repository.save_policy_holder(&quote_number, details)?;
        self.advance(quote, QuoteStatus::Step3)?;
        debug!(quote_number = %quote_number, holder_id = saved.id, "policy holder saved");
        Ok(saved)
    }

    pub fn get_policy_holder(&self, id: RecordId) -> Result<PolicyHolderRecord, LifecycleError> {
        self.repository
            .fetch_policy_holder(id)?
            .ok_or(LifecycleError::NotFound {
                entity: "policy holder",
                id,
            })
    }

    pub fn update_policy_holder(
        &self,
        id: RecordId,
        details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, LifecycleError> {
        validate_policy_holder(&details)?;
        let holder = self.get_policy_holder(id)?;
        self.mutable_quote(&holder.quote_number)?;
        let updated = self.repository.update_policy_holder(id, details)?;
        self.touch(&holder.quote_number)?;
        Ok(updated)
    }

    pub fn delete_policy_holder(&self, id: RecordId) -> Result<(), LifecycleError> {
        let holder = self.get_policy_holder(id)?;
        self.mutable_quote(&holder.quote_number)?;
        self.repository.delete_policy_holder(id)?;
        self.rewind(&holder.quote_number, QuoteStatus::Step2)?;
        Ok(())
    }

    /// Final wizard step. Every earlier step must have been saved.
    pub fn complete_quote(&self, number: &QuoteNumber) -> Result<QuoteRecord, LifecycleError> {
        let mut quote = self.get_quote(number)?;
        if quote.status == QuoteStatus::Complete {
            return Ok(quote);
        }

        self.ensure_steps_saved(number)?;

        quote.status = QuoteStatus::Complete;
        quote.updated_at = self.now();
        self.repository.update_quote(&quote)?;
        info!(quote_number = %number, "quote completed");
        Ok(quote)
    }

    /// Event, venue and policy holder must all be on file.
    pub(super) fn ensure_steps_saved(&self, number: &QuoteNumber) -> Result<(), LifecycleError> {
        let event = self
            .repository
            .event_for_quote(number)?
            .ok_or_else(|| LifecycleError::MissingStep {
                quote_number: number.clone(),
                step: "event",
            })?;
        if self.repository.venue_for_event(event.id)?.is_none() {
            return Err(LifecycleError::MissingStep {
                quote_number: number.clone(),
                step: "venue",
            });
        }
        if self.repository.policy_holder_for_quote(number)?.is_none() {
            return Err(LifecycleError::MissingStep {
                quote_number: number.clone(),
                step: "policy holder",
            });
        }

        Ok(())
    }

    fn mutable_quote(&self, number: &QuoteNumber) -> Result<QuoteRecord, LifecycleError> {
        let quote = self.get_quote(number)?;
        if quote.converted_to_policy {
            return Err(LifecycleError::AlreadyConverted(number.clone()));
        }
        Ok(quote)
    }

    fn advance(&self, mut quote: QuoteRecord, step: QuoteStatus) -> Result<(), LifecycleError> {
        quote.status = quote.status.max(step);
        quote.updated_at = self.now();
        self.repository.update_quote(&quote)?;
        Ok(())
    }

    /// Drop the status back to `ceiling` after a required step was removed.
    fn rewind(&self, number: &QuoteNumber, ceiling: QuoteStatus) -> Result<(), LifecycleError> {
        let mut quote = self.get_quote(number)?;
        if quote.status > ceiling {
            debug!(
                quote_number = %number,
                from = %quote.status,
                to = %ceiling,
                "quote status rewound"
            );
            quote.status = ceiling;
        }
        quote.updated_at = self.now();
        self.repository.update_quote(&quote)?;
        Ok(())
    }

    fn touch(&self, number: &QuoteNumber) -> Result<(), LifecycleError> {
        let mut quote = self.get_quote(number)?;
        quote.updated_at = self.now();
        self.repository.update_quote(&quote)?;
        Ok(())
    }

    pub(super) fn notify(&self, notification: Notification) {
        let template = notification.template.label();
        let reference = notification.reference.clone();
        if let Err(err) = self.notifier.publish(notification) {
            warn!(%template, %reference, error = %err, "notification not delivered");
        }
    }
}

/// Error raised by the lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("quote {0} not found")]
    QuoteNotFound(QuoteNumber),
    #[error("policy {0} not found")]
    PolicyNotFound(PolicyNumber),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: RecordId },
    #[error("quote {quote_number} is missing its {step}")]
    MissingStep {
        quote_number: QuoteNumber,
        step: &'static str,
    },
    #[error("quote {0} is not complete")]
    QuoteNotComplete(QuoteNumber),
    #[error("quote {0} has already been converted to a policy")]
    AlreadyConverted(QuoteNumber),
    #[error("payment for quote {0} was declined")]
    PaymentDeclined(QuoteNumber),
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    #[error("policy export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
