use tracing::{info, warn};

use super::domain::{
    NewPayment, PaymentFilter, PaymentReceipt, PaymentRecord, PaymentRequest, PaymentStatus,
    QuoteStatus, RecordId,
};
use super::repository::{InsuranceRepository, NotificationPublisher};
use super::service::{LifecycleError, QuoteLifecycleService};
use super::validation::ValidationError;

impl<R, N> QuoteLifecycleService<R, N>
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    /// Settle a completed quote.
    ///
    /// A completed payment converts the quote (idempotently) and is stored
    /// against the resulting policy. A failed payment persists nothing.
    pub fn record_payment(&self, request: PaymentRequest) -> Result<PaymentReceipt, LifecycleError> {
        let quote = self.get_quote(&request.quote_number)?;
        if request.amount == 0 {
            return Err(ValidationError::PaymentAmount.into());
        }
        if quote.status != QuoteStatus::Complete {
            return Err(LifecycleError::QuoteNotComplete(request.quote_number));
        }
        if request.status == PaymentStatus::Failed {
            warn!(quote_number = %request.quote_number, "payment declined");
            return Err(LifecycleError::PaymentDeclined(request.quote_number));
        }
        if request.amount != quote.premium.total_premium {
            warn!(
                quote_number = %request.quote_number,
                amount = request.amount,
                total_premium = quote.premium.total_premium,
                "payment amount differs from quoted premium"
            );
        }

        let issue = self.convert_quote(&request.quote_number)?;
        let policy_created = issue.was_created();
        let policy = issue.into_policy();

        let payment = self.repository.insert_payment(NewPayment {
            policy_number: policy.policy_number.clone(),
            amount: request.amount,
            method: request.method,
            status: request.status,
            reference: request.reference,
            paid_at: self.now(),
        })?;

        info!(
            policy_number = %policy.policy_number,
            payment_id = payment.id,
            amount = payment.amount,
            "payment recorded"
        );

        Ok(PaymentReceipt {
            payment,
            policy,
            policy_created,
        })
    }

    pub fn get_payment(&self, id: RecordId) -> Result<PaymentRecord, LifecycleError> {
        self.repository
            .fetch_payment(id)?
            .ok_or(LifecycleError::NotFound {
                entity: "payment",
                id,
            })
    }

    pub fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRecord>, LifecycleError> {
        if let Some(policy_number) = &filter.policy_number {
            self.get_policy(policy_number)?;
        }
        Ok(self
            .repository
            .list_payments(filter.policy_number.as_ref())?)
    }
}
