use std::collections::BTreeMap;

use tracing::{info, warn};

use super::domain::{
    PolicyIssue, PolicyNumber, PolicyRecord, PolicyStatus, PolicyStatusUpdate, QuoteNumber,
    QuoteStatus,
};
use super::identifiers::{random_policy_number, sequenced_policy_number};
use super::repository::{
    InsuranceRepository, Notification, NotificationPublisher, NotificationTemplate, StoreError,
};
use super::service::{LifecycleError, QuoteLifecycleService};

impl<R, N> QuoteLifecycleService<R, N>
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    /// Bind a completed quote to a policy.
    ///
    /// Idempotent: a quote that already has a policy returns it unchanged. A
    /// duplicate policy number is retried once with a random suffix.
    pub fn convert_quote(&self, number: &QuoteNumber) -> Result<PolicyIssue, LifecycleError> {
        let quote = self.get_quote(number)?;
        if let Some(existing) = self.repository.policy_for_quote(number)? {
            return Ok(PolicyIssue::Existing(existing));
        }
        if quote.status != QuoteStatus::Complete {
            return Err(LifecycleError::QuoteNotComplete(number.clone()));
        }
        self.ensure_steps_saved(number)?;

        let now = self.now();
        let today = now.date_naive();
        let sequence = self.repository.count_policies_issued_on(today)? + 1;
        let draft = PolicyRecord {
            policy_number: sequenced_policy_number(quote.source, today, sequence),
            quote_number: number.clone(),
            source: quote.source,
            status: PolicyStatus::Active,
            issued_at: now,
            updated_at: now,
        };

        let issue = match self.repository.issue_policy(draft.clone()) {
            Err(StoreError::Conflict(reason)) => {
                warn!(
                    quote_number = %number,
                    policy_number = %draft.policy_number,
                    %reason,
                    "policy number collision"
                );
                if let Some(existing) = self.repository.policy_for_quote(number)? {
                    return Ok(PolicyIssue::Existing(existing));
                }
                let retry = PolicyRecord {
                    policy_number: random_policy_number(quote.source, today, &mut rand::thread_rng()),
                    ..draft
                };
                self.repository.issue_policy(retry)?
            }
            Err(StoreError::NotFound) => return Err(LifecycleError::QuoteNotFound(number.clone())),
            other => other?,
        };

        if let PolicyIssue::Created(policy) = &issue {
            info!(
                quote_number = %number,
                policy_number = %policy.policy_number,
                "quote converted to policy"
            );
            let mut details = BTreeMap::new();
            details.insert("quote_number".to_string(), number.0.clone());
            details.insert(
                "total_premium".to_string(),
                quote.premium.total_premium.to_string(),
            );
            self.notify(Notification {
                template: NotificationTemplate::PolicyIssued,
                recipient: quote.details.email.clone(),
                reference: policy.policy_number.0.clone(),
                details,
            });
        }

        Ok(issue)
    }

    pub fn get_policy(&self, number: &PolicyNumber) -> Result<PolicyRecord, LifecycleError> {
        self.repository
            .fetch_policy(number)?
            .ok_or_else(|| LifecycleError::PolicyNotFound(number.clone()))
    }

    pub fn list_policies(&self) -> Result<Vec<PolicyRecord>, LifecycleError> {
        Ok(self.repository.list_policies()?)
    }

    pub fn update_policy_status(
        &self,
        number: &PolicyNumber,
        update: PolicyStatusUpdate,
    ) -> Result<PolicyRecord, LifecycleError> {
        let mut policy = self.get_policy(number)?;
        if policy.status == update.status {
            return Ok(policy);
        }
        policy.status = update.status;
        policy.updated_at = self.now();
        self.repository.update_policy(&policy)?;
        info!(policy_number = %number, status = %policy.status, "policy status changed");
        Ok(policy)
    }

    /// Delete a policy, cascading to its payments, quote, event, venue and holder.
    pub fn delete_policy(&self, number: &PolicyNumber) -> Result<(), LifecycleError> {
        match self.repository.delete_policy(number) {
            Ok(()) => {
                info!(policy_number = %number, "policy deleted");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(LifecycleError::PolicyNotFound(number.clone())),
            Err(other) => Err(other.into()),
        }
    }

    /// CSV of every policy joined with its quote's premium and event date.
    pub fn export_policies_csv(&self) -> Result<String, LifecycleError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "policy_number",
                "quote_number",
                "source",
                "status",
                "issued_at",
                "event_date",
                "email",
                "total_premium",
            ])
            .map_err(|err| LifecycleError::Export(err.to_string()))?;

        for policy in self.repository.list_policies()? {
            let quote = self.get_quote(&policy.quote_number)?;
            let issued_at = policy.issued_at.to_rfc3339();
            let event_date = quote.details.event_date.to_string();
            let total_premium = quote.premium.total_premium.to_string();
            writer
                .write_record([
                    policy.policy_number.0.as_str(),
                    policy.quote_number.0.as_str(),
                    policy.source.as_str(),
                    policy.status.as_str(),
                    issued_at.as_str(),
                    event_date.as_str(),
                    quote.details.email.as_str(),
                    total_premium.as_str(),
                ])
                .map_err(|err| LifecycleError::Export(err.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| LifecycleError::Export(err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| LifecycleError::Export(err.to_string()))
    }
}
