//! Quote lifecycle: wizard steps, completion, conversion to a policy, and payment.
//!
//! A quote is created when the first wizard step is submitted, gains an event,
//! venue and policy holder through later steps, is marked complete, and is
//! converted to exactly one policy once a payment settles. Conversion is
//! idempotent and atomic at the repository boundary.

mod conversion;
pub mod domain;
mod extract;
pub mod identifiers;
mod payments;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    EventDetails, EventRecord, EventSubmission, NewPayment, PaymentFilter, PaymentMethod,
    PaymentReceipt, PaymentRecord, PaymentRequest, PaymentStatus, PolicyHolderDetails,
    PolicyHolderRecord, PolicyHolderSubmission, PolicyIssue, PolicyNumber, PolicyRecord,
    PolicyStatus, PolicyStatusUpdate, QuoteDetails, QuoteFilter, QuoteNumber, QuoteRecord,
    QuoteSource, QuoteStatus, QuoteSubmission, QuoteView, RecordId, VenueDetails, VenueRecord,
};
pub use repository::{
    InsuranceRepository, Notification, NotificationError, NotificationPublisher,
    NotificationTemplate, StoreError,
};
pub use router::lifecycle_router;
pub use service::{Clock, LifecycleError, QuoteLifecycleService};
pub use validation::ValidationError;
