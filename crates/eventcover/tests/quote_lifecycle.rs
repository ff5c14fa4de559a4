//! End-to-end quote → policy scenarios through the public service facade,
//! run against both repository backends.

mod common {
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, Utc};

    use eventcover::lifecycle::{
        EventDetails, EventSubmission, InsuranceRepository, Notification, NotificationError,
        NotificationPublisher, PolicyHolderDetails, PolicyHolderSubmission, QuoteDetails,
        QuoteLifecycleService, QuoteRecord, QuoteSource, QuoteSubmission, VenueDetails,
    };
    use eventcover::pricing::{GuestRange, LiabilityOption};

    #[derive(Default, Clone)]
    pub struct RecordingNotifier {
        sent: Arc<Mutex<Vec<Notification>>>,
    }

    impl RecordingNotifier {
        pub fn references(&self) -> Vec<String> {
            self.sent
                .lock()
                .expect("notifier mutex poisoned")
                .iter()
                .map(|n| n.reference.clone())
                .collect()
        }
    }

    impl NotificationPublisher for RecordingNotifier {
        fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
            self.sent
                .lock()
                .expect("notifier mutex poisoned")
                .push(notification);
            Ok(())
        }
    }

    pub fn submission(source: QuoteSource) -> QuoteSubmission {
        QuoteSubmission {
            source,
            details: QuoteDetails {
                resident_state: "NE".to_string(),
                event_type: "wedding".to_string(),
                event_date: Utc::now().date_naive() + Duration::days(120),
                guest_range: GuestRange::UpTo300,
                coverage_level: 7,
                liability_option: LiabilityOption::Option6,
                liquor_liability: true,
                covid_disclosure: true,
                special_activities: true,
                email: "morgan@example.org".to_string(),
            },
        }
    }

    pub fn complete<R>(
        service: &QuoteLifecycleService<R, RecordingNotifier>,
        source: QuoteSource,
    ) -> QuoteRecord
    where
        R: InsuranceRepository + 'static,
    {
        let quote = service.create_quote(submission(source)).expect("quote");
        service
            .save_event(EventSubmission {
                quote_number: quote.quote_number.clone(),
                event: EventDetails {
                    honoree1_first_name: "Morgan".to_string(),
                    honoree1_last_name: "Reyes".to_string(),
                    honoree2_first_name: None,
                    honoree2_last_name: None,
                    ceremony_location_type: "outdoor".to_string(),
                },
                venue: VenueDetails {
                    name: "Lauritzen Gardens".to_string(),
                    address1: "100 Bancroft St".to_string(),
                    address2: None,
                    city: "Omaha".to_string(),
                    state: "NE".to_string(),
                    zip: "68108".to_string(),
                    country: "US".to_string(),
                    as_insured: false,
                },
            })
            .expect("event");
        service
            .save_policy_holder(PolicyHolderSubmission {
                quote_number: quote.quote_number.clone(),
                details: PolicyHolderDetails {
                    first_name: "Morgan".to_string(),
                    last_name: "Reyes".to_string(),
                    phone: "402-555-0188".to_string(),
                    relationship: "honoree".to_string(),
                    address: "1401 Jones St".to_string(),
                    city: "Omaha".to_string(),
                    state: "NE".to_string(),
                    zip: "68102".to_string(),
                    country: "US".to_string(),
                    hear_about_us: None,
                    legal_notices_accepted: true,
                },
            })
            .expect("holder");
        service
            .complete_quote(&quote.quote_number)
            .expect("complete")
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use common::{complete, RecordingNotifier};
use eventcover::lifecycle::{
    lifecycle_router, InsuranceRepository, LifecycleError, PaymentMethod, PaymentRequest,
    PaymentStatus, QuoteLifecycleService, QuoteSource,
};
use eventcover::storage::{InMemoryRepository, SqliteRepository};

fn payment(quote: &eventcover::lifecycle::QuoteRecord) -> PaymentRequest {
    PaymentRequest {
        quote_number: quote.quote_number.clone(),
        amount: quote.premium.total_premium,
        method: PaymentMethod::Check,
        status: PaymentStatus::Completed,
        reference: None,
    }
}

fn settle_and_check<R>(repository: Arc<R>)
where
    R: InsuranceRepository + 'static,
{
    let notifier = Arc::new(RecordingNotifier::default());
    let service = QuoteLifecycleService::new(repository.clone(), notifier.clone());
    let quote = complete(&service, QuoteSource::Admin);
    // 505 + 300 + 100
    assert_eq!(quote.premium.total_premium, 905);

    let receipt = service.record_payment(payment(&quote)).expect("paid");
    let today = Utc::now().format("%Y%m%d").to_string();
    assert_eq!(
        receipt.policy.policy_number.0,
        format!("PA-{today}-0001")
    );
    assert!(receipt.policy_created);

    let again = service.convert_quote(&quote.quote_number).expect("idempotent");
    assert_eq!(again.policy(), &receipt.policy);

    let references = notifier.references();
    assert!(references.contains(&quote.quote_number.0));
    assert!(references.contains(&receipt.policy.policy_number.0));

    service
        .delete_policy(&receipt.policy.policy_number)
        .expect("deleted");
    assert!(matches!(
        service.get_quote(&quote.quote_number),
        Err(LifecycleError::QuoteNotFound(_))
    ));
    assert!(repository.list_payments(None).expect("payments").is_empty());
}

#[test]
fn payment_issues_policy_in_memory() {
    settle_and_check(Arc::new(InMemoryRepository::default()));
}

#[test]
fn payment_issues_policy_in_sqlite() {
    settle_and_check(Arc::new(SqliteRepository::in_memory().expect("sqlite opens")));
}

#[test]
fn sqlite_survives_reopen() {
    let path = std::env::temp_dir().join(format!(
        "eventcover-{}-{}.db",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    let quote = {
        let repository = Arc::new(SqliteRepository::open(&path).expect("opens"));
        let service =
            QuoteLifecycleService::new(repository, Arc::new(RecordingNotifier::default()));
        complete(&service, QuoteSource::Customer)
    };

    let repository = Arc::new(SqliteRepository::open(&path).expect("reopens"));
    let stored = repository
        .fetch_quote(&quote.quote_number)
        .expect("fetch")
        .expect("persisted");
    assert_eq!(stored.details, quote.details);
    assert_eq!(stored.premium, quote.premium);

    drop(repository);
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

#[tokio::test]
async fn router_serves_quotes_from_sqlite() {
    let repository = Arc::new(SqliteRepository::in_memory().expect("sqlite opens"));
    let service = QuoteLifecycleService::new(repository, Arc::new(RecordingNotifier::default()));
    let quote = complete(&service, QuoteSource::Customer);
    let app = lifecycle_router(Arc::new(service));

    let response = app
        .oneshot(
            Request::get(format!("/api/quotes/{}", quote.quote_number))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["status"], "complete");
    assert_eq!(body["venue"]["city"], "Omaha");
    assert!(body["policy"].is_null());
}
