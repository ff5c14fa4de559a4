use crate::infra::InMemoryNotifier;
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use eventcover::error::AppError;
use eventcover::lifecycle::{
    EventDetails, EventSubmission, InsuranceRepository, PaymentMethod, PaymentRequest,
    PaymentStatus, PolicyHolderDetails, PolicyHolderSubmission, QuoteDetails,
    QuoteLifecycleService, QuoteSource, QuoteSubmission, VenueDetails,
};
use eventcover::pricing::{GuestRange, LiabilityOption, PremiumInputs};
use eventcover::storage::{InMemoryRepository, SqliteRepository};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct PremiumArgs {
    /// Coverage level (1-10)
    #[arg(long)]
    pub(crate) coverage_level: u8,
    /// Liability option key (none, option1 .. option6)
    #[arg(long, default_value = "none")]
    pub(crate) liability: LiabilityOption,
    /// Expected guest count (1-400)
    #[arg(long)]
    pub(crate) guests: u32,
    /// Add liquor liability
    #[arg(long)]
    pub(crate) liquor: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Event date (YYYY-MM-DD). Defaults to 90 days from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) event_date: Option<NaiveDate>,
    /// Originate the quote from the admin portal instead of the customer site.
    #[arg(long)]
    pub(crate) admin: bool,
    /// Write the walkthrough to this SQLite file instead of memory.
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

pub(crate) fn run_premium(args: PremiumArgs) -> Result<(), AppError> {
    let Some(guest_range) = GuestRange::from_guest_count(args.guests) else {
        println!(
            "Guest count {} is outside the rated ranges (1-400); no premium available",
            args.guests
        );
        return Ok(());
    };

    let premium = PremiumInputs {
        coverage_level: args.coverage_level,
        liability_option: args.liability,
        guest_range,
        liquor_liability: args.liquor,
    }
    .premium();

    println!(
        "Coverage level {} | liability {} | guests {} ({}) | liquor {}",
        args.coverage_level,
        args.liability,
        args.guests,
        guest_range,
        if args.liquor { "yes" } else { "no" }
    );
    println!("- Base premium:             ${}", premium.base_premium);
    println!("- Liability premium:        ${}", premium.liability_premium);
    println!(
        "- Liquor liability premium: ${}",
        premium.liquor_liability_premium
    );
    println!("Total premium: ${}", premium.total_premium);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let event_date = args
        .event_date
        .unwrap_or_else(|| Utc::now().date_naive() + Duration::days(90));
    let source = if args.admin {
        QuoteSource::Admin
    } else {
        QuoteSource::Customer
    };

    match args.database {
        Some(path) => {
            println!("Storage: SQLite ({})", path.display());
            walkthrough(Arc::new(SqliteRepository::open(&path)?), source, event_date)
        }
        None => {
            println!("Storage: in memory");
            walkthrough(Arc::new(InMemoryRepository::default()), source, event_date)
        }
    }
}

fn walkthrough<R>(
    repository: Arc<R>,
    source: QuoteSource,
    event_date: NaiveDate,
) -> Result<(), AppError>
where
    R: InsuranceRepository + 'static,
{
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = QuoteLifecycleService::new(repository, notifier.clone());

    println!("\nStep 1: quote");
    let quote = match service.create_quote(demo_quote(source, event_date)) {
        Ok(quote) => quote,
        Err(err) => {
            println!("  Quote rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- {} ({}) for {} on {}",
        quote.quote_number, quote.source, quote.details.event_type, quote.details.event_date
    );
    println!(
        "- Premium: base ${} + liability ${} + liquor ${} = ${}",
        quote.premium.base_premium,
        quote.premium.liability_premium,
        quote.premium.liquor_liability_premium,
        quote.premium.total_premium
    );

    println!("\nStep 2: event and venue");
    let (event, venue) = service.save_event(demo_event(&quote.quote_number))?;
    println!(
        "- Event #{} honoring {} {}",
        event.id, event.details.honoree1_first_name, event.details.honoree1_last_name
    );
    println!(
        "- Venue #{}: {}, {} {}",
        venue.id, venue.details.name, venue.details.city, venue.details.state
    );

    println!("\nStep 3: policy holder");
    let holder = service.save_policy_holder(demo_holder(&quote.quote_number))?;
    println!(
        "- Holder #{}: {} {} ({})",
        holder.id, holder.details.first_name, holder.details.last_name, holder.details.relationship
    );

    let quote = service.complete_quote(&quote.quote_number)?;
    println!("\nQuote {} is {}", quote.quote_number, quote.status);

    println!("\nCheckout");
    let receipt = match service.record_payment(PaymentRequest {
        quote_number: quote.quote_number.clone(),
        amount: quote.premium.total_premium,
        method: PaymentMethod::Card,
        status: PaymentStatus::Completed,
        reference: Some("demo-checkout".to_string()),
    }) {
        Ok(receipt) => receipt,
        Err(err) => {
            println!("  Payment rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Payment #{} of ${} via {} ({})",
        receipt.payment.id, receipt.payment.amount, receipt.payment.method, receipt.payment.status
    );
    println!(
        "- Policy {} issued {}",
        receipt.policy.policy_number,
        receipt.policy.issued_at.format("%Y-%m-%d %H:%M UTC")
    );

    let repeat = service.convert_quote(&quote.quote_number)?;
    println!(
        "- Converting again returns {} (created: {})",
        repeat.policy().policy_number,
        repeat.was_created()
    );

    let sent = notifier.sent();
    if sent.is_empty() {
        println!("\nNotifications: none");
    } else {
        println!("\nNotifications");
        for notification in sent {
            println!(
                "- {} -> {} ({})",
                notification.template.label(),
                notification.recipient,
                notification.reference
            );
        }
    }

    println!("\nPolicy export");
    print!("{}", service.export_policies_csv()?);
    Ok(())
}

fn demo_quote(source: QuoteSource, event_date: NaiveDate) -> QuoteSubmission {
    QuoteSubmission {
        source,
        details: QuoteDetails {
            resident_state: "IA".to_string(),
            event_type: "wedding".to_string(),
            event_date,
            guest_range: GuestRange::UpTo150,
            coverage_level: 5,
            liability_option: LiabilityOption::Option2,
            liquor_liability: true,
            covid_disclosure: true,
            special_activities: false,
            email: "casey.nguyen@example.com".to_string(),
        },
    }
}

fn demo_event(quote_number: &eventcover::lifecycle::QuoteNumber) -> EventSubmission {
    EventSubmission {
        quote_number: quote_number.clone(),
        event: EventDetails {
            honoree1_first_name: "Casey".to_string(),
            honoree1_last_name: "Nguyen".to_string(),
            honoree2_first_name: Some("Drew".to_string()),
            honoree2_last_name: Some("Holm".to_string()),
            ceremony_location_type: "outdoor".to_string(),
        },
        venue: VenueDetails {
            name: "Brenton Arboretum".to_string(),
            address1: "25141 260th St".to_string(),
            address2: None,
            city: "Dallas Center".to_string(),
            state: "IA".to_string(),
            zip: "50063".to_string(),
            country: "US".to_string(),
            as_insured: false,
        },
    }
}

fn demo_holder(quote_number: &eventcover::lifecycle::QuoteNumber) -> PolicyHolderSubmission {
    PolicyHolderSubmission {
        quote_number: quote_number.clone(),
        details: PolicyHolderDetails {
            first_name: "Casey".to_string(),
            last_name: "Nguyen".to_string(),
            phone: "515-555-0107".to_string(),
            relationship: "honoree".to_string(),
            address: "600 E Court Ave".to_string(),
            city: "Des Moines".to_string(),
            state: "IA".to_string(),
            zip: "50309".to_string(),
            country: "US".to_string(),
            hear_about_us: Some("planner".to_string()),
            legal_notices_accepted: true,
        },
    }
}
