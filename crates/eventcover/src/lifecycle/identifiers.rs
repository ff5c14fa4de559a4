//! Quote and policy number generation.
//!
//! Numbers read `<prefix>-<YYYYMMDD>-<suffix>`. The prefix encodes the record
//! type and the channel that created it; quotes carry a random six-digit
//! suffix, policies a per-day sequence.

use chrono::NaiveDate;
use rand::Rng;

use super::domain::{PolicyNumber, QuoteNumber, QuoteSource};

pub const CUSTOMER_QUOTE_PREFIX: &str = "QC";
pub const ADMIN_QUOTE_PREFIX: &str = "QA";
pub const CUSTOMER_POLICY_PREFIX: &str = "PC";
pub const ADMIN_POLICY_PREFIX: &str = "PA";

pub fn quote_prefix(source: QuoteSource) -> &'static str {
    match source {
        QuoteSource::Customer => CUSTOMER_QUOTE_PREFIX,
        QuoteSource::Admin => ADMIN_QUOTE_PREFIX,
    }
}

pub fn policy_prefix(source: QuoteSource) -> &'static str {
    match source {
        QuoteSource::Customer => CUSTOMER_POLICY_PREFIX,
        QuoteSource::Admin => ADMIN_POLICY_PREFIX,
    }
}

pub fn generate_quote_number<G: Rng + ?Sized>(
    source: QuoteSource,
    today: NaiveDate,
    rng: &mut G,
) -> QuoteNumber {
    QuoteNumber(format!(
        "{}-{}-{}",
        quote_prefix(source),
        today.format("%Y%m%d"),
        random_suffix(rng)
    ))
}

/// Policy number for the `sequence`-th policy issued on `today` (1-based).
pub fn sequenced_policy_number(source: QuoteSource, today: NaiveDate, sequence: u32) -> PolicyNumber {
    PolicyNumber(format!(
        "{}-{}-{:04}",
        policy_prefix(source),
        today.format("%Y%m%d"),
        sequence
    ))
}

/// Fallback used after a sequence collision.
pub fn random_policy_number<G: Rng + ?Sized>(
    source: QuoteSource,
    today: NaiveDate,
    rng: &mut G,
) -> PolicyNumber {
    PolicyNumber(format!(
        "{}-{}-{}",
        policy_prefix(source),
        today.format("%Y%m%d"),
        random_suffix(rng)
    ))
}

/// Recover the originating channel from a policy number prefix.
pub fn policy_source(number: &PolicyNumber) -> Option<QuoteSource> {
    match number.0.split('-').next()? {
        CUSTOMER_POLICY_PREFIX => Some(QuoteSource::Customer),
        ADMIN_POLICY_PREFIX => Some(QuoteSource::Admin),
        _ => None,
    }
}

fn random_suffix<G: Rng + ?Sized>(rng: &mut G) -> String {
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    #[test]
    fn quote_numbers_carry_source_prefix() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let customer = generate_quote_number(QuoteSource::Customer, day(), &mut rng);
            let admin = generate_quote_number(QuoteSource::Admin, day(), &mut rng);
            assert!(customer.0.starts_with("QC-20261016-"), "{customer}");
            assert!(admin.0.starts_with("QA-20261016-"), "{admin}");
            assert_eq!(customer.0.len(), "QC-20261016-".len() + 6);
        }
    }

    #[test]
    fn policy_numbers_are_date_sequenced() {
        let first = sequenced_policy_number(QuoteSource::Customer, day(), 1);
        let admin = sequenced_policy_number(QuoteSource::Admin, day(), 12);
        assert_eq!(first.0, "PC-20261016-0001");
        assert_eq!(admin.0, "PA-20261016-0012");
    }

    #[test]
    fn policy_source_reads_prefix_back() {
        let mut rng = StdRng::seed_from_u64(11);
        let random = random_policy_number(QuoteSource::Admin, day(), &mut rng);
        assert_eq!(policy_source(&random), Some(QuoteSource::Admin));
        assert_eq!(
            policy_source(&sequenced_policy_number(QuoteSource::Customer, day(), 3)),
            Some(QuoteSource::Customer)
        );
        assert_eq!(
            policy_source(&PolicyNumber("QC-20261016-000001".to_string())),
            None
        );
    }
}
