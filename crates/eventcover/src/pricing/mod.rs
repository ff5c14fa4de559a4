//! Premium calculation for event liability and cancellation coverage.
//!
//! Every amount is a static table lookup. Keys that are not present in a table
//! price at zero rather than failing, so the calculator can be driven directly
//! from untrusted wizard input; range checks live in quote validation.

mod tables;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tables::{BASE_PREMIUMS, LIABILITY_PREMIUMS, LIQUOR_LIABILITY_PREMIUMS};

/// Lowest selectable coverage level.
pub const MIN_COVERAGE_LEVEL: u8 = 1;
/// Highest selectable coverage level.
pub const MAX_COVERAGE_LEVEL: u8 = 10;

/// Premium components for a single quote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumBreakdown {
    pub base_premium: u32,
    pub liability_premium: u32,
    pub liquor_liability_premium: u32,
    pub total_premium: u32,
}

impl PremiumBreakdown {
    fn from_components(base: u32, liability: u32, liquor: u32) -> Self {
        Self {
            base_premium: base,
            liability_premium: liability,
            liquor_liability_premium: liquor,
            total_premium: base + liability + liquor,
        }
    }
}

/// Optional third-party liability tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiabilityOption {
    #[default]
    None,
    Option1,
    Option2,
    Option3,
    Option4,
    Option5,
    Option6,
}

impl LiabilityOption {
    pub const ALL: [LiabilityOption; 7] = [
        LiabilityOption::None,
        LiabilityOption::Option1,
        LiabilityOption::Option2,
        LiabilityOption::Option3,
        LiabilityOption::Option4,
        LiabilityOption::Option5,
        LiabilityOption::Option6,
    ];

    pub fn key(self) -> &'static str {
        match self {
            LiabilityOption::None => "none",
            LiabilityOption::Option1 => "option1",
            LiabilityOption::Option2 => "option2",
            LiabilityOption::Option3 => "option3",
            LiabilityOption::Option4 => "option4",
            LiabilityOption::Option5 => "option5",
            LiabilityOption::Option6 => "option6",
        }
    }

    pub fn is_selected(self) -> bool {
        self != LiabilityOption::None
    }
}

impl fmt::Display for LiabilityOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for LiabilityOption {
    type Err = UnknownKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|option| option.key() == value)
            .ok_or_else(|| UnknownKey::new("liability option", value))
    }
}

/// Guest count bucket used by the liquor liability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GuestRange {
    #[serde(rename = "1-50")]
    UpTo50,
    #[serde(rename = "51-100")]
    UpTo100,
    #[serde(rename = "101-150")]
    UpTo150,
    #[serde(rename = "151-200")]
    UpTo200,
    #[serde(rename = "201-250")]
    UpTo250,
    #[serde(rename = "251-300")]
    UpTo300,
    #[serde(rename = "301-350")]
    UpTo350,
    #[serde(rename = "351-400")]
    UpTo400,
}

impl GuestRange {
    pub const ALL: [GuestRange; 8] = [
        GuestRange::UpTo50,
        GuestRange::UpTo100,
        GuestRange::UpTo150,
        GuestRange::UpTo200,
        GuestRange::UpTo250,
        GuestRange::UpTo300,
        GuestRange::UpTo350,
        GuestRange::UpTo400,
    ];

    pub fn key(self) -> &'static str {
        match self {
            GuestRange::UpTo50 => "1-50",
            GuestRange::UpTo100 => "51-100",
            GuestRange::UpTo150 => "101-150",
            GuestRange::UpTo200 => "151-200",
            GuestRange::UpTo250 => "201-250",
            GuestRange::UpTo300 => "251-300",
            GuestRange::UpTo350 => "301-350",
            GuestRange::UpTo400 => "351-400",
        }
    }

    /// Upper bound (inclusive) of the bucket.
    pub fn max_guests(self) -> u32 {
        match self {
            GuestRange::UpTo50 => 50,
            GuestRange::UpTo100 => 100,
            GuestRange::UpTo150 => 150,
            GuestRange::UpTo200 => 200,
            GuestRange::UpTo250 => 250,
            GuestRange::UpTo300 => 300,
            GuestRange::UpTo350 => 350,
            GuestRange::UpTo400 => 400,
        }
    }

    /// Bucket a raw head count. Zero guests and parties above 400 are not insurable.
    pub fn from_guest_count(guests: u32) -> Option<Self> {
        if guests == 0 {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|range| guests <= range.max_guests())
    }
}

impl fmt::Display for GuestRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for GuestRange {
    type Err = UnknownKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|range| range.key() == value)
            .ok_or_else(|| UnknownKey::new("guest range", value))
    }
}

/// Raised when a stored or submitted key does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownKey {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownKey {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

pub fn base_premium(coverage_level: u8) -> u32 {
    BASE_PREMIUMS
        .iter()
        .find(|(level, _)| *level == coverage_level)
        .map(|(_, amount)| *amount)
        .unwrap_or(0)
}

pub fn liability_premium(liability_key: &str) -> u32 {
    lookup(&LIABILITY_PREMIUMS, liability_key)
}

pub fn liquor_liability_premium(guest_range_key: &str, liquor_liability: bool) -> u32 {
    if !liquor_liability {
        return 0;
    }
    lookup(&LIQUOR_LIABILITY_PREMIUMS, guest_range_key)
}

fn lookup(table: &[(&str, u32)], key: &str) -> u32 {
    table
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, amount)| *amount)
        .unwrap_or(0)
}

/// Price raw wizard keys.
pub fn calculate_premium(
    coverage_level: u8,
    liability_key: &str,
    guest_range_key: &str,
    liquor_liability: bool,
) -> PremiumBreakdown {
    PremiumBreakdown::from_components(
        base_premium(coverage_level),
        liability_premium(liability_key),
        liquor_liability_premium(guest_range_key, liquor_liability),
    )
}

/// Typed pricing inputs as carried on a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumInputs {
    pub coverage_level: u8,
    pub liability_option: LiabilityOption,
    pub guest_range: GuestRange,
    pub liquor_liability: bool,
}

impl PremiumInputs {
    pub fn premium(&self) -> PremiumBreakdown {
        calculate_premium(
            self.coverage_level,
            self.liability_option.key(),
            self.guest_range.key(),
            self.liquor_liability,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_sum_of_components_for_every_combination() {
        for level in MIN_COVERAGE_LEVEL..=MAX_COVERAGE_LEVEL {
            for option in LiabilityOption::ALL {
                for range in GuestRange::ALL {
                    for liquor in [false, true] {
                        let inputs = PremiumInputs {
                            coverage_level: level,
                            liability_option: option,
                            guest_range: range,
                            liquor_liability: liquor,
                        };
                        let premium = inputs.premium();
                        assert_eq!(
                            premium.total_premium,
                            premium.base_premium
                                + premium.liability_premium
                                + premium.liquor_liability_premium
                        );
                        assert_eq!(premium.base_premium, base_premium(level));
                        assert_eq!(premium.liability_premium, liability_premium(option.key()));
                        if !liquor {
                            assert_eq!(premium.liquor_liability_premium, 0);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn matches_rate_table_for_representative_quote() {
        let premium = calculate_premium(5, "option2", "101-150", true);
        assert_eq!(
            premium,
            PremiumBreakdown {
                base_premium: 355,
                liability_premium: 210,
                liquor_liability_premium: 85,
                total_premium: 650,
            }
        );
    }

    #[test]
    fn base_premium_rises_with_coverage_level() {
        let amounts: Vec<u32> = (MIN_COVERAGE_LEVEL..=MAX_COVERAGE_LEVEL)
            .map(base_premium)
            .collect();
        assert!(amounts.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(amounts.first(), Some(&160));
        assert_eq!(amounts.last(), Some(&705));
    }

    #[test]
    fn unknown_keys_price_at_zero() {
        let premium = calculate_premium(11, "option9", "401-450", true);
        assert_eq!(premium, PremiumBreakdown::default());
        assert_eq!(base_premium(0), 0);
    }

    #[test]
    fn liquor_liability_follows_guest_range_table() {
        assert_eq!(liquor_liability_premium("1-50", true), 65);
        assert_eq!(liquor_liability_premium("151-200", true), 85);
        assert_eq!(liquor_liability_premium("251-300", true), 100);
        assert_eq!(liquor_liability_premium("351-400", true), 150);
        assert_eq!(liquor_liability_premium("351-400", false), 0);
    }

    #[test]
    fn guest_counts_map_to_buckets() {
        assert_eq!(GuestRange::from_guest_count(1), Some(GuestRange::UpTo50));
        assert_eq!(GuestRange::from_guest_count(50), Some(GuestRange::UpTo50));
        assert_eq!(GuestRange::from_guest_count(51), Some(GuestRange::UpTo100));
        assert_eq!(GuestRange::from_guest_count(400), Some(GuestRange::UpTo400));
        assert_eq!(GuestRange::from_guest_count(0), None);
        assert_eq!(GuestRange::from_guest_count(401), None);
    }

    #[test]
    fn keys_parse_back_to_variants() {
        assert_eq!(
            "option4".parse::<LiabilityOption>(),
            Ok(LiabilityOption::Option4)
        );
        assert_eq!("201-250".parse::<GuestRange>(), Ok(GuestRange::UpTo250));
        let err = "lots".parse::<GuestRange>().expect_err("unknown range");
        assert_eq!(err.to_string(), "unknown guest range 'lots'");
    }

    #[test]
    fn serde_uses_wizard_keys() {
        let json = serde_json::to_string(&GuestRange::UpTo150).expect("serializes");
        assert_eq!(json, "\"101-150\"");
        let option: LiabilityOption = serde_json::from_str("\"option6\"").expect("parses");
        assert_eq!(option, LiabilityOption::Option6);
    }
}
