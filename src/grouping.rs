//! Year bucketing for the second level of the organized tree.
//!
//! A file's modification year is turned into a folder label according to a
//! [`GroupConfig`]. Only one grouping mode is active at a time:
//!
//! - per year (default): `"2024"`
//! - decades for old files: `"2010s"` once a year is `recent_years` or more
//!   behind the reference year
//! - cutoff: every year before `N` becomes `"Pre-N"`
//! - custom range: every year in `start..=end` becomes `"start-end"`

use crate::config::ConfigError;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Default number of recent years kept as literal buckets in decade mode.
pub const DEFAULT_RECENT_YEARS: i32 = 5;

/// The active grouping mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum YearGrouping {
    /// One folder per literal year.
    #[default]
    PerYear,
    /// Years at least `recent_years` older than the reference year collapse into decades.
    Decades { recent_years: i32 },
    /// Years strictly before `year` collapse into `Pre-<year>`.
    Before { year: i32 },
    /// Years inside the inclusive range collapse into `start-end`.
    Range { start: i32, end: i32 },
}

/// Grouping mode plus the year it is evaluated against.
///
/// The reference year is captured once so that bucketing stays a pure
/// function of `(year, config)` for the lifetime of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub grouping: YearGrouping,
    pub reference_year: i32,
}

impl GroupConfig {
    /// Builds a validated config using the current local year as reference.
    pub fn new(grouping: YearGrouping) -> Result<Self, ConfigError> {
        Self::with_reference_year(grouping, chrono::Local::now().year())
    }

    /// Builds a validated config against an explicit reference year.
    pub fn with_reference_year(
        grouping: YearGrouping,
        reference_year: i32,
    ) -> Result<Self, ConfigError> {
        match grouping {
            YearGrouping::Decades { recent_years } if recent_years <= 0 => {
                return Err(ConfigError::InvalidGrouping(format!(
                    "recent_years must be positive, got {}",
                    recent_years
                )));
            }
            YearGrouping::Range { start, end } if start > end => {
                return Err(ConfigError::InvalidGrouping(format!(
                    "range start {} is after end {}",
                    start, end
                )));
            }
            _ => {}
        }
        Ok(Self {
            grouping,
            reference_year,
        })
    }

    /// Per-year grouping, which needs no reference year.
    pub fn per_year() -> Self {
        Self {
            grouping: YearGrouping::PerYear,
            reference_year: chrono::Local::now().year(),
        }
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self::per_year()
    }
}

/// Parses a `START-END` range such as `2010-2019`.
pub fn parse_range(text: &str) -> Result<YearGrouping, ConfigError> {
    let invalid = || ConfigError::InvalidGrouping(format!("expected START-END, got '{}'", text));
    let (start, end) = text.trim().split_once('-').ok_or_else(invalid)?;
    let start = start.trim().parse::<i32>().map_err(|_| invalid())?;
    let end = end.trim().parse::<i32>().map_err(|_| invalid())?;
    Ok(YearGrouping::Range { start, end })
}

/// Returns the folder label for `year` under `config`.
///
/// # Examples
///
/// ```
/// use filetidy::grouping::{GroupConfig, YearGrouping, bucket_for};
///
/// let config = GroupConfig::with_reference_year(YearGrouping::Before { year: 2000 }, 2024).unwrap();
/// assert_eq!(bucket_for(1998, &config), "Pre-2000");
/// assert_eq!(bucket_for(2005, &config), "2005");
/// ```
pub fn bucket_for(year: i32, config: &GroupConfig) -> String {
    match config.grouping {
        YearGrouping::PerYear => year.to_string(),
        YearGrouping::Decades { recent_years } => {
            if config.reference_year - year >= recent_years {
                format!("{}s", year.div_euclid(10) * 10)
            } else {
                year.to_string()
            }
        }
        YearGrouping::Before { year: cutoff } => {
            if year < cutoff {
                format!("Pre-{}", cutoff)
            } else {
                year.to_string()
            }
        }
        YearGrouping::Range { start, end } => {
            if (start..=end).contains(&year) {
                format!("{}-{}", start, end)
            } else {
                year.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(grouping: YearGrouping) -> GroupConfig {
        GroupConfig::with_reference_year(grouping, 2026).unwrap()
    }

    #[test]
    fn test_per_year_is_literal() {
        let c = config(YearGrouping::PerYear);
        assert_eq!(bucket_for(2024, &c), "2024");
        assert_eq!(bucket_for(1987, &c), "1987");
    }

    #[test]
    fn test_decades_only_for_old_years() {
        let c = config(YearGrouping::Decades { recent_years: 5 });
        assert_eq!(bucket_for(2026, &c), "2026");
        assert_eq!(bucket_for(2022, &c), "2022");
        assert_eq!(bucket_for(2021, &c), "2020s");
        assert_eq!(bucket_for(2013, &c), "2010s");
        assert_eq!(bucket_for(1999, &c), "1990s");
    }

    #[test]
    fn test_before_cutoff() {
        let c = config(YearGrouping::Before { year: 2000 });
        assert_eq!(bucket_for(1998, &c), "Pre-2000");
        assert_eq!(bucket_for(2000, &c), "2000");
        assert_eq!(bucket_for(2005, &c), "2005");
    }

    #[test]
    fn test_custom_range_is_inclusive() {
        let c = config(YearGrouping::Range {
            start: 2010,
            end: 2019,
        });
        assert_eq!(bucket_for(2010, &c), "2010-2019");
        assert_eq!(bucket_for(2019, &c), "2010-2019");
        assert_eq!(bucket_for(2009, &c), "2009");
        assert_eq!(bucket_for(2020, &c), "2020");
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(
            GroupConfig::with_reference_year(YearGrouping::Range { start: 2020, end: 2010 }, 2026)
                .is_err()
        );
        assert!(
            GroupConfig::with_reference_year(YearGrouping::Decades { recent_years: 0 }, 2026)
                .is_err()
        );
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_range("2010-2019").unwrap(),
            YearGrouping::Range {
                start: 2010,
                end: 2019
            }
        );
        assert_eq!(
            parse_range(" 1990 - 1999 ").unwrap(),
            YearGrouping::Range {
                start: 1990,
                end: 1999
            }
        );
        assert!(parse_range("2010").is_err());
        assert!(parse_range("abc-2019").is_err());
    }

    #[test]
    fn test_bucketing_is_stable_across_calls() {
        let c = config(YearGrouping::Decades { recent_years: 5 });
        assert_eq!(bucket_for(2014, &c), bucket_for(2014, &c));
    }
}
