//! Contribution schedule: which trading dates receive a recurring purchase.
//!
//! The schedule is evaluated against the ordered date axis of a price table,
//! never against the calendar, so a month with no recorded trading days simply
//! gets no contribution. The first date of the table is the initial purchase
//! and is never a contribution date.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Rule selecting contribution dates from the available trading dates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContributionSchedule {
    /// First available date of each calendar month after the start month.
    #[default]
    Monthly,

    /// No recurring contributions; only the initial purchase happens.
    Never,

    /// Explicit dates. Dates absent from the table, or not after the first
    /// table date, are skipped.
    Dates { dates: Vec<NaiveDate> },
}

impl ContributionSchedule {
    /// Contribution dates selected from `dates` (ascending, no duplicates).
    ///
    /// `dates` must be strictly increasing; `dates[0]` is the start date.
    pub fn contribution_dates(&self, dates: &[NaiveDate]) -> Vec<NaiveDate> {
        let Some((&start, rest)) = dates.split_first() else {
            return Vec::new();
        };

        match self {
            Self::Never => Vec::new(),
            Self::Monthly => {
                let mut anchor = year_month(start);
                let mut out = Vec::new();
                for &date in rest {
                    let ym = year_month(date);
                    if ym != anchor {
                        out.push(date);
                        anchor = ym;
                    }
                }
                out
            }
            Self::Dates { dates: wanted } => {
                let mut out: Vec<NaiveDate> = wanted
                    .iter()
                    .copied()
                    .filter(|d| *d > start && rest.binary_search(d).is_ok())
                    .collect();
                out.sort_unstable();
                out.dedup();
                out
            }
        }
    }

    /// Per-date predicate form: one flag per entry of `dates`.
    pub fn contribution_flags(&self, dates: &[NaiveDate]) -> Vec<bool> {
        let selected = self.contribution_dates(dates);
        let mut flags = vec![false; dates.len()];
        let mut next = selected.iter().peekable();
        for (i, date) in dates.iter().enumerate() {
            if next.peek() == Some(&date) {
                flags[i] = true;
                next.next();
            }
        }
        flags
    }

    /// Human-readable label for reports.
    pub fn label(&self) -> String {
        match self {
            Self::Monthly => "monthly".to_string(),
            Self::Never => "never".to_string(),
            Self::Dates { dates } => format!("{} explicit dates", dates.len()),
        }
    }
}

fn year_month(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monthly_picks_first_trading_day_of_each_later_month() {
        let dates = vec![
            d(2021, 1, 4),
            d(2021, 1, 5),
            d(2021, 1, 29),
            d(2021, 2, 1),
            d(2021, 2, 2),
            d(2021, 3, 3),
            d(2021, 3, 4),
        ];
        let got = ContributionSchedule::Monthly.contribution_dates(&dates);
        assert_eq!(got, vec![d(2021, 2, 1), d(2021, 3, 3)]);
    }

    #[test]
    fn monthly_skips_start_month_even_on_the_first() {
        let dates = vec![d(2021, 1, 1), d(2021, 1, 2)];
        assert!(ContributionSchedule::Monthly
            .contribution_dates(&dates)
            .is_empty());
    }

    #[test]
    fn monthly_skips_months_without_trading_days() {
        // No rows at all in February
        let dates = vec![d(2021, 1, 15), d(2021, 3, 10), d(2021, 3, 11)];
        let got = ContributionSchedule::Monthly.contribution_dates(&dates);
        assert_eq!(got, vec![d(2021, 3, 10)]);
    }

    #[test]
    fn monthly_handles_year_rollover() {
        let dates = vec![d(2021, 12, 30), d(2022, 1, 3), d(2022, 12, 1), d(2023, 1, 2)];
        let got = ContributionSchedule::Monthly.contribution_dates(&dates);
        assert_eq!(got, vec![d(2022, 1, 3), d(2022, 12, 1), d(2023, 1, 2)]);
    }

    #[test]
    fn never_selects_nothing() {
        let dates = vec![d(2021, 1, 4), d(2021, 2, 1)];
        assert!(ContributionSchedule::Never
            .contribution_dates(&dates)
            .is_empty());
    }

    #[test]
    fn explicit_dates_outside_table_are_skipped() {
        let dates = vec![d(2021, 1, 4), d(2021, 1, 5), d(2021, 1, 6)];
        let schedule = ContributionSchedule::Dates {
            dates: vec![d(2021, 1, 6), d(2021, 1, 4), d(2021, 1, 9), d(2021, 1, 5), d(2021, 1, 5)],
        };
        assert_eq!(
            schedule.contribution_dates(&dates),
            vec![d(2021, 1, 5), d(2021, 1, 6)]
        );
    }

    #[test]
    fn flags_line_up_with_dates() {
        let dates = vec![d(2021, 1, 4), d(2021, 2, 1), d(2021, 2, 2), d(2021, 3, 1)];
        assert_eq!(
            ContributionSchedule::Monthly.contribution_flags(&dates),
            vec![false, true, false, true]
        );
    }

    #[test]
    fn empty_axis_has_no_contributions() {
        assert!(ContributionSchedule::Monthly
            .contribution_dates(&[])
            .is_empty());
    }

    #[test]
    fn toml_tagged_representation() {
        #[derive(Deserialize)]
        struct Wrapper {
            schedule: ContributionSchedule,
        }
        let w: Wrapper = toml::from_str("schedule = { type = \"monthly\" }").unwrap();
        assert_eq!(w.schedule, ContributionSchedule::Monthly);
        let w: Wrapper =
            toml::from_str("schedule = { type = \"dates\", dates = [\"2021-02-01\"] }").unwrap();
        assert_eq!(
            w.schedule,
            ContributionSchedule::Dates {
                dates: vec![d(2021, 2, 1)]
            }
        );
    }
}
