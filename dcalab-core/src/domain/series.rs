//! Date-indexed series, the output shape of every simulation result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A sequence of values keyed by strictly increasing calendar dates.
///
/// Dates and values are stored side by side; `dates.len() == values.len()`
/// always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries<T> {
    dates: Vec<NaiveDate>,
    values: Vec<T>,
}

impl<T> TimeSeries<T> {
    pub fn new() -> Self {
        Self {
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            dates: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Append a point. Returns false (and drops the value) if `date` is not
    /// strictly after the last date already in the series.
    pub fn push(&mut self, date: NaiveDate, value: T) -> bool {
        if self.dates.last().is_some_and(|last| *last >= date) {
            return false;
        }
        self.dates.push(date);
        self.values.push(value);
        true
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Value on an exact date, if the series has one.
    pub fn get(&self, date: NaiveDate) -> Option<&T> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| &self.values[idx])
    }

    pub fn first(&self) -> Option<(NaiveDate, &T)> {
        self.dates.first().copied().zip(self.values.first())
    }

    pub fn last(&self) -> Option<(NaiveDate, &T)> {
        self.dates.last().copied().zip(self.values.last())
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &T)> + '_ {
        self.dates.iter().copied().zip(self.values.iter())
    }

    /// Build a new series over the same dates by transforming every value.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> TimeSeries<U> {
        TimeSeries {
            dates: self.dates.clone(),
            values: self.values.iter().map(f).collect(),
        }
    }
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn push_keeps_dates_strictly_increasing() {
        let mut ts = TimeSeries::new();
        assert!(ts.push(d(2), 1.0));
        assert!(ts.push(d(3), 2.0));
        assert!(!ts.push(d(3), 3.0));
        assert!(!ts.push(d(1), 4.0));
        assert_eq!(ts.len(), 2);
        assert_eq!(ts.values(), &[1.0, 2.0]);
    }

    #[test]
    fn lookup_by_date() {
        let mut ts = TimeSeries::new();
        ts.push(d(2), 10.0);
        ts.push(d(5), 20.0);
        assert_eq!(ts.get(d(5)), Some(&20.0));
        assert_eq!(ts.get(d(4)), None);
        assert_eq!(ts.first(), Some((d(2), &10.0)));
        assert_eq!(ts.last(), Some((d(5), &20.0)));
    }

    #[test]
    fn map_preserves_dates() {
        let mut ts = TimeSeries::new();
        ts.push(d(2), 10.0);
        ts.push(d(3), 20.0);
        let doubled = ts.map(|v| v * 2.0);
        assert_eq!(doubled.dates(), ts.dates());
        assert_eq!(doubled.values(), &[20.0, 40.0]);
    }
}
