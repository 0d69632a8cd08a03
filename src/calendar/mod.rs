//! Logistics calendar: which days are valid for ordering, how holidays shift
//! receipts, and the authoritative `(r1, P)` resolver.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{calendar_exhausted, calendar_override_before_planning, CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lane {
    Standard,
    Saturday,
    Monday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HolidayScope {
    Logistics,
    Orders,
    Receipts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HolidayEffect {
    NoOrder,
    NoReceipt,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HolidayDate {
    Single(NaiveDate),
    /// Inclusive on both ends.
    Range(NaiveDate, NaiveDate),
    /// Fixed day-of-month, recurring every month (e.g. the 1st).
    MonthlyFixedDay(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holiday {
    pub date: HolidayDate,
    pub scope: HolidayScope,
    pub effect: HolidayEffect,
}

impl Holiday {
    fn covers(&self, date: NaiveDate) -> bool {
        match &self.date {
            HolidayDate::Single(d) => *d == date,
            HolidayDate::Range(start, end) => date >= *start && date <= *end,
            HolidayDate::MonthlyFixedDay(day) => date.day() == *day,
        }
    }

    fn blocks_order(&self) -> bool {
        matches!(self.effect, HolidayEffect::NoOrder | HolidayEffect::Both)
    }

    fn blocks_receipt(&self) -> bool {
        matches!(self.effect, HolidayEffect::NoReceipt | HolidayEffect::Both)
    }
}

pub struct LogisticsCalendar {
    /// Weekdays on which ordering is otherwise permitted.
    pub order_weekdays: Vec<Weekday>,
    pub holidays: Vec<Holiday>,
    /// Safety bound on how far forward the resolver searches before
    /// declaring the calendar exhausted.
    pub max_lookahead_days: i64,
}

impl LogisticsCalendar {
    pub fn new(order_weekdays: Vec<Weekday>, holidays: Vec<Holiday>) -> Self {
        Self { order_weekdays, holidays, max_lookahead_days: 90 }
    }

    fn holiday_blocks(&self, date: NaiveDate, scope: HolidayScope, blocks: impl Fn(&Holiday) -> bool) -> bool {
        self.holidays
            .iter()
            .any(|h| h.scope == scope && h.covers(date) && blocks(h))
    }

    pub fn is_order_day(&self, date: NaiveDate) -> bool {
        if !self.order_weekdays.contains(&date.weekday()) {
            return false;
        }
        !self.holiday_blocks(date, HolidayScope::Orders, Holiday::blocks_order)
            && !self.holiday_blocks(date, HolidayScope::Logistics, Holiday::blocks_order)
    }

    pub fn is_receipt_day(&self, date: NaiveDate) -> bool {
        !self.holiday_blocks(date, HolidayScope::Receipts, Holiday::blocks_receipt)
            && !self.holiday_blocks(date, HolidayScope::Logistics, Holiday::blocks_receipt)
    }

    /// Smallest valid order day strictly greater than `after`.
    pub fn next_order_opportunity(&self, after: NaiveDate) -> CoreResult<NaiveDate> {
        let mut candidate = after + Duration::days(1);
        for _ in 0..self.max_lookahead_days {
            if self.is_order_day(candidate) {
                return Ok(candidate);
            }
            candidate += Duration::days(1);
        }
        Err(calendar_exhausted(after))
    }

    /// Next day on or after `from` on which a receipt may be accepted.
    pub fn next_receipt_day(&self, from: NaiveDate) -> CoreResult<NaiveDate> {
        let mut candidate = from;
        for _ in 0..self.max_lookahead_days {
            if self.is_receipt_day(candidate) {
                return Ok(candidate);
            }
            candidate += Duration::days(1);
        }
        Err(calendar_exhausted(from))
    }

    /// The supplier commitment rule. STANDARD delivers `lead_time_days`
    /// later; SATURDAY/MONDAY lanes only apply when `order_date` is a
    /// Friday (callers downgrade to STANDARD otherwise), then shift forward
    /// past any NO_RECEIPT holiday.
    pub fn next_receipt_date(&self, order_date: NaiveDate, lane: Lane, lead_time_days: u32) -> CoreResult<NaiveDate> {
        let naive = match lane {
            Lane::Standard => order_date + Duration::days(lead_time_days as i64),
            Lane::Saturday if order_date.weekday() == Weekday::Fri => {
                order_date + Duration::days(1)
            }
            Lane::Monday if order_date.weekday() == Weekday::Fri => {
                order_date + Duration::days(3)
            }
            _ => order_date + Duration::days(lead_time_days as i64),
        };
        self.next_receipt_day(naive)
    }

    /// Authoritative resolver. Returns `(r1, P)` with `P >= 1`: `r1` is the
    /// receipt date (or the validated override), `P` is the number of days
    /// from `order_date` (exclusive) through the day before the next
    /// delivery opportunity after `r1` (inclusive).
    pub fn resolve_receipt_and_protection(
        &self,
        order_date: NaiveDate,
        lane: Lane,
        lead_time_days: u32,
        receipt_override: Option<NaiveDate>,
    ) -> CoreResult<(NaiveDate, u32)> {
        let r1 = match receipt_override {
            Some(d) => {
                if d < order_date {
                    return Err(calendar_override_before_planning(order_date, d));
                }
                d
            }
            None => self.next_receipt_date(order_date, lane, lead_time_days)?,
        };

        let next_order = self.next_order_opportunity(order_date)?;
        let next_delivery = self.next_receipt_date(next_order, lane, lead_time_days)?;
        let protection_end = if next_delivery > r1 {
            next_delivery - Duration::days(1)
        } else {
            r1
        };

        let p = (protection_end - order_date).num_days();
        let p = p.max(1) as u32;
        Ok((r1, p))
    }
}

impl Default for LogisticsCalendar {
    fn default() -> Self {
        Self::new(
            vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            Vec::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekend_is_not_an_order_day_by_default() {
        let cal = LogisticsCalendar::default();
        assert!(!cal.is_order_day(d(2026, 8, 1))); // a Saturday
        assert!(cal.is_order_day(d(2026, 7, 31))); // a Friday
    }

    #[test]
    fn no_order_holiday_blocks_the_order_day() {
        let cal = LogisticsCalendar::new(
            vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
            vec![Holiday {
                date: HolidayDate::Single(d(2026, 7, 31)),
                scope: HolidayScope::Orders,
                effect: HolidayEffect::NoOrder,
            }],
        );
        assert!(!cal.is_order_day(d(2026, 7, 31)));
    }

    #[test]
    fn no_receipt_holiday_shifts_receipt_forward() {
        let cal = LogisticsCalendar::new(
            vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
            vec![Holiday {
                date: HolidayDate::Single(d(2026, 8, 5)),
                scope: HolidayScope::Receipts,
                effect: HolidayEffect::NoReceipt,
            }],
        );
        let receipt = cal.next_receipt_date(d(2026, 7, 29), Lane::Standard, 7).unwrap();
        assert_eq!(receipt, d(2026, 8, 6));
    }

    #[test]
    fn resolver_returns_protection_at_least_one_day() {
        let cal = LogisticsCalendar::default();
        let (r1, p) = cal
            .resolve_receipt_and_protection(d(2026, 7, 31), Lane::Standard, 3, None)
            .unwrap();
        assert_eq!(r1, d(2026, 8, 3));
        assert!(p >= 1);
    }

    #[test]
    fn override_before_planning_date_is_rejected() {
        let cal = LogisticsCalendar::default();
        let err = cal
            .resolve_receipt_and_protection(d(2026, 7, 31), Lane::Standard, 3, Some(d(2026, 7, 1)))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidCalendar { .. }));
    }
}
