#[cfg(test)]
use std::str::FromStr;

#[cfg(test)]
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
#[cfg(test)]
use rust_decimal::Decimal;

pub mod test_postgres;

#[cfg(test)]
pub(crate) fn hour(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 1, 2, 0, 0, 0).unwrap() + TimeDelta::hours(n)
}

#[cfg(test)]
pub(crate) fn at(n: i64, minutes: i64) -> DateTime<Utc> {
    hour(n) + TimeDelta::minutes(minutes)
}

#[cfg(test)]
pub(crate) fn dec(v: &str) -> Decimal {
    Decimal::from_str(v).unwrap()
}
