use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Midnight at the first day of the current month (UTC).
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .expect("first of month is always a valid date")
}

/// Midnight at the most recent Sunday (UTC).
pub fn start_of_week(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_back = now.weekday().num_days_from_sunday() as i64;
    let date = now.date_naive() - Duration::days(days_back);
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight exists"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_of_month_truncates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 17, 15, 42, 7).unwrap();
        let start = start_of_month(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn start_of_week_is_sunday_midnight() {
        // 2024-03-17 was a Sunday
        let sunday = Utc.with_ymd_and_hms(2024, 3, 17, 10, 0, 0).unwrap();
        assert_eq!(
            start_of_week(sunday),
            Utc.with_ymd_and_hms(2024, 3, 17, 0, 0, 0).unwrap()
        );

        // Wednesday the 20th rolls back to the same Sunday
        let wednesday = Utc.with_ymd_and_hms(2024, 3, 20, 23, 59, 59).unwrap();
        assert_eq!(
            start_of_week(wednesday),
            Utc.with_ymd_and_hms(2024, 3, 17, 0, 0, 0).unwrap()
        );
    }
}
