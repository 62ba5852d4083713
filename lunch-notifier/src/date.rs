use crate::types::TargetDate;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolves "tomorrow" as a civil date in a fixed zone.
#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    zone: Tz,
}

impl DateResolver {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    pub fn tomorrow(&self) -> TargetDate {
        self.resolve(Utc::now())
    }

    /// Civil date of `now` in the resolver's zone, plus one day.
    ///
    /// The wall clock is pinned to noon before adding 24 hours. A DST shift
    /// moves the result by one hour at most, which keeps it on the same
    /// calendar day.
    pub fn resolve(&self, now: DateTime<Utc>) -> TargetDate {
        let today = now.with_timezone(&self.zone).date_naive();
        let tomorrow = NaiveTime::from_hms_opt(12, 0, 0)
            .and_then(|noon| self.zone.from_local_datetime(&today.and_time(noon)).earliest())
            .map(|anchor| (anchor + Duration::days(1)).with_timezone(&self.zone).date_naive())
            // Noon never falls in a transition gap for real zones; fall back to
            // plain calendar arithmetic if one ever does.
            .or_else(|| today.succ_opt())
            .unwrap_or(today);

        TargetDate::new(tomorrow, self.zone)
    }

    /// Pin an explicit calendar date to this resolver's zone.
    pub fn fixed(&self, date: chrono::NaiveDate) -> TargetDate {
        TargetDate::new(date, self.zone)
    }
}
