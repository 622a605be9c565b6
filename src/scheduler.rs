use chrono::Days;
use chrono_tz::Tz;

use crate::limits::{MAX_HORIZON_DAYS, MAX_LOOK_AHEAD_MONTHS};
use crate::model::{Instant, MonthId};
use crate::store::{self, MonthEntry, SlotCache};
use crate::tz;

/// The visible month followed by `look_ahead` months.
pub fn months_to_ensure(visible: MonthId, look_ahead: u32) -> Vec<MonthId> {
    let look_ahead = look_ahead.min(MAX_LOOK_AHEAD_MONTHS);
    let mut months = Vec::with_capacity(look_ahead as usize + 1);
    let mut month = visible;
    months.push(month);
    for _ in 0..look_ahead {
        month = month.next();
        months.push(month);
    }
    months
}

/// Never while a request is outstanding; failures are always retried.
pub fn should_fetch(entry: Option<&MonthEntry>) -> bool {
    match entry {
        None | Some(MonthEntry::NotFetched) | Some(MonthEntry::Failed { .. }) => true,
        Some(MonthEntry::Fetching) | Some(MonthEntry::Fetched { .. }) => false,
    }
}

/// Part of `month` inside the bookable window `[today, today + horizon)`.
/// `None` when the month lies wholly outside it.
pub fn fetch_range(
    month: MonthId,
    zone: Tz,
    now: Instant,
    horizon_days: u32,
) -> Option<(Instant, Instant)> {
    let today = tz::day_of(now, zone);
    let horizon = horizon_days.min(MAX_HORIZON_DAYS);
    let window_start = tz::day_start(today, zone);
    let window_end = tz::day_start(today + Days::new(u64::from(horizon)), zone);
    let (month_start, month_end) = month.range(zone);
    let start = month_start.max(window_start);
    let end = month_end.min(window_end);
    (start < end).then_some((start, end))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub month: MonthId,
    pub start: Instant,
    pub end: Instant,
}

/// Outcome of one scheduling pass: the cache with every requested month
/// marked [`MonthEntry::Fetching`], and the requests to issue.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub cache: SlotCache,
    pub requests: Vec<FetchRequest>,
}

pub fn plan_fetches(
    cache: &SlotCache,
    visible: MonthId,
    look_ahead: u32,
    zone: Tz,
    now: Instant,
    horizon_days: u32,
) -> FetchPlan {
    let mut next = cache.clone();
    let mut requests = Vec::new();
    for month in months_to_ensure(visible, look_ahead) {
        if !should_fetch(store::get(&next, month)) {
            continue;
        }
        let Some((start, end)) = fetch_range(month, zone, now, horizon_days) else {
            continue;
        };
        next = store::merge(&next, month, MonthEntry::Fetching);
        requests.push(FetchRequest { month, start, end });
    }
    FetchPlan {
        cache: next,
        requests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FetchError, merge};
    use chrono::{TimeZone, Utc};

    fn month(s: &str) -> MonthId {
        s.parse().unwrap()
    }

    fn now() -> Instant {
        Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn months_to_ensure_walks_forward() {
        let months = months_to_ensure(month("2024-11"), 2);
        let ids: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        assert_eq!(ids, vec!["2024-11", "2024-12", "2025-01"]);
        assert_eq!(months_to_ensure(month("2024-11"), 0), vec![month("2024-11")]);
    }

    #[test]
    fn should_fetch_by_state() {
        assert!(should_fetch(None));
        assert!(should_fetch(Some(&MonthEntry::NotFetched)));
        assert!(should_fetch(Some(&MonthEntry::Failed {
            error: FetchError::Transport("reset".into())
        })));
        assert!(!should_fetch(Some(&MonthEntry::Fetching)));
        assert!(!should_fetch(Some(&MonthEntry::fetched(vec![]))));
    }

    #[test]
    fn fetch_range_clamps_to_window() {
        let z = chrono_tz::UTC;
        let (start, end) = fetch_range(month("2024-07"), z, now(), 90).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap());

        // 2024-07-15 + 90 days = 2024-10-13.
        let (_, end) = fetch_range(month("2024-10"), z, now(), 90).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 10, 13, 0, 0, 0).unwrap());
        assert_eq!(fetch_range(month("2024-11"), z, now(), 90), None);
        assert_eq!(fetch_range(month("2024-06"), z, now(), 90), None);
    }

    #[test]
    fn second_pass_requests_nothing() {
        let first = plan_fetches(&SlotCache::new(), month("2024-07"), 1, chrono_tz::UTC, now(), 90);
        let asked: Vec<MonthId> = first.requests.iter().map(|r| r.month).collect();
        assert_eq!(asked, vec![month("2024-07"), month("2024-08")]);
        for m in &asked {
            assert!(store::get(&first.cache, *m).unwrap().fetch_in_progress());
        }

        let second = plan_fetches(&first.cache, month("2024-07"), 1, chrono_tz::UTC, now(), 90);
        assert!(second.requests.is_empty());
        assert_eq!(second.cache, first.cache);
    }

    #[test]
    fn failed_month_is_requested_exactly_once() {
        let cache = merge(
            &merge(
                &SlotCache::new(),
                month("2024-07"),
                MonthEntry::Failed {
                    error: FetchError::Backend {
                        status: 500,
                        message: "boom".into(),
                    },
                },
            ),
            month("2024-08"),
            MonthEntry::fetched(vec![]),
        );
        let plan = plan_fetches(&cache, month("2024-07"), 1, chrono_tz::UTC, now(), 90);
        assert_eq!(plan.requests.len(), 1);
        assert_eq!(plan.requests[0].month, month("2024-07"));
    }

    #[test]
    fn months_past_horizon_are_skipped() {
        let plan = plan_fetches(&SlotCache::new(), month("2024-10"), 2, chrono_tz::UTC, now(), 90);
        let asked: Vec<MonthId> = plan.requests.iter().map(|r| r.month).collect();
        assert_eq!(asked, vec![month("2024-10")]);
        assert_eq!(store::get(&plan.cache, month("2024-11")), None);
    }
}
