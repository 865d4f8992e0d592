use std::collections::HashMap;

use ansi_term::{Colour, Style};
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{
    core::entities::DaySnapshot,
    utils::time::{date_key, format_duration_short},
};

#[derive(Debug, PartialEq, Eq)]
pub struct NameUsage {
    pub name: String,
    pub total: Duration,
    pub count: usize,
}

/// Returns per-name usage sorted by time spent, plus the tracked total. When `now` is given
/// the active lap's elapsed time is counted too (only meaningful for today's snapshot).
pub fn analyze_day(snapshot: &DaySnapshot, now: Option<DateTime<Utc>>) -> (Vec<NameUsage>, Duration) {
    let mut map = HashMap::<&str, NameUsage>::new();
    let mut total = Duration::zero();

    for lap in &snapshot.laps {
        total += lap.duration;
        let usage = map.entry(&lap.name).or_insert_with(|| NameUsage {
            name: lap.name.clone(),
            total: Duration::zero(),
            count: 0,
        });
        usage.total += lap.duration;
        usage.count += 1;
    }

    if let (Some(active), Some(now)) = (&snapshot.active_lap, now) {
        let elapsed = active.elapsed(now);
        total += elapsed;
        let usage = map.entry(&active.name).or_insert_with(|| NameUsage {
            name: active.name.clone(),
            total: Duration::zero(),
            count: 0,
        });
        usage.total += elapsed;
        usage.count += 1;
    }

    let mut usages = map.into_values().collect::<Vec<_>>();
    usages.sort_by(|a, b| b.total.cmp(&a.total));
    (usages, total)
}

const BAR_WIDTH: i64 = 24;

pub fn print_day(date: NaiveDate, usages: &[NameUsage], total: Duration) {
    println!("{}", Style::new().bold().paint(date_key(date)));
    if usages.is_empty() {
        println!("  no laps recorded");
        return;
    }
    println!(
        "  total tracked: {}",
        Style::new().bold().paint(format_duration_short(total))
    );

    let name_width = usages.iter().map(|v| v.name.len()).max().unwrap_or(0);
    for usage in usages {
        let filled = if total > Duration::zero() {
            (usage.total.num_milliseconds() * BAR_WIDTH / total.num_milliseconds()).max(1)
        } else {
            0
        };
        let bar: String = (0..BAR_WIDTH)
            .map(|i| if i < filled { '█' } else { '·' })
            .collect();
        let count = if usage.count > 1 {
            format!(" x{}", usage.count)
        } else {
            String::new()
        };
        println!(
            "  {:name_width$}  {}  {}{}",
            usage.name,
            Colour::Cyan.paint(bar),
            format_duration_short(usage.total),
            count,
        );
    }
}

pub fn print_past_day(date: NaiveDate, usages: &[NameUsage], total: Duration) {
    let top = usages
        .iter()
        .take(3)
        .map(|v| format!("{} {}", v.name, format_duration_short(v.total)))
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "  {}  {:>8}  {}",
        date_key(date),
        format_duration_short(total),
        Style::new().dimmed().paint(top)
    );
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::core::entities::ActiveLap;

    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn lap(name: &str, start: i64, end: i64) -> crate::core::entities::Lap {
        ActiveLap {
            id: format!("{name}-{start}"),
            name: name.into(),
            start_time: at(start),
        }
        .close(at(end))
    }

    #[test]
    fn groups_by_name_and_sorts_by_total() {
        let snapshot = DaySnapshot {
            laps: vec![
                lap("work", 0, 10_000),
                lap("lunch", 10_000, 40_000),
                lap("work", 40_000, 45_000),
            ],
            active_lap: None,
        };

        let (usages, total) = analyze_day(&snapshot, None);
        assert_eq!(total, Duration::milliseconds(45_000));
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].name, "lunch");
        assert_eq!(usages[0].total, Duration::milliseconds(30_000));
        assert_eq!(usages[1].name, "work");
        assert_eq!(usages[1].count, 2);
    }

    #[test]
    fn active_lap_elapsed_is_included_when_now_is_given() {
        let snapshot = DaySnapshot {
            laps: vec![lap("work", 0, 10_000)],
            active_lap: Some(ActiveLap {
                id: "a".into(),
                name: "work".into(),
                start_time: at(10_000),
            }),
        };

        let (usages, total) = analyze_day(&snapshot, Some(at(25_000)));
        assert_eq!(total, Duration::milliseconds(25_000));
        assert_eq!(usages[0].total, Duration::milliseconds(25_000));
        assert_eq!(usages[0].count, 2);

        let (usages, total) = analyze_day(&snapshot, None);
        assert_eq!(total, Duration::milliseconds(10_000));
        assert_eq!(usages[0].count, 1);
    }

    #[test]
    fn empty_day_is_empty() {
        let (usages, total) = analyze_day(&DaySnapshot::default(), None);
        assert!(usages.is_empty());
        assert_eq!(total, Duration::zero());
    }
}
