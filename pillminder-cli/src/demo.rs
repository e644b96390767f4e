use chrono::{DateTime, Duration, Utc};
use pillminder_core::Task;

/// Offline test list: the first dose was due four minutes ago, the rest follow
/// every `spacing`.
pub fn generate(count: usize, spacing: Duration, now: DateTime<Utc>) -> Vec<Task> {
    let first = now - Duration::minutes(4);
    (0..count)
        .map_while(|i| {
            let offset = spacing.checked_mul(i32::try_from(i).ok()?)?;
            let at = first.checked_add_signed(offset)?;
            Some(Task::new(
                format!("demo-{i}"),
                format!("Medication {i}"),
                "99 mL",
                at,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pillminder_core::TaskState;

    #[test]
    fn test_spaced_from_four_minutes_ago() {
        let now = Utc.with_ymd_and_hms(2026, 2, 21, 8, 0, 0).unwrap();
        let tasks = generate(3, Duration::seconds(120), now);

        let times: Vec<_> = tasks.iter().map(|t| t.scheduled_time).collect();
        assert_eq!(
            times,
            vec![
                now - Duration::minutes(4),
                now - Duration::minutes(2),
                now,
            ]
        );
        assert_eq!(tasks[2].title(), "Medication 2: 99 mL");
        assert!(tasks.iter().all(|t| t.state(now) == TaskState::Soon));
    }

    #[test]
    fn test_zero_count_is_empty() {
        let now = Utc.with_ymd_and_hms(2026, 2, 21, 8, 0, 0).unwrap();
        assert!(generate(0, Duration::seconds(120), now).is_empty());
    }
}
