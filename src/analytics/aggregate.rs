use crate::analytics::types::{HourlyDelay, LineDelay, WorstLine};
use crate::analytics::utility::{display_avg, on_time_pct, round2};
use crate::store::{HourGroupRow, LineGroupRow, LineNameGroupRow};

/// Renders per-line aggregates. Row order is kept as queried.
pub fn line_delays(rows: Vec<LineGroupRow>) -> Vec<LineDelay> {
    rows.into_iter()
        .map(|row| LineDelay {
            line: row.line,
            avg_delay_min: display_avg(row.avg_delay),
            total_trips: row.total_trips,
            delayed_trips: row.delayed_trips,
        })
        .collect()
}

/// Renders per-line aggregates with an on-time percentage, dropping groups
/// without trips.
pub fn worst_lines(rows: Vec<LineNameGroupRow>) -> Vec<WorstLine> {
    rows.into_iter()
        .filter(|row| row.total_trips > 0)
        .map(|row| WorstLine {
            on_time_pct: round2(on_time_pct(row.delayed_trips, row.total_trips)),
            line: row.line,
            line_name: row.line_name,
            avg_delay_min: display_avg(row.avg_delay),
            total_trips: row.total_trips,
            delayed_trips: row.delayed_trips,
        })
        .collect()
}

pub fn hourly_delays(rows: Vec<HourGroupRow>) -> Vec<HourlyDelay> {
    rows.into_iter()
        .map(|row| HourlyDelay {
            hour: row.hour,
            avg_delay_min: display_avg(row.avg_delay),
            total_trips: row.total_trips,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_delays_null_average_shown_as_zero() {
        let rows = vec![
            LineGroupRow {
                line: "T1".to_string(),
                avg_delay: Some(3.0),
                total_trips: 2,
                delayed_trips: 2,
            },
            LineGroupRow {
                line: "L2".to_string(),
                avg_delay: None,
                total_trips: 1,
                delayed_trips: 0,
            },
        ];

        let out = line_delays(rows);
        assert_eq!(out[0].avg_delay_min, 3.0);
        assert_eq!(out[1].avg_delay_min, 0.0);
        assert_eq!(out[1].total_trips, 1);
    }

    #[test]
    fn test_worst_lines_on_time_pct() {
        let rows = vec![
            LineNameGroupRow {
                line: "T4".to_string(),
                line_name: Some("T4 Eastern Suburbs & Illawarra Line".to_string()),
                avg_delay: Some(2.456),
                total_trips: 10,
                delayed_trips: 3,
            },
            LineNameGroupRow {
                line: "M1".to_string(),
                line_name: None,
                avg_delay: None,
                total_trips: 0,
                delayed_trips: 0,
            },
            LineNameGroupRow {
                line: "T9".to_string(),
                line_name: None,
                avg_delay: Some(1.5),
                total_trips: 3,
                delayed_trips: 1,
            },
        ];

        let out = worst_lines(rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].on_time_pct, 70.0);
        assert_eq!(out[0].avg_delay_min, 2.46);
        assert_eq!(out[1].line, "T9");
        assert_eq!(out[1].on_time_pct, 66.67);
    }

    #[test]
    fn test_hourly_delays() {
        let out = hourly_delays(vec![HourGroupRow {
            hour: 10,
            avg_delay: Some(0.333),
            total_trips: 3,
        }]);
        assert_eq!(
            out,
            vec![HourlyDelay {
                hour: 10,
                avg_delay_min: 0.33,
                total_trips: 3
            }]
        );
    }
}
