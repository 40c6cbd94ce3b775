/// Rounds to two decimal places, the precision every analytics view reports.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Average delay as displayed: rounded, with "no data" shown as 0.
pub fn display_avg(avg: Option<f64>) -> f64 {
    avg.map(round2).unwrap_or(0.0)
}

/// Share of trips that were not delayed, in percent. Returns 0.0 for no trips.
pub fn on_time_pct(delayed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    100.0 * (1.0 - delayed as f64 / total as f64)
}
