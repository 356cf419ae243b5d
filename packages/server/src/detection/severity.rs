use common::AlertSeverity;

/// Map a percent change onto a severity tier.
///
/// Bounds are exclusive: exactly 5% raises nothing, exactly 30% is medium.
/// NaN never raises an alert.
pub fn classify(percent_change: f64) -> Option<AlertSeverity> {
    if percent_change > 30.0 {
        Some(AlertSeverity::High)
    } else if percent_change > 15.0 {
        Some(AlertSeverity::Medium)
    } else if percent_change > 5.0 {
        Some(AlertSeverity::Low)
    } else {
        None
    }
}
