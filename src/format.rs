use itertools::Itertools;

/// Human-friendly distance.
///
/// Below 1 km: whole meters. Below 10 km: kilometers plus remaining meters.
/// From 10 km: kilometers with one decimal.
pub fn format_distance(distance_km: f64) -> String {
    let meters = (distance_km * 1000.0) as i64;

    if meters < 1000 {
        return format!("{meters} m");
    }

    if meters < 10_000 {
        let km = meters / 1000;
        let remaining = meters % 1000;
        if remaining == 0 {
            return format!("{km} km");
        }
        return format!("{km} km {remaining} m");
    }

    format!("{distance_km:.1} km")
}

/// Compact distance for live display
pub fn format_distance_from_meters(distance_meters: f64) -> String {
    if distance_meters >= 1000.0 {
        format!("{:.1} km", distance_meters / 1000.0)
    } else {
        format!("{} m", distance_meters as i64)
    }
}

/// Step count with thousands separators
pub fn format_steps(steps: u64) -> String {
    let digits: Vec<char> = steps.to_string().chars().collect();
    digits
        .rchunks(3)
        .rev()
        .map(|group| group.iter().collect::<String>())
        .join(",")
}

/// `HH:MM:SS`; hours keep growing past 99
pub fn format_elapsed_time(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
