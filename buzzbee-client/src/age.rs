use crate::api::Time;

/// How long ago `date` was, as shown under posts and comments.
///
/// Dates in the future (clock skew) read as "Just Now". Anything a week old
/// or more is shown as a plain date.
pub fn relative_age(now: Time, date: Time) -> String {
    let secs = (now - date).num_seconds();
    let mins = secs / 60;
    let hours = mins / 60;
    let days = hours / 24;
    if secs < 60 {
        String::from("Just Now")
    } else if mins < 60 {
        format!("{mins} {} ago", plural(mins, "min"))
    } else if hours < 24 {
        format!("{hours} {} ago", plural(hours, "hour"))
    } else if days < 7 {
        format!("{days} {} ago", plural(days, "day"))
    } else {
        date.format("%d %b %Y").to_string()
    }
}

fn plural(n: i64, unit: &str) -> String {
    match n {
        1 => String::from(unit),
        _ => format!("{unit}s"),
    }
}
