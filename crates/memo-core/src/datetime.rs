use anyhow::{Context, anyhow};
use chrono::{
    DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

/// Render a due date for tables and info dumps, in the user's local time.
#[must_use]
pub fn format_due(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Parse a due-date expression the way the add/edit form accepts them.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(input: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let token = input.trim();

    match token.to_ascii_lowercase().as_str() {
        "now" => return Ok(now),
        "today" => return local_midnight(now.with_timezone(&Local).date_naive(), "today"),
        "tomorrow" => return Ok(parse_date_expr("today", now)? + Duration::days(1)),
        "yesterday" => return Ok(parse_date_expr("today", now)? - Duration::days(1)),
        _ => {}
    }

    if let Some(due) = parse_relative_offset(token, now) {
        return Ok(due);
    }

    if let Some(time) = parse_wall_clock(token) {
        return next_occurrence(time, now);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return local_midnight(date, "date");
    }

    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return to_utc_from_local(ndt, fmt);
        }
    }

    Err(anyhow!("unrecognized due date expression: {input}")).context(
        "supported: now/today/tomorrow/yesterday, clock times (17:30, 5:30pm), \
         +Nd/+Nh/+Nm offsets, RFC3339, YYYY-MM-DD, YYYY-MM-DDTHH:MM, YYYY-MM-DD HH:MM",
    )
}

/// `+2d`, `-3h`, `+45m`: a signed offset from now.
fn parse_relative_offset(token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let body = token
        .strip_prefix('+')
        .or_else(|| token.strip_prefix('-'))?;
    if body.len() < 2 {
        return None;
    }

    let (digits, unit) = body.split_at(body.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: i64 = digits.parse().ok()?;

    let duration = match unit {
        "d" => Duration::days(amount),
        "h" => Duration::hours(amount),
        "m" => Duration::minutes(amount),
        _ => return None,
    };

    Some(if token.starts_with('-') {
        now - duration
    } else {
        now + duration
    })
}

/// `17:30` or `5:30pm`.
fn parse_wall_clock(token: &str) -> Option<NaiveTime> {
    ["%H:%M", "%I:%M%p", "%I:%M %p"]
        .into_iter()
        .find_map(|fmt| NaiveTime::parse_from_str(token, fmt).ok())
}

/// The next time the local clock reads `time`, strictly after now.
fn next_occurrence(time: NaiveTime, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let local_now = now.with_timezone(&Local);
    let mut candidate = local_now.date_naive().and_time(time);
    if candidate <= local_now.naive_local() {
        candidate = candidate + Duration::days(1);
    }
    to_utc_from_local(candidate, "clock time")
}

fn local_midnight(date: NaiveDate, context: &str) -> anyhow::Result<DateTime<Utc>> {
    to_utc_from_local(date.and_time(NaiveTime::MIN), context)
}

fn to_utc_from_local(local_naive: NaiveDateTime, context: &str) -> anyhow::Result<DateTime<Utc>> {
    // a DST-skipped instant has no local representation; an ambiguous one
    // resolves to the earlier offset
    Local
        .from_local_datetime(&local_naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("local datetime does not exist in this timezone: {context}"))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, TimeZone, Utc};

    use super::parse_date_expr;

    fn fixed_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    #[test]
    fn parses_now_and_relative_offsets() {
        let now = fixed_now();
        assert_eq!(parse_date_expr("now", now).expect("parse now"), now);
        assert_eq!(
            parse_date_expr("+2d", now).expect("parse +2d"),
            now + Duration::days(2)
        );
        assert_eq!(
            parse_date_expr("-3h", now).expect("parse -3h"),
            now - Duration::hours(3)
        );
        assert_eq!(
            parse_date_expr("+45m", now).expect("parse +45m"),
            now + Duration::minutes(45)
        );
    }

    #[test]
    fn parses_rfc3339_losslessly() {
        let now = fixed_now();
        let parsed = parse_date_expr("2026-03-01T09:30:00Z", now).expect("parse rfc3339");
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
                .single()
                .expect("valid instant")
        );
    }

    #[test]
    fn tomorrow_is_one_day_after_today() {
        let now = fixed_now();
        let today = parse_date_expr("today", now).expect("parse today");
        let tomorrow = parse_date_expr("tomorrow", now).expect("parse tomorrow");
        assert_eq!(tomorrow - today, Duration::days(1));
    }

    #[test]
    fn clock_time_lands_in_the_future() {
        let now = Utc::now();
        let parsed = parse_date_expr("17:30", now).expect("parse clock time");
        assert!(parsed > now);
        assert_eq!(
            parsed.with_timezone(&Local).format("%H:%M").to_string(),
            "17:30"
        );
    }

    #[test]
    fn am_pm_and_24h_clocks_agree() {
        let now = Utc::now();
        let afternoon = parse_date_expr("5:30pm", now).expect("parse 5:30pm");
        let military = parse_date_expr("17:30", now).expect("parse 17:30");
        assert_eq!(afternoon, military);
    }

    #[test]
    fn rejects_unknown_expressions() {
        let now = fixed_now();
        assert!(parse_date_expr("soonish", now).is_err());
        assert!(parse_date_expr("+d", now).is_err());
        assert!(parse_date_expr("+2w", now).is_err());
    }
}
