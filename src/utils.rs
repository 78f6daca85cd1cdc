use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses the remote's draw date, which carries a weekday suffix such as
/// `2025-07-17(四)`.
pub fn parse_draw_date(raw: &str) -> Option<NaiveDate> {
    let date_part: String = raw.trim().chars().take(10).collect();
    NaiveDate::parse_from_str(&date_part, DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Two-digit balls for pooled types, bare digits for positional ones.
pub fn format_numbers(numbers: &[u8], positional: bool) -> String {
    numbers
        .iter()
        .map(|n| {
            if positional {
                n.to_string()
            } else {
                format!("{:02}", n)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders a raw yuan amount in 亿元 or 万元; non-numeric input is returned as is.
pub fn format_amount(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(yuan) if yuan >= 100_000_000.0 => format!("{:.2}亿元", yuan / 100_000_000.0),
        Ok(yuan) if yuan > 0.0 => format!("{:.2}万元", yuan / 10_000.0),
        Ok(_) => "0元".to_string(),
        Err(_) => raw.to_string(),
    }
}
