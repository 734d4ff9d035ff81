use std::time::Duration;

/// Unit suffix of an interval expression such as `"250ms"` or `"5s"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Match a lowercase suffix: `ms`, `s`, `m`, `h` or `d`.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "ms" => TimeUnit::Milliseconds,
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            _ => return None,
        })
    }

    pub const fn millis_per_unit(self) -> u64 {
        match self {
            TimeUnit::Milliseconds => 1,
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
            TimeUnit::Days => 86_400_000,
        }
    }

    pub fn duration_of(self, count: u64) -> Duration {
        Duration::from_millis(count.saturating_mul(self.millis_per_unit()))
    }

    /// Split `"<digits><suffix>"` into its count and unit.
    ///
    /// Suffixes are case-sensitive and must follow the digits directly.
    pub fn split_shorthand(expr: &str) -> Option<(u64, TimeUnit)> {
        let expr = expr.trim();
        let boundary = expr.find(|c: char| !c.is_ascii_digit())?;
        if boundary == 0 {
            return None;
        }
        let (digits, suffix) = expr.split_at(boundary);
        Some((digits.parse().ok()?, TimeUnit::from_suffix(suffix)?))
    }
}

/// Parse an interval expression into a `Duration`.
///
/// Accepts shorthand (`"250ms"`, `"5s"`) or a bare integer, which is read as
/// milliseconds.
pub fn parse_interval(expr: &str) -> Option<Duration> {
    match TimeUnit::split_shorthand(expr) {
        Some((count, unit)) => Some(unit.duration_of(count)),
        None => expr.trim().parse::<u64>().ok().map(Duration::from_millis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_shorthand_suffixes() {
        assert_eq!(TimeUnit::split_shorthand("500ms"), Some((500, TimeUnit::Milliseconds)));
        assert_eq!(TimeUnit::split_shorthand("5s"), Some((5, TimeUnit::Seconds)));
        assert_eq!(TimeUnit::split_shorthand(" 10m "), Some((10, TimeUnit::Minutes)));
        assert_eq!(TimeUnit::split_shorthand("2h"), Some((2, TimeUnit::Hours)));
        assert_eq!(TimeUnit::split_shorthand("1d"), Some((1, TimeUnit::Days)));
    }

    #[test]
    fn rejects_malformed_shorthand() {
        assert_eq!(TimeUnit::split_shorthand("5S"), None);
        assert_eq!(TimeUnit::split_shorthand("5 s"), None);
        assert_eq!(TimeUnit::split_shorthand("ms"), None);
        assert_eq!(TimeUnit::split_shorthand("250"), None);
        assert_eq!(TimeUnit::split_shorthand(""), None);
    }

    #[test]
    fn bare_numbers_are_milliseconds() {
        assert_eq!(parse_interval("250"), Some(Duration::from_millis(250)));
        assert_eq!(parse_interval("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_interval("soon"), None);
    }

    #[test]
    fn huge_counts_saturate() {
        assert_eq!(TimeUnit::Days.duration_of(u64::MAX), Duration::from_millis(u64::MAX));
    }
}
