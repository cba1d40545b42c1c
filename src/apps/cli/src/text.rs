//! Small text helpers for terminal presentation

/// Mask sensitive text, one star per character.
pub fn masked_text(input: &str) -> String {
    "*".repeat(input.chars().count())
}

/// Suffix and divisor for abbreviated numeric labels, picked from the
/// largest magnitude on the chart.
pub fn abbreviation_scale(max_abs: f64) -> (&'static str, f64) {
    if max_abs >= 1_000_000_000.0 {
        ("B", 1_000_000_000.0)
    } else if max_abs >= 1_000_000.0 {
        ("M", 1_000_000.0)
    } else if max_abs >= 1_000.0 {
        ("K", 1_000.0)
    } else {
        ("", 1.0)
    }
}

/// Format a value against a scale: one decimal for small magnitudes, none
/// once the scaled value reaches three digits.
pub fn format_abbreviated(value: f64, scale: (&'static str, f64)) -> String {
    let (suffix, divisor) = scale;
    let scaled = value / divisor;
    if scaled.abs() >= 100.0 || scaled.fract() == 0.0 {
        format!("{scaled:.0}{suffix}")
    } else {
        format!("{scaled:.1}{suffix}")
    }
}

/// Shorten an axis label, appending an ellipsis when truncated.
pub fn shorten_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        label.to_string()
    } else {
        let mut shortened: String = label.chars().take(max_chars).collect();
        shortened.push('…');
        shortened
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_covers_every_character() {
        assert_eq!(masked_text("secret"), "******");
        assert_eq!(masked_text(""), "");
    }

    #[test]
    fn scales_step_at_thousand_boundaries() {
        assert_eq!(abbreviation_scale(950.0), ("", 1.0));
        assert_eq!(abbreviation_scale(12_000.0), ("K", 1_000.0));
        assert_eq!(abbreviation_scale(3_400_000.0), ("M", 1_000_000.0));
        assert_eq!(abbreviation_scale(2_000_000_000.0), ("B", 1_000_000_000.0));
    }

    #[test]
    fn abbreviation_keeps_one_decimal_for_small_values() {
        assert_eq!(format_abbreviated(1_250.0, ("K", 1_000.0)), "1.2K");
        assert_eq!(format_abbreviated(250_000.0, ("K", 1_000.0)), "250K");
        assert_eq!(format_abbreviated(42.0, ("", 1.0)), "42");
    }

    #[test]
    fn long_labels_are_truncated_with_ellipsis() {
        assert_eq!(shorten_label("short", 8), "short");
        assert_eq!(shorten_label("a rather long label", 8), "a rather…");
    }
}
