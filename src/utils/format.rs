/// Groups digits in threes with `_`, e.g. `1_500_612`.
pub fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('_');
        }
        grouped.push(c);
    }
    grouped
}

/// `correct / total (pct %)` with aligned columns.
pub fn ratio_line(correct: usize, total: usize) -> String {
    let pct = 100.0 * correct as f64 / total as f64;
    format!(
        "{:>12} / {:>12} ({:6.2} %)",
        group_thousands(correct),
        group_thousands(total),
        pct
    )
}

pub fn rounded(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}
