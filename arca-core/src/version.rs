//! Version-label arithmetic
//!
//! The remote service does not auto-increment version labels on new drafts;
//! the engine computes the next label from the prior one.

use std::cmp::Ordering;

/// Computes the next version label from the prior label.
///
/// - Three-part numeric labels increment the last part: "0.0.1" -> "0.0.2"
/// - "vN" labels increment N: "v3" -> "v4"
/// - Anything else gets a literal suffix: "alpha" -> "alpha-new"
pub fn next_version_label(prior: &str) -> String {
    if let Some(next) = bump_dotted(prior) {
        return next;
    }
    if let Some(next) = bump_v_prefixed(prior) {
        return next;
    }
    format!("{}-new", prior)
}

/// Orders two version labels numerically where possible.
///
/// Parseable labels (three-part numeric or "vN") compare by their numeric
/// components, so "0.0.10" outranks "0.0.9"; a parseable label outranks an
/// unparseable one; two unparseable labels fall back to string order.
pub fn compare_version_labels(a: &str, b: &str) -> Ordering {
    match (numeric_key(a), numeric_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

fn numeric_key(label: &str) -> Option<Vec<u64>> {
    if let Some((x, y, z)) = dotted_parts(label) {
        return Some(vec![x, y, z]);
    }
    let n: u64 = label.strip_prefix('v')?.parse().ok()?;
    Some(vec![n])
}

fn dotted_parts(label: &str) -> Option<(u64, u64, u64)> {
    let parts: Vec<&str> = label.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let x: u64 = parts[0].parse().ok()?;
    let y: u64 = parts[1].parse().ok()?;
    let z: u64 = parts[2].parse().ok()?;
    Some((x, y, z))
}

fn bump_dotted(label: &str) -> Option<String> {
    let (x, y, z) = dotted_parts(label)?;
    Some(format!("{}.{}.{}", x, y, z + 1))
}

fn bump_v_prefixed(label: &str) -> Option<String> {
    let digits = label.strip_prefix('v')?;
    let n: u64 = digits.parse().ok()?;
    Some(format!("v{}", n + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_part_numeric() {
        assert_eq!(next_version_label("0.0.1"), "0.0.2");
        assert_eq!(next_version_label("1.2.9"), "1.2.10");
    }

    #[test]
    fn test_v_prefixed() {
        assert_eq!(next_version_label("v3"), "v4");
        assert_eq!(next_version_label("v10"), "v11");
    }

    #[test]
    fn test_unparseable_fallback() {
        assert_eq!(next_version_label("alpha"), "alpha-new");
        assert_eq!(next_version_label("1.2"), "1.2-new");
        assert_eq!(next_version_label("1.2.x"), "1.2.x-new");
        assert_eq!(next_version_label("v3beta"), "v3beta-new");
    }

    #[test]
    fn test_compare_is_numeric_not_lexicographic() {
        assert_eq!(compare_version_labels("0.0.9", "0.0.10"), Ordering::Less);
        assert_eq!(compare_version_labels("0.0.10", "0.0.9"), Ordering::Greater);
        assert_eq!(compare_version_labels("v9", "v10"), Ordering::Less);
        assert_eq!(compare_version_labels("0.0.2", "0.0.2"), Ordering::Equal);
        // Parseable labels outrank unparseable ones; unparseable fall back
        // to string order
        assert_eq!(compare_version_labels("0.0.1", "alpha"), Ordering::Greater);
        assert_eq!(compare_version_labels("alpha", "beta"), Ordering::Less);
    }
}
