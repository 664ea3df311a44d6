/// What a missing cell looks like after it has been forced through a
/// float column upstream.
const NOT_A_NUMBER: &str = "nan";

/// Artifact left on integer-looking values that were stored as floats.
const FLOAT_SUFFIX: &str = ".0";

/// Canonicalize a raw cell into a lookup key.
///
/// Trims surrounding whitespace, maps the literal `nan` to the empty string,
/// and drops a trailing `.0` (so `"8.0"` becomes `"8"`). The suffix strip is
/// textual: `"12/3.0"` also loses its `.0`. Nothing else is touched, so two
/// spellings of a street only group together if they are byte-identical.
pub fn normalize(raw: &str) -> String {
    let s = raw.trim();
    if s == NOT_A_NUMBER {
        return String::new();
    }
    match s.strip_suffix(FLOAT_SUFFIX) {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => s.to_string(),
    }
}

/// [`normalize`] for a cell that may not exist in a short row.
pub fn normalize_cell(raw: Option<&str>) -> String {
    raw.map(normalize).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_float_artifact() {
        assert_eq!(normalize("8.0"), "8");
        assert_eq!(normalize("  8.0 "), "8");
        assert_eq!(normalize("10.0"), "10");
        // only the final ".0"
        assert_eq!(normalize("1.0.0"), "1.0");
    }

    #[test]
    fn suffix_strip_is_textual() {
        assert_eq!(normalize("12/3.0"), "12/3");
        assert_eq!(normalize("א.0"), "א");
    }

    #[test]
    fn lone_suffix_is_kept() {
        assert_eq!(normalize(".0"), ".0");
        assert_eq!(normalize(" .0 "), ".0");
    }

    #[test]
    fn other_values_only_trimmed() {
        assert_eq!(normalize(" תל אביב "), "תל אביב");
        assert_eq!(normalize("8.5"), "8.5");
        assert_eq!(normalize("8.00"), "8.00");
        assert_eq!(normalize("007"), "007");
        assert_eq!(normalize("Herzl St"), "Herzl St");
        assert_eq!(normalize("\t\n"), "");
    }

    #[test]
    fn not_a_number_is_empty() {
        assert_eq!(normalize("nan"), "");
        assert_eq!(normalize(" nan "), "");
        // case-sensitive, like the upstream coercion
        assert_eq!(normalize("NaN"), "NaN");
        assert_eq!(normalize("banana"), "banana");
    }

    #[test]
    fn missing_cell_is_empty() {
        assert_eq!(normalize_cell(None), "");
        assert_eq!(normalize_cell(Some("3.0")), "3");
    }
}
