use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

/// Sanitize a filename stem for cross-platform use: strip characters that
/// are invalid on Windows, macOS or Linux, dodge reserved Windows names,
/// and cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let invalid = Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("invalid-char regex");
    let cleaned = invalid.replace_all(name, "_");
    let cleaned = cleaned.trim_matches(|c| c == ' ' || c == '.');

    let reserved = Regex::new(r"(?i)^(CON|PRN|AUX|NUL|COM[1-9]|LPT[1-9])$").expect("reserved regex");
    if reserved.is_match(cleaned) {
        return format!("_{cleaned}");
    }

    let capped: String = cleaned.chars().take(120).collect();
    if capped.is_empty() {
        "document".to_string()
    } else {
        capped
    }
}

/// Build the export artifact name: `notes_{stem}_{timestamp}.docx`, where
/// the timestamp is the ISO-8601 instant with `:` and `.` replaced by `-`
/// and truncated to 19 characters (`2024-03-05T12-30-45`).
pub fn export_filename(original_filename: &str, now: DateTime<Utc>) -> String {
    let stem = match original_filename.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => original_filename,
    };
    let stem = sanitize_filename(stem);

    let timestamp: String = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
        .chars()
        .take(19)
        .collect();

    format!("notes_{stem}_{timestamp}.docx")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sanitize_replaces_invalid_characters() {
        assert_eq!(sanitize_filename("scan: final/v2"), "scan_ final_v2");
        assert_eq!(sanitize_filename("a<b>c|d"), "a_b_c_d");
        assert_eq!(sanitize_filename("report\x00dump"), "report_dump");
    }

    #[test]
    fn sanitize_handles_reserved_and_empty_names() {
        assert_eq!(sanitize_filename("CON"), "_CON");
        assert_eq!(sanitize_filename("lpt3"), "_lpt3");
        assert_eq!(sanitize_filename("  ...  "), "document");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_filename(&long).chars().count(), 120);
    }

    #[test]
    fn export_name_strips_extension_and_truncates_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 45).unwrap();
        assert_eq!(
            export_filename("medical report.pdf", now),
            "notes_medical report_2024-03-05T12-30-45.docx"
        );
    }

    #[test]
    fn export_name_timestamp_has_no_colons_or_dots() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let name = export_filename("x.pdf", now);
        let timestamp = name
            .trim_start_matches("notes_x_")
            .trim_end_matches(".docx");
        assert_eq!(timestamp.len(), 19);
        assert!(!timestamp.contains(':'));
        assert!(!timestamp.contains('.'));
    }
}
