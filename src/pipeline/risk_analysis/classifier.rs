//! Reads a free-text assessment into a [`Classification`].
//!
//! Levels are matched as whole words, case-insensitively, in precedence
//! order: a reply that mentions CRITICAL anywhere is critical even if its
//! verdict line says LOW. A reply with no level keyword is MODERATE.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{Classification, Criticality};

static LEVEL_PATTERNS: LazyLock<Vec<(Criticality, Regex)>> = LazyLock::new(|| {
    Criticality::by_precedence()
        .iter()
        .map(|level| {
            let pattern = format!(r"(?i)(?:^|[^[:alnum:]]){}(?:$|[^[:alnum:]])", level.keyword());
            (*level, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

/// Section headers, tolerant of markdown emphasis around the label and colon.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[*_]*(CRITICALITY|ATTENTION\s+POINTS|RECOMMENDATIONS)[*_]*\s*:[*_]*")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Criticality,
    Attention,
    Recommendations,
}

struct Marker {
    section: Section,
    start: usize,
    end: usize,
}

fn find_markers(reply: &str) -> Vec<Marker> {
    MARKER_RE
        .captures_iter(reply)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?.as_str().to_ascii_uppercase();
            let section = if label.starts_with("CRITICALITY") {
                Section::Criticality
            } else if label.starts_with("ATTENTION") {
                Section::Attention
            } else {
                Section::Recommendations
            };
            Some(Marker {
                section,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Body of the first `section` marker, up to the next marker or end of text.
fn section_body(reply: &str, markers: &[Marker], section: Section) -> Option<String> {
    let (idx, marker) = markers
        .iter()
        .enumerate()
        .find(|(_, m)| m.section == section)?;

    let stop = markers
        .get(idx + 1)
        .map(|next| next.start)
        .unwrap_or(reply.len());

    let body = reply[marker.end..stop].trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

/// Highest-precedence level keyword present in the reply.
pub fn detect_criticality(reply: &str) -> Criticality {
    LEVEL_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(reply))
        .map(|(level, _)| *level)
        .unwrap_or(Criticality::Moderate)
}

/// Classify a sanitized backend reply. Never fails.
pub fn classify(reply: &str) -> Classification {
    let criticality = detect_criticality(reply);
    let markers = find_markers(reply);

    Classification {
        criticality,
        score: criticality.score(),
        attention_points: section_body(reply, &markers, Section::Attention),
        recommendations: section_body(reply, &markers, Section::Recommendations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
**CRITICALITY:** HIGH

**ATTENTION POINTS:**
- Hypotension with tachycardia
- Arterial lactate 4.2 mmol/L

**RECOMMENDATIONS:**
- Start fluid resuscitation
- Repeat lactate in 2 hours";

    #[test]
    fn well_formed_reply() {
        let c = classify(WELL_FORMED);
        assert_eq!(c.criticality, Criticality::High);
        assert_eq!(c.score, 70);
        assert_eq!(
            c.attention_points.as_deref(),
            Some("- Hypotension with tachycardia\n- Arterial lactate 4.2 mmol/L")
        );
        assert_eq!(
            c.recommendations.as_deref(),
            Some("- Start fluid resuscitation\n- Repeat lactate in 2 hours")
        );
    }

    #[test]
    fn no_keyword_defaults_to_moderate_50() {
        let c = classify("The patient is stable, continue current management.");
        assert_eq!(c.criticality, Criticality::Moderate);
        assert_eq!(c.score, 50);
        assert_eq!(c.attention_points, None);
        assert_eq!(c.recommendations, None);
    }

    #[test]
    fn precedence_beats_position() {
        // Verdict says LOW but the prose mentions a higher level.
        let reply = "CRITICALITY: LOW\nATTENTION POINTS:\n- Not critical at this time";
        assert_eq!(classify(reply).criticality, Criticality::Critical);
    }

    #[test]
    fn case_insensitive_levels() {
        assert_eq!(detect_criticality("criticality: critical"), Criticality::Critical);
        assert_eq!(detect_criticality("Risk is High."), Criticality::High);
        assert_eq!(detect_criticality("overall low risk"), Criticality::Low);
    }

    #[test]
    fn whole_words_only() {
        // "follow", "highlight", "criticality" must not count as levels.
        let reply = "CRITICALITY: LOW\nRECOMMENDATIONS:\n- Follow up and highlight trends";
        assert_eq!(detect_criticality(reply), Criticality::Low);
        assert_eq!(detect_criticality("Level: __LOW__"), Criticality::Low);
    }

    #[test]
    fn each_level_scores() {
        for (reply, score) in [
            ("CRITICALITY: CRITICAL", 90),
            ("CRITICALITY: HIGH", 70),
            ("CRITICALITY: MODERATE", 50),
            ("CRITICALITY: LOW", 30),
        ] {
            assert_eq!(classify(reply).score, score, "{reply}");
        }
    }

    #[test]
    fn missing_sections_are_none() {
        let c = classify("CRITICALITY: LOW\nRECOMMENDATIONS:\n- Discharge planning");
        assert_eq!(c.attention_points, None);
        assert_eq!(c.recommendations.as_deref(), Some("- Discharge planning"));
    }

    #[test]
    fn blank_section_is_none() {
        let c = classify("ATTENTION POINTS:\n   \nRECOMMENDATIONS:\n- Monitor");
        assert_eq!(c.attention_points, None);
        assert_eq!(c.recommendations.as_deref(), Some("- Monitor"));
    }

    #[test]
    fn sections_out_of_order() {
        let reply = "RECOMMENDATIONS: Monitor urine output\nATTENTION POINTS: Oliguria\nCRITICALITY: MODERATE";
        let c = classify(reply);
        assert_eq!(c.recommendations.as_deref(), Some("Monitor urine output"));
        assert_eq!(c.attention_points.as_deref(), Some("Oliguria"));
        assert_eq!(c.criticality, Criticality::Moderate);
    }

    #[test]
    fn tolerant_marker_formatting() {
        let reply = "## Attention Points**:** fever\n__Recommendations__: cultures";
        let c = classify(reply);
        assert_eq!(c.attention_points.as_deref(), Some("fever"));
        assert_eq!(c.recommendations.as_deref(), Some("cultures"));
    }

    #[test]
    fn criticality_marker_ends_section() {
        let reply = "ATTENTION POINTS:\n- Sepsis screen positive\nCRITICALITY: HIGH";
        let c = classify(reply);
        assert_eq!(c.attention_points.as_deref(), Some("- Sepsis screen positive"));
    }

    #[test]
    fn empty_reply_is_moderate() {
        let c = classify("");
        assert_eq!(c.criticality, Criticality::Moderate);
        assert_eq!(c.attention_points, None);
    }
}
