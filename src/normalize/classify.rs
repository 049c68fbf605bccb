//! Mode/variant classification and result vocabulary.
//!
//! `classify_mode_and_variant` is the single classifier shared by the
//! normalizer and the calculated-view builder; both must agree on every
//! input, so neither carries its own copy.

/// Simplified per-game outcome from the acting player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

/// Result codes that mean a draw. Everything else non-"win" is a loss
/// described by its cause (checkmated, resigned, timeout, ...).
const DRAW_RESULT_CODES: [&str; 7] = [
    "agreed",
    "repetition",
    "stalemate",
    "insufficient",
    "50move",
    "timevsinsufficient",
    "draw",
];

/// Cause keyword to display string, most specific first. The order matters
/// for the substring fallback in [`termination_display`].
const CAUSE_DISPLAYS: [(&str, &str); 13] = [
    ("timevsinsufficient", "Draw by timeout vs insufficient material"),
    ("bughousepartnerlose", "Bughouse partner lost"),
    ("kingofthehill", "King of the hill"),
    ("threecheck", "Three check"),
    ("50move", "Draw by 50-move rule"),
    ("insufficient", "Insufficient material"),
    ("repetition", "Draw by repetition"),
    ("stalemate", "Stalemate"),
    ("checkmated", "Checkmated"),
    ("abandoned", "Abandoned"),
    ("resigned", "Resigned"),
    ("agreed", "Draw agreed"),
    ("timeout", "Timeout"),
];

/// Pure (rules, time_class) -> (mode, variant) mapping.
pub fn classify_mode_and_variant(rules: &str, time_class: &str) -> (String, String) {
    let rules = rules.trim().to_lowercase();
    let time_class = time_class.trim().to_lowercase();

    match rules.as_str() {
        "chess" => {
            let mode = match time_class.as_str() {
                "bullet" | "blitz" | "rapid" | "daily" => time_class,
                _ => "unknown".to_string(),
            };
            (mode, "standard".to_string())
        }
        "chess960" => {
            let mode = if time_class == "daily" {
                "daily960".to_string()
            } else {
                "chess960".to_string()
            };
            (mode, "chess960".to_string())
        }
        other => (other.to_string(), other.to_string()),
    }
}

/// Map a per-side result code to Win/Draw/Loss. Empty codes carry no
/// information and map to `None`.
pub fn result_outcome(code: &str) -> Option<Outcome> {
    let code = code.trim().to_ascii_lowercase();
    if code.is_empty() {
        return None;
    }
    if code == "win" {
        return Some(Outcome::Win);
    }
    if DRAW_RESULT_CODES.contains(&code.as_str()) {
        return Some(Outcome::Draw);
    }
    Some(Outcome::Loss)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTermination {
    pub winner: Option<String>,
    pub cause: String,
}

/// Split a termination tag into winner and cause.
///
/// Recognized shapes: `<winner> won by <cause>` and `drawn by <cause>`.
/// Anything else is treated as a cause with no winner.
pub fn parse_termination_tag(tag: &str) -> ParsedTermination {
    let tag = tag.trim();
    let lower = tag.to_ascii_lowercase();

    if let Some(idx) = lower.find(" won by ") {
        return ParsedTermination {
            winner: Some(tag[..idx].trim().to_string()),
            cause: tag[idx + " won by ".len()..].trim().to_string(),
        };
    }

    if let Some(idx) = lower.find("drawn by ") {
        return ParsedTermination {
            winner: None,
            cause: tag[idx + "drawn by ".len()..].trim().to_string(),
        };
    }

    ParsedTermination {
        winner: None,
        cause: tag.to_string(),
    }
}

/// Normalize a cause to its display string: exact vocabulary match on the
/// cause, then substring match against the whole raw tag, then the raw
/// cause with its first letter capitalized.
pub fn termination_display(cause: &str, raw_tag: &str) -> String {
    let cause_key = cause.trim().to_ascii_lowercase();
    if cause_key.is_empty() && raw_tag.trim().is_empty() {
        return String::new();
    }

    for (key, display) in CAUSE_DISPLAYS {
        if cause_key == key {
            return display.to_string();
        }
    }

    let tag_lower = raw_tag.trim().to_ascii_lowercase();
    for (key, display) in CAUSE_DISPLAYS {
        if !tag_lower.is_empty() && tag_lower.contains(key) {
            return display.to_string();
        }
    }

    let raw = if cause.trim().is_empty() {
        raw_tag.trim()
    } else {
        cause.trim()
    };
    capitalize(raw)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
