//! Annotation blob parser.
//!
//! A game record blob has an optional header section of `[Key "Value"]`
//! lines followed by a move-text section; the header ends at the first blank
//! line or at the first line that is not a tag. Tags are only read from the
//! header, so tag-shaped text inside move comments never leaks in.
//!
//! Move text carries two shapes worth recognizing:
//!   paired:      `12. Nf3 {[%clk 0:02:58.1]} 12... Nc6 {[%clk 0:02:55]}`
//!   black-only:  `12... Nc6 {[%clk 0:02:55]}`
//! Black-only entries fill a slot only when the paired pass left it empty.
//! Parsing never fails: a blob that matches nothing yields empty output.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

lazy_static! {
    static ref TAG_RE: Regex =
        Regex::new(r#"^\[([A-Za-z0-9_\-]+)\s+"(.*)"\]\s*$"#).unwrap();
    static ref PAIR_RE: Regex = Regex::new(
        r#"(\d+)\.\s*([A-Za-z][\w+#=\-]*[!?]*)\s*((?:\{[^}]*\}\s*)*)(?:(?:\d+\.\.\.\s*)?([A-Za-z][\w+#=\-]*[!?]*)\s*((?:\{[^}]*\}\s*)*))?"#
    )
    .unwrap();
    static ref BLACK_ONLY_RE: Regex = Regex::new(
        r#"(\d+)\.\.\.\s*([A-Za-z][\w+#=\-]*[!?]*)\s*((?:\{[^}]*\}\s*)*)"#
    )
    .unwrap();
    static ref CLOCK_RE: Regex = Regex::new(r"\[%clk\s*([^\]}]+)\]").unwrap();
    static ref NAG_RE: Regex = Regex::new(r"\$\d+").unwrap();
    static ref VARIATION_RE: Regex = Regex::new(r"\([^()]*\)").unwrap();
    static ref RESULT_RE: Regex = Regex::new(r"(?:1-0|0-1|1/2-1/2|\*)\s*$").unwrap();
}

/// Known tag-key spelling variants, unified to one canonical key.
fn canonical_tag_name(name: &str) -> &str {
    match name {
        "ECOURL" => "ECOUrl",
        "UTCDATE" => "UTCDate",
        "UTCTIME" => "UTCTime",
        "ENDDATE" => "EndDate",
        "ENDTIME" => "EndTime",
        "TIMEZONE" => "Timezone",
        other => other,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedPgn {
    pub tags: HashMap<String, String>,
    /// SAN tokens, white-then-black per move number.
    pub moves_san: Vec<String>,
    /// Clock strings parallel to `moves_san`; empty where no clock was given.
    pub moves_clock: Vec<String>,
    /// Highest move number observed.
    pub move_pairs: usize,
}

#[derive(Debug, Default)]
struct MoveSlot {
    white: Option<(String, String)>,
    black: Option<(String, String)>,
}

/// Parse an annotation blob. Never fails; unparseable input yields the
/// default (empty) output.
pub fn parse(blob: &str) -> ParsedPgn {
    let mut parsed = ParsedPgn::default();
    if blob.trim().is_empty() {
        return parsed;
    }

    let mut move_lines: Vec<&str> = Vec::new();
    let mut in_header = true;

    for line in blob.lines() {
        if in_header {
            if line.trim().is_empty() {
                in_header = false;
                continue;
            }
            if let Some(caps) = TAG_RE.captures(line.trim()) {
                let name = canonical_tag_name(&caps[1]).to_string();
                parsed.tags.insert(name, caps[2].to_string());
                continue;
            }
            // Not a tag and not blank: move text starts here.
            in_header = false;
        }
        move_lines.push(line);
    }

    let move_text = move_lines.join(" ");
    let cleaned = clean_move_text(&move_text);
    if cleaned.trim().is_empty() {
        return parsed;
    }

    let mut slots: BTreeMap<u32, MoveSlot> = BTreeMap::new();

    for caps in PAIR_RE.captures_iter(&cleaned) {
        let Ok(number) = caps[1].parse::<u32>() else {
            continue;
        };
        let slot = slots.entry(number).or_default();
        if slot.white.is_none() {
            let san = caps[2].to_string();
            let clock = extract_clock(caps.get(3).map_or("", |m| m.as_str()));
            slot.white = Some((san, clock));
        }
        if slot.black.is_none() {
            if let Some(san) = caps.get(4) {
                let clock = extract_clock(caps.get(5).map_or("", |m| m.as_str()));
                slot.black = Some((san.as_str().to_string(), clock));
            }
        }
    }

    for caps in BLACK_ONLY_RE.captures_iter(&cleaned) {
        let Ok(number) = caps[1].parse::<u32>() else {
            continue;
        };
        let slot = slots.entry(number).or_default();
        if slot.black.is_none() {
            let san = caps[2].to_string();
            let clock = extract_clock(caps.get(3).map_or("", |m| m.as_str()));
            slot.black = Some((san, clock));
        }
    }

    let Some(max_number) = slots.keys().next_back().copied() else {
        return parsed;
    };

    for number in 1..=max_number {
        let Some(slot) = slots.get(&number) else {
            continue;
        };
        if let Some((san, clock)) = &slot.white {
            parsed.moves_san.push(san.clone());
            parsed.moves_clock.push(clock.clone());
        }
        if let Some((san, clock)) = &slot.black {
            parsed.moves_san.push(san.clone());
            parsed.moves_clock.push(clock.clone());
        }
    }
    parsed.move_pairs = max_number as usize;

    parsed
}

/// Strip the trailing result token, parenthesized variations (innermost-out,
/// so nesting unwinds) and numeric annotation glyphs.
fn clean_move_text(text: &str) -> String {
    let mut cleaned = RESULT_RE.replace(text.trim(), "").into_owned();

    loop {
        let next = VARIATION_RE.replace_all(&cleaned, " ").into_owned();
        if next == cleaned {
            break;
        }
        cleaned = next;
    }

    NAG_RE.replace_all(&cleaned, " ").into_owned()
}

fn extract_clock(comments: &str) -> String {
    CLOCK_RE
        .captures(comments)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PGN: &str = concat!(
        "[Event \"Live Chess\"]\n",
        "[Site \"Chess.com\"]\n",
        "[White \"alice\"]\n",
        "[Black \"bob\"]\n",
        "[Result \"1-0\"]\n",
        "[ECOURL \"https://www.chess.com/openings/Kings-Pawn-Opening\"]\n",
        "[UTCDate \"2024.01.15\"]\n",
        "[UTCTime \"18:02:11\"]\n",
        "\n",
        "1. e4 {[%clk 0:02:59.1]} 1... e5 {[%clk 0:02:58]} 2. Nf3 {[%clk 0:02:57.3]} 1-0\n",
    );

    #[test]
    fn test_header_tags_and_alias() {
        let parsed = parse(FULL_PGN);
        assert_eq!(parsed.tags.get("Event").unwrap(), "Live Chess");
        assert_eq!(parsed.tags.get("White").unwrap(), "alice");
        // ECOURL is unified to the canonical spelling.
        assert_eq!(
            parsed.tags.get("ECOUrl").unwrap(),
            "https://www.chess.com/openings/Kings-Pawn-Opening"
        );
        assert!(!parsed.tags.contains_key("ECOURL"));
    }

    #[test]
    fn test_moves_with_clocks() {
        let parsed = parse(FULL_PGN);
        assert_eq!(parsed.moves_san, vec!["e4", "e5", "Nf3"]);
        assert_eq!(
            parsed.moves_clock,
            vec!["0:02:59.1", "0:02:58", "0:02:57.3"]
        );
        assert_eq!(parsed.move_pairs, 2);
    }

    #[test]
    fn test_plain_moves_without_clocks() {
        let parsed = parse("1. e4 e5 2. Nf3");
        assert_eq!(parsed.moves_san, vec!["e4", "e5", "Nf3"]);
        assert_eq!(parsed.moves_clock, vec!["", "", ""]);
        assert_eq!(parsed.move_pairs, 2);
    }

    #[test]
    fn test_bracketed_text_in_move_section_is_not_a_tag() {
        let blob = "[Event \"Live Chess\"]\n\n1. e4 {[%clk 0:09:58]} [Round \"9\"] 1... e5";
        let parsed = parse(blob);
        assert_eq!(parsed.tags.get("Event").unwrap(), "Live Chess");
        assert!(!parsed.tags.contains_key("Round"));
        assert_eq!(parsed.moves_san, vec!["e4", "e5"]);
    }

    #[test]
    fn test_black_only_fills_empty_slot_only() {
        // The paired pass claims 1...e5; the later stray 1...d5 must not win.
        let parsed = parse("1. e4 1... e5 1... d5");
        assert_eq!(parsed.moves_san, vec!["e4", "e5"]);

        // A true black-only entry (no paired match for that number) lands.
        let parsed = parse("5... c5 {[%clk 0:01:00]}");
        assert_eq!(parsed.moves_san, vec!["c5"]);
        assert_eq!(parsed.moves_clock, vec!["0:01:00"]);
        assert_eq!(parsed.move_pairs, 5);
    }

    #[test]
    fn test_variations_nags_and_result_stripped() {
        let parsed = parse("1. e4 $1 (1. d4 d5 (1... Nf6)) 1... e5 2. Nf3 0-1");
        assert_eq!(parsed.moves_san, vec!["e4", "e5", "Nf3"]);
        assert_eq!(parsed.move_pairs, 2);
    }

    #[test]
    fn test_castling_promotion_and_checks() {
        let parsed = parse("1. O-O-O e8=Q+ 2. Qxe8#");
        assert_eq!(parsed.moves_san, vec!["O-O-O", "e8=Q+", "Qxe8#"]);
    }

    #[test]
    fn test_garbage_yields_empty_output() {
        let parsed = parse("   \n\t ");
        assert!(parsed.tags.is_empty());
        assert!(parsed.moves_san.is_empty());
        assert_eq!(parsed.move_pairs, 0);

        let parsed = parse("no moves here, just prose.");
        assert!(parsed.moves_san.is_empty());
    }

    #[test]
    fn test_header_without_blank_line_separator() {
        let parsed = parse("[Event \"Live Chess\"]\n1. d4 d5");
        assert_eq!(parsed.tags.get("Event").unwrap(), "Live Chess");
        assert_eq!(parsed.moves_san, vec!["d4", "d5"]);
    }
}
