//! Heading-delimited section location and splicing.
//!
//! A section starts at a heading line whose text is exactly the section name
//! and runs until the next heading of equal or shallower depth (or the end of
//! the document). Boundaries are recomputed by scanning on every call, so they
//! stay valid across unrelated edits elsewhere in the document.
//!
//! Documents are split on `\n` and rejoined with `\n`, which leaves `\r\n`
//! line endings (and everything else outside the section) byte-for-byte intact.

use regex::Regex;
use std::sync::OnceLock;

/// Body text of the placeholder returned when a section does not exist.
pub const MISSING_SECTION_NOTICE: &str = "Section not found.";

/// Location of a section inside a document, in line indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionBounds {
    /// Index of the heading line.
    pub start: usize,
    /// Exclusive end line index.
    pub end: usize,
    /// Number of leading `#` on the heading line.
    pub depth: usize,
}

impl SectionBounds {
    /// Number of lines covered by the section, heading included.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Depth of a heading line (1-6), or `None` for any other line.
///
/// # Examples
///
/// ```
/// use mdpanes::section::heading_depth;
///
/// assert_eq!(heading_depth("## Usage"), Some(2));
/// assert_eq!(heading_depth("####### too deep"), None);
/// assert_eq!(heading_depth("#tag"), None);
/// ```
pub fn heading_depth(line: &str) -> Option<usize> {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    let re = HEADING.get_or_init(|| Regex::new(r"^(#{1,6})(?:\s|$)").expect("valid heading regex"));
    re.captures(line).map(|caps| caps[1].len())
}

fn section_heading_pattern(name: &str) -> Regex {
    // The escaped name cannot produce an invalid pattern.
    Regex::new(&format!(r"^(#{{1,6}})\s+{}\s*$", regex::escape(name)))
        .expect("escaped section pattern is valid")
}

/// Locate the first section called `name` in a list of lines.
pub fn find_section_in_lines(lines: &[&str], name: &str) -> Option<SectionBounds> {
    let pattern = section_heading_pattern(name);

    let (start, depth) = lines.iter().enumerate().find_map(|(idx, line)| {
        pattern
            .captures(line)
            .map(|caps| (idx, caps.get(1).map_or(1, |m| m.len())))
    })?;

    let end = lines[start + 1..]
        .iter()
        .position(|line| heading_depth(line).is_some_and(|d| d <= depth))
        .map_or(lines.len(), |offset| start + 1 + offset);

    Some(SectionBounds { start, end, depth })
}

/// Locate the first section called `name` in `document`.
pub fn find_section(document: &str, name: &str) -> Option<SectionBounds> {
    let lines: Vec<&str> = document.split('\n').collect();
    find_section_in_lines(&lines, name)
}

/// Placeholder shown in place of a section that does not exist.
pub fn missing_section(name: &str) -> String {
    format!("# {}\n\n{}", name, MISSING_SECTION_NOTICE)
}

/// Extract the section called `name`, heading line included.
///
/// A missing section is not an error: a level-1 placeholder heading with a
/// "Section not found." body is returned instead so it can still be rendered.
///
/// # Examples
///
/// ```
/// use mdpanes::section::extract_section;
///
/// let doc = "# Root\n## A\nbody1\n## B\nbody2";
/// assert_eq!(extract_section(doc, "A"), "## A\nbody1");
/// ```
pub fn extract_section(document: &str, name: &str) -> String {
    let lines: Vec<&str> = document.split('\n').collect();
    match find_section_in_lines(&lines, name) {
        Some(bounds) => lines[bounds.start..bounds.end].join("\n"),
        None => missing_section(name),
    }
}

/// Replace the section called `name` with `new_text`.
///
/// Lines outside the section are preserved verbatim. When the section does not
/// exist, `new_text` is appended after a blank line.
///
/// # Examples
///
/// ```
/// use mdpanes::section::replace_section;
///
/// let doc = "# Root\n## A\nbody1\n## B\nbody2";
/// assert_eq!(
///     replace_section(doc, "A", "## A\nbody1-edited"),
///     "# Root\n## A\nbody1-edited\n## B\nbody2"
/// );
/// ```
pub fn replace_section(document: &str, name: &str, new_text: &str) -> String {
    let lines: Vec<&str> = document.split('\n').collect();

    let Some(bounds) = find_section_in_lines(&lines, name) else {
        return append_section(document, new_text);
    };

    let mut result: Vec<&str> = Vec::with_capacity(lines.len());
    result.extend_from_slice(&lines[..bounds.start]);
    result.extend(new_text.split('\n'));
    result.extend_from_slice(&lines[bounds.end..]);
    result.join("\n")
}

fn append_section(document: &str, new_text: &str) -> String {
    if document.is_empty() {
        new_text.to_string()
    } else if document.ends_with("\n\n") {
        format!("{}{}", document, new_text)
    } else if document.ends_with('\n') {
        format!("{}\n{}", document, new_text)
    } else {
        format!("{}\n\n{}", document, new_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_DOC: &str = "# Root\n## A\nbody1\n## B\nbody2";

    #[test]
    fn test_extract_simple_section() {
        assert_eq!(extract_section(ROOT_DOC, "A"), "## A\nbody1");
        assert_eq!(extract_section(ROOT_DOC, "B"), "## B\nbody2");
    }

    #[test]
    fn test_extract_includes_deeper_subsections() {
        let md = "# Top\n## Install\nstep\n### Linux\napt\n#### Notes\nx\n## Usage\nrun";
        assert_eq!(
            extract_section(md, "Install"),
            "## Install\nstep\n### Linux\napt\n#### Notes\nx"
        );
    }

    #[test]
    fn test_extract_stops_at_shallower_heading() {
        let md = "## Inner\ntext\n# Outer\nmore";
        assert_eq!(extract_section(md, "Inner"), "## Inner\ntext");
    }

    #[test]
    fn test_extract_whole_document_for_top_heading() {
        assert_eq!(extract_section(ROOT_DOC, "Root"), ROOT_DOC);
    }

    #[test]
    fn test_extract_missing_section_placeholder() {
        let content = extract_section(ROOT_DOC, "Nope");
        assert!(content.starts_with("# Nope\n"));
        assert!(content.contains("Section not found"));
        assert_eq!(content.lines().filter(|l| l.starts_with('#')).count(), 1);
    }

    #[test]
    fn test_name_match_is_exact_and_case_sensitive() {
        let md = "## Apple pie\nx\n## apple\ny\n## Apple\nz";
        assert_eq!(extract_section(md, "Apple"), "## Apple\nz");
        assert_eq!(extract_section(md, "apple"), "## apple\ny");
    }

    #[test]
    fn test_name_with_regex_characters_matches_literally() {
        let md = "## a.b\nwrong\n## a+b (c)?\nright\n## axb\nalso wrong";
        assert_eq!(extract_section(md, "a+b (c)?"), "## a+b (c)?\nright");
        assert!(extract_section(md, "a.c").contains("Section not found"));
    }

    #[test]
    fn test_trailing_whitespace_on_heading_allowed() {
        let md = "## Spaced   \nbody\n## Next";
        assert_eq!(extract_section(md, "Spaced"), "## Spaced   \nbody");
    }

    #[test]
    fn test_first_match_wins() {
        let md = "## Dup\nfirst\n## Dup\nsecond";
        assert_eq!(find_section(md, "Dup").map(|b| b.start), Some(0));
        assert_eq!(extract_section(md, "Dup"), "## Dup\nfirst");
    }

    #[test]
    fn test_replace_scenario() {
        let replaced = replace_section(ROOT_DOC, "A", "## A\nbody1-edited");
        assert_eq!(replaced, "# Root\n## A\nbody1-edited\n## B\nbody2");
    }

    #[test]
    fn test_replace_round_trip() {
        let md = "# T\n## Keep\nk\n## Target\nold\n### Child\nc\n## After\na";
        let new_text = "## Target\nnew body\nsecond line";
        let replaced = replace_section(md, "Target", new_text);
        assert_eq!(extract_section(&replaced, "Target"), new_text);
    }

    #[test]
    fn test_replace_preserves_crlf_outside_section() {
        let md = "# Root\r\nintro\r\n## A\r\nbody\r\n## B\r\ntail\r\n";
        let replaced = replace_section(md, "A", "## A\r\nnew");
        assert_eq!(replaced, "# Root\r\nintro\r\n## A\r\nnew\n## B\r\ntail\r\n");
    }

    #[test]
    fn test_last_section_owns_trailing_newline() {
        let md = "## A\nbody\n## B\nb\n";
        let section = extract_section(md, "B");
        assert_eq!(section, "## B\nb\n");
        assert_eq!(replace_section(md, "B", &section), md);
        assert_eq!(replace_section(md, "B", "## B\nc"), "## A\nbody\n## B\nc");
    }

    #[test]
    fn test_replace_missing_section_appends() {
        assert_eq!(
            replace_section("# Doc\ntext", "New", "## New\nbody"),
            "# Doc\ntext\n\n## New\nbody"
        );
        assert_eq!(
            replace_section("# Doc\n", "New", "## New"),
            "# Doc\n\n## New"
        );
        assert_eq!(replace_section("", "New", "## New"), "## New");
    }

    #[test]
    fn test_heading_depth() {
        assert_eq!(heading_depth("# a"), Some(1));
        assert_eq!(heading_depth("######"), Some(6));
        assert_eq!(heading_depth("###### six"), Some(6));
        assert_eq!(heading_depth("####### seven"), None);
        assert_eq!(heading_depth(" # indented"), None);
        assert_eq!(heading_depth("plain"), None);
    }

    #[test]
    fn test_bounds() {
        let bounds = find_section(ROOT_DOC, "A").unwrap();
        assert_eq!(
            bounds,
            SectionBounds {
                start: 1,
                end: 3,
                depth: 2
            }
        );
        assert_eq!(bounds.len(), 2);
    }
}
