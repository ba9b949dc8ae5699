//! Editor commands redirected to embedded section editors.
//!
//! Each command works on the line holding the cursor (or on the selection,
//! for the inline formatting toggles) of any [`EditingSurface`].

use crate::config::EditingConfig;
use crate::surface::{Edit, EditingSurface, Position};
use regex::Regex;
use std::sync::OnceLock;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Commands recognized by their host identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum EditorCommand {
    #[strum(serialize = "editor:toggle-checklist-status")]
    ToggleChecklistStatus,
    #[strum(serialize = "editor:toggle-bold")]
    ToggleBold,
    #[strum(serialize = "editor:toggle-italics")]
    ToggleItalics,
    #[strum(serialize = "editor:toggle-strikethrough")]
    ToggleStrikethrough,
    #[strum(serialize = "editor:toggle-code")]
    ToggleCode,
    #[strum(serialize = "editor:insert-link")]
    InsertLink,
    #[strum(serialize = "editor:toggle-bullet-list")]
    ToggleBulletList,
    #[strum(serialize = "editor:toggle-numbered-list")]
    ToggleNumberedList,
    #[strum(serialize = "editor:indent-list")]
    IndentList,
    #[strum(serialize = "editor:unindent-list")]
    UnindentList,
    #[strum(serialize = "editor:insert-tag")]
    InsertTag,
    #[strum(serialize = "editor:swap-line-up")]
    SwapLineUp,
    #[strum(serialize = "editor:swap-line-down")]
    SwapLineDown,
    #[strum(serialize = "editor:duplicate-line")]
    DuplicateLine,
    #[strum(serialize = "editor:delete-line")]
    DeleteLine,
}

fn unchecked_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)- \[ \]").expect("valid checklist regex"))
}

fn checked_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(\s*)- \[x\]").expect("valid checklist regex"))
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)- ").expect("valid bullet regex"))
}

fn numbered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)(\d+)\. ").expect("valid numbered list regex"))
}

/// Leading whitespace and the char length of the marker that follows it.
fn marker(re: &Regex, line: &str) -> Option<(usize, usize)> {
    let caps = re.captures(line)?;
    let indent = caps.get(1).map_or(0, |m| m.as_str().chars().count());
    let whole = caps.get(0).map_or(0, |m| m.as_str().chars().count());
    Some((indent, whole - indent))
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn char_slice(line: &str, from: usize, to: usize) -> String {
    line.chars().skip(from).take(to.saturating_sub(from)).collect()
}

impl EditorCommand {
    /// Look up a command by its host identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        id.parse().ok()
    }

    /// The host identifier of this command.
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// All recognized host identifiers.
    pub fn ids() -> Vec<String> {
        Self::iter().map(|c| c.id()).collect()
    }

    pub fn description(&self) -> &'static str {
        match self {
            EditorCommand::ToggleChecklistStatus => "Toggle checklist status",
            EditorCommand::ToggleBold => "Toggle bold",
            EditorCommand::ToggleItalics => "Toggle italics",
            EditorCommand::ToggleStrikethrough => "Toggle strikethrough",
            EditorCommand::ToggleCode => "Toggle inline code",
            EditorCommand::InsertLink => "Insert markdown link",
            EditorCommand::ToggleBulletList => "Toggle bullet list",
            EditorCommand::ToggleNumberedList => "Toggle numbered list",
            EditorCommand::IndentList => "Indent",
            EditorCommand::UnindentList => "Unindent",
            EditorCommand::InsertTag => "Insert tag",
            EditorCommand::SwapLineUp => "Move line up",
            EditorCommand::SwapLineDown => "Move line down",
            EditorCommand::DuplicateLine => "Duplicate line",
            EditorCommand::DeleteLine => "Delete line",
        }
    }

    /// Run the command against `surface`.
    pub fn execute(self, surface: &mut dyn EditingSurface, config: &EditingConfig) {
        tracing::trace!(command = %self, "executing editor command");
        match self {
            EditorCommand::ToggleChecklistStatus => toggle_checklist(surface),
            EditorCommand::ToggleBold => toggle_wrap(surface, "**"),
            EditorCommand::ToggleItalics => toggle_wrap(surface, "*"),
            EditorCommand::ToggleStrikethrough => toggle_wrap(surface, "~~"),
            EditorCommand::ToggleCode => toggle_wrap(surface, "`"),
            EditorCommand::InsertLink => insert_link(surface),
            EditorCommand::ToggleBulletList => toggle_bullet(surface),
            EditorCommand::ToggleNumberedList => toggle_numbered(surface),
            EditorCommand::IndentList => indent(surface, config),
            EditorCommand::UnindentList => unindent(surface, config),
            EditorCommand::InsertTag => insert_tag(surface),
            EditorCommand::SwapLineUp => swap_up(surface),
            EditorCommand::SwapLineDown => swap_down(surface),
            EditorCommand::DuplicateLine => duplicate_line(surface),
            EditorCommand::DeleteLine => delete_line(surface),
        }
    }
}

fn current_line(surface: &dyn EditingSurface) -> (usize, String) {
    let line = surface.cursor().line;
    (line, surface.line(line).unwrap_or_default())
}

fn toggle_checklist(surface: &mut dyn EditingSurface) {
    let (l, text) = current_line(surface);

    if let Some((indent, _)) = marker(unchecked_re(), &text) {
        surface.replace_range("[x]", Position::new(l, indent + 2), Position::new(l, indent + 5));
    } else if let Some((indent, _)) = marker(checked_re(), &text) {
        surface.replace_range("[ ]", Position::new(l, indent + 2), Position::new(l, indent + 5));
    } else if let Some((indent, len)) = marker(bullet_re(), &text) {
        surface.replace_range("[ ] ", Position::new(l, indent + len), Position::new(l, indent + len));
    } else {
        let indent = indent_of(&text);
        surface.replace_range("- [ ] ", Position::new(l, indent), Position::new(l, indent));
    }
}

fn toggle_wrap(surface: &mut dyn EditingSurface, mark: &str) {
    let m = mark.chars().count();

    let Some(sel) = surface.selection() else {
        let pos = surface.cursor();
        let line = surface.line(pos.line).unwrap_or_default();
        let before = pos.ch >= m && char_slice(&line, pos.ch - m, pos.ch) == mark;
        let after = char_slice(&line, pos.ch, pos.ch + m) == mark;
        if before && after {
            // Empty pair left by a previous toggle.
            surface.replace_range(
                "",
                Position::new(pos.line, pos.ch - m),
                Position::new(pos.line, pos.ch + m),
            );
        } else {
            surface.transaction(
                &[Edit::insert(pos, format!("{mark}{mark}"))],
                Some(Position::new(pos.line, pos.ch + m)),
            );
        }
        return;
    };

    let (from, to) = (sel.from(), sel.to());
    let selected = surface.selected_text();
    let inner_len = selected.chars().count();
    let same_line = from.line == to.line;

    // Markers inside the selection.
    if inner_len >= 2 * m && selected.starts_with(mark) && selected.ends_with(mark) {
        let inner = char_slice(&selected, m, inner_len - m);
        surface.replace_selection(&inner);
        if same_line {
            surface.set_selection(from, Position::new(from.line, from.ch + inner_len - 2 * m));
        }
        return;
    }

    // Markers just outside the selection.
    let first = surface.line(from.line).unwrap_or_default();
    let last = surface.line(to.line).unwrap_or_default();
    let wrapped = from.ch >= m
        && char_slice(&first, from.ch - m, from.ch) == mark
        && char_slice(&last, to.ch, to.ch + m) == mark;
    if wrapped {
        let start = Position::new(from.line, from.ch - m);
        let end_ch = if same_line { to.ch - m } else { to.ch };
        surface.transaction(
            &[
                Edit::new(start, from, ""),
                Edit::new(to, Position::new(to.line, to.ch + m), ""),
            ],
            None,
        );
        surface.set_selection(start, Position::new(to.line, end_ch));
        return;
    }

    surface.transaction(&[Edit::insert(from, mark), Edit::insert(to, mark)], None);
    let end_ch = if same_line { to.ch + m } else { to.ch };
    surface.set_selection(
        Position::new(from.line, from.ch + m),
        Position::new(to.line, end_ch),
    );
}

fn insert_link(surface: &mut dyn EditingSurface) {
    match surface.selection() {
        Some(sel) => {
            let from = sel.from();
            let text = surface.selected_text();
            let single_line = !text.contains('\n');
            let len = text.chars().count();
            surface.replace_selection(&format!("[{text}]()"));
            if single_line {
                surface.set_cursor(Position::new(from.line, from.ch + len + 3));
            }
        }
        None => {
            let pos = surface.cursor();
            surface.transaction(
                &[Edit::insert(pos, "[]()")],
                Some(Position::new(pos.line, pos.ch + 1)),
            );
        }
    }
}

fn toggle_bullet(surface: &mut dyn EditingSurface) {
    let (l, text) = current_line(surface);

    let checklist = marker(unchecked_re(), &text).or_else(|| marker(checked_re(), &text));
    if let Some((indent, len)) = checklist {
        // The checkbox goes along with the bullet, including the space after it.
        let len = if text.chars().nth(indent + len) == Some(' ') { len + 1 } else { len };
        surface.replace_range("", Position::new(l, indent), Position::new(l, indent + len));
    } else if let Some((indent, len)) = marker(bullet_re(), &text) {
        surface.replace_range("", Position::new(l, indent), Position::new(l, indent + len));
    } else if let Some((indent, len)) = marker(numbered_re(), &text) {
        surface.replace_range("- ", Position::new(l, indent), Position::new(l, indent + len));
    } else {
        let indent = indent_of(&text);
        surface.replace_range("- ", Position::new(l, indent), Position::new(l, indent));
    }
}

/// Number to use on line `l`: one more than a numbered line right above it.
fn next_number(surface: &dyn EditingSurface, l: usize) -> u64 {
    l.checked_sub(1)
        .and_then(|prev| surface.line(prev))
        .and_then(|prev| {
            numbered_re()
                .captures(&prev)
                .and_then(|caps| caps.get(2))
                .and_then(|n| n.as_str().parse::<u64>().ok())
        })
        .map_or(1, |n| n + 1)
}

fn toggle_numbered(surface: &mut dyn EditingSurface) {
    let (l, text) = current_line(surface);

    if let Some((indent, len)) = marker(numbered_re(), &text) {
        surface.replace_range("", Position::new(l, indent), Position::new(l, indent + len));
        return;
    }

    let number = format!("{}. ", next_number(surface, l));
    if let Some((indent, len)) = marker(bullet_re(), &text) {
        surface.replace_range(&number, Position::new(l, indent), Position::new(l, indent + len));
    } else {
        let indent = indent_of(&text);
        surface.replace_range(&number, Position::new(l, indent), Position::new(l, indent));
    }
}

fn indent(surface: &mut dyn EditingSurface, config: &EditingConfig) {
    let l = surface.cursor().line;
    let at = Position::new(l, 0);
    surface.replace_range(&config.indent, at, at);
}

fn unindent(surface: &mut dyn EditingSurface, config: &EditingConfig) {
    let (l, text) = current_line(surface);
    let remove = if text.starts_with('\t') {
        1
    } else {
        text.chars()
            .take(config.indent_width)
            .take_while(|c| *c == ' ')
            .count()
    };
    if remove > 0 {
        surface.replace_range("", Position::new(l, 0), Position::new(l, remove));
    }
}

fn insert_tag(surface: &mut dyn EditingSurface) {
    match surface.selection() {
        Some(_) => {
            let tag: String = surface
                .selected_text()
                .trim()
                .trim_start_matches('#')
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-");
            surface.replace_selection(&format!("#{tag}"));
        }
        None => surface.replace_selection("#"),
    }
}

fn swap_up(surface: &mut dyn EditingSurface) {
    let pos = surface.cursor();
    if pos.line == 0 {
        return;
    }
    let above = surface.line(pos.line - 1).unwrap_or_default();
    let current = surface.line(pos.line).unwrap_or_default();
    let end = surface.line_end(pos.line);
    surface.transaction(
        &[Edit::new(
            Position::new(pos.line - 1, 0),
            end,
            format!("{current}\n{above}"),
        )],
        Some(Position::new(pos.line - 1, pos.ch)),
    );
}

fn swap_down(surface: &mut dyn EditingSurface) {
    let pos = surface.cursor();
    if pos.line + 1 >= surface.line_count() {
        return;
    }
    let current = surface.line(pos.line).unwrap_or_default();
    let below = surface.line(pos.line + 1).unwrap_or_default();
    let end = surface.line_end(pos.line + 1);
    surface.transaction(
        &[Edit::new(
            Position::new(pos.line, 0),
            end,
            format!("{below}\n{current}"),
        )],
        Some(Position::new(pos.line + 1, pos.ch)),
    );
}

fn duplicate_line(surface: &mut dyn EditingSurface) {
    let pos = surface.cursor();
    let current = surface.line(pos.line).unwrap_or_default();
    let end = surface.line_end(pos.line);
    surface.transaction(
        &[Edit::insert(end, format!("\n{current}"))],
        Some(Position::new(pos.line + 1, pos.ch)),
    );
}

fn delete_line(surface: &mut dyn EditingSurface) {
    let pos = surface.cursor();
    let count = surface.line_count();

    let (from, to) = if pos.line + 1 < count {
        (Position::new(pos.line, 0), Position::new(pos.line + 1, 0))
    } else if pos.line > 0 {
        (surface.line_end(pos.line - 1), surface.line_end(pos.line))
    } else {
        (Position::new(0, 0), surface.line_end(0))
    };

    let line = pos.line.min(count.saturating_sub(2));
    surface.transaction(&[Edit::new(from, to, "")], None);
    let ch = pos.ch.min(surface.line_len(line));
    surface.set_cursor(Position::new(line, ch));
}
