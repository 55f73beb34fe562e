//! Terminal rendering of the transcript.
//!
//! [`render_styled`] turns a parsed [`StyledText`] into ANSI text for the
//! console front-end: character styles through `colored`, wrapping through
//! `textwrap`, and `<center>` / `<right>` paragraphs padded to the given width.
//! The [`TranscriptStyle`] trait covers the text the front-end adds itself.

use std::ops::Range;

use colored::{ColoredString, Colorize};
use textwrap::{Options, fill};

use crate::markup::{Alignment, StyleMods, StyledText};
use crate::theme::Theme;
use crate::transcript::TranscriptEntry;

/// Styles for front-end text, colored according to the active theme.
pub trait TranscriptStyle {
    fn command_style(&self, theme: Theme) -> ColoredString;
    fn notice_style(&self, theme: Theme) -> ColoredString;
    fn error_style(&self, theme: Theme) -> ColoredString;
    fn section_style(&self, theme: Theme) -> ColoredString;
}

impl TranscriptStyle for &str {
    fn command_style(&self, theme: Theme) -> ColoredString {
        self.bold().color(theme.palette().command.to_color())
    }
    fn notice_style(&self, theme: Theme) -> ColoredString {
        self.italic().color(theme.palette().notice.to_color())
    }
    fn error_style(&self, theme: Theme) -> ColoredString {
        self.color(theme.palette().error.to_color())
    }
    fn section_style(&self, theme: Theme) -> ColoredString {
        let bracketed = format!("[{self}]");
        bracketed.color(theme.palette().section.to_color())
    }
}

impl TranscriptStyle for String {
    fn command_style(&self, theme: Theme) -> ColoredString {
        self.as_str().command_style(theme)
    }
    fn notice_style(&self, theme: Theme) -> ColoredString {
        self.as_str().notice_style(theme)
    }
    fn error_style(&self, theme: Theme) -> ColoredString {
        self.as_str().error_style(theme)
    }
    fn section_style(&self, theme: Theme) -> ColoredString {
        self.as_str().section_style(theme)
    }
}

/// Render styled text wrapped to `width` columns.
///
/// Each `\n`-separated paragraph is wrapped on its own and aligned by the last
/// alignment span that touches it.
pub fn render_styled(text: &StyledText, width: usize, theme: Theme) -> String {
    let width = width.max(1);
    paragraph_ranges(text.as_str())
        .into_iter()
        .map(|range| {
            let alignment = text.alignment_in(&range);
            let ansi: String = text
                .segments(range)
                .into_iter()
                .map(|(segment, mods)| apply_mods(segment, mods, theme))
                .collect();
            if ansi.is_empty() {
                return ansi;
            }
            align_block(&fill(&ansi, Options::new(width)), width, alignment)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render one transcript entry: the echoed command (if any), then the response.
pub fn render_entry(entry: &TranscriptEntry, width: usize, theme: Theme) -> String {
    let response = render_styled(&entry.response, width, theme);
    if entry.command.is_empty() {
        response
    } else {
        format!("{}\n{response}", entry.command.as_str().command_style(theme))
    }
}

fn paragraph_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices('\n') {
        ranges.push(start..idx);
        start = idx + 1;
    }
    ranges.push(start..text.len());
    ranges
}

fn apply_mods(text: &str, mods: StyleMods, theme: Theme) -> String {
    let fg = theme.palette().text;
    if mods.is_plain() && fg.is_none() {
        return text.to_string();
    }

    let mut styled = text.normal();
    if let Some(fg) = fg {
        styled = styled.color(fg.to_color());
    }
    if mods.bold {
        styled = styled.bold();
    }
    if mods.italic {
        styled = styled.italic();
    }
    if mods.underline {
        styled = styled.underline();
    }
    if mods.strikethrough {
        styled = styled.strikethrough();
    }
    styled.to_string()
}

fn align_block(wrapped: &str, width: usize, alignment: Option<Alignment>) -> String {
    let Some(alignment) = alignment else {
        return wrapped.to_string();
    };
    wrapped
        .lines()
        .map(|line| {
            let free = width.saturating_sub(textwrap::core::display_width(line));
            let pad = match alignment {
                Alignment::Center => free / 2,
                Alignment::Right => free,
            };
            format!("{}{line}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
