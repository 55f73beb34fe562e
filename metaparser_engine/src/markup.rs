//! Inline markup emitted by the interpreter.
//!
//! Metaparser games decorate their output with a handful of HTML-like tags.
//! [`parse`] strips the tags and records where each style applies, producing a
//! [`StyledText`] that front-ends can render however they like.
//!
//! # Vocabulary
//! - `<b>` bold, `<i>` italic, `<u>` underline, `<st>` strikethrough
//! - `<center>` / `<right>` paragraph alignment
//!
//! Tag names are case-insensitive and attributes are ignored. Any other tag is
//! removed from the text without effect. The tokenizer is lenient: a `<` that
//! does not start a tag is kept as text, and the common character entities
//! (`&lt;`, `&amp;`, `&#NN;` ...) are decoded.
//!
//! End tags close the most recent open tag *of the same kind*, so crossed
//! nesting such as `<b><i>x</b></i>` still styles `x` both ways. A tag that is
//! never closed contributes no style, and neither does a tag pair enclosing no
//! text.

use std::borrow::Cow;
use std::ops::Range;

/// Paragraph alignment requested by `<center>` or `<right>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alignment {
    Center,
    Right,
}

/// A single style attribute applied over a range of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Align(Alignment),
}

/// A style and the half-open byte range of [`StyledText::as_str`] it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSpan {
    pub style: Style,
    pub range: Range<usize>,
}

/// Character-level attributes active over a run of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct StyleMods {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl StyleMods {
    fn apply(&mut self, style: Style) {
        match style {
            Style::Bold => self.bold = true,
            Style::Italic => self.italic = true,
            Style::Underline => self.underline = true,
            Style::Strikethrough => self.strikethrough = true,
            Style::Align(_) => {},
        }
    }

    pub fn is_plain(self) -> bool {
        self == StyleMods::default()
    }
}

/// Text with style ranges attached.
///
/// Spans are stored in the order their end tags were seen. Ranges are byte
/// offsets and always fall on `char` boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledText {
    text: String,
    spans: Vec<StyleSpan>,
}

impl StyledText {
    /// Unstyled text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn spans(&self) -> &[StyleSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Alignment for the given range: the last alignment span that overlaps it.
    pub fn alignment_in(&self, range: &Range<usize>) -> Option<Alignment> {
        self.spans
            .iter()
            .filter(|span| span.range.start < range.end && range.start < span.range.end)
            .filter_map(|span| match span.style {
                Style::Align(align) => Some(align),
                _ => None,
            })
            .next_back()
    }

    /// Split `range` into maximal runs that share the same character styles.
    pub fn segments(&self, range: Range<usize>) -> Vec<(&str, StyleMods)> {
        let mut cuts = vec![range.start, range.end];
        for span in &self.spans {
            for edge in [span.range.start, span.range.end] {
                if edge > range.start && edge < range.end {
                    cuts.push(edge);
                }
            }
        }
        cuts.sort_unstable();
        cuts.dedup();

        cuts.windows(2)
            .filter(|pair| pair[0] < pair[1])
            .map(|pair| {
                let mut mods = StyleMods::default();
                for span in &self.spans {
                    if span.range.start <= pair[0] && pair[1] <= span.range.end {
                        mods.apply(span.style);
                    }
                }
                (&self.text[pair[0]..pair[1]], mods)
            })
            .collect()
    }
}

/// Parse interpreter output into [`StyledText`].
///
/// Each call starts from an empty buffer; no state survives between calls.
pub fn parse(source: &str) -> StyledText {
    let mut out = StyledText::default();
    let mut marks: Vec<(TagKind, usize)> = Vec::new();

    for token in Tokenizer::new(source) {
        match token {
            Token::Text(text) => out.text.push_str(&text),
            Token::Start(name) => {
                if let Some(kind) = TagKind::from_name(name) {
                    marks.push((kind, out.text.len()));
                }
            },
            Token::End(name) => {
                let Some(kind) = TagKind::from_name(name) else {
                    continue;
                };
                let Some(pos) = marks.iter().rposition(|(open, _)| *open == kind) else {
                    continue;
                };
                let (_, start) = marks.remove(pos);
                let end = out.text.len();
                if start != end {
                    out.spans.push(StyleSpan {
                        style: kind.style(),
                        range: start..end,
                    });
                }
            },
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Center,
    Right,
}

impl TagKind {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "b" => TagKind::Bold,
            "i" => TagKind::Italic,
            "u" => TagKind::Underline,
            "st" => TagKind::Strikethrough,
            "center" => TagKind::Center,
            "right" => TagKind::Right,
            _ => return None,
        })
    }

    fn style(self) -> Style {
        match self {
            TagKind::Bold => Style::Bold,
            TagKind::Italic => Style::Italic,
            TagKind::Underline => Style::Underline,
            TagKind::Strikethrough => Style::Strikethrough,
            TagKind::Center => Style::Align(Alignment::Center),
            TagKind::Right => Style::Align(Alignment::Right),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Text(Cow<'a, str>),
    Start(&'a str),
    End(&'a str),
}

/// Lenient SGML-ish tokenizer. Never fails; anything it cannot read as a tag
/// comes back as text.
struct Tokenizer<'a> {
    input: &'a str,
    idx: usize,
    pending_end: Option<&'a str>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            idx: 0,
            pending_end: None,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.idx..]
    }

    /// Try to read a tag at the current `<`. Returns `None` when the `<` is literal.
    fn read_tag(&mut self) -> Option<Token<'a>> {
        let rest = self.rest();

        if rest.starts_with("<!--") {
            let close = rest[4..].find("-->").map_or(rest.len(), |rel| 4 + rel + 3);
            self.idx += close;
            return Some(Token::Text(Cow::Borrowed("")));
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            let close = rest.find('>').map_or(rest.len(), |rel| rel + 1);
            self.idx += close;
            return Some(Token::Text(Cow::Borrowed("")));
        }

        let (is_end, name_start) = if rest.starts_with("</") { (true, 2) } else { (false, 1) };
        let first = rest[name_start..].chars().next()?;
        if !first.is_ascii_alphabetic() {
            return None;
        }

        let name_len = rest[name_start..]
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ':' | '.')))
            .unwrap_or(rest.len() - name_start);
        let name = &rest[name_start..name_start + name_len];

        let close = find_tag_close(&rest[name_start + name_len..])?;
        let body = &rest[name_start + name_len..name_start + name_len + close];
        self.idx += name_start + name_len + close + 1;

        if is_end {
            Some(Token::End(name))
        } else {
            if body.trim_end().ends_with('/') {
                self.pending_end = Some(name);
            }
            Some(Token::Start(name))
        }
    }

    fn read_text(&mut self) -> Cow<'a, str> {
        let start = self.idx;
        let mut owned: Option<String> = None;

        while self.idx < self.input.len() {
            let rest = self.rest();
            if rest.starts_with('<') {
                break;
            }
            if rest.starts_with('&')
                && let Some((decoded, used)) = decode_entity(rest)
            {
                owned
                    .get_or_insert_with(|| self.input[start..self.idx].to_string())
                    .push(decoded);
                self.idx += used;
                continue;
            }
            let Some(ch) = rest.chars().next() else {
                break;
            };
            if let Some(buf) = owned.as_mut() {
                buf.push(ch);
            }
            self.idx += ch.len_utf8();
        }

        owned.map_or_else(|| Cow::Borrowed(&self.input[start..self.idx]), Cow::Owned)
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(name) = self.pending_end.take() {
            return Some(Token::End(name));
        }
        if self.idx >= self.input.len() {
            return None;
        }
        if self.rest().starts_with('<') {
            if let Some(token) = self.read_tag() {
                return Some(token);
            }
            // literal '<'
            self.idx += 1;
            let tail = self.read_text();
            return Some(Token::Text(Cow::Owned(format!("<{tail}"))));
        }
        Some(Token::Text(self.read_text()))
    }
}

/// Offset of the `>` ending a tag body, skipping over quoted attribute values.
fn find_tag_close(body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in body.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => return Some(idx),
            (None, '<') => return None,
            _ => {},
        }
    }
    None
}

/// Decode a character entity at the start of `input`, returning the character
/// and the number of bytes consumed.
fn decode_entity(input: &str) -> Option<(char, usize)> {
    let end = input[1..].find(';').filter(|&rel| rel > 0 && rel <= 10)? + 1;
    let name = &input[1..end];
    let decoded = if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        char::from_u32(code)?
    } else {
        match name {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            "nbsp" => '\u{a0}',
            _ => return None,
        }
    };
    Some((decoded, end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn span(style: Style, range: Range<usize>) -> StyleSpan {
        StyleSpan { style, range }
    }

    #[test]
    fn empty_input_yields_empty_text() {
        let out = parse("");
        assert!(out.is_empty());
        assert!(out.spans().is_empty());
    }

    #[test]
    fn plain_text_is_unchanged() {
        let out = parse("plain");
        assert_eq!(out, StyledText::plain("plain"));
    }

    #[test]
    fn bold_covers_enclosed_text() {
        let out = parse("<b>x</b>");
        assert_eq!(out.as_str(), "x");
        assert_eq!(out.spans(), &[span(Style::Bold, 0..1)]);
    }

    #[test]
    fn empty_tag_pair_applies_nothing() {
        let out = parse("<b></b>");
        assert_eq!(out.as_str(), "");
        assert!(out.spans().is_empty());
    }

    #[test]
    fn end_tag_closes_latest_mark_of_same_kind() {
        let out = parse("<b><i>hi</b></i>");
        assert_eq!(out.as_str(), "hi");
        assert_eq!(out.spans(), &[span(Style::Bold, 0..2), span(Style::Italic, 0..2)]);
    }

    #[test]
    fn crossed_tags_close_at_their_own_end() {
        let out = parse("<b>one <i>two</b> three</i>");
        assert_eq!(out.as_str(), "one two three");
        assert_eq!(out.spans(), &[span(Style::Bold, 0..7), span(Style::Italic, 4..13)]);
    }

    #[test]
    fn same_kind_nesting_pairs_innermost_first() {
        let out = parse("<b>a<b>b</b>c</b>");
        assert_eq!(out.as_str(), "abc");
        assert_eq!(out.spans(), &[span(Style::Bold, 1..2), span(Style::Bold, 0..3)]);
    }

    #[test]
    fn tag_names_are_case_insensitive() {
        let out = parse("<ST>gone</st> <U>under</U>");
        assert_eq!(out.as_str(), "gone under");
        assert_eq!(
            out.spans(),
            &[span(Style::Strikethrough, 0..4), span(Style::Underline, 5..10)]
        );
    }

    #[test]
    fn alignment_tags_produce_alignment_spans() {
        let out = parse("<center>Title</center>\n<right>by someone</right>");
        assert_eq!(out.as_str(), "Title\nby someone");
        assert_eq!(out.alignment_in(&(0..5)), Some(Alignment::Center));
        assert_eq!(out.alignment_in(&(6..16)), Some(Alignment::Right));
    }

    #[test]
    fn unclosed_tag_is_dropped() {
        let out = parse("<b>never closed");
        assert_eq!(out.as_str(), "never closed");
        assert!(out.spans().is_empty());
    }

    #[test]
    fn stray_end_tag_is_ignored() {
        let out = parse("text</i>");
        assert_eq!(out.as_str(), "text");
        assert!(out.spans().is_empty());
    }

    #[test]
    fn unknown_tags_and_attributes_are_stripped() {
        let out = parse("<font color=\"a>b\">x</font><b class='q'>y</b>");
        assert_eq!(out.as_str(), "xy");
        assert_eq!(out.spans(), &[span(Style::Bold, 1..2)]);
    }

    #[test]
    fn self_closing_tag_is_empty() {
        let out = parse("a<b/>b");
        assert_eq!(out.as_str(), "ab");
        assert!(out.spans().is_empty());
    }

    #[test]
    fn literal_angle_brackets_survive() {
        let out = parse("1 < 2 and 3 <> 4");
        assert_eq!(out.as_str(), "1 < 2 and 3 <> 4");
    }

    #[test]
    fn entities_are_decoded() {
        let out = parse("&lt;b&gt; &amp; &#65;&#x42; &bogus;");
        assert_eq!(out.as_str(), "<b> & AB &bogus;");
        assert!(out.spans().is_empty());
    }

    #[test]
    fn comments_are_skipped() {
        let out = parse("a<!-- <b> -->b");
        assert_eq!(out.as_str(), "ab");
        assert!(out.spans().is_empty());
    }

    #[test]
    fn multibyte_text_keeps_byte_ranges_on_char_boundaries() {
        let out = parse("Дом <i>тёмный</i>");
        assert_eq!(out.as_str(), "Дом тёмный");
        let italic = &out.spans()[0];
        assert_eq!(&out.as_str()[italic.range.clone()], "тёмный");
    }

    #[test]
    fn segments_split_on_style_edges() {
        let out = parse("a<b>b<i>c</i></b>d");
        let segs = out.segments(0..out.len());
        let texts: Vec<&str> = segs.iter().map(|(text, _)| *text).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
        assert!(segs[0].1.is_plain());
        assert!(segs[1].1.bold && !segs[1].1.italic);
        assert!(segs[2].1.bold && segs[2].1.italic);
        assert!(segs[3].1.is_plain());
    }

    #[derive(Debug, Clone)]
    enum Node {
        Text(String),
        Tag(&'static str, Vec<Node>),
    }

    const TAGS: &[&str] = &["b", "i", "u", "st", "center", "right", "B", "span"];

    fn node() -> impl Strategy<Value = Node> {
        let leaf = "[a-zA-Z0-9 .,!?\n]{0,8}".prop_map(Node::Text);
        leaf.prop_recursive(4, 32, 4, |inner| {
            (prop::sample::select(TAGS), prop::collection::vec(inner, 0..4))
                .prop_map(|(tag, children)| Node::Tag(tag, children))
        })
    }

    fn render(node: &Node, markup: &mut String, plain: &mut String) {
        match node {
            Node::Text(text) => {
                markup.push_str(text);
                plain.push_str(text);
            },
            Node::Tag(tag, children) => {
                markup.push_str(&format!("<{tag}>"));
                for child in children {
                    render(child, markup, plain);
                }
                markup.push_str(&format!("</{tag}>"));
            },
        }
    }

    proptest! {
        #[test]
        fn balanced_markup_strips_tags_and_nests_spans(nodes in prop::collection::vec(node(), 0..6)) {
            let (mut markup, mut plain) = (String::new(), String::new());
            for node in &nodes {
                render(node, &mut markup, &mut plain);
            }

            let out = parse(&markup);
            prop_assert_eq!(out.as_str(), plain.as_str());
            for span in out.spans() {
                prop_assert!(span.range.start < span.range.end);
                prop_assert!(span.range.end <= out.len());
            }
            for (idx, a) in out.spans().iter().enumerate() {
                for b in &out.spans()[idx + 1..] {
                    let (a, b) = (&a.range, &b.range);
                    let disjoint = a.end <= b.start || b.end <= a.start;
                    let nested = (a.start <= b.start && b.end <= a.end) || (b.start <= a.start && a.end <= b.end);
                    prop_assert!(disjoint || nested, "crossed spans {:?} and {:?} in {:?}", a, b, markup);
                }
            }
        }
    }
}
