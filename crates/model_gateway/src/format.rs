//! Local advice formatting.
//!
//! Turns markdown-ish advice into plain paragraphs led by a `TL;DR:` summary.
//! Used when enhancement is disabled or unavailable, and to normalize model
//! output so every answer has the same shape.

use regex::Regex;

/// Prefix every formatted answer starts with.
pub const TLDR_PREFIX: &str = "TL;DR:";

/// Sentences taken from the text for a locally built summary.
const SUMMARY_SENTENCES: usize = 2;

/// Upper bound for a summary built from text without sentence breaks.
const SUMMARY_MAX_CHARS: usize = 280;

/// How far into model output a `TL;DR` marker may start and still be kept.
const TLDR_SEARCH_WINDOW: usize = 200;

/// Characters dropped from running text.
const MARKUP_CHARS: [char; 4] = ['*', '`', '~', '#'];

/// Line classification after markup is removed.
enum Line {
    Blank,
    Rule,
    TableSeparator,
    Heading(String),
    Item(String),
    Text(String),
}

/// Markdown stripper and TL;DR builder.
#[derive(Debug, Clone)]
pub struct AdviceFormatter {
    heading: Regex,
    item: Regex,
    quote: Regex,
    rule: Regex,
    table_separator: Regex,
    table_row: Regex,
    link: Regex,
    whitespace: Regex,
    tldr_lead: Regex,
}

impl Default for AdviceFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl AdviceFormatter {
    pub fn new() -> Self {
        Self {
            heading: Regex::new(r"^\s{0,3}#{1,6}\s*(.*?)[\s#]*$").unwrap(),
            item: Regex::new(r"^\s*(?:[-*+•]|\d{1,3}[.)])\s+(.*)$").unwrap(),
            quote: Regex::new(r"^\s*>\s?(.*)$").unwrap(),
            rule: Regex::new(r"^\s*(?:[-*_=]\s*){3,}$").unwrap(),
            table_separator: Regex::new(
                r"^\s*\|?(?:\s*:?-{3,}:?\s*\|)+\s*(?::?-{3,}:?\s*)?$",
            )
            .unwrap(),
            table_row: Regex::new(r"^\s*\|(.*)\|\s*$").unwrap(),
            link: Regex::new(r"!?\[([^\]]*)\]\(([^)\s]+)[^)]*\)").unwrap(),
            whitespace: Regex::new(r"\s+").unwrap(),
            tldr_lead: Regex::new(r"(?i)^tl;?\s?dr\b\s*[:\-–.]?\s*").unwrap(),
        }
    }

    /// Whether the text still carries markdown constructs.
    pub fn has_markup(&self, text: &str) -> bool {
        if text.contains(MARKUP_CHARS) || self.link.is_match(text) {
            return true;
        }
        text.lines().any(|line| {
            self.item.is_match(line)
                || self.quote.is_match(line)
                || self.rule.is_match(line)
                || self.table_row.is_match(line)
        })
    }

    /// Remove markup and join each block into one plain paragraph.
    ///
    /// List items, table rows and headings become sentences; a heading that
    /// stands alone is merged into the paragraph that follows it.
    pub fn strip_markup(&self, text: &str) -> String {
        let mut paragraphs: Vec<String> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut pending_heading: Option<String> = None;

        let mut flush = |current: &mut Vec<String>, pending: &mut Option<String>| {
            if current.is_empty() {
                return;
            }
            let mut parts = Vec::with_capacity(current.len() + 1);
            if let Some(heading) = pending.take() {
                parts.push(heading);
            }
            parts.append(current);
            let joined = self.whitespace.replace_all(&parts.join(" "), " ").trim().to_string();
            if !joined.is_empty() {
                paragraphs.push(joined);
            }
        };

        for raw in text.lines() {
            match self.classify(raw) {
                Line::Blank | Line::Rule => flush(&mut current, &mut pending_heading),
                Line::TableSeparator => {}
                Line::Heading(heading) => {
                    flush(&mut current, &mut pending_heading);
                    if !heading.is_empty() {
                        match pending_heading.take() {
                            Some(prev) => pending_heading = Some(format!("{} {}", prev, heading)),
                            None => pending_heading = Some(heading),
                        }
                    }
                }
                Line::Item(item) => current.push(item),
                Line::Text(line) => current.push(line),
            }
        }
        flush(&mut current, &mut pending_heading);

        if let Some(heading) = pending_heading {
            paragraphs.push(heading);
        }

        paragraphs.join("\n\n")
    }

    fn classify(&self, raw: &str) -> Line {
        if raw.trim().is_empty() {
            return Line::Blank;
        }
        if self.table_separator.is_match(raw) {
            return Line::TableSeparator;
        }
        if self.rule.is_match(raw) {
            return Line::Rule;
        }
        if let Some(caps) = self.heading.captures(raw) {
            return Line::Heading(sentence(&self.clean_inline(&caps[1])));
        }
        if let Some(caps) = self.table_row.captures(raw) {
            let cells: Vec<String> = caps[1]
                .split('|')
                .map(|cell| self.clean_inline(cell))
                .filter(|cell| !cell.is_empty())
                .collect();
            return Line::Item(sentence(&cells.join(", ")));
        }
        let mut line = raw.to_string();
        if let Some(caps) = self.quote.captures(&line) {
            line = caps[1].to_string();
        }
        if let Some(caps) = self.item.captures(&line) {
            return Line::Item(sentence(&self.clean_inline(&caps[1])));
        }
        Line::Text(self.clean_inline(&line))
    }

    /// Rewrite links as `text (url)` and drop emphasis characters.
    fn clean_inline(&self, text: &str) -> String {
        let linked = self.link.replace_all(text, |caps: &regex::Captures<'_>| {
            let label = caps[1].trim();
            if label.is_empty() {
                caps[2].to_string()
            } else {
                format!("{} ({})", label, &caps[2])
            }
        });
        linked
            .replace("__", "")
            .chars()
            .filter(|c| !MARKUP_CHARS.contains(c))
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Summary line built from the text's own leading sentences.
    pub fn tldr_summary(&self, plain: &str) -> String {
        let flat = self.whitespace.replace_all(plain, " ");
        let flat = flat.trim();
        let sentences = leading_sentences(flat, SUMMARY_SENTENCES);
        let summary = if sentences.is_empty() {
            truncate_words(flat, SUMMARY_MAX_CHARS)
        } else {
            sentences
        };
        format!("{} {}", TLDR_PREFIX, summary).trim_end().to_string()
    }

    /// Lead plain text with a summary built from its own sentences.
    ///
    /// Nothing is dropped. Text that already opens with a `TL;DR` marker only
    /// has the marker normalized.
    pub fn prefix_summary(&self, plain: &str) -> String {
        let plain = plain.trim();
        if plain.is_empty() {
            return TLDR_PREFIX.to_string();
        }
        if self.tldr_lead.is_match(plain) {
            return self.relabel_tldr(plain);
        }
        format!("{}\n\n{}", self.tldr_summary(plain), plain)
    }

    /// Re-lead model output on the `TL;DR` paragraph it already carries.
    ///
    /// The marker must open a paragraph starting within the first
    /// `TLDR_SEARCH_WINDOW` bytes. Only the preamble before that paragraph
    /// is dropped; a marker inside running text is not a summary.
    pub fn lead_with_tldr(&self, plain: &str) -> Option<String> {
        let plain = plain.trim();
        paragraph_starts(plain)
            .take_while(|start| *start <= TLDR_SEARCH_WINDOW)
            .map(|start| plain[start..].trim_start())
            .find(|rest| self.tldr_lead.is_match(rest))
            .map(|rest| self.relabel_tldr(rest))
    }

    fn relabel_tldr(&self, text: &str) -> String {
        let body = self.tldr_lead.replace(text, "");
        format!("{} {}", TLDR_PREFIX, body.trim_start())
    }

    /// Full local pipeline: strip markup, then lead with a summary.
    pub fn format_locally(&self, raw: &str) -> String {
        self.prefix_summary(&self.strip_markup(raw))
    }
}

/// Byte offsets at which paragraphs begin.
fn paragraph_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    std::iter::once(0).chain(text.match_indices("\n\n").map(|(idx, _)| idx + 2))
}

/// End a heading or list item with punctuation so it reads as a sentence.
fn sentence(text: &str) -> String {
    let text = text.trim();
    match text.chars().last() {
        None => String::new(),
        Some(c) if matches!(c, '.' | '!' | '?' | ':' | ';') => text.to_string(),
        Some(_) => format!("{}.", text),
    }
}

/// First `count` sentences, or empty when the text has no sentence end.
fn leading_sentences(text: &str, count: usize) -> String {
    let mut end = None;
    let mut found = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_break = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_break {
                found += 1;
                end = Some(idx + c.len_utf8());
                if found == count {
                    break;
                }
            }
        }
    }
    end.map(|e| text[..e].to_string()).unwrap_or_default()
}

/// Cut at a word boundary no later than `max` chars.
fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    match cut.rfind(' ') {
        Some(pos) => format!("{}...", &cut[..pos]),
        None => format!("{}...", cut),
    }
}
