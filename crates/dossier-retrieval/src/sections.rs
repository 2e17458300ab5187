//! Report section splitting
//!
//! Splits a Markdown report at heading boundaries with pulldown-cmark.
//! Text before the first heading becomes an untitled section. A leading
//! YAML metadata block is skipped.

use pulldown_cmark::{Event, Options, Parser as MdParser, Tag, TagEnd};
use std::ops::Range;

/// One section of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Position in document order
    pub index: usize,
    /// Heading level (1-6), 0 for the preamble
    pub level: u8,
    /// Heading text, empty for the preamble
    pub heading: String,
    /// Plain text of the body (no markup, no link targets)
    pub text: String,
    /// Markdown source of the section including its heading line
    pub markdown: String,
}

impl Section {
    /// Whether this is the untitled text before the first heading
    #[inline]
    #[must_use]
    pub fn is_preamble(&self) -> bool {
        self.level == 0
    }
}

#[derive(Default)]
struct Builder {
    level: u8,
    heading: String,
    text: String,
    start: usize,
}

/// Split `markdown` into sections in document order
///
/// Blank sections (no heading and no text) are omitted.
#[must_use]
pub fn split_sections(markdown: &str) -> Vec<Section> {
    let options = Options::ENABLE_YAML_STYLE_METADATA_BLOCKS | Options::ENABLE_TABLES;
    let parser = MdParser::new_ext(markdown, options).into_offset_iter();

    let mut sections = Vec::new();
    let mut current = Builder::default();
    let mut in_heading = false;
    let mut in_metadata = false;

    for (event, range) in parser {
        match event {
            Event::Start(Tag::MetadataBlock(_)) => in_metadata = true,
            Event::End(TagEnd::MetadataBlock(_)) => {
                in_metadata = false;
                current.start = range.end;
            }
            Event::Start(Tag::Heading { level, .. }) => {
                let finished = std::mem::take(&mut current);
                push_section(&mut sections, markdown, finished, range.start);
                current.level = level as u8;
                current.start = range.start;
                in_heading = true;
            }
            Event::End(TagEnd::Heading(_)) => in_heading = false,
            Event::Text(text) | Event::Code(text) if !in_metadata => {
                let target = if in_heading {
                    &mut current.heading
                } else {
                    &mut current.text
                };
                target.push_str(&text);
            }
            Event::SoftBreak | Event::HardBreak => current.text.push(' '),
            Event::End(TagEnd::Paragraph | TagEnd::Item | TagEnd::TableCell) => {
                current.text.push(' ');
            }
            _ => {}
        }
    }

    push_section(&mut sections, markdown, current, markdown.len());
    sections
}

fn push_section(sections: &mut Vec<Section>, markdown: &str, builder: Builder, end: usize) {
    let heading = builder.heading.trim().to_string();
    let text = builder.text.split_whitespace().collect::<Vec<_>>().join(" ");
    if heading.is_empty() && text.is_empty() {
        return;
    }

    let range: Range<usize> = builder.start.min(end)..end;
    sections.push(Section {
        index: sections.len(),
        level: builder.level,
        heading,
        text,
        markdown: markdown[range].trim().to_string(),
    });
}
