//! Minimal Markdown to HTML for message previews
//!
//! Line-oriented: each input line becomes one block (heading, blockquote,
//! list item, paragraph or `<br/>`), then inline markup is applied. Input is
//! HTML-escaped first, so the output never contains caller-supplied tags.

use regex::Regex;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum List {
    Unordered,
    Ordered,
}

impl List {
    fn open(self) -> &'static str {
        match self {
            List::Unordered => "<ul>",
            List::Ordered => "<ol>",
        }
    }

    fn close(self) -> &'static str {
        match self {
            List::Unordered => "</ul>",
            List::Ordered => "</ol>",
        }
    }
}

/// Compiled preview renderer. Build once, render many.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    heading: Regex,
    quote: Regex,
    bullet: Regex,
    numbered: Regex,
    /// Inline rules, applied in order.
    inline: Vec<(Regex, &'static str)>,
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl MarkdownRenderer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            heading: Regex::new(r"^(#{1,6})\s?(.*)$")?,
            // Lines are matched after escaping
            quote: Regex::new(r"^&gt;\s?")?,
            bullet: Regex::new(r"^[-*+]\s+")?,
            numbered: Regex::new(r"^\d+\.\s+")?,
            inline: vec![
                (Regex::new(r"`([^`]+)`")?, "<code>${1}</code>"),
                (Regex::new(r"\*\*([^*]+)\*\*")?, "<strong>${1}</strong>"),
                (Regex::new(r"\*([^*]+)\*")?, "<em>${1}</em>"),
                (Regex::new(r"__([^_]+)__")?, "<strong>${1}</strong>"),
                (Regex::new(r"_([^_]+)_")?, "<em>${1}</em>"),
                (
                    Regex::new(r"\[([^\]]+)\]\(([^)]+)\)")?,
                    r#"<a href="${2}" target="_blank" rel="noreferrer">${1}</a>"#,
                ),
            ],
        })
    }

    pub fn render(&self, markdown: &str) -> String {
        if markdown.is_empty() {
            return String::new();
        }

        let escaped = escape_html(markdown);
        let mut out: Vec<String> = Vec::new();
        let mut open: Option<List> = None;

        for raw in escaped.split('\n') {
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            let block = if let Some(caps) = self.heading.captures(line)
                && !caps[2].trim().is_empty()
            {
                close_list(&mut out, &mut open);
                let level = caps[1].len();
                format!("<h{level}>{}</h{level}>", &caps[2])
            } else if self.quote.is_match(line) {
                close_list(&mut out, &mut open);
                format!("<blockquote>{}</blockquote>", self.quote.replace(line, ""))
            } else if self.bullet.is_match(line) {
                enter_list(&mut out, &mut open, List::Unordered);
                format!("<li>{}</li>", self.bullet.replace(line, ""))
            } else if self.numbered.is_match(line) {
                enter_list(&mut out, &mut open, List::Ordered);
                format!("<li>{}</li>", self.numbered.replace(line, ""))
            } else {
                close_list(&mut out, &mut open);
                if line.trim().is_empty() {
                    "<br/>".to_owned()
                } else {
                    format!("<p>{line}</p>")
                }
            };

            out.push(self.apply_inline(block));
        }
        close_list(&mut out, &mut open);

        out.join("\n")
    }

    fn apply_inline(&self, mut line: String) -> String {
        for (pattern, replacement) in &self.inline {
            line = pattern.replace_all(&line, *replacement).into_owned();
        }
        line
    }
}

fn close_list(out: &mut Vec<String>, open: &mut Option<List>) {
    if let Some(list) = open.take() {
        out.push(list.close().to_owned());
    }
}

fn enter_list(out: &mut Vec<String>, open: &mut Option<List>, kind: List) {
    if *open != Some(kind) {
        close_list(out, open);
        out.push(kind.open().to_owned());
        *open = Some(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str) -> String {
        MarkdownRenderer::new().unwrap().render(md)
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render(""), "");
    }

    #[test]
    fn headings_need_content() {
        assert_eq!(render("# Title"), "<h1>Title</h1>");
        assert_eq!(render("###Tight"), "<h3>Tight</h3>");
        assert_eq!(render("#"), "<p>#</p>");
        assert_eq!(render("####### deep"), "<h6># deep</h6>");
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(
            render("<script>a & b</script>"),
            "<p>&lt;script&gt;a &amp; b&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn blockquote() {
        assert_eq!(render("> quoted"), "<blockquote>quoted</blockquote>");
    }

    #[test]
    fn lists_group_and_close() {
        let html = render("- one\n* two\ntext\n1. first\n2. second");
        assert_eq!(
            html,
            "<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n<p>text</p>\n<ol>\n<li>first</li>\n<li>second</li>\n</ol>"
        );
    }

    #[test]
    fn switching_list_kind_closes_previous() {
        assert_eq!(
            render("- a\n1. b"),
            "<ul>\n<li>a</li>\n</ul>\n<ol>\n<li>b</li>\n</ol>"
        );
    }

    #[test]
    fn blank_lines_are_breaks() {
        assert_eq!(render("a\r\n\r\nb"), "<p>a</p>\n<br/>\n<p>b</p>");
    }

    #[test]
    fn inline_markup() {
        assert_eq!(
            render("**bold** *it* __b2__ _i2_ `x*y`"),
            "<p><strong>bold</strong> <em>it</em> <strong>b2</strong> <em>i2</em> <code>x*y</code></p>"
        );
    }

    #[test]
    fn links_open_in_new_tab() {
        assert_eq!(
            render("see [docs](https://example.com/a)"),
            r#"<p>see <a href="https://example.com/a" target="_blank" rel="noreferrer">docs</a></p>"#
        );
    }
}
