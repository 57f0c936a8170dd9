use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};

const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    '\\',
];

/// Escapes plain text for Telegram MarkdownV2.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Inside `code` and ```pre``` only the backtick and the backslash are escaped.
fn escape_code(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '`' || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Inside the `(...)` part of a link only `)` and the backslash are escaped.
fn escape_link_target(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for ch in url.chars() {
        if ch == ')' || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn ensure_trailing_newlines(out: &mut String, count: usize) {
    if out.is_empty() {
        return;
    }
    let existing = out.chars().rev().take_while(|ch| *ch == '\n').count();
    for _ in existing..count {
        out.push('\n');
    }
}

#[derive(Default)]
struct Renderer {
    // One buffer per open block quote, plus the root.
    buffers: Vec<String>,
    lists: Vec<Option<u64>>,
    bold: usize,
    italic: usize,
    strike: usize,
    in_code_block: bool,
}

impl Renderer {
    fn new() -> Self {
        Renderer {
            buffers: vec![String::new()],
            ..Renderer::default()
        }
    }

    fn out(&mut self) -> &mut String {
        if self.buffers.is_empty() {
            self.buffers.push(String::new());
        }
        let last = self.buffers.len() - 1;
        &mut self.buffers[last]
    }

    fn push(&mut self, text: &str) {
        self.out().push_str(text);
    }

    fn end_block(&mut self) {
        let gap = if self.lists.is_empty() { 2 } else { 1 };
        ensure_trailing_newlines(self.out(), gap);
    }

    fn toggle(&mut self, marker: &str, opening: bool) {
        let depth = match marker {
            "*" => &mut self.bold,
            "_" => &mut self.italic,
            _ => &mut self.strike,
        };
        let emit = if opening {
            *depth += 1;
            *depth == 1
        } else {
            *depth = depth.saturating_sub(1);
            *depth == 0
        };
        if emit {
            self.push(marker);
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading(..) => self.toggle("*", true),
            Tag::BlockQuote => self.buffers.push(String::new()),
            Tag::CodeBlock(kind) => {
                self.in_code_block = true;
                let language = match kind {
                    CodeBlockKind::Fenced(language) => language.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.push(&format!("```{}\n", escape_code(language.trim())));
            }
            Tag::List(start) => {
                if !self.lists.is_empty() {
                    ensure_trailing_newlines(self.out(), 1);
                }
                self.lists.push(start);
            }
            Tag::Item => {
                let depth = self.lists.len().saturating_sub(1);
                let indent = "  ".repeat(depth);
                let bullet = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let bullet = format!("{}\\. ", number);
                        *number += 1;
                        bullet
                    }
                    _ => "• ".to_string(),
                };
                self.push(&format!("{indent}{bullet}"));
            }
            Tag::Emphasis => self.toggle("_", true),
            Tag::Strong => self.toggle("*", true),
            Tag::Strikethrough => self.toggle("~", true),
            Tag::Link(..) | Tag::Image(..) => self.push("["),
            _ => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.end_block(),
            Tag::Heading(..) => {
                self.toggle("*", false);
                self.end_block();
            }
            Tag::BlockQuote => {
                let quoted = self.buffers.pop().unwrap_or_default();
                let lines: Vec<String> = quoted
                    .trim_end_matches('\n')
                    .split('\n')
                    .map(|line| format!(">{line}"))
                    .collect();
                self.push(&lines.join("\n"));
                self.end_block();
            }
            Tag::CodeBlock(_) => {
                self.in_code_block = false;
                ensure_trailing_newlines(self.out(), 1);
                self.push("```");
                self.end_block();
            }
            Tag::List(_) => {
                self.lists.pop();
                self.end_block();
            }
            Tag::Item => ensure_trailing_newlines(self.out(), 1),
            Tag::Emphasis => self.toggle("_", false),
            Tag::Strong => self.toggle("*", false),
            Tag::Strikethrough => self.toggle("~", false),
            Tag::Link(_, dest, _) | Tag::Image(_, dest, _) => {
                self.push(&format!("]({})", escape_link_target(&dest)));
            }
            _ => {}
        }
    }

    fn finish(mut self) -> String {
        while self.buffers.len() > 1 {
            let nested = self.buffers.pop().unwrap_or_default();
            self.push(&nested);
        }
        self.buffers
            .pop()
            .unwrap_or_default()
            .trim_end_matches('\n')
            .to_string()
    }
}

/// Converts model Markdown into Telegram MarkdownV2, escaping everything that
/// is not formatting.
pub fn markdown_to_telegram_v2(markdown: &str) -> String {
    if markdown.trim().is_empty() {
        return String::new();
    }

    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::new();
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => renderer.start(tag),
            Event::End(tag) => renderer.end(tag),
            Event::Text(text) => {
                let rendered = if renderer.in_code_block {
                    escape_code(&text)
                } else {
                    escape_text(&text)
                };
                renderer.push(&rendered);
            }
            Event::Code(code) => renderer.push(&format!("`{}`", escape_code(&code))),
            Event::Html(html) => renderer.push(&escape_text(&html)),
            Event::SoftBreak | Event::HardBreak => renderer.push("\n"),
            Event::Rule => {
                renderer.push("──────");
                renderer.end_block();
            }
            Event::TaskListMarker(checked) => {
                renderer.push(if checked { "\\[x\\] " } else { "\\[ \\] " });
            }
            Event::FootnoteReference(_) => {}
        }
    }

    renderer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_punctuation_is_escaped() {
        assert_eq!(
            markdown_to_telegram_v2("Harga naik 5% (setara Rp1.000)!"),
            "Harga naik 5% \\(setara Rp1\\.000\\)\\!"
        );
    }

    #[test]
    fn inline_formatting_is_converted() {
        assert_eq!(
            markdown_to_telegram_v2("**Tebal**, *miring* dan ~~coret~~"),
            "*Tebal*, _miring_ dan ~coret~"
        );
    }

    #[test]
    fn headings_become_bold_without_double_markers() {
        assert_eq!(markdown_to_telegram_v2("## Ringkasan **inti**"), "*Ringkasan inti*");
    }

    #[test]
    fn code_keeps_its_content_mostly_raw() {
        assert_eq!(
            markdown_to_telegram_v2("Jalankan `cargo run -- --debug` sekarang."),
            "Jalankan `cargo run -- --debug` sekarang\\."
        );
        assert_eq!(
            markdown_to_telegram_v2("```rust\nlet x = a.b();\n```"),
            "```rust\nlet x = a.b();\n```"
        );
    }

    #[test]
    fn links_escape_only_the_target_delimiters() {
        assert_eq!(
            markdown_to_telegram_v2("Lihat [Wiki (ID)](https://id.wikipedia.org/wiki/A_(b))"),
            "Lihat [Wiki \\(ID\\)](https://id.wikipedia.org/wiki/A_(b\\))"
        );
    }

    #[test]
    fn lists_get_bullets_and_escaped_numbers() {
        assert_eq!(
            markdown_to_telegram_v2("- satu\n- dua\n\n1. pertama\n2. kedua"),
            "• satu\n• dua\n\n1\\. pertama\n2\\. kedua"
        );
    }

    #[test]
    fn block_quotes_are_prefixed_per_line() {
        assert_eq!(
            markdown_to_telegram_v2("> kutipan satu\n> kutipan dua"),
            ">kutipan satu\n>kutipan dua"
        );
    }

    #[test]
    fn paragraphs_stay_separated() {
        assert_eq!(
            markdown_to_telegram_v2("Paragraf satu.\n\nParagraf dua."),
            "Paragraf satu\\.\n\nParagraf dua\\."
        );
        assert_eq!(markdown_to_telegram_v2("  \n"), "");
    }

    #[test]
    fn escape_text_handles_every_special_character() {
        assert_eq!(escape_text("a_b*c"), "a\\_b\\*c");
        assert_eq!(escape_text("\\"), "\\\\");
    }
}
