use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use sv_core::{ErrorKind, VarError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Set,
    Register,
    Unregister,
}

impl CommandKind {
    pub fn tag_name(self) -> &'static str {
        match self {
            Self::Set => "setVar",
            Self::Register => "registerVar",
            Self::Unregister => "unregisterVar",
        }
    }

    fn from_tag_name(name: &str) -> Option<Self> {
        match name {
            "setVar" => Some(Self::Set),
            "registerVar" => Some(Self::Register),
            "unregisterVar" => Some(Self::Unregister),
            _ => None,
        }
    }
}

/// A located command tag. Attribute text is kept raw for the strict parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpan {
    pub kind: CommandKind,
    pub range: Range<usize>,
    pub attrs: String,
    pub label: Option<String>,
}

fn open_tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"<(setVar|registerVar|unregisterVar)\b").expect("open tag regex must compile")
    })
}

struct TagHead {
    attrs_end: usize,
    after: usize,
    self_closing: bool,
}

/// Finds the `>` closing an opening tag, skipping quoted attribute values. A bare `<` before
/// the end means the tag was never closed.
fn scan_tag_head(text: &str, start: usize) -> Option<TagHead> {
    let mut quote: Option<char> = None;
    let mut previous: Option<(usize, char)> = None;
    for (offset, ch) in text[start..].char_indices() {
        let index = start + offset;
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '<' => return None,
                '>' => {
                    let self_closing = matches!(previous, Some((_, '/')));
                    let attrs_end = match previous {
                        Some((slash_index, '/')) => slash_index,
                        _ => index,
                    };
                    return Some(TagHead {
                        attrs_end,
                        after: index + 1,
                        self_closing,
                    });
                }
                _ => {}
            },
        }
        previous = Some((index, ch));
    }
    None
}

/// Locates the matching close tag, refusing to reach past the start of another command.
fn find_close_tag(text: &str, from: usize, kind: CommandKind) -> Option<usize> {
    let close = format!("</{}>", kind.tag_name());
    let found = from + text[from..].find(&close)?;
    if open_tag_regex().is_match(&text[from..found]) {
        return None;
    }
    Some(found)
}

/// Phase one: find every command tag in free-form text. Unterminated tags become errors in
/// place; scanning continues after them.
pub fn tokenize_commands(text: &str) -> Vec<Result<TagSpan, VarError>> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    while let Some(found) = open_tag_regex().captures_at(text, cursor) {
        let (Some(whole), Some(name)) = (found.get(0), found.get(1)) else {
            break;
        };
        let name = name.as_str();
        let Some(kind) = CommandKind::from_tag_name(name) else {
            cursor = whole.end();
            continue;
        };

        let Some(head) = scan_tag_head(text, whole.end()) else {
            out.push(Err(VarError::new(
                ErrorKind::MalformedCommand,
                format!("Unterminated <{}> tag at byte {}.", name, whole.start()),
            )));
            cursor = whole.end();
            continue;
        };

        let attrs = text[whole.end()..head.attrs_end].to_string();
        let (end, label) = if head.self_closing {
            (head.after, None)
        } else {
            match find_close_tag(text, head.after, kind) {
                Some(close_start) => (
                    close_start + kind.tag_name().len() + 3,
                    Some(text[head.after..close_start].to_string()),
                ),
                None => (head.after, None),
            }
        };

        out.push(Ok(TagSpan {
            kind,
            range: whole.start()..end,
            attrs,
            label,
        }));
        cursor = end;
    }
    out
}

/// Narrative text with every located command tag removed.
pub fn strip_commands(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for span in tokenize_commands(text).into_iter().flatten() {
        out.push_str(&text[last..span.range.start]);
        last = span.range.end;
    }
    out.push_str(&text[last..]);
    out
}
