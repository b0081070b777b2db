use std::collections::BTreeMap;

use sv_core::{ErrorKind, VarError};

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':' | '.')
}

fn attr_error(name: &str, message: String) -> VarError {
    // A broken `value` is a literal problem; anything else is a broken tag.
    let kind = if name == "value" {
        ErrorKind::MalformedLiteral
    } else {
        ErrorKind::MalformedCommand
    };
    VarError::new(kind, message)
}

/// Strict `key="value"` / `key='value'` list. Bare attributes and unquoted values are errors.
pub(crate) fn parse_attributes(raw: &str) -> Result<BTreeMap<String, String>, VarError> {
    let mut out = BTreeMap::new();
    let mut chars = raw.char_indices().peekable();

    loop {
        while chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}
        let Some(&(name_start, first)) = chars.peek() else {
            break;
        };
        if !is_name_char(first) {
            return Err(VarError::new(
                ErrorKind::MalformedCommand,
                format!("Unexpected character '{}' in tag attributes.", first),
            ));
        }
        let mut name_end = name_start;
        while let Some((index, ch)) = chars.next_if(|(_, ch)| is_name_char(*ch)) {
            name_end = index + ch.len_utf8();
        }
        let name = raw[name_start..name_end].to_string();

        while chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}
        if chars.next_if(|(_, ch)| *ch == '=').is_none() {
            return Err(attr_error(
                &name,
                format!("Attribute \"{}\" has no value.", name),
            ));
        }
        while chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}

        let quote = match chars.next() {
            Some((_, ch @ ('"' | '\''))) => ch,
            _ => {
                return Err(attr_error(
                    &name,
                    format!("Attribute \"{}\" value must be quoted.", name),
                ))
            }
        };
        let mut value = String::new();
        let mut closed = false;
        for (_, ch) in chars.by_ref() {
            if ch == quote {
                closed = true;
                break;
            }
            value.push(ch);
        }
        if !closed {
            return Err(attr_error(
                &name,
                format!("Attribute \"{}\" value is not terminated.", name),
            ));
        }

        if out.insert(name.clone(), decode_entities(&value)).is_some() {
            return Err(VarError::new(
                ErrorKind::MalformedCommand,
                format!("Attribute \"{}\" is repeated.", name),
            ));
        }
    }

    Ok(out)
}

pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod attrs_tests {
    use super::*;

    #[test]
    fn parses_both_quote_styles_and_entities() {
        let attrs = parse_attributes(r#" name="ToDoList.currentToDoList" value='[{"task":"&lt;a&gt;"}]' "#)
            .expect("attributes should parse");
        assert_eq!(attrs["name"], "ToDoList.currentToDoList");
        assert_eq!(attrs["value"], r#"[{"task":"<a>"}]"#);

        let attrs = parse_attributes(r#"value="{&quot;a&quot;:1}""#).expect("entities");
        assert_eq!(attrs["value"], r#"{"a":1}"#);
    }

    #[test]
    fn empty_quoted_value_is_allowed() {
        let attrs = parse_attributes(r#"name="x" value="""#).expect("empty value");
        assert_eq!(attrs["value"], "");
    }

    #[test]
    fn missing_value_after_equals_is_a_literal_error() {
        let error = parse_attributes(r#" name="x" value="#).expect_err("missing value");
        assert_eq!(error.kind, ErrorKind::MalformedLiteral);
        let error = parse_attributes(r#"name=x"#).expect_err("unquoted name");
        assert_eq!(error.kind, ErrorKind::MalformedCommand);
    }

    #[test]
    fn rejects_bare_repeated_and_unterminated_attributes() {
        assert!(parse_attributes("name").is_err());
        assert!(parse_attributes(r#"name="a" name="b""#).is_err());
        assert!(parse_attributes(r#"value="open"#).is_err());
        assert!(parse_attributes(r#"="x""#).is_err());
    }
}
