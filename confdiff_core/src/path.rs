//! Location paths into a value tree and their canonical rendering.

use confdiff_common::EvalError;
use std::fmt;

const RESERVED_KEYWORDS: &[&str] = &[
    "if", "then", "else", "assert", "with", "let", "in", "rec", "inherit",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Attribute name
    Name(String),
    /// List position
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttrPath {
    segments: Vec<Segment>,
}

impl AttrPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of the final segment, if it is an attribute
    pub fn last_name(&self) -> Option<&str> {
        match self.segments.last() {
            Some(Segment::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }

    pub fn name(&self, name: impl Into<String>) -> Self {
        self.child(Segment::Name(name.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    /// Parse a dotted attribute path such as `services."my.site".ports.0`.
    ///
    /// Segments made only of digits select list positions; quoted segments
    /// are always attribute names.
    pub fn parse(input: &str) -> Result<Self, EvalError> {
        let mut path = Self::root();
        if input.is_empty() {
            return Ok(path);
        }

        let mut chars = input.chars().peekable();
        loop {
            let segment = if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('n') => name.push('\n'),
                            Some('r') => name.push('\r'),
                            Some('t') => name.push('\t'),
                            Some(other) => name.push(other),
                            None => break,
                        },
                        other => name.push(other),
                    }
                }
                if !closed {
                    return Err(EvalError::InvalidPath(format!(
                        "unterminated quoted segment in '{}'",
                        input
                    )));
                }
                Segment::Name(name)
            } else {
                let mut raw = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' {
                        break;
                    }
                    raw.push(c);
                    chars.next();
                }
                if raw.is_empty() {
                    return Err(EvalError::InvalidPath(format!("empty segment in '{}'", input)));
                }
                let canonical = raw.chars().all(|c| c.is_ascii_digit())
                    && (raw == "0" || !raw.starts_with('0'));
                match raw.parse::<usize>() {
                    Ok(index) if canonical => Segment::Index(index),
                    _ => Segment::Name(raw),
                }
            };
            path.segments.push(segment);

            match chars.next() {
                None => return Ok(path),
                Some('.') if chars.peek().is_some() => {}
                Some(other) => {
                    return Err(EvalError::InvalidPath(format!(
                        "unexpected '{}' in '{}'",
                        other, input
                    )))
                }
            }
        }
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Name(name) => f.write_str(&quote_attribute(name))?,
                Segment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

/// Whether `name` can appear unquoted as an attribute.
pub fn is_bare_identifier(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    if RESERVED_KEYWORDS.contains(&name) {
        return false;
    }
    if first.is_ascii_digit() || first == '-' || first == '\'' {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '\'')
}

pub fn quote_attribute(name: &str) -> String {
    if is_bare_identifier(name) {
        name.to_string()
    } else {
        quote_string(name)
    }
}

/// Render `text` as a double-quoted string literal.
pub fn quote_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_identifiers() {
        assert!(is_bare_identifier("enable"));
        assert!(is_bare_identifier("fooBar-2"));
        assert!(is_bare_identifier("_private"));
        assert!(is_bare_identifier("x'"));
        assert!(!is_bare_identifier(""));
        assert!(!is_bare_identifier("1abc"));
        assert!(!is_bare_identifier("-flag"));
        assert!(!is_bare_identifier("'quoted"));
        assert!(!is_bare_identifier("with"));
        assert!(!is_bare_identifier("a.b"));
        assert!(!is_bare_identifier("héllo"));
    }

    #[test]
    fn test_segment_quoting() {
        let base = AttrPath::root().name("services");
        assert_eq!(base.name("1abc").to_string(), "services.\"1abc\"");
        assert_eq!(base.name("fooBar-2").to_string(), "services.fooBar-2");
        assert_eq!(base.name("inherit").to_string(), "services.\"inherit\"");
    }

    #[test]
    fn test_root_segment_has_no_leading_dot() {
        assert_eq!(AttrPath::root().to_string(), "");
        assert_eq!(AttrPath::root().name("a").to_string(), "a");
        assert_eq!(AttrPath::root().index(3).to_string(), "3");
        assert_eq!(AttrPath::root().name("xs").index(2).to_string(), "xs.2");
    }

    #[test]
    fn test_quote_string_escapes() {
        assert_eq!(quote_string("plain"), "\"plain\"");
        assert_eq!(quote_string("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote_string("a\\b"), "\"a\\\\b\"");
        assert_eq!(quote_string("line\nnext\t"), "\"line\\nnext\\t\"");
        assert_eq!(quote_string("${x} $y"), "\"\\${x} $y\"");
    }

    #[test]
    fn test_parse_dotted_path() {
        let path = AttrPath::parse("services.nginx.virtualHosts").unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.last_name(), Some("virtualHosts"));
    }

    #[test]
    fn test_parse_indices_and_quotes() {
        let path = AttrPath::parse("listen.0.\"my.site\"").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Name("listen".to_string()),
                Segment::Index(0),
                Segment::Name("my.site".to_string()),
            ]
        );
        assert_eq!(path.to_string(), "listen.0.\"my.site\"");
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert!(AttrPath::parse("a..b").is_err());
        assert!(AttrPath::parse("a.").is_err());
        assert!(AttrPath::parse("\"open").is_err());
        assert!(AttrPath::parse("\"a\"b").is_err());
    }

    #[test]
    fn test_or_is_a_bare_name() {
        assert!(is_bare_identifier("or"));
        assert_eq!(AttrPath::root().name("or").to_string(), "or");
        assert_eq!(AttrPath::root().name("x").name("or").to_string(), "x.or");
    }

    #[test]
    fn test_parse_leading_zero_is_a_name() {
        let path = AttrPath::parse("a.01").unwrap();
        assert_eq!(
            path.segments(),
            &[Segment::Name("a".to_string()), Segment::Name("01".to_string())]
        );
        assert_eq!(path.to_string(), "a.\"01\"");
        assert_eq!(AttrPath::parse("a.0").unwrap().segments()[1], Segment::Index(0));
        assert_eq!(AttrPath::parse("a.10").unwrap().segments()[1], Segment::Index(10));
    }

    #[test]
    fn test_parse_empty_is_root() {
        assert!(AttrPath::parse("").unwrap().is_empty());
    }
}
