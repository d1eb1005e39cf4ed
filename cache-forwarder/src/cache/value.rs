//! Values stored in the NICOS cache.
//!
//! The cache transports values as Python literal reprs (`10.5`, `'idle'`,
//! `(200, 'idle')`, `None`). [`CacheValue::parse`] turns them into a typed
//! value; anything unrecognised is kept verbatim as [`CacheValue::Raw`].

use std::fmt;

/// Deepest tuple/list nesting accepted before a value is kept as raw text.
const MAX_NESTING: usize = 32;

/// A decoded cache value.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<CacheValue>),
    List(Vec<CacheValue>),
    /// Text that is not a literal we understand.
    Raw(String),
}

impl CacheValue {
    /// Parse a Python literal repr.
    ///
    /// Never fails: input that cannot be parsed becomes [`CacheValue::Raw`].
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return CacheValue::None;
        }

        let mut parser = LiteralParser::new(trimmed);
        match parser.parse_value() {
            Some(value) if parser.at_end() => value,
            _ => CacheValue::Raw(trimmed.to_string()),
        }
    }

    /// The value as a float, if it is numeric.
    ///
    /// Only integers and floats count as numeric; booleans, strings and
    /// sequences do not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CacheValue::Int(v) => Some(*v as f64),
            CacheValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// First element of a tuple or list.
    pub fn first(&self) -> Option<&CacheValue> {
        match self {
            CacheValue::Tuple(items) | CacheValue::List(items) => items.first(),
            _ => None,
        }
    }
}

impl fmt::Display for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheValue::None => write!(f, "None"),
            CacheValue::Bool(true) => write!(f, "True"),
            CacheValue::Bool(false) => write!(f, "False"),
            CacheValue::Int(v) => write!(f, "{}", v),
            CacheValue::Float(v) => write!(f, "{:?}", v),
            CacheValue::Str(s) => write!(f, "{:?}", s),
            CacheValue::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            CacheValue::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            CacheValue::Raw(s) => write!(f, "{}", s),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[CacheValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Recursive-descent parser over a subset of Python literal syntax.
struct LiteralParser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos == self.input.len()
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn parse_value(&mut self) -> Option<CacheValue> {
        self.skip_ws();
        match self.peek()? {
            '(' => self.parse_sequence('(', ')').map(CacheValue::Tuple),
            '[' => self.parse_sequence('[', ']').map(CacheValue::List),
            '\'' | '"' => self.parse_string().map(CacheValue::Str),
            _ => self.parse_atom(),
        }
    }

    fn parse_sequence(&mut self, open: char, close: char) -> Option<Vec<CacheValue>> {
        if self.depth == MAX_NESTING || !self.eat(open) {
            return None;
        }
        self.depth += 1;
        let items = self.parse_items(close);
        self.depth -= 1;
        items
    }

    fn parse_items(&mut self, close: char) -> Option<Vec<CacheValue>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Some(items);
            }
            items.push(self.parse_value()?);
            if self.eat(',') {
                continue;
            }
            if self.eat(close) {
                return Some(items);
            }
            return None;
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.peek()?;
        self.pos += 1;
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c if c == quote => {
                    self.pos += i + 1;
                    return Some(out);
                }
                c => out.push(c),
            }
        }
        None
    }

    fn parse_atom(&mut self) -> Option<CacheValue> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c == ',' || c == ')' || c == ']' || c.is_whitespace())
            .unwrap_or(rest.len());
        let token = &rest[..len];
        if token.is_empty() {
            return None;
        }

        let value = match token {
            "None" => CacheValue::None,
            "True" => CacheValue::Bool(true),
            "False" => CacheValue::Bool(false),
            "inf" => CacheValue::Float(f64::INFINITY),
            "-inf" => CacheValue::Float(f64::NEG_INFINITY),
            "nan" => CacheValue::Float(f64::NAN),
            _ => {
                if let Ok(v) = token.parse::<i64>() {
                    CacheValue::Int(v)
                } else if looks_like_float(token) {
                    CacheValue::Float(token.parse::<f64>().ok()?)
                } else {
                    return None;
                }
            }
        };

        self.pos += len;
        Some(value)
    }
}

/// Rust's float parser also accepts words like "infinity"; only digits,
/// signs, dots and exponents are Python float reprs.
fn looks_like_float(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
}
