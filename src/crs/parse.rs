//! Parser for WKT coordinate reference system definitions (the `.prj` format).

use anyhow::{bail, Context, Result};

/// One argument of a WKT node.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Value {
    Text(String),
    Number(f64),
    Word(String),
    Node(Node),
}

/// `KEYWORD[arg, arg, ...]`
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Node {
    pub(crate) keyword: String,
    pub(crate) args: Vec<Value>,
}

impl Node {
    /// First child node with the given keyword (case-insensitive).
    pub(crate) fn child(&self, keyword: &str) -> Option<&Node> {
        self.args.iter().find_map(|arg| match arg {
            Value::Node(node) if node.is(keyword) => Some(node),
            _ => None,
        })
    }

    pub(crate) fn children<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.args.iter().filter_map(move |arg| match arg {
            Value::Node(node) if node.is(keyword) => Some(node),
            _ => None,
        })
    }

    /// The node's quoted name, i.e. its first argument.
    pub(crate) fn name(&self) -> Option<&str> {
        match self.args.first() {
            Some(Value::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn number(&self, index: usize) -> Option<f64> {
        match self.args.get(index) {
            Some(Value::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub(crate) fn is(&self, keyword: &str) -> bool { self.keyword.eq_ignore_ascii_case(keyword) }
}

/// Parse a complete WKT CRS definition into its root node.
pub(crate) fn parse(input: &str) -> Result<Node> {
    let mut parser = Parser { src: input.as_bytes(), pos: 0 };
    let node = parser.node().context("malformed WKT spatial reference")?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        bail!("malformed WKT spatial reference: trailing input at offset {}", parser.pos);
    }
    Ok(node)
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> { self.src.get(self.pos).copied() }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) { self.pos += 1 }
    }

    fn word(&mut self) -> Result<String> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_') { self.pos += 1 }
        if start == self.pos {
            bail!("expected a keyword at offset {start}");
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn node(&mut self) -> Result<Node> {
        let keyword = self.word()?;
        self.skip_ws();
        let close = match self.peek() {
            Some(b'[') => b']',
            Some(b'(') => b')',
            _ => bail!("expected '[' after {keyword} at offset {}", self.pos),
        };
        self.pos += 1;

        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(Node { keyword, args });
        }
        loop {
            args.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {
                    self.pos += 1;
                    return Ok(Node { keyword, args });
                }
                _ => bail!("expected ',' or '{}' in {keyword} at offset {}", close as char, self.pos),
            }
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_ws();
        match self.peek() {
            Some(b'"') => self.text().map(Value::Text),
            Some(b) if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() => self.number().map(Value::Number),
            Some(b) if b.is_ascii_alphabetic() => {
                let save = self.pos;
                let word = self.word()?;
                self.skip_ws();
                if matches!(self.peek(), Some(b'[') | Some(b'(')) {
                    self.pos = save;
                    self.node().map(Value::Node)
                } else {
                    Ok(Value::Word(word))
                }
            }
            _ => bail!("unexpected input at offset {}", self.pos),
        }
    }

    fn text(&mut self) -> Result<String> {
        self.pos += 1; // opening quote
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => bail!("unterminated string"),
                Some(b'"') if self.src.get(self.pos + 1) == Some(&b'"') => {
                    out.push(b'"');
                    self.pos += 2;
                }
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(String::from_utf8_lossy(&out).into_owned());
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E')) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])?;
        text.parse::<f64>().with_context(|| format!("invalid number {text:?} at offset {start}"))
    }
}
