//! Literal-value parsing for semantic output comparison.
//!
//! Judge output comparison is structural when possible: both sides are parsed
//! as Python-style literals (numbers, booleans, strings, lists, tuples,
//! nested combinations) and compared by value, so `[1, 2, 3]` matches
//! `[1,2,3]` and `1.0` matches `1`. When either side fails to parse, the
//! comparison falls back to trimmed string equality.

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// Lists and tuples compare equal when their elements do; the judge does
    /// not distinguish bracket style.
    Seq(Vec<Literal>),
    None,
}

impl Literal {
    /// Structural equality with numeric promotion (`1 == 1.0`).
    pub fn semantically_equals(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => (a - b).abs() < 1e-9,
            (Literal::Int(a), Literal::Float(b)) | (Literal::Float(b), Literal::Int(a)) => {
                (*a as f64 - b).abs() < 1e-9
            }
            (Literal::Bool(a), Literal::Bool(b)) => a == b,
            (Literal::Str(a), Literal::Str(b)) => a == b,
            (Literal::Seq(a), Literal::Seq(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.semantically_equals(y))
            }
            (Literal::None, Literal::None) => true,
            _ => false,
        }
    }
}

/// Parse a complete literal; returns `None` on trailing garbage or malformed
/// input.
pub fn parse_literal(input: &str) -> Option<Literal> {
    let mut parser = Parser {
        chars: input.trim().char_indices().collect(),
        pos: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos == parser.chars.len() {
        Some(value)
    } else {
        None
    }
}

/// Semantic output comparison: literal-parse both sides and compare
/// structurally, falling back to trimmed string equality.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    let actual = actual.trim().trim_end_matches(['\r', '\n']);
    let expected = normalize_expected(expected);

    match (parse_literal(actual), parse_literal(&expected)) {
        (Some(a), Some(e)) => a.semantically_equals(&e),
        _ => actual == expected,
    }
}

/// Authors sometimes store expected output wrapped in double quotes; strip
/// one balanced layer before comparing.
fn normalize_expected(expected: &str) -> String {
    let trimmed = expected.trim().trim_end_matches(['\r', '\n']);
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Option<Literal> {
        self.skip_whitespace();
        match self.peek()? {
            '[' => self.parse_seq(']'),
            '(' => self.parse_seq(')'),
            '\'' | '"' => self.parse_string(),
            c if c.is_ascii_digit() || c == '-' || c == '+' => self.parse_number(),
            _ => self.parse_word(),
        }
    }

    fn parse_seq(&mut self, close: char) -> Option<Literal> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek()? == close {
                self.bump();
                return Some(Literal::Seq(items));
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek()? {
                ',' => {
                    self.bump();
                }
                c if c == close => {}
                _ => return None,
            }
        }
    }

    fn parse_string(&mut self) -> Option<Literal> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            match self.bump()? {
                '\\' => {
                    let escaped = self.bump()?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c == quote => return Some(Literal::Str(out)),
                c => out.push(c),
            }
        }
    }

    fn parse_number(&mut self) -> Option<Literal> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.' && !is_float {
                is_float = true;
                self.bump();
            } else if (c == 'e' || c == 'E') && self.pos > start {
                is_float = true;
                self.bump();
                if matches!(self.peek(), Some('-' | '+')) {
                    self.bump();
                }
            } else {
                break;
            }
        }

        let text: String = self.chars[start..self.pos].iter().map(|&(_, c)| c).collect();
        if is_float {
            text.parse().ok().map(Literal::Float)
        } else {
            text.parse().ok().map(Literal::Int)
        }
    }

    fn parse_word(&mut self) -> Option<Literal> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.bump();
        }
        let word: String = self.chars[start..self.pos].iter().map(|&(_, c)| c).collect();
        match word.as_str() {
            "True" | "true" => Some(Literal::Bool(true)),
            "False" | "false" => Some(Literal::Bool(false)),
            "None" | "null" => Some(Literal::None),
            _ => None,
        }
    }
}
