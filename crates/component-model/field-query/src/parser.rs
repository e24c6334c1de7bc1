use serde_json::{Number, Value};

use crate::{Argument, DirectiveNode, FieldNode, InputValue, ListItem, ParseError, ParseResult};

/// Recursive descent over the query text. Positions are byte offsets.
pub(crate) struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Parser { input, pos: 0 }
    }

    pub(crate) fn finish(&mut self) -> ParseResult<()> {
        self.skip_whitespace();
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("the end of the input")),
        }
    }

    pub(crate) fn field(&mut self) -> ParseResult<FieldNode> {
        self.skip_whitespace();
        let name = self.expect_name("a field name")?;
        self.skip_whitespace();
        let arguments = if self.peek() == Some('(') {
            self.arguments()?
        } else {
            Vec::new()
        };
        self.skip_whitespace();
        let alias = if self.eat('@') {
            self.skip_whitespace();
            Some(self.expect_name("an alias")?.to_owned())
        } else {
            None
        };
        self.skip_whitespace();
        let directives = if self.peek() == Some('<') {
            self.directive_list()?
        } else {
            Vec::new()
        };
        Ok(FieldNode {
            name: name.to_owned(),
            alias,
            arguments,
            directives,
        })
    }

    pub(crate) fn directive_list(&mut self) -> ParseResult<Vec<DirectiveNode>> {
        self.skip_whitespace();
        self.expect('<', "'<'")?;
        let mut directives = Vec::new();
        loop {
            directives.push(self.directive()?);
            if self.separator('>')? {
                return Ok(directives);
            }
        }
    }

    fn directive(&mut self) -> ParseResult<DirectiveNode> {
        self.skip_whitespace();
        let name = self.expect_name("a directive name")?;
        self.skip_whitespace();
        let arguments = if self.peek() == Some('(') {
            self.arguments()?
        } else {
            Vec::new()
        };
        self.skip_whitespace();
        let nested = if self.peek() == Some('<') {
            self.directive_list()?
        } else {
            Vec::new()
        };
        Ok(DirectiveNode {
            name: name.to_owned(),
            arguments,
            nested,
        })
    }

    pub(crate) fn arguments(&mut self) -> ParseResult<Vec<Argument>> {
        self.skip_whitespace();
        self.expect('(', "'('")?;
        self.skip_whitespace();
        let mut arguments = Vec::new();
        if self.eat(')') {
            return Ok(arguments);
        }
        loop {
            arguments.push(self.argument()?);
            if self.separator(')')? {
                return Ok(arguments);
            }
        }
    }

    fn argument(&mut self) -> ParseResult<Argument> {
        self.skip_whitespace();
        let checkpoint = self.pos;
        if let Some(name) = self.name() {
            self.skip_whitespace();
            if self.eat(':') || self.eat('=') {
                return Ok(Argument::named(name, self.value()?));
            }
        }
        self.pos = checkpoint;
        Ok(Argument::positional(self.value()?))
    }

    fn value(&mut self) -> ParseResult<InputValue> {
        self.skip_whitespace();
        match self.peek() {
            Some('"') => self.string().map(|string| InputValue::Const(Value::String(string))),
            Some('$') => {
                self.bump();
                Ok(InputValue::Variable(self.expect_name("a variable name")?.to_owned()))
            }
            Some('%') => {
                self.bump();
                self.skip_whitespace();
                let name = self.expect_name("an expression name")?;
                self.skip_whitespace();
                self.expect('%', "'%'")?;
                Ok(InputValue::Expression(name.to_owned()))
            }
            Some('[') => self.list(),
            Some(_) => self.bare(),
            None => Err(ParseError::UnexpectedEnd { expected: "a value" }),
        }
    }

    fn list(&mut self) -> ParseResult<InputValue> {
        self.expect('[', "'['")?;
        self.skip_whitespace();
        let mut items = Vec::new();
        if self.eat(']') {
            return Ok(InputValue::List(items));
        }
        loop {
            items.push(self.list_item()?);
            if self.separator(']')? {
                return Ok(InputValue::List(items));
            }
        }
    }

    fn list_item(&mut self) -> ParseResult<ListItem> {
        self.skip_whitespace();
        let checkpoint = self.pos;
        if let Some(key) = self.name() {
            self.skip_whitespace();
            if self.eat('=') {
                return Ok(ListItem {
                    key: Some(key.to_owned()),
                    value: self.value()?,
                });
            }
        }
        self.pos = checkpoint;
        Ok(ListItem {
            key: None,
            value: self.value()?,
        })
    }

    /// Either a field call, `name(...)`, or a bare literal running up to the next delimiter.
    fn bare(&mut self) -> ParseResult<InputValue> {
        let start = self.pos;
        if self.name().is_some() && self.peek() == Some('(') {
            self.pos = start;
            return Ok(InputValue::Field(Box::new(self.field()?)));
        }
        while let Some(c) = self.peek() {
            if matches!(c, ',' | ')' | ']') {
                break;
            }
            self.bump();
        }
        let raw = self.input[start..self.pos].trim();
        if raw.is_empty() {
            return Err(self.unexpected("a value"));
        }
        Ok(InputValue::Const(literal(raw)))
    }

    fn string(&mut self) -> ParseResult<String> {
        let start = self.pos;
        self.bump();
        let mut string = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(string),
                Some('\\') => match self.bump() {
                    Some('n') => string.push('\n'),
                    Some('t') => string.push('\t'),
                    Some(c) => string.push(c),
                    None => return Err(ParseError::UnterminatedString { position: start }),
                },
                Some(c) => string.push(c),
                None => return Err(ParseError::UnterminatedString { position: start }),
            }
        }
    }

    /// Consumes a `,` (returning false) or the closing delimiter (returning true).
    fn separator(&mut self, closing: char) -> ParseResult<bool> {
        self.skip_whitespace();
        match self.peek() {
            Some(',') => {
                self.bump();
                Ok(false)
            }
            Some(c) if c == closing => {
                self.bump();
                Ok(true)
            }
            _ => Err(self.unexpected(match closing {
                ')' => "',' or ')'",
                ']' => "',' or ']'",
                _ => "',' or '>'",
            })),
        }
    }

    fn name(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.bump();
        }
        (self.pos > start).then(|| &self.input[start..self.pos])
    }

    fn expect_name(&mut self, expected: &'static str) -> ParseResult<&'a str> {
        match self.name() {
            Some(name) => Ok(name),
            None => Err(self.unexpected(expected)),
        }
    }

    fn expect(&mut self, c: char, expected: &'static str) -> ParseResult<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub(crate) fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    pub(crate) fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            Some(found) => ParseError::Unexpected {
                found,
                position: self.pos,
                expected,
            },
            None => ParseError::UnexpectedEnd { expected },
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn literal(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(int) = raw.parse::<i64>() {
                return Value::Number(int.into());
            }
            match raw.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(number) => Value::Number(number),
                None => Value::String(raw.to_owned()),
            }
        }
    }
}
