use crate::{parser::Parser, FieldNode, ParseResult};

/// One query path: `posts(limit: 3).author.name|email`. Each group lists sibling fields, every
/// field of a non-final group is a relation the rest of the path descends into.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPath {
    pub groups: Vec<Vec<FieldNode>>,
}

/// Parses `path ("," path)*` where `path := group ("." group)*` and `group := field ("|" field)*`.
pub fn parse_query(input: &str) -> ParseResult<Vec<FieldPath>> {
    let mut parser = Parser::new(input);
    let mut paths = Vec::new();
    loop {
        paths.push(path(&mut parser)?);
        parser.skip_whitespace();
        match parser.peek() {
            None => return Ok(paths),
            Some(',') => {
                parser.eat(',');
            }
            Some(_) => return Err(parser.unexpected("',', '.', '|' or the end of the query")),
        }
    }
}

fn path(parser: &mut Parser<'_>) -> ParseResult<FieldPath> {
    let mut groups = Vec::new();
    loop {
        let mut group = vec![parser.field()?];
        parser.skip_whitespace();
        while parser.eat('|') {
            group.push(parser.field()?);
            parser.skip_whitespace();
        }
        groups.push(group);
        if !parser.eat('.') {
            return Ok(FieldPath { groups });
        }
    }
}
