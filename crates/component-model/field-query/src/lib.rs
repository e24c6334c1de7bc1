//! The field/directive query language.
//!
//! A field is written `name(arg: value, ...)@alias<directive(...)<nested>, ...>`. Argument values
//! are quoted strings, bare literals, `$variables`, `%expressions%`, `[lists, key=value]` or
//! nested field calls such as `isStatus(status: draft)`. Everything is parsed once into the AST
//! of [`ast`], and printed back in a canonical form through `Display`.

mod ast;
mod error;
mod field;
mod parser;
mod query;

pub use ast::*;
pub use error::*;
pub use field::Field;
pub use query::{parse_query, FieldPath};

use parser::Parser;

pub fn parse_field(input: &str) -> ParseResult<FieldNode> {
    let mut parser = Parser::new(input);
    let field = parser.field()?;
    parser.finish()?;
    Ok(field)
}

/// Parses a directive annotation, `<a, b(x: 1)>`.
pub fn parse_directives(input: &str) -> ParseResult<Vec<DirectiveNode>> {
    let mut parser = Parser::new(input);
    let directives = parser.directive_list()?;
    parser.finish()?;
    Ok(directives)
}

/// Parses a parenthesized argument list, `(a: 1, "b")`.
pub fn parse_arguments(input: &str) -> ParseResult<Vec<Argument>> {
    let mut parser = Parser::new(input);
    let arguments = parser.arguments()?;
    parser.finish()?;
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn single_value(input: &str) -> InputValue {
        let mut arguments = parse_arguments(&format!("({input})")).unwrap();
        assert_eq!(arguments.len(), 1);
        arguments.remove(0).value
    }

    #[rstest]
    #[case("3", InputValue::Const(json!(3)))]
    #[case("-2.5", InputValue::Const(json!(-2.5)))]
    #[case("true", InputValue::Const(json!(true)))]
    #[case("null", InputValue::Const(json!(null)))]
    #[case("draft", InputValue::Const(json!("draft")))]
    #[case("2020-01-31", InputValue::Const(json!("2020-01-31")))]
    #[case(r#""a, (b)""#, InputValue::Const(json!("a, (b)")))]
    #[case(r#""say \"hi\"""#, InputValue::Const(json!("say \"hi\"")))]
    #[case("$limit", InputValue::Variable("limit".into()))]
    #[case("% self %", InputValue::Expression("self".into()))]
    #[case("isStatus(status: draft)", InputValue::Field(Box::new(parse_field("isStatus(status: draft)").unwrap())))]
    fn values(#[case] input: &str, #[case] expected: InputValue) {
        assert_eq!(single_value(input), expected);
    }

    #[test]
    fn mixed_list() {
        let value = single_value("[1, key=two, [3]]");
        assert_eq!(
            value,
            InputValue::List(vec![
                ListItem {
                    key: None,
                    value: InputValue::Const(json!(1)),
                },
                ListItem {
                    key: Some("key".into()),
                    value: InputValue::Const(json!("two")),
                },
                ListItem {
                    key: None,
                    value: InputValue::List(vec![ListItem {
                        key: None,
                        value: InputValue::Const(json!(3)),
                    }]),
                },
            ])
        );
    }

    #[test]
    fn named_and_positional_arguments() {
        let field = parse_field("posts(limit=3, 10, order: title)").unwrap();
        let names: Vec<_> = field.arguments.iter().map(|argument| argument.name.as_deref()).collect();
        assert_eq!(names, vec![Some("limit"), None, Some("order")]);
    }

    #[test]
    fn field_with_alias_and_nested_directives() {
        let field = parse_field("title @heading <if(condition: isPublished())<upperCase>, default(value: \"-\")>").unwrap();

        assert_eq!(field.alias.as_deref(), Some("heading"));
        assert_eq!(field.directives.len(), 2);
        assert_eq!(field.directives[0].nested[0].name, "upperCase");
        assert_snapshot!(field, @r#"title@heading<if(condition: isPublished())<upperCase>, default(value: "-")>"#);
        assert_snapshot!(field.output_key(), @"heading");
        assert_snapshot!(field.directives_key(), @r#"<if(condition: isPublished())<upperCase>, default(value: "-")>"#);
    }

    #[test]
    fn output_key_ignores_directives() {
        let field = parse_field("posts(limit:3)<skip(if: $hide)>").unwrap();
        assert_snapshot!(field.output_key(), @"posts(limit: 3)");
    }

    #[test]
    fn printing_is_a_fixed_point() {
        let inputs = [
            "posts(limit: 3, order: [title, direction=desc])",
            r#"echo(value: "line\nbreak \"quoted\"")"#,
            "isStatus(status: %status%)@draft<include(if: $showDrafts)>",
            "sum(values: [1, 2.5, -3])",
        ];
        for input in inputs {
            let field = parse_field(input).unwrap();
            let reparsed = parse_field(&field.to_string()).unwrap();
            assert_eq!(reparsed, field);
            assert_eq!(reparsed.to_string(), field.to_string());
        }
    }

    #[test]
    fn const_objects_print_as_keyed_lists() {
        let value = InputValue::Const(json!({"0": "a", "key": [1, 2]}));
        assert_snapshot!(value, @r#"[0="a", key=[1, 2]]"#);
    }

    #[rstest]
    #[case("posts(limit: 3", ParseError::UnexpectedEnd { expected: "',' or ')'" })]
    #[case("(", ParseError::Unexpected { found: '(', position: 0, expected: "a field name" })]
    #[case(r#"echo(value: "open)"#, ParseError::UnterminatedString { position: 12 })]
    #[case("title<>", ParseError::Unexpected { found: '>', position: 6, expected: "a directive name" })]
    #[case("title extra", ParseError::Unexpected { found: 'e', position: 6, expected: "the end of the input" })]
    fn errors(#[case] input: &str, #[case] expected: ParseError) {
        assert_eq!(parse_field(input).unwrap_err(), expected);
    }

    #[test]
    fn fields_compare_by_canonical_text() {
        let spaced = Field::parse("posts( limit : 3 )").unwrap();
        let compact = Field::parse("posts(limit:3)").unwrap();
        assert_eq!(spaced, compact);
        assert_eq!(spaced.key(), "posts(limit: 3)");
    }
}
