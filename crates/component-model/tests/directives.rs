#![allow(unused_crate_dependencies)]

mod common;

use common::{field, fields, ids, value, Blog};
use component_model::{EngineConfig, FailurePolicy, FeedbackEntry, FeedbackKind, ObligationTree, Variables};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(true, None)]
#[case(false, Some(json!("Hello world")))]
fn skip_reads_variables(#[case] hide: bool, #[case] expected: Option<serde_json::Value>) {
    let blog = Blog::default();
    let variables = Variables::default().with("hide", json!(hide));

    let output = blog.run_with("posts(limit: 1).title<skip(if: $hide)>|status", &variables);

    assert_eq!(value(&output, "post", "1", "title"), expected.as_ref());
    assert_eq!(value(&output, "post", "1", "status"), Some(&json!("published")));
}

#[test]
fn include_evaluates_field_calls_per_entity() {
    let blog = Blog::default();

    let output = blog.run("posts.title<include(if: isPublished())>");

    assert_eq!(ids(&output, "post"), vec!["1", "2", "3", "4"]);
    assert_eq!(value(&output, "post", "1", "title"), Some(&json!("Hello world")));
    assert_eq!(value(&output, "post", "2", "title"), None);
    assert_eq!(value(&output, "post", "3", "title"), Some(&json!("Rust tips")));
}

#[test]
fn non_repeatable_directives_run_once() {
    let blog = Blog::default();

    let output = blog.run(r#"posts(limit: 1).title<wrap(with: "*"), wrap(with: "_")>"#);

    assert_eq!(
        output.messages(FeedbackKind::SchemaError),
        vec!["Directive 'wrap' can be executed only once within a field, so the current execution (number 2) has been ignored"]
    );
    assert_eq!(output.schema_errors["primary"]["post"][0].path, vec!["title", "wrap"]);
    assert_eq!(value(&output, "post", "1", "title"), Some(&json!("*Hello world*")));
}

#[test]
fn restricted_directives_skip_other_fields() {
    let blog = Blog::default();

    let output = blog.run(r#"posts(limit: 1).status<wrap(with: "!")>"#);

    assert_eq!(
        output.schema_warnings["primary"]["post"].first(),
        Some(
            &FeedbackEntry::new("Directive 'wrap' doesn't support field 'status', so it has been ignored for it")
                .with_path(["status", "wrap"])
        )
    );
    assert_eq!(value(&output, "post", "1", "status"), Some(&json!("published")));
}

#[test]
fn conditional_directives_nest() {
    let blog = Blog::default();

    let output = blog.run("posts(limit: 2).title<if(condition: isPublished())<upperCase>>");

    assert_eq!(value(&output, "post", "1", "title"), Some(&json!("HELLO WORLD")));
    assert_eq!(value(&output, "post", "2", "title"), Some(&json!("Draft notes")));
}

#[test]
fn exported_expressions_feed_later_fields() {
    let blog = Blog::default();

    let output = blog.run("posts(limit: 1).title<exportExpression(as: heading)>|echo(value: %heading%)<upperCase>");

    assert_eq!(value(&output, "post", "1", "title"), Some(&json!("Hello world")));
    assert_eq!(
        value(&output, "post", "1", "echo(value: %heading%)"),
        Some(&json!("HELLO WORLD"))
    );
    assert!(output.query_errors.is_empty());
}

#[test]
fn defaults_replace_missing_values() {
    let blog = Blog::default();

    let output = blog.run(r#"posts(limit: 2).subtitle<default(value: "-")>"#);

    assert_eq!(value(&output, "post", "1", "subtitle"), Some(&json!("An introduction")));
    assert_eq!(value(&output, "post", "2", "subtitle"), Some(&json!("-")));
}

#[test]
fn case_directives_leave_other_values_unchanged() {
    let blog = Blog::default();

    let output = blog.run("posts(limit: 1).isFavorite<upperCase>");

    assert_eq!(value(&output, "post", "1", "isFavorite"), Some(&json!(true)));
    assert_eq!(
        output.messages(FeedbackKind::ResultWarning),
        vec!["Directive 'upperCase' can only transform strings, so value 'true' has been left unchanged"]
    );
    let warnings = &output.db_warnings["primary"]["post"]["1"];
    assert_eq!(warnings[0].path, vec!["isFavorite", "upperCase"]);
}

#[test]
fn gates_carry_their_own_directives() {
    let blog = Blog::default();
    let tree = ObligationTree::new().relation(
        field("posts(limit: 2)"),
        ObligationTree::new()
            .conditional(field("status<upperCase>"), fields(["title"]))
            .conditional(field(r#"subtitle<default(value: "-")>"#), fields(["content"])),
    );

    let output = blog.run_tree(tree);

    assert_eq!(value(&output, "post", "1", "status"), Some(&json!("PUBLISHED")));
    assert_eq!(value(&output, "post", "1", "title"), Some(&json!("Hello world")));
    assert_eq!(value(&output, "post", "1", "content"), Some(&json!("Welcome to the blog")));
    // The default replaces the value, not the gate's outcome.
    assert_eq!(value(&output, "post", "2", "subtitle"), Some(&json!("-")));
    assert_eq!(value(&output, "post", "2", "content"), None);
}

#[test]
fn unknown_directives_remove_their_fields() {
    let blog = Blog::default();

    let output = blog.run("posts(limit: 1).title<shout>|status");

    assert_eq!(
        output.schema_errors["primary"]["post"].first(),
        Some(&FeedbackEntry::new("No DirectiveResolver resolves directive with name 'shout'").with_path(["title", "shout"]))
    );
    assert_eq!(value(&output, "post", "1", "title"), None);
    assert_eq!(value(&output, "post", "1", "status"), Some(&json!("published")));
}

#[test]
fn unknown_directives_are_only_skipped_when_ignoring_failures() {
    let blog = Blog::with_config(EngineConfig {
        failure_policy: FailurePolicy::IgnoreAndWarn,
        ..Default::default()
    });

    let output = blog.run("posts(limit: 1).title<shout>");

    assert!(output.schema_errors.is_empty());
    assert_eq!(
        output.messages(FeedbackKind::SchemaWarning),
        vec!["No DirectiveResolver resolves directive with name 'shout'"]
    );
    assert_eq!(value(&output, "post", "1", "title"), Some(&json!("Hello world")));
}

#[test]
fn invalid_directive_arguments() {
    let blog = Blog::default();

    let output = blog.run("posts(limit: 1).title<skip>");

    assert_eq!(
        output.messages(FeedbackKind::SchemaError),
        vec![
            "Mandatory argument 'if' in directive 'skip' has not been provided",
            "This directive can't be processed due to previous errors",
        ]
    );
    assert_eq!(value(&output, "post", "1", "title"), None);
}
