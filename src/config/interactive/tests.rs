use super::*;

#[test]
fn parses_comma_separated_types() {
    assert_eq!(
        parse_types_input("post, page, product"),
        vec!["post", "page", "product"]
    );
}

#[test]
fn normalizes_case_and_whitespace() {
    assert_eq!(parse_types_input("  Post ,PAGE  "), vec!["post", "page"]);
}

#[test]
fn drops_empty_segments() {
    assert_eq!(parse_types_input("post,,page,"), vec!["post", "page"]);
    assert!(parse_types_input("  ,  ").is_empty());
    assert!(parse_types_input("").is_empty());
}
