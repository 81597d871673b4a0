use expressway::routing::{PathPattern, PatternError};

fn param(p: &PathPattern, path: &str, name: &str) -> Option<String> {
    p.matches(path)?.params.get(name).cloned()
}

#[test]
fn test_exact_pattern_with_param() {
    let p = PathPattern::parse("/users/:id", false).unwrap();

    assert_eq!(param(&p, "/users/42", "id").as_deref(), Some("42"));
    assert_eq!(param(&p, "/users/42/", "id").as_deref(), Some("42"));
    assert!(p.matches("/users/42/posts").is_none());
    assert!(p.matches("/users").is_none());
    assert_eq!(p.param_names(), ["id".to_string()]);
    assert!(!p.is_partial());
}

#[test]
fn test_exact_match_has_no_remainder() {
    let p = PathPattern::parse("/about", false).unwrap();
    let m = p.matches("/about").unwrap();

    assert_eq!(m.base, "/about");
    assert_eq!(m.rest, None);
}

#[test]
fn test_partial_pattern_reports_remainder() {
    let p = PathPattern::parse("/users", true).unwrap();

    let m = p.matches("/users/42/posts").unwrap();
    assert_eq!(m.base, "/users");
    assert_eq!(m.rest.as_deref(), Some("/42/posts"));

    assert_eq!(p.matches("/users").unwrap().rest.as_deref(), Some(""));
    assert!(p.matches("/usersx").is_none());
}

#[test]
fn test_root_mount_matches_everything() {
    let p = PathPattern::parse("/", true).unwrap();

    assert_eq!(p.source(), "");
    assert_eq!(p.matches("/").unwrap().rest.as_deref(), Some("/"));
    assert_eq!(p.matches("/a/b").unwrap().rest.as_deref(), Some("/a/b"));
}

#[test]
fn test_trailing_slash_source() {
    let p = PathPattern::new("/static/", Vec::new(), true).unwrap();
    let m = p.matches("/static/css/site.css").unwrap();

    assert_eq!(m.base, "/static/");
    assert_eq!(m.rest.as_deref(), Some("css/site.css"));
}

#[test]
fn test_optional_param() {
    let p = PathPattern::parse("/files/:name?", false).unwrap();

    assert!(p.matches("/files").is_some());
    assert_eq!(param(&p, "/files", "name"), None);
    assert_eq!(param(&p, "/files/report", "name").as_deref(), Some("report"));
}

#[test]
fn test_custom_param_regex() {
    let p = PathPattern::parse(r"/orders/:id(\d+)", false).unwrap();

    assert_eq!(param(&p, "/orders/1234", "id").as_deref(), Some("1234"));
    assert!(p.matches("/orders/abc").is_none());
}

#[test]
fn test_groups_inside_custom_regex_keep_params_aligned() {
    let p = PathPattern::parse("/:kind((cat|dog))/:id/*", false).unwrap();
    let m = p.matches("/dog/7/toys/ball").unwrap();

    assert_eq!(m.params.get("kind").map(String::as_str), Some("dog"));
    assert_eq!(m.params.get("id").map(String::as_str), Some("7"));
    assert_eq!(m.params.get("0").map(String::as_str), Some("toys/ball"));
    assert!(p.matches("/cow/7/x").is_none());
}

#[test]
fn test_wildcards_are_numbered() {
    let p = PathPattern::parse("/assets/*", false).unwrap();

    assert_eq!(param(&p, "/assets/css/site.css", "0").as_deref(), Some("css/site.css"));
}

#[test]
fn test_matching_ignores_case() {
    let p = PathPattern::parse("/Users/:id", false).unwrap();

    assert_eq!(param(&p, "/users/7", "id").as_deref(), Some("7"));
    assert_eq!(param(&p, "/USERS/7", "id").as_deref(), Some("7"));
}

#[test]
fn test_literals_are_escaped() {
    let p = PathPattern::parse("/file.txt", false).unwrap();

    assert!(p.matches("/file.txt").is_some());
    assert!(p.matches("/fileXtxt").is_none());
}

#[test]
fn test_equality_by_source_and_mode() {
    let a = PathPattern::parse("/same", false).unwrap();
    let b = PathPattern::parse("/same/", false).unwrap();
    let c = PathPattern::parse("/same", true).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_invalid_patterns() {
    assert!(matches!(
        PathPattern::parse("/bad/:id([)", false),
        Err(PatternError::Regex { .. })
    ));
    assert!(matches!(
        PathPattern::parse("/bad/:", false),
        Err(PatternError::UnnamedParam(_))
    ));
    assert!(matches!(
        PathPattern::parse("/bad/:id(\\d+", false),
        Err(PatternError::UnbalancedGroup(_))
    ));
}
