//! Free-text matching

use crate::model::{Find, Trench};

/// Lower-case the query and split it on whitespace
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// True when every token is a substring of the joined fields.
/// No tokens means the text dimension is inactive.
fn all_tokens_in<'a>(fields: impl IntoIterator<Item = Option<&'a str>>, tokens: &[String]) -> bool {
    if tokens.is_empty() {
        return true;
    }

    let mut haystack = String::new();
    for field in fields.into_iter().flatten() {
        haystack.push(' ');
        haystack.push_str(field);
    }
    let haystack = haystack.to_lowercase();

    tokens.iter().all(|token| haystack.contains(token.as_str()))
}

/// Match against code, name and project
pub fn trench_matches(trench: &Trench, tokens: &[String]) -> bool {
    all_tokens_in(
        [
            Some(trench.code.as_str()),
            trench.name.as_deref(),
            trench.project.as_deref(),
        ],
        tokens,
    )
}

/// Match against code, description and the denormalized trench/level labels
pub fn find_matches(find: &Find, tokens: &[String]) -> bool {
    all_tokens_in(
        [
            Some(find.code.as_str()),
            find.description.as_deref(),
            find.trench_code.as_deref(),
            find.trench_name.as_deref(),
            find.level_name.as_deref(),
        ],
        tokens,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trench(code: &str, name: Option<&str>, project: Option<&str>) -> Trench {
        Trench {
            id: 1,
            code: code.to_string(),
            name: name.map(str::to_string),
            project: project.map(str::to_string),
            description: None,
            vertices: Vec::new(),
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("  B2   Bronze\tAge "), vec!["b2", "bronze", "age"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_trench_all_tokens_required() {
        let t = trench("B2", Some("North Sector"), Some("Kültepe"));
        assert!(trench_matches(&t, &tokenize("b2 north")));
        assert!(trench_matches(&t, &tokenize("KÜLTEPE")));
        assert!(!trench_matches(&t, &tokenize("b2 south")));
        assert!(trench_matches(&t, &[]));
    }

    #[test]
    fn test_find_matches_denormalized_fields() {
        let f = Find {
            id: 1,
            code: "B2-001".to_string(),
            description: Some("Bronze pin".to_string()),
            z: None,
            found_at: None,
            trench_id: Some(10),
            trench_code: Some("B2".to_string()),
            trench_name: Some("North".to_string()),
            level_name: Some("Level 3".to_string()),
            lat: None,
            lon: None,
        };
        assert!(find_matches(&f, &tokenize("pin level")));
        assert!(find_matches(&f, &tokenize("north")));
        assert!(!find_matches(&f, &tokenize("iron")));
    }
}
