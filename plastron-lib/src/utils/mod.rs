use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

/// Split `text` on every `separator` that is not preceded by a backslash.
///
/// A backslash escapes the character that follows it, so `a\|b` yields the
/// single value `a|b`. A trailing lone backslash is kept as-is.
pub fn split_escaped(text: &str, separator: char) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push(c),
            }
        } else if c == separator {
            values.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    values.push(current);
    values
}

pub fn not_empty<S: AsRef<str>>(value: &S) -> bool {
    !value.as_ref().is_empty()
}

/// Current UTC timestamp, either as `20231117151827` or `2023-11-17T15:18:27`.
pub fn datetimestamp(digits_only: bool) -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    if digits_only {
        now.chars().filter(|c| c.is_ascii_digit()).collect()
    } else {
        now
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Recursively replace `${VAR_NAME}` placeholders in every string of `value`
/// with the matching entry of `env`. Placeholders with no entry are left as-is.
pub fn envsubst(value: Value, env: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) if s.contains("${") => {
            let replaced = placeholder_regex().replace_all(&s, |caps: &Captures| {
                let name = &caps[1];
                match env.get(name) {
                    Some(replacement) => replacement.clone(),
                    None => {
                        tracing::warn!("Environment variable ${{{}}} not found", name);
                        caps[0].to_string()
                    }
                }
            });
            Value::String(replaced.into_owned())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(|v| envsubst(v, env)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, envsubst(v, env)))
                .collect(),
        ),
        other => other,
    }
}

/// [`envsubst`] against the current process environment.
pub fn envsubst_from_environment(value: Value) -> Value {
    let env: HashMap<String, String> = std::env::vars().collect();
    envsubst(value, &env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_escaped() {
        assert_eq!(split_escaped("a|b|", '|'), vec!["a", "b", ""]);
        assert_eq!(split_escaped("a\\|b", '|'), vec!["a|b"]);
        assert_eq!(split_escaped("", '|'), vec![""]);
        assert_eq!(split_escaped("trailing\\", '|'), vec!["trailing\\"]);
        let values: Vec<String> = split_escaped("|x||y", '|')
            .into_iter()
            .filter(not_empty)
            .collect();
        assert_eq!(values, vec!["x", "y"]);
    }

    #[test]
    fn test_datetimestamp() {
        let digits = datetimestamp(true);
        assert_eq!(digits.len(), 14);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(datetimestamp(false).len(), 19);
    }

    #[test]
    fn test_envsubst() {
        let env = HashMap::from([("JOB_DIR".to_string(), "/var/jobs".to_string())]);
        let value = json!({
            "metadata": "${JOB_DIR}/import.csv",
            "paths": ["${JOB_DIR}", "${MISSING}/x"],
            "keepAliveSeconds": 90
        });
        let result = envsubst(value, &env);
        assert_eq!(result["metadata"], "/var/jobs/import.csv");
        assert_eq!(result["paths"][0], "/var/jobs");
        assert_eq!(result["paths"][1], "${MISSING}/x");
        assert_eq!(result["keepAliveSeconds"], 90);
    }
}
