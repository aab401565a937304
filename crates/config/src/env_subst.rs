/// Replace `${ENV_VAR}` placeholders in config string values.
///
/// Supports `${VAR:-default}` for a fallback value. Unresolvable variables
/// without a fallback are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Replace placeholders using a custom lookup function.
///
/// This is the implementation used by [`substitute_env`]; the separate
/// signature makes it testable without mutating the process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated placeholder; emit the remainder literally.
            result.push_str(&rest[start..]);
            return result;
        };
        let inner = &after[..end];
        let (name, fallback) = match inner.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (inner, None),
        };
        if name.is_empty() {
            result.push_str(&rest[start..start + end + 3]);
        } else {
            match lookup(name).or_else(|| fallback.map(str::to_string)) {
                Some(val) => result.push_str(&val),
                None => {
                    // Leave unresolved placeholder as-is.
                    result.push_str(&rest[start..start + end + 3]);
                },
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "VOLTAIC_TEST_VAR" => Some("hello".to_string()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("key=${VOLTAIC_TEST_VAR}", lookup),
            "key=hello"
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${VOLTAIC_NONEXISTENT_XYZ}", lookup),
            "${VOLTAIC_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn fallback_applies_when_unset() {
        assert_eq!(
            substitute_env_with("${VOLTAIC_NONEXISTENT_XYZ:-fallback}", lookup),
            "fallback"
        );
        // Set variables win over the fallback.
        assert_eq!(
            substitute_env_with("${VOLTAIC_TEST_VAR:-fallback}", lookup),
            "hello"
        );
    }

    #[test]
    fn multiple_placeholders() {
        assert_eq!(
            substitute_env_with("${VOLTAIC_TEST_VAR} and ${VOLTAIC_TEST_VAR}", lookup),
            "hello and hello"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_env_with("tail ${broken", lookup), "tail ${broken");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
