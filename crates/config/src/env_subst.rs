/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// Unset variables and malformed placeholders are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

pub(crate) fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match lookup(name).filter(|_| is_var_name(name)) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn lookup(name: &str) -> Option<String> {
        match name {
            "FLOWRELAY_TOKEN" => Some("123:abc".into()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[rstest]
    #[case("token = \"${FLOWRELAY_TOKEN}\"", "token = \"123:abc\"")]
    #[case("a${EMPTY}b", "ab")]
    #[case("${MISSING}", "${MISSING}")]
    #[case("${not a var}", "${not a var}")]
    #[case("${FLOWRELAY_TOKEN", "${FLOWRELAY_TOKEN")]
    #[case("cost: $5 {x}", "cost: $5 {x}")]
    #[case("${FLOWRELAY_TOKEN}/${FLOWRELAY_TOKEN}", "123:abc/123:abc")]
    fn substitutes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute_env_with(input, lookup), expected);
    }
}
