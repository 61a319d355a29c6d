//! Case conversion for deriving table and key names from model names.

/// Convert an identifier from CamelCase to snake_case.
/// e.g. "UserRole" -> "user_role", "Post" -> "post"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else if c == '-' || c == ' ' {
            out.push('_');
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::to_snake_case;

    #[test]
    fn snake_cases_model_names() {
        assert_eq!(to_snake_case("UserRole"), "user_role");
        assert_eq!(to_snake_case("Post"), "post");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("HTTPLog"), "httplog");
        assert_eq!(to_snake_case("Order2Item"), "order2_item");
    }
}
