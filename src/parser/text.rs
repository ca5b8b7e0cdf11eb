//! Text normalization for parsed feed content.

/// Strip inline markup tags and unescape HTML entities.
///
/// Feed bodies routinely embed HTML; notifications want plain text.
pub fn strip_markup(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_entity = false;
    let mut entity = String::new();

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            '&' if !in_tag => {
                in_entity = true;
                entity.clear();
            }
            ';' if in_entity => {
                in_entity = false;
                match entity.as_str() {
                    "amp" => result.push('&'),
                    "lt" => result.push('<'),
                    "gt" => result.push('>'),
                    "quot" => result.push('"'),
                    "apos" => result.push('\''),
                    "nbsp" => result.push(' '),
                    _ if entity.starts_with('#') => {
                        if let Some(code) = parse_numeric_entity(&entity) {
                            if let Some(c) = char::from_u32(code) {
                                result.push(c);
                            }
                        }
                    }
                    _ => {
                        // Unknown entity, keep as-is
                        result.push('&');
                        result.push_str(&entity);
                        result.push(';');
                    }
                }
            }
            _ if in_entity => {
                entity.push(ch);
            }
            _ if !in_tag => {
                result.push(ch);
            }
            _ => {}
        }
    }

    // Collapse whitespace runs left behind by removed tags
    let result: String = result.split_whitespace().collect::<Vec<&str>>().join(" ");

    result.trim().to_string()
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    if entity.starts_with("#x") || entity.starts_with("#X") {
        u32::from_str_radix(&entity[2..], 16).ok()
    } else if entity.starts_with('#') {
        entity[1..].parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup_basic() {
        assert_eq!(strip_markup("<p>Hello</p>"), "Hello");
        assert_eq!(strip_markup("<b>Bold</b> text"), "Bold text");
        assert_eq!(strip_markup("<div><p>Nested</p></div>"), "Nested");
    }

    #[test]
    fn test_strip_markup_entities() {
        assert_eq!(strip_markup("&amp;"), "&");
        assert_eq!(strip_markup("&lt;tag&gt;"), "<tag>");
        assert_eq!(strip_markup("&quot;quoted&quot;"), "\"quoted\"");
        assert_eq!(strip_markup("A&nbsp;B"), "A B");
    }

    #[test]
    fn test_strip_markup_numeric_entities() {
        assert_eq!(strip_markup("&#65;"), "A");
        assert_eq!(strip_markup("&#x41;"), "A");
        assert_eq!(strip_markup("&#x3042;"), "あ");
    }

    #[test]
    fn test_strip_markup_unknown_entity_kept() {
        assert_eq!(strip_markup("&bogus;"), "&bogus;");
    }

    #[test]
    fn test_strip_markup_whitespace() {
        assert_eq!(strip_markup("<p>  Multiple   spaces  </p>"), "Multiple spaces");
        assert_eq!(
            strip_markup("<p>\n\tNewlines\n\tand\ttabs\n</p>"),
            "Newlines and tabs"
        );
    }

    #[test]
    fn test_strip_markup_plain_text_unchanged() {
        assert_eq!(strip_markup("just plain text"), "just plain text");
    }

    #[test]
    fn test_parse_numeric_entity() {
        assert_eq!(parse_numeric_entity("#65"), Some(65));
        assert_eq!(parse_numeric_entity("#x41"), Some(65));
        assert_eq!(parse_numeric_entity("#X41"), Some(65));
        assert_eq!(parse_numeric_entity("#x3042"), Some(12354));
        assert_eq!(parse_numeric_entity("invalid"), None);
    }
}
