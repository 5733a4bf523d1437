//! Small string helpers for the constrained CSS text the engine reads and
//! writes. None of this is a general CSS parser.

/// Replaces `/* ... */` comments with a single space. An unterminated
/// comment swallows the rest of the input.
pub fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut in_comment = false;
    let mut in_string: Option<char> = None;
    let mut chars = css.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_comment {
            if ch == '*' && chars.peek() == Some(&'/') {
                let _ = chars.next();
                in_comment = false;
                out.push(' ');
            }
            continue;
        }

        if let Some(quote) = in_string {
            out.push(ch);
            if ch == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }

        if ch == '/' && chars.peek() == Some(&'*') {
            let _ = chars.next();
            in_comment = true;
            continue;
        }
        if ch == '"' || ch == '\'' {
            in_string = Some(ch);
        }
        out.push(ch);
    }

    out
}

pub fn find_matching_brace(css: &str, open_idx: usize) -> Option<usize> {
    find_matching(css, open_idx, '{', '}')
}

pub fn find_matching_paren(css: &str, open_idx: usize) -> Option<usize> {
    find_matching(css, open_idx, '(', ')')
}

fn find_matching(css: &str, open_idx: usize, open: char, close: char) -> Option<usize> {
    if !css[open_idx..].starts_with(open) {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (rel_idx, ch) in css[open_idx..].char_indices() {
        let idx = open_idx + rel_idx;
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }

        if ch == '"' || ch == '\'' {
            in_string = Some(ch);
            continue;
        }

        if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(idx);
            }
        }
    }

    None
}

/// Whether `target_idx` sits outside every brace block, string and comment.
pub fn is_top_level_position(css: &str, target_idx: usize) -> bool {
    let mut depth = 0usize;
    let mut in_comment = false;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    let mut chars = css.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if idx >= target_idx {
            return depth == 0 && !in_comment && in_string.is_none();
        }

        if in_comment {
            if ch == '*' {
                if let Some((_, '/')) = chars.peek().copied() {
                    let _ = chars.next();
                    in_comment = false;
                }
            }
            continue;
        }

        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }

        if ch == '/' {
            if let Some((_, '*')) = chars.peek().copied() {
                let _ = chars.next();
                in_comment = true;
                continue;
            }
        }

        match ch {
            '"' | '\'' => in_string = Some(ch),
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    depth == 0 && !in_comment && in_string.is_none()
}

/// Splits a declaration block body into `(name, value)` pairs. Nested
/// blocks are skipped over, and a trailing declaration without `;` counts.
pub fn split_declarations(body: &str) -> Vec<(&str, &str)> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut segment_start = 0usize;

    for (idx, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    segment_start = idx + 1;
                }
            }
            ';' if depth == 0 => {
                if let Some(pair) = split_declaration(&body[segment_start..idx]) {
                    declarations.push(pair);
                }
                segment_start = idx + 1;
            }
            _ => {}
        }
    }
    if depth == 0 {
        if let Some(pair) = split_declaration(&body[segment_start..]) {
            declarations.push(pair);
        }
    }

    declarations
}

fn split_declaration(segment: &str) -> Option<(&str, &str)> {
    let (name, value) = segment.split_once(':')?;
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Escapes a class name for use after `.` in a selector.
pub fn escape_class_name(class_name: &str) -> String {
    let mut out = String::with_capacity(class_name.len() + 4);
    for (idx, ch) in class_name.chars().enumerate() {
        let leading_digit = ch.is_ascii_digit()
            && (idx == 0 || (idx == 1 && class_name.starts_with('-')));
        if leading_digit {
            out.push_str(&format!("\\3{} ", ch));
        } else if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        escape_class_name, find_matching_brace, find_matching_paren, is_top_level_position,
        split_declarations, strip_comments,
    };

    #[test]
    fn strips_comments_but_keeps_strings() {
        let css = "a { /* note */ content: \"/* keep */\"; }";
        assert_eq!(strip_comments(css), "a {   content: \"/* keep */\"; }");
    }

    #[test]
    fn unterminated_comment_swallows_the_rest() {
        assert_eq!(strip_comments("a /* b c"), "a ");
    }

    #[test]
    fn matches_nested_braces_and_parens() {
        let css = "x { a { b } } y";
        assert_eq!(find_matching_brace(css, 2), Some(12));
        let cond = "((min-width: 1px) and (x))";
        assert_eq!(find_matching_paren(cond, 0), Some(cond.len() - 1));
        assert_eq!(find_matching_paren("(open", 0), None);
    }

    #[test]
    fn top_level_position_ignores_nested_blocks() {
        let css = "a { @layer x; } @layer y;";
        let nested = css.find("@layer x").unwrap_or_default();
        let top = css.find("@layer y").unwrap_or_default();
        assert!(!is_top_level_position(css, nested));
        assert!(is_top_level_position(css, top));
    }

    #[test]
    fn splits_declarations_including_trailing_one() {
        let body = " --a: 1px; --b: red ; --c:  x y ";
        assert_eq!(
            split_declarations(body),
            vec![("--a", "1px"), ("--b", "red"), ("--c", "x y")]
        );
    }

    #[test]
    fn escapes_selector_characters() {
        assert_eq!(escape_class_name("p-4"), "p-4");
        assert_eq!(escape_class_name("hover:flex"), "hover\\:flex");
        assert_eq!(escape_class_name("p-0.5"), "p-0\\.5");
        assert_eq!(escape_class_name("2xl:p-4"), "\\32 xl\\:p-4");
    }
}
