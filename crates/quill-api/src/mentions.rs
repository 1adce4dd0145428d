/// Extract `@username` handles from note text, in order of first appearance,
/// without duplicates. A handle ends at the first character that cannot
/// appear in a username.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut prev: Option<char> = None;

    while let Some((i, c)) = chars.next() {
        // `@` inside a word (e.g. an email address) is not a mention
        let starts_handle = c == '@' && !prev.is_some_and(is_handle_char);
        prev = Some(c);
        if !starts_handle {
            continue;
        }

        let start = i + c.len_utf8();
        let mut end = start;
        while let Some(&(j, next)) = chars.peek() {
            if !is_handle_char(next) {
                break;
            }
            end = j + next.len_utf8();
            prev = Some(next);
            chars.next();
        }

        let handle = &text[start..end];
        if !handle.is_empty() && !found.iter().any(|h| h == handle) {
            found.push(handle.to_string());
        }
    }

    found
}

fn is_handle_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
