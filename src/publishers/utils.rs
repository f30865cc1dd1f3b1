/// Trim text to at most `max_chars` characters, appending an ellipsis if trimmed.
/// Char-aware, so multi-byte titles are never cut mid-sequence.
pub fn trim_with_ellipsis(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut s: String = text.chars().take(max_chars - 1).collect();
    s.push('…');
    s
}

fn is_markdown_control(c: char) -> bool {
    matches!(c, '_' | '*' | '`' | '[')
}

/// Экранирует управляющие символы legacy Markdown Telegram (`_ * ` [`).
///
/// The escaped result stays within `max_chars`: it is cut before a whole `\x`
/// pair and an ellipsis is appended.
pub fn escape_markdown_trimmed(text: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut used = 0usize;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let width = if is_markdown_control(c) { 2 } else { 1 };
        let reserve = if chars.peek().is_some() { 1 } else { 0 };
        if used + width + reserve > max_chars {
            if used < max_chars {
                out.push('…');
            }
            return out;
        }
        if is_markdown_control(c) {
            out.push('\\');
        }
        out.push(c);
        used += width;
    }
    out
}

/// Полужирный текст для legacy Markdown.
///
/// Escapes are not allowed inside an entity, so every control character closes
/// the bold run, is emitted escaped, and the run reopens after it.
pub fn bold_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    let mut run = String::new();
    for c in text.chars() {
        if is_markdown_control(c) {
            if !run.is_empty() {
                out.push('*');
                out.push_str(&run);
                out.push('*');
                run.clear();
            }
            out.push('\\');
            out.push(c);
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        out.push('*');
        out.push_str(&run);
        out.push('*');
    }
    out
}
