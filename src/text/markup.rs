//! Rich-text labels are reduced to plain text before layout.

/// Strip HTML tags, turning block-level breaks into newlines and decoding
/// the common entities.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        match ch {
            '<' => {
                let rest = &input[i..];
                match rest.find('>') {
                    Some(end) => {
                        let tag = rest[1..end].trim().to_ascii_lowercase();
                        if is_line_break_tag(&tag) {
                            out.push('\n');
                        }
                        // Skip past the closing '>'
                        let stop = i + end;
                        while let Some(&(j, _)) = chars.peek() {
                            if j > stop {
                                break;
                            }
                            chars.next();
                        }
                    }
                    None => out.push(ch),
                }
            }
            '&' => {
                let rest = &input[i..];
                match rest.find(';').filter(|end| *end <= 10) {
                    Some(end) => match decode_entity(&rest[1..end]) {
                        Some(decoded) => {
                            out.push(decoded);
                            let stop = i + end;
                            while let Some(&(j, _)) = chars.peek() {
                                if j > stop {
                                    break;
                                }
                                chars.next();
                            }
                        }
                        None => out.push(ch),
                    },
                    None => out.push(ch),
                }
            }
            _ => out.push(ch),
        }
    }

    collapse_blank_lines(&out)
}

fn is_line_break_tag(tag: &str) -> bool {
    let name = tag
        .trim_end_matches('/')
        .split_whitespace()
        .next()
        .unwrap_or("");
    matches!(name, "br" | "/p" | "/div" | "/li" | "/tr" | "/h1" | "/h2" | "/h3" | "/h4")
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn collapse_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() && lines.last().is_some_and(|l| l.trim().is_empty()) {
            continue;
        }
        lines.push(trimmed);
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_untouched() {
        assert_eq!(strip_html("What is your age?"), "What is your age?");
    }

    #[test]
    fn tags_removed_and_breaks_kept() {
        assert_eq!(
            strip_html("<p><b>Section</b> one</p><p>two<br/>three</p>"),
            "Section one\ntwo\nthree"
        );
    }

    #[test]
    fn entities_decoded() {
        assert_eq!(strip_html("a &lt; b &amp;&amp; c&nbsp;&#62; d &#x41;"), "a < b && c > d A");
    }

    #[test]
    fn stray_brackets_survive() {
        assert_eq!(strip_html("x < 5 & y"), "x < 5 & y");
    }

    #[test]
    fn blank_runs_collapse() {
        assert_eq!(strip_html("a<br><br><br>b"), "a\n\nb");
    }
}
