//! RFC 4514 escaping for attribute values inside a distinguished name.

/// Escape a single RDN value.
///
/// `,` `+` `"` `\` `<` `>` `;` are always escaped, as are a leading `#`,
/// leading or trailing spaces and NUL.
pub fn escape_value(input: &str) -> String {
    let count = input.chars().count();
    let mut result = String::with_capacity(input.len() + 4);

    for (i, c) in input.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i + 1 == count;

        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' => {
                result.push('\\');
                result.push(c);
            }
            ' ' if is_first || is_last => result.push_str("\\ "),
            '#' if is_first => result.push_str("\\#"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }

    result
}

/// Undo [`escape_value`], also accepting the `\XX` hex form.
pub fn unescape_value(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            if i + 2 < bytes.len() {
                if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    out.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            out.push(bytes[i + 1]);
            i += 2;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Split on every `sep` that is not preceded by an escaping backslash.
/// The pieces keep their escapes.
pub fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&input[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Trailing spaces are insignificant unless escaped.
pub(crate) fn trim_unescaped_end(value: &str) -> &str {
    let bytes = value.as_bytes();
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1] == b' ' {
        let backslashes = bytes[..end - 1]
            .iter()
            .rev()
            .take_while(|&&b| b == b'\\')
            .count();
        if backslashes % 2 == 1 {
            break;
        }
        end -= 1;
    }
    &value[..end]
}
