//! Decoder for the ROT47-obfuscated product titles Idealo renders through
//! `idealoApp.getContents('…')`.

/// Reverses the obfuscation: fullwidth parentheses stand in for `W`/`X`,
/// JavaScript string escapes are resolved, then ROT47 is applied.
#[must_use]
pub fn decode_obfuscated(ciphertext: &str) -> String {
    let replaced = ciphertext.replace('（', "W").replace('）', "X");
    unescape(&replaced).chars().map(rot47).collect()
}

/// ROT47 on the printable ASCII range; it is its own inverse.
#[must_use]
pub fn rot47(c: char) -> char {
    match u32::from(c) {
        code @ 33..=126 => char::from_u32(33 + ((code + 14) % 94)).unwrap_or(c),
        _ => c,
    }
}

/// Resolves backslash escapes. Unknown escapes are kept verbatim.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(kind @ ('u' | 'x')) => {
                let width = if kind == 'u' { 4 } else { 2 };
                let hex: String = chars.clone().take(width).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == width => {
                        out.push(decoded);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    _ => {
                        out.push('\\');
                        out.push(kind);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
