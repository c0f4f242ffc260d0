use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Cleans a text field taken from feed markup.
///
/// Removes ASCII control characters and ANSI escape sequences (feed text is
/// printed straight to a terminal by the CLI), then collapses runs of
/// whitespace into single spaces and trims both ends. Titles are compared
/// byte-for-byte during deduplication, so every parser-produced title goes
/// through here to keep that comparison stable across fetches.
///
/// ```
/// use feedwatch::util::clean_text;
///
/// assert_eq!(clean_text("  Hello\n   world "), "Hello world");
/// assert_eq!(clean_text("\x1b[31mred\x1b[0m"), "red");
/// ```
pub fn clean_text(s: &str) -> String {
    let stripped = strip_control_chars(s);
    let mut out = String::with_capacity(stripped.len());
    for word in stripped.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Strips terminal control characters and ANSI escape sequences.
///
/// Tab, newline and carriage return are kept. Returns `Cow::Borrowed` when
/// there is nothing to remove.
fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let needs_strip = s.bytes().any(is_control_byte);
    if !needs_strip {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                // CSI: parameters until a final byte in 0x40..=0x7e
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: until BEL or ST (ESC \)
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_ascii_control() => {}
            c => out.push(c),
        }
    }

    Cow::Owned(out)
}

fn is_control_byte(b: u8) -> bool {
    b == 0x1b || b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
}

/// Truncates `s` to at most `max_width` terminal columns, appending `...`
/// when text was cut.
///
/// ```
/// use feedwatch::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// assert_eq!(truncate_to_width("Test", 2), "Te");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    let mut width = 0;
    let mut fits_end = 0; // byte end of the prefix that fits max_width
    let mut ellipsis_cut = None; // byte end of the prefix that leaves room for "..."
    let target = max_width.saturating_sub(ELLIPSIS_WIDTH);

    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if ellipsis_cut.is_none() && width + w > target {
            ellipsis_cut = Some(idx);
        }
        if width + w > max_width {
            if max_width <= ELLIPSIS_WIDTH {
                return Cow::Owned(s[..fits_end].to_string());
            }
            let cut = ellipsis_cut.unwrap_or(idx);
            return Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS));
        }
        width += w;
        fits_end = idx + c.len_utf8();
    }

    Cow::Borrowed(s)
}
