//! Cleanup of decision texts extracted from word-processor documents.
//!
//! # Steps
//!
//! 1. Repair corrupted guillemets: the opening `«` arrives as U+0F4B and the
//!    closing `»` as a plain space. An opening mark is closed at the next
//!    double space; a mark that never closes becomes a space.
//! 2. Tab and form feed → space.
//! 3. CRLF and CR → LF.
//! 4. Runs of 2+ spaces → one space.
//! 5. Known-bad characters replaced from [`REPLACEMENTS`].
//! 6. Trim.

const CORRUPTED_OPENING_GUILLEMET: char = '\u{0F4B}';

/// Characters replaced verbatim after whitespace normalisation.
pub const REPLACEMENTS: &[(char, &str)] = &[
    ('\u{00A0}', " "),
    ('\u{00AD}', ""),
    ('\u{FEFF}', ""),
    ('\u{2028}', "\n"),
    ('\u{0F4C}', "»"),
];

pub fn clean(raw: &str) -> String {
    let fixed = fix_guillemets(raw);

    let mut out = String::with_capacity(fixed.len());
    let mut chars = fixed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\t' | '\u{000C}' => push_space(&mut out),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            ' ' => push_space(&mut out),
            other => match REPLACEMENTS.iter().find(|(bad, _)| *bad == other) {
                Some((_, replacement)) => out.push_str(replacement),
                None => out.push(other),
            },
        }
    }

    out.trim().to_string()
}

fn push_space(out: &mut String) {
    if !out.ends_with(' ') {
        out.push(' ');
    }
}

fn fix_guillemets(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let mut open: Option<usize> = None;

    let mut i = 0;
    while i < chars.len() {
        if chars[i] == CORRUPTED_OPENING_GUILLEMET {
            if let Some(previous) = open {
                chars[previous] = ' ';
            }
            open = Some(i);
        } else if chars[i] == ' '
            && let Some(start) = open
            && chars.get(i + 1) == Some(&' ')
        {
            chars[start] = '«';
            chars[i + 1] = '»';
            open = None;
        }
        i += 1;
    }
    if let Some(start) = open {
        chars[start] = ' ';
    }

    chars.into_iter().collect()
}

/// Nothing but whitespace.
pub fn is_empty_text(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

/// No line break at all; such texts are extraction failures.
pub fn has_no_break(text: &str) -> bool {
    !text.contains('\n')
}

/// Replacement characters or leftover Tibetan code points after cleanup.
pub fn has_unknown_characters(text: &str) -> bool {
    text.chars()
        .any(|c| c == '\u{FFFD}' || ('\u{0F00}'..='\u{0FFF}').contains(&c))
}
