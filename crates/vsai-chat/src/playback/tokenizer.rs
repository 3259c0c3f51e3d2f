/// Split text into sentence units.
///
/// A unit ends after a run of `.`, `!` or `?` that is followed by whitespace or
/// the end of the text; the whitespace after the terminator belongs to the unit.
/// Text after the last terminator forms a final unit, so text without any
/// terminator comes back whole. Whitespace-only units are dropped.
///
/// Locale naive: terminators such as `。` or `।` are not recognised.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        while chars.next_if(|&(_, c)| is_terminator(c)).is_some() {}

        match chars.peek() {
            None => break,
            Some(&(_, next)) if next.is_whitespace() => {
                while chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}
                let end = chars.peek().map(|&(i, _)| i).unwrap_or(text.len());
                push_unit(&mut units, &text[start..end]);
                start = end;
            }
            Some(_) => {}
        }
    }

    push_unit(&mut units, &text[start..]);
    units
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn push_unit<'a>(units: &mut Vec<&'a str>, unit: &'a str) {
    if !unit.trim().is_empty() {
        units.push(unit);
    }
}
