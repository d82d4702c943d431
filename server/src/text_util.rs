use crate::line::{span, LineSpan};

pub fn and_list_span(mut words: Vec<LineSpan>) -> Vec<LineSpan> {
    match words.len() {
        0 | 1 => words,
        2 => {
            words.insert(1, span(" and "));
            words
        }
        len => {
            words.insert(len - 1, span(" and "));
            for i in (1..len - 1).rev() {
                words.insert(i, span(", "));
            }
            words
        }
    }
}

pub fn are(len: usize) -> &'static str {
    if len > 1 {
        "are"
    } else {
        "is"
    }
}

pub fn plural(len: usize, str: &str) -> String {
    if len != 1 {
        format!("{}s", str)
    } else {
        str.to_string()
    }
}

/// "the goblin" at the start of a sentence.
pub fn capitalize(str: &str) -> String {
    let mut chars = str.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn health_status(hp: i32, max_hp: i32) -> &'static str {
    let percent = if max_hp > 0 { hp * 100 / max_hp } else { 0 };
    match percent {
        p if p >= 100 => "is in perfect health",
        p if p >= 75 => "has a few scratches",
        p if p >= 50 => "is wounded",
        p if p >= 25 => "is badly wounded",
        p if p > 0 => "is barely standing",
        _ => "is down",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_read_naturally() {
        let text = |words: Vec<&str>| {
            and_list_span(words.into_iter().map(span).collect())
                .into_iter()
                .map(|span| span.text)
                .collect::<String>()
        };
        assert_eq!(text(vec!["a"]), "a");
        assert_eq!(text(vec!["a", "b"]), "a and b");
        assert_eq!(text(vec!["a", "b", "c"]), "a, b and c");
    }

    #[test]
    fn capitalizes_first_letter_only() {
        assert_eq!(capitalize("the goblin"), "The goblin");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn health_bands() {
        assert_eq!(health_status(100, 100), "is in perfect health");
        assert_eq!(health_status(30, 100), "is badly wounded");
        assert_eq!(health_status(-3, 100), "is down");
    }
}
