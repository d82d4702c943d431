use once_cell::sync::Lazy;

use crate::{event_writer::EventWriter, id::Id, line::Line, player::Player};

static ALIASES: &[(&str, &str)] = &[
    ("l", "look"),
    ("k", "kill"),
    ("attack", "kill"),
    ("mm", "magic-missile"),
    ("fl", "flee"),
    ("sc", "score"),
    ("n", "north"),
    ("ne", "northeast"),
    ("e", "east"),
    ("se", "southeast"),
    ("s", "south"),
    ("sw", "southwest"),
    ("w", "west"),
    ("nw", "northwest"),
    ("u", "up"),
    ("d", "down"),
];

static ALIAS_LINES: Lazy<Vec<Line>> = Lazy::new(|| {
    ALIASES
        .iter()
        .map(|(alias, resolution)| Line::str(&format!("{} → {}", alias, resolution)))
        .collect::<Vec<_>>()
});

pub fn resolve_aliases(mut words: Vec<&str>) -> Vec<&str> {
    if let Some(first) = words.first() {
        if let Some((_, resolution)) =
            ALIASES.iter().find(|(alias, _)| first.eq_ignore_ascii_case(alias))
        {
            words[0] = *resolution;
        }
    }
    words
}

pub fn alias(player_id: Id<Player>, writer: &mut EventWriter) {
    writer.tell_lines(player_id, &ALIAS_LINES);
}
