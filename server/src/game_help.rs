use once_cell::sync::Lazy;

use crate::{
    event_writer::EventWriter,
    id::Id,
    line::{span, Color, Line},
    player::Player,
};

fn command(name: &str, text: &str) -> Line {
    span(name).color(Color::White).line().push(span(text))
}

static HELP_LINES: Lazy<Vec<Line>> = Lazy::new(|| {
    vec![
        span("Commands:").bold().line(),
        command("look", " – Look around, or at someone"),
        command("north", ", etc. – Move to another room"),
        command("kill", " <target> – Attack something with your weapon"),
        command("bash", " [target] – Toggle bashing: double damage, half as often, no criticals"),
        command("cast", " <ability> [target] – Channel an ability, e.g. cast magic missile"),
        command("stop", " – Stop channelling and go back to your weapon"),
        command("flee", " – Run out of the fight through a random exit"),
        command("disengage", " – Step back from the fight without leaving"),
        command("score", " – Your health, mana and experience"),
        command("who", " – See who is online"),
        command("alias", " – List short aliases for commands"),
        command("help", " – You're looking at it"),
    ]
});

pub fn help(player_id: Id<Player>, writer: &mut EventWriter) {
    writer.tell_lines(player_id, &HELP_LINES);
}
