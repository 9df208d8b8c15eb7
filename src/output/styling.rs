use std::fmt::Display;

use console::{style, StyledObject};

/// Section heading: emoji followed by an underlined title.
pub fn heading(emoji: &str, title: &str) -> String {
    format!("{}  {}", style(emoji).bright(), style(title).bright().underlined())
}

/// Field labels and secondary text
pub fn muted(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

/// Counts and in-flight work
pub fn highlight(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn success(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn failure(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

/// Build slugs
pub fn build_ref(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn brand(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
