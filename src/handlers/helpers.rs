//! Helper functions for IRC command handlers.

use lantern_proto::Message;

use crate::state::User;

/// A message sourced from `user` (`:nick!ident@host COMMAND ...`).
pub fn from_user(user: &User, command: &str, params: Vec<String>) -> Message {
    Message::new(command, params).with_prefix(user.mask())
}

/// Clip `text` to at most `max` bytes without splitting a character.
pub fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Split a comma-separated target list, skipping empty entries.
pub fn comma_list(arg: &str) -> impl Iterator<Item = &str> {
    arg.split(',').filter(|s| !s.is_empty())
}

pub fn is_channel_target(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo", 2), "h");
    }

    #[test]
    fn comma_list_skips_empties() {
        assert_eq!(comma_list("#a,,#b,").collect::<Vec<_>>(), vec!["#a", "#b"]);
    }
}
