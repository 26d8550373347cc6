//! Mode string parsing.
//!
//! A mode string such as `+ok-l alice key` is turned into a flat list of
//! [`ModeChange`]s before anything is applied. Which letters consume an
//! argument is decided by the caller.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn is_plus(self) -> bool {
        self == Sign::Plus
    }

    fn as_char(self) -> char {
        match self {
            Sign::Plus => '+',
            Sign::Minus => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub sign: Sign,
    pub mode: char,
    pub arg: Option<String>,
}

impl ModeChange {
    pub fn new(sign: Sign, mode: char, arg: Option<String>) -> Self {
        Self { sign, mode, arg }
    }
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sign.as_char(), self.mode)?;
        if let Some(arg) = &self.arg {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Split `modes` into changes, pulling arguments from `args` in order for
/// every letter where `takes_arg(sign, letter)` holds.
///
/// A letter that wants an argument when none are left gets `arg: None`.
/// The sign defaults to `+` until the first `+` or `-`.
pub fn parse_mode_string(
    modes: &str,
    args: &[&str],
    takes_arg: impl Fn(Sign, char) -> bool,
) -> Vec<ModeChange> {
    let mut sign = Sign::Plus;
    let mut args = args.iter();
    let mut changes = Vec::new();
    for c in modes.chars() {
        match c {
            '+' => sign = Sign::Plus,
            '-' => sign = Sign::Minus,
            _ => {
                let arg = if takes_arg(sign, c) {
                    args.next().map(|a| a.to_string())
                } else {
                    None
                };
                changes.push(ModeChange::new(sign, c, arg));
            }
        }
    }
    changes
}

/// Collapse applied changes into wire form: `("+o-k", ["alice", "*"])`.
pub fn render_changes(changes: &[ModeChange]) -> (String, Vec<String>) {
    let mut modes = String::new();
    let mut args = Vec::new();
    let mut current = None;
    for change in changes {
        if current != Some(change.sign) {
            modes.push(change.sign.as_char());
            current = Some(change.sign);
        }
        modes.push(change.mode);
        args.extend(change.arg.clone());
    }
    (modes, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_args(sign: Sign, c: char) -> bool {
        matches!(c, 'b' | 'o' | 'v' | 'k') || (c == 'l' && sign.is_plus())
    }

    #[test]
    fn arguments_follow_letter_order() {
        let changes = parse_mode_string("+ok-l+v", &["alice", "secret", "bob"], channel_args);
        assert_eq!(
            changes,
            vec![
                ModeChange::new(Sign::Plus, 'o', Some("alice".into())),
                ModeChange::new(Sign::Plus, 'k', Some("secret".into())),
                ModeChange::new(Sign::Minus, 'l', None),
                ModeChange::new(Sign::Plus, 'v', Some("bob".into())),
            ]
        );
    }

    #[test]
    fn missing_argument_and_default_sign() {
        let changes = parse_mode_string("ib", &[], channel_args);
        assert_eq!(changes[0], ModeChange::new(Sign::Plus, 'i', None));
        assert_eq!(changes[1], ModeChange::new(Sign::Plus, 'b', None));
    }

    #[test]
    fn render_groups_signs() {
        let changes = vec![
            ModeChange::new(Sign::Plus, 'n', None),
            ModeChange::new(Sign::Plus, 'o', Some("alice".into())),
            ModeChange::new(Sign::Minus, 'k', Some("*".into())),
            ModeChange::new(Sign::Minus, 't', None),
        ];
        assert_eq!(
            render_changes(&changes),
            ("+no-kt".to_string(), vec!["alice".to_string(), "*".to_string()])
        );
        assert_eq!(changes[1].to_string(), "+o alice");
    }
}
