//! Tokenizing inbound lines and rendering outbound ones.

use nom::{
    IResult,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::opt,
    sequence::preceded,
};
use std::fmt;

/// An owned IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Source prefix without the leading `:`.
    pub prefix: Option<String>,
    /// Command verb or three-digit numeric. Upper-cased when parsed.
    pub command: String,
    /// Arguments, with the trailing one already stripped of its `:`.
    pub params: Vec<String>,
}

/// Split a raw line into its command and argument list.
///
/// Returns `None` for lines with no command (empty or all spaces); callers
/// skip those silently.
pub fn tokenize(line: &str) -> Option<(String, Vec<String>)> {
    Message::parse(line).map(|m| (m.command, m.params))
}

fn spaces(input: &str) -> IResult<&str, &str> {
    take_while(|c| c == ' ')(input)
}

/// Source prefix after `:`. May be empty, in which case the line has no
/// command and is skipped.
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while(|c| c != ' '))(input)
}

/// Command verb: everything up to the next space. Unknown verbs are kept so
/// that dispatch can answer them.
fn parse_command(input: &str) -> IResult<&str, &str> {
    take_while1(|c| c != ' ')(input)
}

fn parse_head(input: &str) -> IResult<&str, (Option<&str>, &str)> {
    let (input, _) = spaces(input)?;
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = spaces(input)?;
    let (input, command) = parse_command(input)?;
    Ok((input, (prefix, command)))
}

impl Message {
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.into(),
            params,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Parse a line as received from a client.
    ///
    /// Fields are separated by runs of spaces. An argument starting with `:`
    /// swallows the rest of the line, spaces included. A leading `:prefix`
    /// is kept on the message but plays no part in dispatch.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (mut rest, (prefix, command)) = parse_head(line).ok()?;

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            match rest.split_once(' ') {
                Some((token, tail)) => {
                    params.push(token.to_owned());
                    rest = tail;
                }
                None => {
                    params.push(rest.to_owned());
                    break;
                }
            }
        }

        Some(Self {
            prefix: prefix.map(str::to_owned),
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    #[inline]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Length of the command and its arguments joined by single spaces.
    pub fn payload_len(&self) -> usize {
        self.command.len() + self.params.iter().map(|p| p.len() + 1).sum::<usize>()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        if let Some((last, init)) = self.params.split_last() {
            for param in init {
                write!(f, " {param}")?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        Ok(())
    }
}
