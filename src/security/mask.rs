//! Wildcard masks (`*` and `?`) as used by bans, K/Q-lines and oper hostmasks.
//!
//! Matching folds both sides with the RFC 1459 case mapping, so `[` matches `{`.

use lantern_proto::irc_to_lower;
use regex::Regex;

/// Translate a wildcard mask into an anchored regex over folded text.
fn to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push_str("(?s)^");
    for c in irc_to_lower(pattern).chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            _ => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

/// A wildcard mask compiled once, for masks that are checked repeatedly
/// (channel bans, moderation lists).
#[derive(Debug, Clone)]
pub struct WildcardMask {
    pattern: String,
    regex: Option<Regex>,
}

impl WildcardMask {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            regex: to_regex(pattern),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|re| re.is_match(&irc_to_lower(text)))
    }
}

impl PartialEq for WildcardMask {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for WildcardMask {}

/// Whether `text` matches the wildcard `pattern`.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    WildcardMask::new(pattern).matches(text)
}

/// Whether a mask contains any wildcard characters.
pub fn has_wildcards(mask: &str) -> bool {
    mask.contains(['*', '?'])
}

/// Expand a partial ban mask to full `nick!ident@host` form.
///
/// `bob` becomes `bob!*@*`, `*@host` becomes `*!*@host`, `bob!x` becomes `bob!x@*`.
pub fn normalize_mask(mask: &str) -> String {
    match (mask.find('!'), mask.find('@')) {
        (Some(_), Some(_)) => mask.to_string(),
        (Some(_), None) => format!("{mask}@*"),
        (None, Some(_)) => format!("*!{mask}"),
        (None, None) => format!("{mask}!*@*"),
    }
}
