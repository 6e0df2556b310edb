//! Rule matching against an actor.

use crate::engine::ActorContext;
use crate::schema::{RuleMatch, Scope};

/// Case-insensitive match of `value` against a pattern list where `*` is a
/// wildcard for any run of characters. An empty list matches everything.
pub fn matches_any(patterns: &[String], value: &str) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let value = value.to_lowercase();
    patterns
        .iter()
        .any(|pattern| glob_match(&pattern.to_lowercase(), &value))
}

/// `*`-only glob. Both sides are expected to be normalized already.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return true,
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return pattern == text,
    };

    if !text.starts_with(first) {
        return false;
    }
    let mut remaining = &text[first.len()..];

    for part in middle.iter().filter(|p| !p.is_empty()) {
        match remaining.find(part) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }

    remaining.ends_with(last)
}

impl RuleMatch {
    /// Whether every non-empty criterion holds for `actor`.
    pub fn matches(&self, actor: &ActorContext) -> bool {
        if !matches_any(&self.channels, &actor.channel) {
            return false;
        }
        if !matches_any(&self.chats, &actor.chat_id) {
            return false;
        }
        if !self.senders.is_empty()
            && !actor
                .identities()
                .any(|id| matches_any(&self.senders, id))
        {
            return false;
        }
        match self.scope {
            Some(Scope::Dm) => !actor.is_group,
            Some(Scope::Group) => actor.is_group,
            Some(Scope::Any) | None => true,
        }
    }
}
