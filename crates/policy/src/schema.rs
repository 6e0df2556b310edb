//! The policy document (`policy.json`).
//!
//! ```json
//! {
//!   "version": 1,
//!   "defaults": {
//!     "access": "allow",
//!     "whenToReply": { "dm": "always", "group": "mention_only" }
//!   },
//!   "rules": [
//!     { "name": "block-spam", "match": { "senders": ["spam*"] }, "access": "deny" },
//!     {
//!       "name": "family",
//!       "match": { "channels": ["whatsapp"], "chats": ["family@g.us"] },
//!       "whenToReply": "always",
//!       "allowedTools": ["weather", "web_search"],
//!       "persona": "family.md"
//!     }
//!   ]
//! }
//! ```
//!
//! Rules are checked top to bottom. Each axis (access, reply, tools, persona)
//! is decided by the first matching rule that says anything about it; rules
//! that leave an axis unset fall through to later rules and then to
//! `defaults`.

use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: u32 = 1;

/// The whole policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub defaults: PolicyDefaults,

    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            defaults: PolicyDefaults::default(),
            rules: Vec::new(),
        }
    }
}

/// What applies when no rule decides an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefaults {
    #[serde(default)]
    pub access: Access,

    #[serde(default)]
    pub when_to_reply: WhenToReply,

    /// `None` keeps every registered tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub denied_tools: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            access: Access::Allow,
            when_to_reply: WhenToReply::default(),
            allowed_tools: None,
            denied_tools: Vec::new(),
            persona: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    Allow,
    Deny,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Allow => "allow",
            Access::Deny => "deny",
        }
    }
}

/// When to answer inside an accepted conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    Always,
    /// Only when the bot is mentioned or replied to
    MentionOnly,
    Never,
}

impl ReplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyMode::Always => "always",
            ReplyMode::MentionOnly => "mention_only",
            ReplyMode::Never => "never",
        }
    }
}

/// Reply modes per conversation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhenToReply {
    #[serde(default = "default_dm_mode")]
    pub dm: ReplyMode,

    #[serde(default = "default_group_mode")]
    pub group: ReplyMode,
}

fn default_dm_mode() -> ReplyMode {
    ReplyMode::Always
}
fn default_group_mode() -> ReplyMode {
    ReplyMode::MentionOnly
}

impl Default for WhenToReply {
    fn default() -> Self {
        Self {
            dm: default_dm_mode(),
            group: default_group_mode(),
        }
    }
}

/// A rule's reply setting: one mode for both kinds, or per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyOverride {
    Both(ReplyMode),
    PerKind {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dm: Option<ReplyMode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<ReplyMode>,
    },
}

impl ReplyOverride {
    /// The mode this override sets for a conversation kind, if any.
    pub fn mode_for(&self, is_group: bool) -> Option<ReplyMode> {
        match self {
            ReplyOverride::Both(mode) => Some(*mode),
            ReplyOverride::PerKind { dm, group } => {
                if is_group {
                    *group
                } else {
                    *dm
                }
            }
        }
    }
}

/// One policy rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "match", default)]
    pub matcher: RuleMatch,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_to_reply: Option<ReplyOverride>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

impl PolicyRule {
    /// Whether this rule says anything about the tool axis.
    pub fn scopes_tools(&self) -> bool {
        self.allowed_tools.is_some() || self.denied_tools.is_some()
    }

    /// Every tool name the rule refers to.
    pub fn referenced_tools(&self) -> impl Iterator<Item = &String> {
        self.allowed_tools
            .iter()
            .flatten()
            .chain(self.denied_tools.iter().flatten())
    }
}

/// Which messages a rule applies to. Empty lists match everything; all
/// non-empty criteria must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,

    /// Sender patterns, checked against the primary id and every alias
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub senders: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chats: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Dm,
    Group,
    Any,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default_policy() {
        let policy: PolicyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, PolicyConfig::default());
        assert_eq!(policy.defaults.access, Access::Allow);
        assert_eq!(policy.defaults.when_to_reply.dm, ReplyMode::Always);
        assert_eq!(policy.defaults.when_to_reply.group, ReplyMode::MentionOnly);
    }

    #[test]
    fn parses_camel_case_rules() {
        let policy: PolicyConfig = serde_json::from_str(
            r#"{
                "version": 1,
                "defaults": { "access": "deny", "whenToReply": { "group": "never" } },
                "rules": [
                    {
                        "name": "owner",
                        "match": { "senders": ["+4917*"], "scope": "dm" },
                        "access": "allow",
                        "whenToReply": "always",
                        "deniedTools": ["exec"]
                    },
                    {
                        "match": { "channels": ["telegram"] },
                        "whenToReply": { "group": "always" }
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(policy.defaults.access, Access::Deny);
        assert_eq!(policy.defaults.when_to_reply.dm, ReplyMode::Always);
        assert_eq!(policy.defaults.when_to_reply.group, ReplyMode::Never);

        let owner = &policy.rules[0];
        assert_eq!(owner.matcher.scope, Some(Scope::Dm));
        assert_eq!(owner.when_to_reply, Some(ReplyOverride::Both(ReplyMode::Always)));
        assert!(owner.scopes_tools());

        let tg = &policy.rules[1];
        assert_eq!(tg.when_to_reply.unwrap().mode_for(true), Some(ReplyMode::Always));
        assert_eq!(tg.when_to_reply.unwrap().mode_for(false), None);
        assert!(!tg.scopes_tools());
    }

    #[test]
    fn serializes_without_empty_fields() {
        let json = serde_json::to_string(&PolicyConfig::default()).unwrap();
        assert!(json.contains("\"whenToReply\""));
        assert!(json.contains("\"mention_only\""));
        assert!(!json.contains("allowedTools"));
        assert!(!json.contains("persona"));
    }

    #[test]
    fn unknown_reply_mode_is_rejected() {
        let parsed: Result<PolicyConfig, _> = serde_json::from_str(
            r#"{ "defaults": { "whenToReply": { "dm": "sometimes" } } }"#,
        );
        assert!(parsed.is_err());
    }
}
