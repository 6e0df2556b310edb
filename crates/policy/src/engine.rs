//! The policy engine: actor in, decision out.
//!
//! `evaluate` is a pure function of the policy document and the actor. It
//! keeps no counters and no warning state; the agent loop owns those.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use nanoclaw_core::bus::{InboundMessage, SENDER_ALIAS_DELIMITER, meta};
use tracing::{debug, warn};

use crate::error::PolicyError;
use crate::loader;
use crate::schema::{Access, CURRENT_VERSION, PolicyConfig, PolicyRule, ReplyMode};

/// The identity and conversation context a decision is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub channel: String,
    pub chat_id: String,
    pub sender_primary: String,
    /// Every alias in arrival order, primary first, without duplicates.
    pub sender_aliases: Vec<String>,
    pub is_group: bool,
    /// `None` when the channel did not report mentions at all.
    pub mentioned_bot: Option<bool>,
    /// `None` when the channel did not report reply targets at all.
    pub reply_to_bot: Option<bool>,
}

/// Split a raw sender id into its primary id and de-duplicated aliases.
///
/// `"123|@alice|123"` becomes `("123", ["123", "@alice"])`. Blank parts are
/// dropped; an all-blank sender yields an empty primary and no aliases.
pub fn sender_aliases(raw: &str) -> (String, Vec<String>) {
    let mut aliases: Vec<String> = Vec::new();
    for part in raw.split(SENDER_ALIAS_DELIMITER).map(str::trim) {
        if !part.is_empty() && !aliases.iter().any(|a| a == part) {
            aliases.push(part.to_string());
        }
    }
    let primary = aliases.first().cloned().unwrap_or_default();
    (primary, aliases)
}

impl ActorContext {
    /// A direct-message actor with a single sender id.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self::from_sender(channel, chat_id, &sender.into())
    }

    /// A direct-message actor from a raw, possibly `|`-joined, sender id.
    pub fn from_sender(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        raw_sender: &str,
    ) -> Self {
        let (sender_primary, sender_aliases) = sender_aliases(raw_sender);
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            sender_primary,
            sender_aliases,
            is_group: false,
            mentioned_bot: None,
            reply_to_bot: None,
        }
    }

    /// Derive the actor from an inbound message and its metadata.
    pub fn from_message(msg: &InboundMessage) -> Self {
        Self {
            is_group: msg.metadata_flag(meta::IS_GROUP).unwrap_or(false),
            mentioned_bot: msg.metadata_flag(meta::MENTIONED_BOT),
            reply_to_bot: msg.metadata_flag(meta::REPLY_TO_BOT),
            ..Self::from_sender(&msg.channel, &msg.chat_id, &msg.sender_id)
        }
    }

    pub fn group(mut self, is_group: bool) -> Self {
        self.is_group = is_group;
        self
    }

    pub fn mentioned(mut self, mentioned: Option<bool>) -> Self {
        self.mentioned_bot = mentioned;
        self
    }

    pub fn replying_to_bot(mut self, reply: Option<bool>) -> Self {
        self.reply_to_bot = reply;
        self
    }

    /// Primary id and aliases, each once.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.sender_aliases.iter().map(String::as_str)
    }
}

/// Outcome of the reply axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyVerdict {
    Respond,
    Silent,
    /// Reply depends on mention metadata the channel did not supply.
    /// Treated as silent.
    MissingMetadata,
}

impl ReplyVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyVerdict::Respond => "respond",
            ReplyVerdict::Silent => "silent",
            ReplyVerdict::MissingMetadata => "missing_metadata",
        }
    }
}

impl std::fmt::Display for ReplyVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verdict for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub accept_message: bool,
    /// Implies `accept_message`.
    pub should_respond: bool,
    pub reply_verdict: ReplyVerdict,
    pub allowed_tools: BTreeSet<String>,
    pub persona_file: Option<String>,
    /// `;`-separated tags naming what decided each axis, e.g.
    /// `access:default_allow;when_to_reply:always_dm;tools:default;persona:none`.
    pub reason: String,
}

impl PolicyDecision {
    /// Accept and answer with every tool. Used when policy is disabled.
    pub fn allow_all(default_tools: &BTreeSet<String>, reason: impl Into<String>) -> Self {
        Self {
            accept_message: true,
            should_respond: true,
            reply_verdict: ReplyVerdict::Respond,
            allowed_tools: default_tools.clone(),
            persona_file: None,
            reason: reason.into(),
        }
    }

    pub fn allows_tool(&self, name: &str) -> bool {
        self.allowed_tools.contains(name)
    }
}

/// Evaluates a [`PolicyConfig`] against actors.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    config: PolicyConfig,
    personas_dir: Option<PathBuf>,
}

fn rule_tag(index: usize, rule: &PolicyRule) -> String {
    match &rule.name {
        Some(name) => format!("rule:{name}"),
        None => format!("rule:#{index}"),
    }
}

fn narrow_tools(
    default_tools: &BTreeSet<String>,
    allowed: Option<&Vec<String>>,
    denied: &[String],
) -> BTreeSet<String> {
    default_tools
        .iter()
        .filter(|t| allowed.is_none_or(|list| list.contains(t)))
        .filter(|t| !denied.contains(t))
        .cloned()
        .collect()
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            personas_dir: None,
        }
    }

    /// Resolve relative persona references against `<dir>/personas/`.
    pub fn with_base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.personas_dir = Some(dir.as_ref().join("personas"));
        self
    }

    /// Load the policy at `path` (defaults when missing), with persona
    /// references resolved next to it.
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let config = loader::load_policy(path)?;
        let engine = Self::new(config);
        Ok(match path.parent() {
            Some(dir) => engine.with_base_dir(dir),
            None => engine,
        })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn rule_count(&self) -> usize {
        self.config.rules.len()
    }

    /// Decide access, reply, tool scope, and persona for `actor`.
    pub fn evaluate(
        &self,
        actor: &ActorContext,
        default_tools: &BTreeSet<String>,
    ) -> PolicyDecision {
        let defaults = &self.config.defaults;
        let matching: Vec<(usize, &PolicyRule)> = self
            .config
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.matcher.matches(actor))
            .collect();

        // Access
        let access_rule = matching
            .iter()
            .find_map(|(i, rule)| rule.access.map(|a| (a, rule_tag(*i, rule))));
        let (access, access_reason) = match access_rule {
            Some((access, tag)) => (access, format!("access:{tag}:{}", access.as_str())),
            None => (
                defaults.access,
                format!("access:default_{}", defaults.access.as_str()),
            ),
        };

        if access == Access::Deny {
            let decision = PolicyDecision {
                accept_message: false,
                should_respond: false,
                reply_verdict: ReplyVerdict::Silent,
                allowed_tools: BTreeSet::new(),
                persona_file: None,
                reason: access_reason,
            };
            log_decision(actor, &decision);
            return decision;
        }

        // Reply
        let kind = if actor.is_group { "group" } else { "dm" };
        let reply_rule = matching.iter().find_map(|(i, rule)| {
            rule.when_to_reply
                .and_then(|w| w.mode_for(actor.is_group))
                .map(|mode| (mode, format!("{}:", rule_tag(*i, rule))))
        });
        let default_mode = if actor.is_group {
            defaults.when_to_reply.group
        } else {
            defaults.when_to_reply.dm
        };
        let (mode, source) = reply_rule.unwrap_or((default_mode, String::new()));
        let (reply_verdict, detail) = reply_verdict(mode, actor);
        let reply_reason = format!("when_to_reply:{source}{}_{kind}{detail}", mode.as_str());

        // Tools
        let tools_rule = matching.iter().find(|(_, rule)| rule.scopes_tools());
        let (allowed_tools, tools_reason) = match tools_rule {
            Some((i, rule)) => (
                narrow_tools(
                    default_tools,
                    rule.allowed_tools.as_ref(),
                    rule.denied_tools.as_deref().unwrap_or_default(),
                ),
                format!("tools:{}", rule_tag(*i, rule)),
            ),
            None => (
                narrow_tools(
                    default_tools,
                    defaults.allowed_tools.as_ref(),
                    &defaults.denied_tools,
                ),
                "tools:default".to_string(),
            ),
        };

        // Persona
        let persona_rule = matching
            .iter()
            .find_map(|(i, rule)| rule.persona.clone().map(|p| (p, rule_tag(*i, rule))));
        let (persona_file, persona_reason) = match persona_rule {
            Some((persona, tag)) => (Some(persona), format!("persona:{tag}")),
            None => match &defaults.persona {
                Some(persona) => (Some(persona.clone()), "persona:default".to_string()),
                None => (None, "persona:none".to_string()),
            },
        };

        let decision = PolicyDecision {
            accept_message: true,
            should_respond: reply_verdict == ReplyVerdict::Respond,
            reply_verdict,
            allowed_tools,
            persona_file,
            reason: [access_reason, reply_reason, tools_reason, persona_reason].join(";"),
        };
        log_decision(actor, &decision);
        decision
    }

    /// Warn about tool names the policy mentions that no registered tool
    /// provides. Returns them sorted.
    pub fn validate(&self, known_tools: &BTreeSet<String>) -> Vec<String> {
        if self.config.version > CURRENT_VERSION {
            warn!(
                version = self.config.version,
                supported = CURRENT_VERSION,
                "Policy file is newer than this build understands"
            );
        }

        let defaults = &self.config.defaults;
        let mut unknown: BTreeSet<String> = BTreeSet::new();

        for name in defaults
            .allowed_tools
            .iter()
            .flatten()
            .chain(defaults.denied_tools.iter())
        {
            if !known_tools.contains(name) {
                warn!(tool = %name, scope = "defaults", "Policy references unknown tool");
                unknown.insert(name.clone());
            }
        }

        for (i, rule) in self.config.rules.iter().enumerate() {
            for name in rule.referenced_tools() {
                if !known_tools.contains(name) {
                    warn!(tool = %name, scope = %rule_tag(i, rule), "Policy references unknown tool");
                    unknown.insert(name.clone());
                }
            }
        }

        unknown.into_iter().collect()
    }

    /// Load the persona text a decision refers to.
    ///
    /// Relative references resolve against the policy's `personas/`
    /// directory. Unreadable or blank personas are logged and treated as
    /// absent.
    pub fn persona_text(&self, persona_file: Option<&str>) -> Option<String> {
        let reference = persona_file?.trim();
        if reference.is_empty() {
            return None;
        }

        let path = nanoclaw_config::expand_tilde(reference);
        let path = match (&self.personas_dir, path.is_relative()) {
            (Some(dir), true) => dir.join(path),
            _ => path,
        };

        match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                warn!(persona = %path.display(), "Persona file is empty, ignoring");
                None
            }
            Err(e) => {
                warn!(persona = %path.display(), error = %e, "Failed to read persona file");
                None
            }
        }
    }
}

fn reply_verdict(mode: ReplyMode, actor: &ActorContext) -> (ReplyVerdict, &'static str) {
    match mode {
        ReplyMode::Always => (ReplyVerdict::Respond, ""),
        ReplyMode::Never => (ReplyVerdict::Silent, ""),
        // A direct message is addressed to the bot by definition.
        ReplyMode::MentionOnly if !actor.is_group => (ReplyVerdict::Respond, ""),
        ReplyMode::MentionOnly => match (actor.mentioned_bot, actor.reply_to_bot) {
            (Some(true), _) => (ReplyVerdict::Respond, ":mentioned"),
            (_, Some(true)) => (ReplyVerdict::Respond, ":reply_to_bot"),
            (None, None) => (ReplyVerdict::MissingMetadata, ":missing_metadata"),
            _ => (ReplyVerdict::Silent, ":not_mentioned"),
        },
    }
}

fn log_decision(actor: &ActorContext, decision: &PolicyDecision) {
    debug!(
        target: "nanoclaw::policy",
        channel = %actor.channel,
        chat = %actor.chat_id,
        sender = %actor.sender_primary,
        aliases = ?actor.sender_aliases,
        is_group = actor.is_group,
        mentioned = ?actor.mentioned_bot,
        reply_to_bot = ?actor.reply_to_bot,
        accepted = decision.accept_message,
        replied = decision.should_respond,
        verdict = %decision.reply_verdict,
        reason = %decision.reason,
        tools = ?decision.allowed_tools,
        persona = decision.persona_file.as_deref().unwrap_or("-"),
        "policy_decision"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PolicyDefaults, ReplyOverride, RuleMatch, Scope};

    fn tools(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn all_tools() -> BTreeSet<String> {
        tools(&["exec", "message", "read_file", "weather", "web_search"])
    }

    fn rule(name: &str, matcher: RuleMatch) -> PolicyRule {
        PolicyRule {
            name: Some(name.into()),
            matcher,
            ..Default::default()
        }
    }

    fn senders(list: &[&str]) -> RuleMatch {
        RuleMatch {
            senders: list.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn sender_aliases_are_ordered_and_unique() {
        let (primary, aliases) = sender_aliases(" 123 | @alice |123||");
        assert_eq!(primary, "123");
        assert_eq!(aliases, vec!["123", "@alice"]);

        let (primary, aliases) = sender_aliases("  ");
        assert_eq!(primary, "");
        assert!(aliases.is_empty());
    }

    #[test]
    fn actor_from_message_reads_metadata() {
        let msg = InboundMessage::new("whatsapp", "491|+49 1", "g@g.us", "hi")
            .with_metadata(meta::IS_GROUP, true)
            .with_metadata(meta::MENTIONED_BOT, false);
        let actor = ActorContext::from_message(&msg);
        assert_eq!(actor.sender_primary, "491");
        assert_eq!(actor.sender_aliases, vec!["491", "+49 1"]);
        assert!(actor.is_group);
        assert_eq!(actor.mentioned_bot, Some(false));
        assert_eq!(actor.reply_to_bot, None);
    }

    #[test]
    fn default_policy_answers_dms_with_all_tools() {
        let engine = PolicyEngine::default();
        let d = engine.evaluate(&ActorContext::new("telegram", "1", "42"), &all_tools());

        assert!(d.accept_message);
        assert!(d.should_respond);
        assert_eq!(d.allowed_tools, all_tools());
        assert_eq!(d.persona_file, None);
        assert_eq!(
            d.reason,
            "access:default_allow;when_to_reply:always_dm;tools:default;persona:none"
        );
    }

    #[test]
    fn deny_rule_drops_message() {
        let engine = PolicyEngine::new(PolicyConfig {
            rules: vec![PolicyRule {
                access: Some(Access::Deny),
                ..rule("blocked", senders(&["spammer"]))
            }],
            ..Default::default()
        });

        let d = engine.evaluate(&ActorContext::new("telegram", "1", "spammer"), &all_tools());
        assert!(!d.accept_message);
        assert!(!d.should_respond);
        assert!(d.allowed_tools.is_empty());
        assert_eq!(d.reason, "access:rule:blocked:deny");
    }

    #[test]
    fn default_deny_with_allow_rule_for_alias() {
        let engine = PolicyEngine::new(PolicyConfig {
            defaults: PolicyDefaults {
                access: Access::Deny,
                ..Default::default()
            },
            rules: vec![PolicyRule {
                access: Some(Access::Allow),
                ..rule("owner", senders(&["@owner"]))
            }],
            ..Default::default()
        });

        let stranger = engine.evaluate(&ActorContext::new("telegram", "1", "99"), &all_tools());
        assert!(!stranger.accept_message);
        assert_eq!(stranger.reason, "access:default_deny");

        let owner = ActorContext::from_sender("telegram", "1", "77|@owner");
        assert!(engine.evaluate(&owner, &all_tools()).accept_message);
    }

    #[test]
    fn group_without_mention_stays_silent() {
        let engine = PolicyEngine::default();
        let actor = ActorContext::new("telegram", "g", "42")
            .group(true)
            .mentioned(Some(false))
            .replying_to_bot(Some(false));

        let d = engine.evaluate(&actor, &all_tools());
        assert!(d.accept_message);
        assert!(!d.should_respond);
        assert_eq!(d.reply_verdict, ReplyVerdict::Silent);
        assert!(d.reason.contains("when_to_reply:mention_only_group:not_mentioned"));
    }

    #[test]
    fn group_mention_or_reply_gets_answer() {
        let engine = PolicyEngine::default();
        let base = ActorContext::new("telegram", "g", "42").group(true);

        let mentioned = engine.evaluate(&base.clone().mentioned(Some(true)), &all_tools());
        assert!(mentioned.should_respond);

        let replied = engine.evaluate(
            &base.mentioned(Some(false)).replying_to_bot(Some(true)),
            &all_tools(),
        );
        assert!(replied.should_respond);
        assert!(replied.reason.contains(":reply_to_bot"));
    }

    #[test]
    fn missing_mention_metadata_fails_closed() {
        let engine = PolicyEngine::default();
        let actor = ActorContext::new("whatsapp", "g", "42").group(true);

        let d = engine.evaluate(&actor, &all_tools());
        assert!(d.accept_message);
        assert!(!d.should_respond);
        assert_eq!(d.reply_verdict, ReplyVerdict::MissingMetadata);
        assert!(d.reason.contains("when_to_reply:mention_only_group:missing_metadata"));
    }

    #[test]
    fn axes_are_decided_independently() {
        // The first matching rule only sets access; reply and tools come
        // from the later rule.
        let engine = PolicyEngine::new(PolicyConfig {
            rules: vec![
                PolicyRule {
                    access: Some(Access::Allow),
                    ..rule("first", senders(&["*"]))
                },
                PolicyRule {
                    access: Some(Access::Deny),
                    when_to_reply: Some(ReplyOverride::Both(ReplyMode::Always)),
                    allowed_tools: Some(vec!["weather".into()]),
                    ..rule("second", senders(&["42"]))
                },
            ],
            ..Default::default()
        });

        let actor = ActorContext::new("telegram", "g", "42").group(true);
        let d = engine.evaluate(&actor, &all_tools());
        assert!(d.accept_message);
        assert!(d.should_respond);
        assert_eq!(d.allowed_tools, tools(&["weather"]));
        assert!(d.reason.starts_with("access:rule:first:allow;"));
        assert!(d.reason.contains("when_to_reply:rule:second:always_group"));
        assert!(d.reason.contains("tools:rule:second"));
    }

    #[test]
    fn per_kind_override_falls_through_for_other_kind() {
        let engine = PolicyEngine::new(PolicyConfig {
            rules: vec![PolicyRule {
                when_to_reply: Some(ReplyOverride::PerKind {
                    dm: None,
                    group: Some(ReplyMode::Always),
                }),
                ..rule("tg", RuleMatch::default())
            }],
            ..Default::default()
        });

        let dm = engine.evaluate(&ActorContext::new("telegram", "1", "42"), &all_tools());
        assert!(dm.reason.contains("when_to_reply:always_dm"));

        let group = engine.evaluate(
            &ActorContext::new("telegram", "g", "42").group(true),
            &all_tools(),
        );
        assert!(group.should_respond);
    }

    #[test]
    fn never_mode_silences_dm() {
        let engine = PolicyEngine::new(PolicyConfig {
            rules: vec![PolicyRule {
                when_to_reply: Some(ReplyOverride::Both(ReplyMode::Never)),
                ..rule("mute", RuleMatch {
                    chats: vec!["muted".into()],
                    ..Default::default()
                })
            }],
            ..Default::default()
        });
        let d = engine.evaluate(&ActorContext::new("cli", "muted", "user"), &all_tools());
        assert!(d.accept_message);
        assert!(!d.should_respond);
    }

    #[test]
    fn tool_scope_uses_allow_and_deny_lists() {
        let engine = PolicyEngine::new(PolicyConfig {
            defaults: PolicyDefaults {
                denied_tools: vec!["exec".into()],
                ..Default::default()
            },
            rules: vec![PolicyRule {
                allowed_tools: Some(vec!["exec".into(), "weather".into(), "ghost".into()]),
                denied_tools: Some(vec!["weather".into()]),
                ..rule("ops", RuleMatch {
                    scope: Some(Scope::Dm),
                    senders: vec!["admin".into()],
                    ..Default::default()
                })
            }],
            ..Default::default()
        });

        let admin = engine.evaluate(&ActorContext::new("cli", "d", "admin"), &all_tools());
        assert_eq!(admin.allowed_tools, tools(&["exec"]));

        let other = engine.evaluate(&ActorContext::new("cli", "d", "guest"), &all_tools());
        assert!(!other.allows_tool("exec"));
        assert!(other.allows_tool("weather"));
        assert_eq!(other.allowed_tools.len(), all_tools().len() - 1);
    }

    #[test]
    fn persona_from_rule_then_defaults() {
        let engine = PolicyEngine::new(PolicyConfig {
            defaults: PolicyDefaults {
                persona: Some("default.md".into()),
                ..Default::default()
            },
            rules: vec![PolicyRule {
                persona: Some("family.md".into()),
                ..rule("family", RuleMatch {
                    chats: vec!["family".into()],
                    ..Default::default()
                })
            }],
            ..Default::default()
        });

        let family = engine.evaluate(&ActorContext::new("wa", "family", "mom"), &all_tools());
        assert_eq!(family.persona_file.as_deref(), Some("family.md"));
        assert!(family.reason.ends_with("persona:rule:family"));

        let other = engine.evaluate(&ActorContext::new("wa", "work", "boss"), &all_tools());
        assert_eq!(other.persona_file.as_deref(), Some("default.md"));
    }

    #[test]
    fn unnamed_rules_are_tagged_by_index() {
        let engine = PolicyEngine::new(PolicyConfig {
            rules: vec![
                rule("unused", senders(&["nobody"])),
                PolicyRule {
                    access: Some(Access::Deny),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });
        let d = engine.evaluate(&ActorContext::new("cli", "d", "x"), &all_tools());
        assert_eq!(d.reason, "access:rule:#1:deny");
    }

    #[test]
    fn validate_reports_unknown_tools() {
        let engine = PolicyEngine::new(PolicyConfig {
            defaults: PolicyDefaults {
                denied_tools: vec!["spawn".into()],
                ..Default::default()
            },
            rules: vec![PolicyRule {
                allowed_tools: Some(vec!["weather".into(), "cron".into()]),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(engine.validate(&all_tools()), vec!["cron", "spawn"]);
        assert!(PolicyEngine::default().validate(&all_tools()).is_empty());
    }

    #[test]
    fn persona_text_resolves_relative_to_policy_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("personas")).unwrap();
        std::fs::write(tmp.path().join("personas/pirate.md"), "Talk like a pirate.\n").unwrap();

        let engine = PolicyEngine::default().with_base_dir(tmp.path());
        assert_eq!(
            engine.persona_text(Some("pirate.md")).as_deref(),
            Some("Talk like a pirate.")
        );
        assert_eq!(engine.persona_text(Some("missing.md")), None);
        assert_eq!(engine.persona_text(None), None);
    }

    #[test]
    fn should_respond_implies_accept() {
        let engine = PolicyEngine::new(PolicyConfig {
            defaults: PolicyDefaults {
                access: Access::Deny,
                ..Default::default()
            },
            ..Default::default()
        });
        for actor in [
            ActorContext::new("cli", "d", "u"),
            ActorContext::new("cli", "g", "u").group(true).mentioned(Some(true)),
        ] {
            let d = engine.evaluate(&actor, &all_tools());
            assert!(!d.should_respond || d.accept_message);
        }
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn decision_log_lists_allowed_tools() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(captured.clone())
            .finish();

        let engine = PolicyEngine::default();
        let actor = ActorContext::new("telegram", "555", "42");
        tracing::subscriber::with_default(subscriber, || {
            engine.evaluate(&actor, &tools(&["exec", "read_file"]));
        });

        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = out
            .lines()
            .find(|l| l.contains("policy_decision"))
            .expect("decision line");
        let json: serde_json::Value = serde_json::from_str(line).unwrap();
        let fields = &json["fields"];
        assert_eq!(fields["tools"], r#"{"exec", "read_file"}"#);
        assert_eq!(fields["accepted"], true);
        assert_eq!(fields["sender"], "42");
    }
}
