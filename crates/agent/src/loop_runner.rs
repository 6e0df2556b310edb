//! The agent reasoning loop implementation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nanoclaw_config::AppConfig;
use nanoclaw_core::bus::{InboundMessage, MessageBus, OutboundMessage, Received, preview};
use nanoclaw_core::identity::Identity;
use nanoclaw_core::message::{Message, Role};
use nanoclaw_core::provider::{Provider, ProviderRequest, ToolDefinition};
use nanoclaw_core::session::SessionStore;
use nanoclaw_core::tool::{ToolContext, ToolRegistry};
use nanoclaw_policy::{ActorContext, PolicyDecision, PolicyEngine, ReplyVerdict};
use nanoclaw_tools::weather::WeatherSource;
use tracing::{debug, error, info, warn};

use crate::context::ContextBuilder;
use crate::fast_path::WeatherFastPath;
use crate::policy_state::{CounterSnapshot, PolicyState, SessionLocks};

pub const DEFAULT_MAX_ITERATIONS: usize = 20;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Reply when the iteration cap is hit without a final answer.
pub const CAP_FALLBACK: &str = "I've completed processing but have no response to give.";
/// Same, for system-originated turns.
pub const SYSTEM_FALLBACK: &str = "Background task completed.";

const DIRECT_SENDER: &str = "user";
const FALLBACK_ORIGIN_CHANNEL: &str = "cli";

/// Split a system message's chat id into its origin `(channel, chat_id)`.
/// Without a `:` the origin is the direct CLI chat.
pub fn parse_origin(chat_id: &str) -> (&str, &str) {
    chat_id
        .split_once(':')
        .unwrap_or((FALLBACK_ORIGIN_CHANNEL, chat_id))
}

/// The core agent loop: consumes inbound messages, applies policy, and runs
/// the provider/tool cycle until a final answer.
pub struct AgentLoop {
    bus: Arc<MessageBus>,

    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    temperature: f32,
    max_tokens: Option<u32>,

    /// Closed set of tools; policy narrows it per message
    tools: Arc<ToolRegistry>,

    sessions: Arc<dyn SessionStore>,
    context: ContextBuilder,

    /// `None` disables policy: everyone is accepted and answered
    policy: Option<Arc<PolicyEngine>>,

    fast_path: Option<WeatherFastPath>,
    state: Arc<PolicyState>,

    /// Serializes turns that share a session key
    locks: SessionLocks,

    /// Maximum provider calls per turn
    max_iterations: usize,
    poll_interval: Duration,
    history_limit: usize,

    running: AtomicBool,
}

impl AgentLoop {
    pub fn new(
        bus: Arc<MessageBus>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            bus,
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            sessions,
            context: ContextBuilder::default(),
            policy: None,
            fast_path: None,
            state: Arc::new(PolicyState::new()),
            locks: SessionLocks::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_limit: DEFAULT_HISTORY_LIMIT,
            running: AtomicBool::new(false),
        }
    }

    /// Apply the `[agent]` settings and provider defaults from `config`.
    /// Policy and the fast path's weather source are attached separately.
    pub fn from_config(
        config: &AppConfig,
        bus: Arc<MessageBus>,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let model = provider
            .default_model()
            .map(str::to_string)
            .unwrap_or_else(|| config.default_model.clone());

        Self::new(bus, provider, model, tools, sessions)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_iterations(config.agent.max_iterations)
            .with_poll_interval(Duration::from_millis(config.agent.poll_interval_ms))
            .with_history_limit(config.agent.history_limit)
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.context = ContextBuilder::new(identity);
        self
    }

    /// Attach a policy engine. Tool names it references that are not
    /// registered are reported once, here.
    pub fn with_policy(mut self, engine: Arc<PolicyEngine>) -> Self {
        let unknown = engine.validate(&self.tool_names());
        debug!(unknown = unknown.len(), rules = engine.rule_count(), "Policy attached");
        self.policy = Some(engine);
        self
    }

    /// Enable the weather fast path backed by `source`.
    pub fn with_fast_path(mut self, source: Arc<dyn WeatherSource>) -> Self {
        self.fast_path = Some(WeatherFastPath::new(source));
        self
    }

    /// Share counters and warning state with the host.
    pub fn with_policy_state(mut self, state: Arc<PolicyState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Current values of the policy counters.
    pub fn policy_counters(&self) -> CounterSnapshot {
        self.state.counters.snapshot()
    }

    pub fn policy_state(&self) -> Arc<PolicyState> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Consume the inbound queue until [`stop`](Self::stop) or the bus closes.
    ///
    /// One message is fully processed before the next is taken. A failed turn
    /// is answered with an apology and never ends the loop.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!(model = %self.model, max_iterations = self.max_iterations, "Agent loop started");

        while self.running.load(Ordering::SeqCst) {
            let msg = match self.bus.consume_inbound(self.poll_interval).await {
                Received::Message(msg) => msg,
                Received::Timeout => continue,
                Received::Closed => {
                    info!("Inbound queue closed");
                    break;
                }
            };
            self.handle(msg).await;
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Agent loop stopped");
    }

    /// Ask [`run`](Self::run) to exit. Takes effect within one poll interval.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Agent loop stopping");
    }

    async fn handle(&self, msg: InboundMessage) {
        match self.process_message(&msg).await {
            Ok(Some(reply)) => self.publish(reply),
            Ok(None) => {}
            Err(e) => {
                error!(channel = %msg.channel, chat = %msg.chat_id, error = %e, "Error processing message");
                let (channel, chat_id) = if msg.is_system() {
                    parse_origin(&msg.chat_id)
                } else {
                    (msg.channel.as_str(), msg.chat_id.as_str())
                };
                self.publish(OutboundMessage::new(
                    channel,
                    chat_id,
                    format!("Sorry, I encountered an error: {e}"),
                ));
            }
        }
    }

    fn publish(&self, reply: OutboundMessage) {
        if let Err(e) = self.bus.publish_outbound(reply) {
            warn!(error = %e, "Failed to publish outbound message");
        }
    }

    /// Process one message and return the reply, or `None` when policy drops it.
    pub async fn process_message(
        &self,
        msg: &InboundMessage,
    ) -> nanoclaw_core::Result<Option<OutboundMessage>> {
        if msg.is_system() {
            return self.process_system_message(msg).await.map(Some);
        }

        info!(
            channel = %msg.channel,
            sender = %msg.sender_id,
            preview = %msg.preview(80),
            "Processing message"
        );

        let decision = self.policy_decision(msg);
        if !decision.accept_message {
            self.state.counters.record_access_drop();
            debug!(channel = %msg.channel, sender = %msg.sender_id, "Dropped by access policy");
            return Ok(None);
        }
        if !decision.should_respond {
            self.state.counters.record_reply_drop();
            debug!(channel = %msg.channel, chat = %msg.chat_id, verdict = %decision.reply_verdict, "Not replying");
            return Ok(None);
        }

        let key = msg.session_key();
        let _turn = self.locks.lock(&key).await;
        let mut session = self.sessions.get_or_create(&key).await?;
        let persona = self
            .policy
            .as_ref()
            .and_then(|engine| engine.persona_text(decision.persona_file.as_deref()));

        if let Some(fast_path) = &self.fast_path
            && let Some(answer) = fast_path.try_answer(&msg.content).await
        {
            info!(
                channel = %msg.channel,
                sender = %msg.sender_id,
                preview = %preview(&answer, 120),
                "Response (weather fast path)"
            );
            session.add_message(Role::User, &msg.content);
            session.add_message(Role::Assistant, &answer);
            self.sessions.save(&session).await?;
            return Ok(Some(OutboundMessage::new(&msg.channel, &msg.chat_id, answer)));
        }

        self.tools
            .set_context(&ToolContext::new(&msg.channel, &msg.chat_id));

        let mut messages = self.context.build_messages(
            session.history(self.history_limit),
            &msg.content,
            persona.as_deref(),
            &msg.media,
            &msg.channel,
            &msg.chat_id,
        );
        let definitions: Vec<ToolDefinition> = self
            .tools
            .definitions()
            .into_iter()
            .filter(|d| decision.allows_tool(&d.name))
            .collect();

        let final_content = self
            .run_iterations(&mut messages, definitions, Some(&decision.allowed_tools))
            .await?
            .unwrap_or_else(|| CAP_FALLBACK.to_string());

        info!(
            channel = %msg.channel,
            sender = %msg.sender_id,
            preview = %preview(&final_content, 120),
            "Response"
        );

        session.add_message(Role::User, &msg.content);
        session.add_message(Role::Assistant, &final_content);
        self.sessions.save(&session).await?;

        Ok(Some(OutboundMessage::new(
            &msg.channel,
            &msg.chat_id,
            final_content,
        )))
    }

    /// Process a message published by the runtime itself (channel `system`).
    ///
    /// The chat id names the conversation to answer in. Policy is not
    /// consulted and every tool is offered.
    pub async fn process_system_message(
        &self,
        msg: &InboundMessage,
    ) -> nanoclaw_core::Result<OutboundMessage> {
        info!(sender = %msg.sender_id, "Processing system message");

        let (channel, chat_id) = parse_origin(&msg.chat_id);
        let key = format!("{channel}:{chat_id}");
        let _turn = self.locks.lock(&key).await;
        let mut session = self.sessions.get_or_create(&key).await?;

        self.tools.set_context(&ToolContext::new(channel, chat_id));

        let mut messages = self.context.build_messages(
            session.history(self.history_limit),
            &msg.content,
            None,
            &msg.media,
            channel,
            chat_id,
        );

        let final_content = self
            .run_iterations(&mut messages, self.tools.definitions(), None)
            .await?
            .unwrap_or_else(|| SYSTEM_FALLBACK.to_string());

        session.add_message(
            Role::User,
            format!("[System: {}] {}", msg.sender_id, msg.content),
        );
        session.add_message(Role::Assistant, &final_content);
        self.sessions.save(&session).await?;

        Ok(OutboundMessage::new(channel, chat_id, final_content))
    }

    /// Process `content` as if `user` sent it on `channel`/`chat_id` and
    /// return the reply text. Empty when policy drops the message.
    pub async fn process_direct(
        &self,
        content: &str,
        channel: &str,
        chat_id: &str,
    ) -> nanoclaw_core::Result<String> {
        let msg = InboundMessage::new(channel, DIRECT_SENDER, chat_id, content);
        Ok(self
            .process_message(&msg)
            .await?
            .map(|reply| reply.content)
            .unwrap_or_default())
    }

    fn tool_names(&self) -> BTreeSet<String> {
        self.tools.names().into_iter().map(str::to_string).collect()
    }

    fn policy_decision(&self, msg: &InboundMessage) -> PolicyDecision {
        let default_tools = self.tool_names();
        let Some(engine) = &self.policy else {
            return PolicyDecision::allow_all(&default_tools, "policy_disabled");
        };

        let actor = ActorContext::from_message(msg);
        let decision = engine.evaluate(&actor, &default_tools);

        if decision.reply_verdict == ReplyVerdict::MissingMetadata
            && self.state.first_missing_metadata(&msg.channel, &msg.chat_id)
        {
            warn!(
                channel = %msg.channel,
                chat = %msg.chat_id,
                "Mention metadata missing; mention-only group replies fail closed until the channel supplies it"
            );
        }
        decision
    }

    /// The provider/tool cycle. `Some(answer)` on a final non-empty reply,
    /// `None` when the iteration cap runs out first.
    ///
    /// With `allowed` set, calls to tools outside it are refused without
    /// running and counted.
    async fn run_iterations(
        &self,
        messages: &mut Vec<Message>,
        tools: Vec<ToolDefinition>,
        allowed: Option<&BTreeSet<String>>,
    ) -> nanoclaw_core::Result<Option<String>> {
        for iteration in 1..=self.max_iterations {
            let mut request = ProviderRequest::new(&self.model, messages.clone());
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;
            request.tools = tools.clone();

            debug!(iteration, messages = messages.len(), "Calling provider");
            let response = self.provider.complete(request).await?;

            if !response.has_tool_calls() {
                let content = response.content().trim();
                return Ok((!content.is_empty()).then(|| content.to_string()));
            }

            let calls = response.tool_calls();
            ContextBuilder::add_assistant_message(
                messages,
                response.content(),
                response.message.tool_calls.clone(),
            );

            for call in calls {
                let args = serde_json::to_string(&call.arguments).unwrap_or_default();
                info!("Tool call: {}({})", call.name, truncate_chars(&args, 200));

                let result = match allowed {
                    Some(set) if !set.contains(&call.name) => {
                        self.state.counters.record_blocked_tool();
                        warn!(tool = %call.name, "Tool call blocked by policy");
                        format!(
                            "Error: Tool '{}' is blocked by policy for this chat.",
                            call.name
                        )
                    }
                    _ => self.tools.execute(&call.name, call.arguments.clone()).await,
                };

                ContextBuilder::add_tool_result(messages, &call.id, &call.name, &result);
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "Iteration cap reached without a final answer"
        );
        Ok(None)
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
