//! End-to-end tests for the agent: sessions, the tool-calling loop,
//! context limits and provider failover, all against stub providers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use arborclaw::agent::{Agent, ContextBuilder, LoopSettings, Navigation};
use arborclaw::providers::{
    ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ProviderRouter, Role, ToolDefinition,
    Turn,
};
use arborclaw::session::SiblingDirection;
use arborclaw::tools::{EchoTool, ToolRegistry};
use arborclaw::tree::NodeKind;
use arborclaw::{ClawError, Result, RetryPolicy};

// ============================================================================
// Stub providers
// ============================================================================

/// Replies with tool calls for the first `tool_rounds` requests, then text.
/// Records the turns of the last request it saw.
struct StubProvider {
    name: &'static str,
    healthy: bool,
    tool_rounds: u32,
    reply: &'static str,
    calls: AtomicU32,
    last_turns: Mutex<Vec<Turn>>,
}

impl StubProvider {
    fn new(name: &'static str, reply: &'static str) -> Self {
        Self {
            name,
            healthy: true,
            tool_rounds: 0,
            reply,
            calls: AtomicU32::new(0),
            last_turns: Mutex::new(Vec::new()),
        }
    }

    fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    fn with_tool_rounds(mut self, rounds: u32) -> Self {
        self.tool_rounds = rounds;
        self
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for StubProvider {
    async fn chat(
        &self,
        turns: Vec<Turn>,
        _tools: Vec<ToolDefinition>,
        _model: Option<&str>,
        _options: ChatOptions,
    ) -> Result<LLMResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_turns.lock().unwrap() = turns;
        if n < self.tool_rounds {
            let call = LLMToolCall::new(&format!("call_{}", n), "echo", r#"{"message":"tick"}"#);
            return Ok(LLMResponse::with_tools("", vec![call]));
        }
        Ok(LLMResponse::text(self.reply))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn default_model(&self) -> &str {
        "stub-model"
    }

    fn name(&self) -> &str {
        self.name
    }

    fn requires_api_key(&self) -> bool {
        false
    }
}

fn fast_router() -> ProviderRouter {
    let mut router = ProviderRouter::new();
    router.set_last_resort(vec![]);
    router.set_retry_policy(
        RetryPolicy::default()
            .with_initial_backoff_ms(1)
            .with_max_backoff_ms(2),
    );
    router
}

fn single_provider_agent(provider: Arc<StubProvider>, settings: LoopSettings) -> Agent {
    let mut router = fast_router();
    router.register("stub", provider);
    router.set_default_provider("stub");

    let mut tools = ToolRegistry::new();
    tools.register(Box::new(EchoTool));

    Agent::with_parts(
        Arc::new(router),
        Arc::new(tools),
        ContextBuilder::new(),
        settings,
    )
}

// ============================================================================
// Loop
// ============================================================================

#[tokio::test]
async fn test_hi_hello_end_to_end() {
    let provider = Arc::new(StubProvider::new("stub", "hello"));
    let agent = single_provider_agent(provider.clone(), LoopSettings::default());
    let id = agent.create_session("e2e").await;

    let reply = agent.process_message(&id, "hi").await.unwrap();
    assert_eq!(reply, "hello");

    agent
        .with_session(&id, |session| {
            let current = session.current_node().unwrap();
            assert_eq!(current.kind(), NodeKind::Assistant);
            assert_eq!(current.content(), "hello");
            assert_eq!(session.total_messages, 2);
        })
        .await
        .unwrap();

    // The provider saw the system prompt and the user turn, never the root.
    let turns = provider.last_turns.lock().unwrap().clone();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::System);
    assert_eq!(turns[1].content, "hi");
}

#[tokio::test]
async fn test_tool_rounds_produce_pairs() {
    let provider = Arc::new(StubProvider::new("stub", "done").with_tool_rounds(2));
    let agent = single_provider_agent(provider.clone(), LoopSettings::default());
    let id = agent.create_session("tools").await;

    assert_eq!(agent.process_message(&id, "go").await.unwrap(), "done");
    assert_eq!(provider.calls(), 3);

    let kinds = agent
        .with_session(&id, |s| {
            s.path_to_current()
                .unwrap()
                .into_iter()
                .skip(1)
                .map(|n| s.tree().get(n).unwrap().kind())
                .collect::<Vec<_>>()
        })
        .await
        .unwrap();
    assert_eq!(
        kinds,
        vec![
            NodeKind::User,
            NodeKind::ToolCall,
            NodeKind::ToolResult,
            NodeKind::ToolCall,
            NodeKind::ToolResult,
            NodeKind::Assistant,
        ]
    );

    // The final request carried both tool results back to the provider.
    let turns = provider.last_turns.lock().unwrap().clone();
    let results: Vec<_> = turns
        .iter()
        .filter(|t| t.role == Role::Tool && !t.is_tool_request())
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "tick");
}

#[tokio::test]
async fn test_iteration_limit_is_exact() {
    let provider = Arc::new(StubProvider::new("stub", "never").with_tool_rounds(u32::MAX));
    let agent = single_provider_agent(
        provider.clone(),
        LoopSettings::default().with_max_iterations(4),
    );
    let id = agent.create_session("limit").await;

    let err = agent.process_message(&id, "loop").await.unwrap_err();
    assert!(matches!(err, ClawError::IterationLimit { max_iterations: 4 }));
    assert_eq!(provider.calls(), 4);
}

#[tokio::test]
async fn test_cancelled_turn_keeps_user_node() {
    let provider = Arc::new(StubProvider::new("stub", "hello"));
    let agent = single_provider_agent(provider.clone(), LoopSettings::default());
    let id = agent.create_session("cancel").await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = agent
        .process_message_with_cancel(&id, "hi", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ClawError::Cancelled(_)));
    assert_eq!(provider.calls(), 0);

    let kind = agent
        .with_session(&id, |s| s.current_node().unwrap().kind())
        .await
        .unwrap();
    assert_eq!(kind, NodeKind::User);
}

// ============================================================================
// Branching
// ============================================================================

#[tokio::test]
async fn test_regenerate_from_earlier_turn() {
    let provider = Arc::new(StubProvider::new("stub", "answer"));
    let agent = single_provider_agent(provider, LoopSettings::default());
    let id = agent.create_session("branch").await;

    agent.process_message(&id, "first question").await.unwrap();
    let first_answer = agent.with_session(&id, |s| s.current()).await.unwrap();

    // Step back to the question and ask again from there.
    let question = agent.navigate(&id, Navigation::Parent).await.unwrap();
    agent.navigate(&id, Navigation::Parent).await.unwrap();
    agent.process_message(&id, "second question").await.unwrap();

    let (root_children, total) = agent
        .with_session(&id, |s| (s.tree().children(s.root()).unwrap().len(), s.total_messages))
        .await
        .unwrap();
    assert_eq!(root_children, 2);
    assert_eq!(total, 4);

    // Sibling navigation walks between the two questions.
    let second_question = agent.with_session(&id, |s| s.tree().parent(s.current()).unwrap()).await.unwrap();
    agent
        .navigate(&id, Navigation::To(second_question.unwrap()))
        .await
        .unwrap();
    let prev = agent
        .navigate(&id, Navigation::Sibling(SiblingDirection::Previous))
        .await
        .unwrap();
    assert_eq!(prev, question);
    let child = agent.navigate(&id, Navigation::Child(0)).await.unwrap();
    assert_eq!(child, first_answer);
}

// ============================================================================
// Context window
// ============================================================================

#[tokio::test]
async fn test_long_conversation_is_summarized() {
    let provider = Arc::new(StubProvider::new("stub", "ok"));
    let mut router = fast_router();
    router.register("stub", provider.clone());
    router.set_default_provider("stub");
    let agent = Agent::with_parts(
        Arc::new(router),
        Arc::new(ToolRegistry::new()),
        ContextBuilder::new().with_max_context_messages(5),
        LoopSettings::default(),
    );
    let id = agent.create_session("long").await;

    for i in 0..6 {
        agent.process_message(&id, &format!("message {}", i)).await.unwrap();
    }

    let turns = provider.last_turns.lock().unwrap().clone();
    assert_eq!(turns.len(), 5);
    assert_eq!(turns[0].role, Role::System);
    assert!(turns[1].content.starts_with("[Conversation Summary]"));
    assert_eq!(turns[4].content, "message 5");
}

// ============================================================================
// Router failover
// ============================================================================

#[tokio::test]
async fn test_unhealthy_primary_fails_over() {
    let primary = Arc::new(StubProvider::new("primary", "from primary").unhealthy());
    let backup = Arc::new(StubProvider::new("backup", "from backup"));

    let mut router = fast_router();
    router.register("primary", primary.clone());
    router.register("backup", backup.clone());
    router.set_default_provider("primary");
    router.set_fallbacks(vec!["backup".into()]);

    let agent = Agent::new(router, ToolRegistry::new());
    let id = agent.create_session("failover").await;

    let reply = agent.process_message(&id, "hi").await.unwrap();
    assert_eq!(reply, "from backup");
    assert_eq!(primary.calls(), 0);
    assert_eq!(backup.calls(), 1);
}

#[tokio::test]
async fn test_session_provider_override() {
    let a = Arc::new(StubProvider::new("a", "from a"));
    let b = Arc::new(StubProvider::new("b", "from b"));

    let mut router = fast_router();
    router.register("a", a.clone());
    router.register("b", b.clone());
    router.set_default_provider("a");

    let agent = Agent::new(router, ToolRegistry::new());
    let id = agent.create_session("override").await;
    agent
        .with_session(&id, |s| s.overrides.provider = Some("b".into()))
        .await
        .unwrap();

    assert_eq!(agent.process_message(&id, "hi").await.unwrap(), "from b");
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_no_healthy_provider_is_error() {
    let only = Arc::new(StubProvider::new("only", "x").unhealthy());
    let mut router = fast_router();
    router.register("only", only);
    router.set_default_provider("only");

    let agent = Agent::new(router, ToolRegistry::new());
    let id = agent.create_session("down").await;
    let err = agent.process_message(&id, "hi").await.unwrap_err();
    assert!(matches!(err, ClawError::Provider(_)));
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_sessions_are_independent() {
    let provider = Arc::new(StubProvider::new("stub", "hello"));
    let agent = Arc::new(single_provider_agent(provider.clone(), LoopSettings::default()));
    let a = agent.create_session("a").await;
    let b = agent.create_session("b").await;

    let (ra, rb) = tokio::join!(
        agent.process_message(&a, "one"),
        agent.process_message(&b, "two")
    );
    assert_eq!(ra.unwrap(), "hello");
    assert_eq!(rb.unwrap(), "hello");

    let infos = agent.list_sessions().await;
    assert!(infos.iter().all(|i| i.total_messages == 2));
    assert_eq!(provider.calls(), 2);

    agent.close_session(&a).await;
    assert_eq!(agent.active_session_id().await.as_deref(), Some(b.as_str()));
    let err = agent.process_message(&a, "gone").await.unwrap_err();
    assert!(matches!(err, ClawError::NotFound(_)));
}
