//! The offline agent answering the example prompts over the seeded local engine.

use std::sync::Arc;
use std::time::Duration;

use querydesk::action::ActionRouter;
use querydesk::agent::{AgentClient, MockAgent};
use querydesk::chat::{ChatSession, ChatStep};
use querydesk::config::PollingConfig;
use querydesk::engine::LocalQueryEngine;
use querydesk::prompts::EXAMPLE_PROMPTS;
use querydesk::proxy::QueryProxy;
use querydesk::transcript::{format_response, Answer};

async fn agent(dir: &tempfile::TempDir) -> MockAgent {
    let engine = LocalQueryEngine::connect("sqlite::memory:").await.unwrap();
    engine
        .execute_script(include_str!("../../demos/seed.sql"))
        .await
        .unwrap();

    let proxy = QueryProxy::new(
        Arc::new(engine),
        url::Url::from_directory_path(dir.path()).unwrap().to_string(),
        PollingConfig::new(Duration::from_millis(10), Duration::from_secs(10)),
    );
    MockAgent::new(ActionRouter::new(proxy, "/athenaQuery"))
}

#[tokio::test]
async fn test_every_example_prompt_returns_a_table() {
    let dir = tempfile::tempdir().unwrap();
    let agent = agent(&dir).await;

    for prompt in EXAMPLE_PROMPTS {
        let reply = agent.ask("MYSESSION", prompt).await.unwrap();
        assert!(
            matches!(format_response(&reply.response), Answer::Table(_)),
            "{prompt} answered {}",
            reply.response
        );
        assert!(reply.trace.ends_with("-> 200"), "{}", reply.trace);
    }
}

#[tokio::test]
async fn test_vip_customers_over_300() {
    let dir = tempfile::tempdir().unwrap();
    let agent = agent(&dir).await;

    let reply = agent.ask("MYSESSION", EXAMPLE_PROMPTS[4]).await.unwrap();
    let Answer::Table(result) = format_response(&reply.response) else {
        panic!("Expected a table");
    };

    // Ana Ortiz, Chen Wei and Eli Novak.
    assert_eq!(result.row_count, 3);
}

#[tokio::test]
async fn test_session_history_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut chat = ChatSession::new(Arc::new(agent(&dir).await), "MYSESSION", 5);

    chat.handle_line(EXAMPLE_PROMPTS[1]).await;
    chat.handle_line(EXAMPLE_PROMPTS[3]).await;

    let questions: Vec<&str> = chat
        .transcript()
        .latest_first()
        .map(|exchange| exchange.question.as_str())
        .collect();
    assert_eq!(questions, vec![EXAMPLE_PROMPTS[3], EXAMPLE_PROMPTS[1]]);

    let ChatStep::Quit(farewell) = chat.handle_line("/quit").await else {
        panic!("Expected Quit");
    };
    assert_eq!(farewell, querydesk::transcript::FAREWELL);
    assert!(chat.transcript().is_empty());
}
