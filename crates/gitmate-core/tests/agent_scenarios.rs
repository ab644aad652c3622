//! End-to-end Turns: OpenAI-compatible model and GitHub (App auth included)
//! both served by wiremock.

use std::sync::Arc;

use gitmate_core::agent::{AgentOrchestrator, OrchestratorConfig, SessionContext, TurnOutcome};
use gitmate_core::ai::{AiClient, AiClientConfig, ProviderId};
use gitmate_core::auth::{CredentialManager, GitHubAppIssuer, InstallationSelector};
use gitmate_core::github::GitHubClient;
use gitmate_core::storage::HistoryStore;
use gitmate_core::tools::{register_all_tools, ToolRegistry, ToolServices};
use gitmate_core::{Conversation, Message};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/test_app_key.pem");

fn model_reply(message: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}]
    }))
}

async fn mount_github_app(server: &MockServer, expected_token_requests: u64) {
    Mock::given(method("GET"))
        .and(path("/app/installations"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": 7, "account": {"login": "acme"}}])),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/app/installations/7/access_tokens"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": "ghs_scenario"})))
        .expect(expected_token_requests)
        .mount(server)
        .await;
}

async fn mount_open_pulls(server: &MockServer) {
    let pr = |number: u64, title: &str| {
        json!({
            "number": number,
            "title": title,
            "state": "open",
            "user": {"login": "ana"},
            "created_at": "2024-05-01T10:00:00Z",
            "body": null,
            "base": {"ref": "main", "sha": "aaa"},
            "head": {"ref": format!("feature-{number}"), "sha": "bbb"}
        })
    };
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls"))
        .and(header("authorization", "Bearer ghs_scenario"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([pr(12, "Add retry to uploader"), pr(15, "Fix login redirect")])),
        )
        .mount(server)
        .await;
}

fn build_agent(github_server: &MockServer, model_server: &MockServer) -> AgentOrchestrator {
    let issuer = GitHubAppIssuer::new(
        github_server.uri(),
        "4242",
        TEST_KEY,
        InstallationSelector::First,
    )
    .unwrap();
    let credentials = Arc::new(CredentialManager::new(Arc::new(issuer)));
    let github = Arc::new(GitHubClient::new(
        github_server.uri(),
        "acme/widgets",
        credentials,
    ));

    let mut registry = ToolRegistry::new();
    register_all_tools(
        &mut registry,
        &ToolServices {
            github: Some(github),
            ..ToolServices::default()
        },
    )
    .unwrap();

    let mut config = AiClientConfig::new(ProviderId::Ollama, "llama3.2");
    config.base_url = Some(format!("{}/v1/chat/completions", model_server.uri()));

    AgentOrchestrator::new(
        Arc::new(AiClient::new(config)),
        Arc::new(registry),
        OrchestratorConfig::default(),
    )
}

#[tokio::test]
async fn list_open_pull_requests_turn() {
    let github_server = MockServer::start().await;
    let model_server = MockServer::start().await;
    mount_github_app(&github_server, 1).await;
    mount_open_pulls(&github_server).await;

    let summary = "There are 2 open pull requests:\n- #12 Add retry to uploader\n- #15 Fix login redirect";

    // Second call: the tool result is in the history
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(model_reply(json!({"role": "assistant", "content": summary})))
        .expect(1)
        .mount(&model_server)
        .await;
    // First call: the model asks for the PR listing
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("list_open_pull_requests"))
        .respond_with(model_reply(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_prs",
                "type": "function",
                "function": {"name": "list_open_pull_requests", "arguments": "{}"}
            }]
        })))
        .up_to_n_times(1)
        .mount(&model_server)
        .await;

    let agent = build_agent(&github_server, &model_server);
    let session = SessionContext::new("alice");
    let mut conversation = Conversation::new();

    let outcome = agent
        .run_turn(&session, &mut conversation, "list open pull requests", None)
        .await
        .unwrap();

    let TurnOutcome::Completed { answer, iterations } = outcome else {
        panic!("turn did not complete");
    };
    assert_eq!(iterations, 2);
    assert_eq!(answer.matches("#12 Add retry to uploader").count(), 1);
    assert_eq!(answer.matches("#15 Fix login redirect").count(), 1);

    let messages = conversation.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], Message::user("list open pull requests"));
    assert_eq!(messages[1].tool_calls()[0].id, "call_prs");

    let Message::Tool {
        tool_call_id,
        content,
    } = &messages[2]
    else {
        panic!("expected a tool result");
    };
    assert_eq!(tool_call_id, "call_prs");
    let payload: Value = serde_json::from_str(content).unwrap();
    assert_eq!(
        payload["pull_requests"],
        json!([
            {"pr_number": 12, "pr_title": "Add retry to uploader"},
            {"pr_number": 15, "pr_title": "Fix login redirect"}
        ])
    );
    assert_eq!(messages[3], Message::assistant(summary));
}

#[tokio::test]
async fn github_outage_reaches_model_as_envelope() {
    let github_server = MockServer::start().await;
    let model_server = MockServer::start().await;
    mount_github_app(&github_server, 1).await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&github_server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(model_reply(json!({
            "role": "assistant",
            "content": "I could not reach GitHub to list the issues."
        })))
        .mount(&model_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(model_reply(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{
                "id": "call_issues",
                "type": "function",
                "function": {"name": "list_open_issues", "arguments": ""}
            }]
        })))
        .up_to_n_times(1)
        .mount(&model_server)
        .await;

    let agent = build_agent(&github_server, &model_server);
    let mut conversation = Conversation::new();
    let outcome = agent
        .run_turn(&SessionContext::new("bob"), &mut conversation, "what issues are open?", None)
        .await
        .unwrap();

    assert_eq!(outcome.answer(), Some("I could not reach GitHub to list the issues."));
    let envelope: Value = serde_json::from_str(conversation.messages()[2].content()).unwrap();
    assert_eq!(envelope["fatal_error"], true);
    assert!(envelope["message"]
        .as_str()
        .unwrap()
        .starts_with("Operation Failed."));
}

#[tokio::test]
async fn history_survives_between_sessions() {
    let github_server = MockServer::start().await;
    let model_server = MockServer::start().await;
    mount_github_app(&github_server, 1).await;
    mount_open_pulls(&github_server).await;

    Mock::given(method("POST"))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(model_reply(json!({"role": "assistant", "content": "Two open PRs."})))
        .mount(&model_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("list open pull requests"))
        .respond_with(model_reply(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "list_open_pull_requests", "arguments": "{}"}
            }]
        })))
        .up_to_n_times(1)
        .mount(&model_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let history = HistoryStore::new(dir.path());
    let agent = build_agent(&github_server, &model_server);

    let mut conversation = history.load("carol").unwrap();
    agent
        .run_turn(&SessionContext::new("carol"), &mut conversation, "list open pull requests", None)
        .await
        .unwrap();
    history.save("carol", &conversation).unwrap();

    let restored = history.load("carol").unwrap();
    assert_eq!(restored, conversation);
    assert!(restored.pending_tool_calls().is_empty());
    assert_eq!(restored.last_assistant_text(), Some("Two open PRs."));
}
