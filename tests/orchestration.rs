//! Integration tests for graph execution, routing validation, and the
//! chain adapters, driven end to end by a scripted decision backend.

use std::sync::{Arc, Mutex};

use tower::util::BoxService;
use tower::BoxError;

use tower_teams::chain::{chain_node, exit_chain, TeamChain};
use tower_teams::error::OrchestratorError;
use tower_teams::graph::{NodeSvc, TeamGraph};
use tower_teams::items::Message;
use tower_teams::provider::ScriptedProvider;
use tower_teams::state::{StateDelta, TeamState};
use tower_teams::supervisor::{Router, FINISH};

const SUPERVISOR_PROMPT: &str =
    "You are a supervisor managing the following workers: {team_members}.";

/// Worker that records each dispatch into a shared event log.
fn recording_worker(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> NodeSvc {
    BoxService::new(tower::service_fn(move |_state: TeamState| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(name.to_string());
            Ok::<_, BoxError>(StateDelta::message(Message::named(name, "done")))
        }
    }))
}

fn router(provider: &ScriptedProvider, members: &[&str]) -> Router {
    Router::new(
        provider.clone().boxed(),
        "test-model",
        SUPERVISOR_PROMPT,
        members.iter().map(|m| m.to_string()).collect(),
    )
}

#[tokio::test]
async fn every_worker_turn_returns_to_the_supervisor() {
    // Two different workers routed back to back. If control returned to a
    // worker without passing through the supervisor, the scripted route
    // queue would desynchronize and the run could not converge.
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let provider = ScriptedProvider::new()
        .with_route("Search")
        .with_route("Retriever")
        .with_route("Search")
        .with_route(FINISH);

    let graph = TeamGraph::builder(router(&provider, &["Search", "Retriever"]).boxed())
        .worker("Search", recording_worker("Search", log.clone()))
        .worker("Retriever", recording_worker("Retriever", log.clone()))
        .build();

    let out = graph
        .run(TeamState::seeded(Message::user("go")))
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["Search", "Retriever", "Search"],
        "dispatch order must follow the supervisor's decisions exactly"
    );
    assert_eq!(out.next.as_deref(), Some(FINISH));
}

#[tokio::test]
async fn transcript_grows_monotonically_and_preserves_order() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let provider = ScriptedProvider::new()
        .with_route("Search")
        .with_route("Retriever")
        .with_route(FINISH);

    let graph = TeamGraph::builder(router(&provider, &["Search", "Retriever"]).boxed())
        .worker("Search", recording_worker("Search", log.clone()))
        .worker("Retriever", recording_worker("Retriever", log))
        .build();

    let seed = Message::user("original request");
    let out = graph.run(TeamState::seeded(seed)).await.unwrap();

    // Seed first, then contributions in dispatch order; nothing dropped.
    assert_eq!(out.messages.len(), 3);
    assert_eq!(out.messages[0].content, "original request");
    assert_eq!(out.messages[1].name.as_deref(), Some("Search"));
    assert_eq!(out.messages[2].name.as_deref(), Some("Retriever"));
}

#[tokio::test]
async fn out_of_set_route_is_a_configuration_error() {
    let provider = ScriptedProvider::new().with_route("Ghost");
    let graph = TeamGraph::builder(router(&provider, &["Search"]).boxed())
        .worker(
            "Search",
            recording_worker("Search", Arc::new(Mutex::new(Vec::new()))),
        )
        .build();

    let err = graph
        .run(TeamState::seeded(Message::user("go")))
        .await
        .unwrap_err();
    match err {
        OrchestratorError::InvalidRoute { label, options } => {
            assert_eq!(label, "Ghost");
            assert!(options.contains(&FINISH.to_string()));
            assert!(options.contains(&"Search".to_string()));
        }
        other => panic!("expected InvalidRoute, got {other:?}"),
    }
}

#[tokio::test]
async fn exit_adapter_projects_to_the_last_message() {
    let mut state = TeamState::seeded(Message::user("request"));
    for i in 0..3 {
        state.apply(StateDelta::message(Message::named(
            "Search",
            format!("finding {i}"),
        )));
    }
    state.apply(StateDelta::message(Message::named("Retriever", "the final word")));
    assert_eq!(state.messages.len(), 5);

    let projected = exit_chain(&state).expect("non-empty transcript");
    assert_eq!(projected.content, "the final word");
    assert_eq!(projected.name.as_deref(), Some("Retriever"));
}

#[tokio::test]
async fn non_convergence_errs_instead_of_hanging() {
    // The scripted queue drains, and a drained queue answers with plain
    // text, which the router rejects; script enough routes that the budget
    // trips first.
    let provider = ScriptedProvider::new()
        .with_route("Search")
        .with_route("Search")
        .with_route("Search")
        .with_route("Search")
        .with_route("Search");
    let graph = TeamGraph::builder(router(&provider, &["Search"]).boxed())
        .worker(
            "Search",
            recording_worker("Search", Arc::new(Mutex::new(Vec::new()))),
        )
        .recursion_limit(6)
        .build();

    let err = graph
        .run(TeamState::seeded(Message::user("never ends")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::RecursionLimitExceeded { limit: 6 }
    ));
}

#[tokio::test]
async fn nested_team_behaves_as_a_single_worker() {
    // Inner team: one worker, finishes after one turn.
    let inner_provider = ScriptedProvider::new().with_route("Search").with_route(FINISH);
    let inner = TeamGraph::builder(router(&inner_provider, &["Search"]).boxed())
        .worker(
            "Search",
            recording_worker("Search", Arc::new(Mutex::new(Vec::new()))),
        )
        .build();

    // Outer graph mounts the whole inner team as the "Research team" worker.
    let outer_provider = ScriptedProvider::new()
        .with_route("Research team")
        .with_route(FINISH);
    let outer = TeamGraph::builder(router(&outer_provider, &["Research team"]).boxed())
        .worker("Research team", chain_node(TeamChain::new(inner)))
        .build();

    let out = outer
        .run(TeamState::seeded(Message::user("delegate")))
        .await
        .unwrap();

    // The inner run contributed exactly one message to the outer transcript.
    assert_eq!(out.messages.len(), 2);
    assert_eq!(out.messages[1].content, "done");
    // The inner team's routing state never leaks into the outer state.
    assert_eq!(out.next.as_deref(), Some(FINISH));
}
