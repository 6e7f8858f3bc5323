//! End-to-end orchestration tests against a scripted model

mod common;

use std::sync::Arc;

use common::*;
use conclave::agent::{MessageKind, Role, SessionState, ORCHESTRATOR, SENTINEL_ANSWER};
use conclave::llm::LLMResponse;
use conclave::{Orchestrator, RetryScope};

/// Step until complete, recording the role and research index after each step
async fn drive(orchestrator: &Orchestrator, mut state: SessionState) -> (SessionState, Vec<Role>, Vec<i64>) {
    let mut roles = Vec::new();
    let mut indices = Vec::new();
    while !state.is_complete() {
        state = orchestrator.step(state).await;
        assert!(state.retry_count <= state.retry_limit);
        assert!(state.validate().is_ok());
        roles.push(state.current_role);
        indices.push(state.current_research_index.current());
        assert!(roles.len() < 50, "session did not terminate");
    }
    (state, roles, indices)
}

#[tokio::test]
async fn test_plan_without_research_goes_straight_to_expert() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&[], &["Add the numbers"])])
            .script(CRITIC, vec![approve(), approve()])
            .script(EXPERT, vec![answer("4", "2 + 2 = 4")])
            .script(FINALIZER, vec![finalize("4", "Added two and two.")]),
    );
    let orchestrator = orchestrator(&config(5), llm.clone());
    let state = orchestrator.start("What is 2 + 2?", None).unwrap();

    let (state, roles, _) = drive(&orchestrator, state).await;

    assert_eq!(
        roles,
        vec![
            Role::Planner,
            Role::CriticPlanner,
            Role::Expert,
            Role::CriticExpert,
            Role::Finalizer
        ]
    );
    assert_eq!(state.final_answer, "4");
    assert_eq!(state.final_reasoning, "Added two and two.");
    assert_eq!(state.retry_count, 0);
    assert!(!state.retry_failed);
    assert_eq!(llm.calls(RESEARCHER), 0);
}

#[tokio::test]
async fn test_research_index_walks_every_step() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&["a", "b", "c"], &["combine"])])
            .script(CRITIC, vec![approve(); 5])
            .script(
                RESEARCHER,
                vec![research("found a"), research("found b"), research("found c")],
            )
            .script(EXPERT, vec![answer("abc", "joined")])
            .script(FINALIZER, vec![finalize("abc", "joined the findings")]),
    );
    let orchestrator = orchestrator(&config(5), llm.clone());
    let state = orchestrator.start("Spell it out", None).unwrap();

    let (state, roles, indices) = drive(&orchestrator, state).await;

    assert_eq!(
        roles,
        vec![
            Role::Planner,
            Role::CriticPlanner,
            Role::Researcher,
            Role::CriticResearcher,
            Role::Researcher,
            Role::CriticResearcher,
            Role::Researcher,
            Role::CriticResearcher,
            Role::Expert,
            Role::CriticExpert,
            Role::Finalizer,
        ]
    );
    assert_eq!(indices, vec![-1, -1, 0, 0, 1, 1, 2, 2, 2, 2, 2]);
    assert_eq!(
        state.research_results.as_slice(),
        &["found a".to_string(), "found b".to_string(), "found c".to_string()]
    );
    assert_eq!(state.researcher_substates.len(), 3);

    // Sub-task filtering only returns the exchange for that step
    let step_one = state
        .messages
        .conversation_between(ORCHESTRATOR, "researcher", Some(1));
    assert_eq!(step_one.len(), 2);
    assert!(step_one.iter().all(|m| m.sub_task_id == Some(1)));
    assert_eq!(step_one[0].kind, MessageKind::Instruction);
    assert!(step_one[0].content.contains('b'));
    assert_eq!(step_one[1].content, "Researcher complete for step 1");
}

#[tokio::test]
async fn test_rejected_research_overwrites_in_place() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&["population of Oslo"], &["report it"])])
            .script(
                CRITIC,
                vec![approve(), reject("Cite a source."), approve(), approve()],
            )
            .script(
                RESEARCHER,
                vec![research("about 700k"), research("709,037 (SSB, 2023)")],
            )
            .script(EXPERT, vec![answer("709,037", "from SSB")])
            .script(FINALIZER, vec![finalize("709,037", "SSB figure")]),
    );
    let orchestrator = orchestrator(&config(5), llm.clone());
    let state = orchestrator.start("How many people live in Oslo?", None).unwrap();

    let (state, _, indices) = drive(&orchestrator, state).await;

    assert_eq!(indices, vec![-1, -1, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(state.research_results.as_slice(), &["709,037 (SSB, 2023)".to_string()]);
    assert_eq!(state.retry_count, 1);
    assert_eq!(state.retries_for(Role::Researcher), 1);

    let exchange = state
        .messages
        .conversation_between(ORCHESTRATOR, "researcher", Some(0));
    assert_eq!(exchange.len(), 4);
    assert!(exchange[2].content.contains("Cite a source."));

    // The retry resumed the same reasoning thread
    let substate = &state.researcher_substates[&0];
    assert_eq!(substate.turns.len(), 4);
    assert_eq!(substate.result.as_deref(), Some("709,037 (SSB, 2023)"));
}

#[tokio::test]
async fn test_retry_budget_exhaustion_yields_sentinel() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&[], &["guess"]); 2])
            .script(CRITIC, vec![reject("Too vague."), reject("Still vague.")]),
    );
    let orchestrator = orchestrator(&config(2), llm.clone());
    let state = orchestrator.start("What is the meaning of life?", None).unwrap();

    let (state, roles, _) = drive(&orchestrator, state).await;

    assert_eq!(
        roles,
        vec![
            Role::Planner,
            Role::CriticPlanner,
            Role::Planner,
            Role::CriticPlanner,
            Role::Finalizer
        ]
    );
    assert!(state.retry_failed);
    assert_eq!(state.retry_count, 2);
    assert_eq!(state.final_answer, SENTINEL_ANSWER);
    assert_eq!(state.final_reasoning, SENTINEL_ANSWER);
    assert_eq!(state.error.as_ref().map(|e| e.kind.as_str()), Some("retry_limit_exceeded"));
    assert_eq!(llm.calls(FINALIZER), 0);
}

#[tokio::test]
async fn test_zero_retry_limit_finalizes_on_first_rejection() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&[], &["guess"])])
            .script(CRITIC, vec![reject("No.")]),
    );
    let orchestrator = orchestrator(&config(0), llm.clone());
    let outcome = orchestrator.run("Anything?", None).await.unwrap();

    assert!(outcome.failed);
    assert_eq!(outcome.final_answer, SENTINEL_ANSWER);
    assert_eq!(outcome.steps, 3);
    assert_eq!(llm.calls(PLANNER), 1);
}

#[tokio::test]
async fn test_retry_scope_decides_cross_role_budget() {
    let script = || {
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&[], &["think"]); 2])
            .script(
                CRITIC,
                vec![reject("Plan more."), approve(), reject("Show work."), approve()],
            )
            .script(EXPERT, vec![answer("7", "guess"), answer("7", "3 + 4")])
            .script(FINALIZER, vec![finalize("7", "3 + 4")])
    };

    let shared = orchestrator(&config(2), Arc::new(script()));
    let outcome = shared.run("What is 3 + 4?", None).await.unwrap();
    assert!(outcome.failed);

    let mut per_role = config(2);
    per_role.workflow.retry_scope = RetryScope::PerRole;
    let per_role = orchestrator(&per_role, Arc::new(script()));
    let outcome = per_role.run("What is 3 + 4?", None).await.unwrap();
    assert!(!outcome.failed);
    assert_eq!(outcome.final_answer, "7");
}

#[tokio::test]
async fn test_iteration_cap_routes_to_finalizer() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&[], &["compute"])])
            .script(CRITIC, vec![approve()])
            .script(EXPERT, vec![calculator("1 + 1"); 3]),
    );
    let mut config = config(5);
    config.workflow.max_subworkflow_iterations = 2;
    let orchestrator = orchestrator(&config, llm.clone());
    let state = orchestrator.start("Keep computing", None).unwrap();

    let (state, roles, _) = drive(&orchestrator, state).await;

    assert_eq!(roles.last(), Some(&Role::Finalizer));
    assert!(state.retry_failed);
    assert_eq!(state.final_answer, SENTINEL_ANSWER);
    let error = state.error.as_ref().unwrap();
    assert_eq!(error.component, "expert");
    assert_eq!(error.kind, "subworkflow_iteration_exceeded");
    assert_eq!(llm.calls(EXPERT), 2);
    assert_eq!(llm.calls(FINALIZER), 0);
}

#[tokio::test]
async fn test_malformed_output_finalizes() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![LLMResponse::text("I would rather chat.")]),
    );
    let orchestrator = orchestrator(&config(5), llm.clone());
    let state = orchestrator.start("Plan this", None).unwrap();

    let (state, roles, _) = drive(&orchestrator, state).await;

    assert_eq!(roles, vec![Role::Planner, Role::Finalizer]);
    assert_eq!(state.final_answer, SENTINEL_ANSWER);
    assert_eq!(state.error.as_ref().map(|e| e.kind.as_str()), Some("malformed_output"));
    assert_eq!(llm.calls(CRITIC), 0);
}

#[tokio::test]
async fn test_schema_violation_is_retried() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(
                PLANNER,
                vec![
                    LLMResponse::text(r#"{"research_steps": []}"#),
                    plan(&[], &["answer directly"]),
                ],
            )
            .script(CRITIC, vec![approve(), approve()])
            .script(EXPERT, vec![answer("Paris", "capital of France")])
            .script(FINALIZER, vec![finalize("Paris", "capital of France")]),
    );
    let orchestrator = orchestrator(&config(5), llm.clone());
    let state = orchestrator.start("Capital of France?", None).unwrap();

    let (state, roles, _) = drive(&orchestrator, state).await;

    assert_eq!(&roles[..3], &[Role::Planner, Role::Planner, Role::CriticPlanner]);
    assert!(!state.retry_failed);
    assert_eq!(state.retry_count, 1);
    assert_eq!(state.final_answer, "Paris");

    let planner = state
        .messages
        .conversation_between(ORCHESTRATOR, "planner", None);
    assert!(planner[1].content.contains("The previous attempt failed"));
}

#[tokio::test]
async fn test_tool_error_reaches_the_expert() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&[], &["divide"])])
            .script(CRITIC, vec![approve(), approve()])
            .script(
                EXPERT,
                vec![calculator("1 / 0"), answer("undefined", "division by zero")],
            )
            .script(FINALIZER, vec![finalize("undefined", "division by zero")]),
    );
    let orchestrator = orchestrator(&config(5), llm);
    let state = orchestrator.start("What is 1 / 0?", None).unwrap();

    let (state, _, _) = drive(&orchestrator, state).await;

    assert!(!state.retry_failed);
    let substate = state.expert_substate.as_ref().unwrap();
    assert!(substate
        .turns
        .iter()
        .any(|t| t.role == "tool" && t.content.starts_with("Error:")));
    assert_eq!(substate.answer.as_deref(), Some("undefined"));
}

#[tokio::test]
async fn test_step_after_completion_is_noop() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&[], &["x"])])
            .script(CRITIC, vec![approve(), approve()])
            .script(EXPERT, vec![answer("x", "x")])
            .script(FINALIZER, vec![finalize("x", "x")]),
    );
    let orchestrator = orchestrator(&config(5), llm.clone());
    let state = orchestrator.start("x?", None).unwrap();
    let (state, _, _) = drive(&orchestrator, state).await;

    let messages = state.messages.len();
    let steps = state.steps;
    let state = orchestrator.step(state).await;

    assert!(state.is_complete());
    assert_eq!(state.messages.len(), messages);
    assert_eq!(state.steps, steps);
    assert_eq!(llm.calls(FINALIZER), 1);
}

#[tokio::test]
async fn test_blank_question_is_rejected() {
    let orchestrator = orchestrator(&config(5), Arc::new(ScriptedProvider::new()));
    assert!(orchestrator.start("   ", None).is_err());
    assert!(orchestrator.run("", None).await.is_err());
}

#[tokio::test]
async fn test_research_rejections_keep_index_and_overwrite() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&["a", "b", "c"], &["combine"])])
            .script(
                CRITIC,
                vec![
                    approve(),
                    reject("Redo a."),
                    approve(),
                    reject("Redo b."),
                    approve(),
                    approve(),
                    approve(),
                ],
            )
            .script(
                RESEARCHER,
                vec![
                    research("a0"),
                    research("a1"),
                    research("b0"),
                    research("b1"),
                    research("c0"),
                ],
            )
            .script(EXPERT, vec![answer("a1 b1 c0", "joined")])
            .script(FINALIZER, vec![finalize("a1 b1 c0", "joined")]),
    );
    let orchestrator = orchestrator(&config(5), llm.clone());
    let state = orchestrator.start("Collect three facts", None).unwrap();

    let (state, roles, indices) = drive(&orchestrator, state).await;

    let at_critic: Vec<i64> = roles
        .iter()
        .zip(&indices)
        .filter(|(role, _)| **role == Role::CriticResearcher)
        .map(|(_, index)| *index)
        .collect();
    assert_eq!(at_critic, vec![0, 0, 1, 1, 2]);

    let mut walked = vec![indices[0]];
    for index in &indices {
        if walked.last() != Some(index) {
            walked.push(*index);
        }
    }
    assert_eq!(walked, vec![-1, 0, 1, 2]);

    assert_eq!(
        state.research_results.as_slice(),
        &["a1".to_string(), "b1".to_string(), "c0".to_string()]
    );
    assert_eq!(state.retry_count, 2);
    assert_eq!(llm.calls(RESEARCHER), 5);
    assert_eq!(state.final_answer, "a1 b1 c0");
}

#[tokio::test]
async fn test_researcher_rejections_exhaust_budget() {
    let llm = Arc::new(
        ScriptedProvider::new()
            .script(PLANNER, vec![plan(&["find it"], &["report"])])
            .script(
                CRITIC,
                vec![approve(), reject("No."), reject("No."), reject("No.")],
            )
            .script(RESEARCHER, vec![research("r0"), research("r1"), research("r2")]),
    );
    let orchestrator = orchestrator(&config(3), llm.clone());
    let state = orchestrator.start("Find it", None).unwrap();

    let (state, roles, _) = drive(&orchestrator, state).await;

    assert_eq!(roles.last(), Some(&Role::Finalizer));
    assert_eq!(llm.calls(RESEARCHER), 3);
    assert_eq!(state.retry_count, 3);
    assert_eq!(state.retries_for(Role::Researcher), 3);
    assert!(state.retry_failed);
    assert_eq!(state.final_answer, SENTINEL_ANSWER);
    assert_eq!(state.research_results.as_slice(), &["r2".to_string()]);
    assert_eq!(llm.calls(EXPERT), 0);
}

#[tokio::test]
async fn test_missing_critic_decision_reruns_critic() {
    let llm = Arc::new(ScriptedProvider::new().script(CRITIC, vec![approve()]));
    let orchestrator = orchestrator(&config(5), llm.clone());
    let mut state = orchestrator.start("Anything?", None).unwrap();
    state.current_role = Role::CriticPlanner;

    let state = orchestrator.step(state).await;

    assert_eq!(state.current_role, Role::CriticPlanner);
    assert!(!state.retry_failed);
    assert_eq!(state.retry_count, 1);
    assert_eq!(state.error.as_ref().map(|e| e.kind.as_str()), Some("validation"));
    assert_eq!(state.planner_decision, conclave::agent::Decision::Approve);
    assert_eq!(llm.calls(CRITIC), 1);
}
