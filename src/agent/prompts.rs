//! Built-in system prompts and orchestrator instruction templates

use crate::agent::state::{Role, SessionState};

pub const PLANNER_PROMPT: &str = "You are the planner in a team that answers hard questions. \
Break the question into research steps (facts that must be looked up with search or \
document tools) and expert steps (reasoning or computation over those facts). Research \
steps must each be a single self-contained lookup. Leave research_steps empty when the \
question can be answered by reasoning alone.";

pub const RESEARCHER_PROMPT: &str = "You are the researcher. Investigate exactly the topic \
you are given using the available tools. Call tools as often as needed, cite what you \
found, and when you have enough information return it as your result.";

pub const EXPERT_PROMPT: &str = "You are the domain expert. Use the researched information \
and the recommended steps to answer the question. Use the calculation tools for any \
arithmetic or unit conversion instead of computing in your head. Give a concise answer \
and the reasoning that supports it.";

pub const CRITIC_PLANNER_PROMPT: &str = "You review plans. Approve a plan only if its \
research and expert steps are correct, complete and logically ordered for the question. \
When rejecting, say precisely what must change.";

pub const CRITIC_RESEARCHER_PROMPT: &str = "You review research. Approve only if the \
result contains sufficient, relevant information on the requested topic. When \
rejecting, say precisely what is missing or wrong.";

pub const CRITIC_EXPERT_PROMPT: &str = "You review answers. Approve only if the expert's \
answer actually answers the question and is supported by the research and reasoning. \
When rejecting, say precisely how to improve the answer.";

pub const FINALIZER_PROMPT: &str = "You write the final answer. Give the shortest answer \
that fully answers the question (a number, a word or a short phrase when possible) and \
a reasoning trace listing the logical steps that led to it.";

/// Built-in system prompt for a role
pub fn system_prompt(role: Role) -> &'static str {
    match role {
        Role::Planner => PLANNER_PROMPT,
        Role::Researcher => RESEARCHER_PROMPT,
        Role::Expert => EXPERT_PROMPT,
        Role::CriticPlanner => CRITIC_PLANNER_PROMPT,
        Role::CriticResearcher => CRITIC_RESEARCHER_PROMPT,
        Role::CriticExpert => CRITIC_EXPERT_PROMPT,
        Role::Finalizer | Role::Start => FINALIZER_PROMPT,
    }
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Retry instruction carrying a critic's feedback verbatim
pub fn feedback_instruction(role: Role, feedback: &str) -> String {
    let target = match role {
        Role::Planner => "the plan",
        Role::Researcher => "the research",
        _ => "your answer",
    };
    format!(
        "Use the following feedback to improve {}:\n{}",
        target, feedback
    )
}

pub fn planner_instruction(state: &SessionState) -> String {
    let mut content = format!(
        "Develop a logical plan to answer the following question:\n{}",
        state.question()
    );
    if let Some(ref file) = state.attachment {
        content.push_str(&format!(
            "\n\nInclude using the following file in any of the research steps:\n{}",
            file
        ));
    }
    content
}

pub fn researcher_instruction(step: &str) -> String {
    format!("Research the following topic or question: {}", step)
}

pub fn critic_planner_brief(state: &SessionState) -> String {
    let file = match state.attachment {
        Some(ref file) => format!(
            "\n### File\nThe following file must be used to answer the question:\n{}\n",
            file
        ),
        None => String::new(),
    };
    let file_check = if state.attachment.is_some() {
        "\nDoes it also use the file in the research steps?"
    } else {
        ""
    };

    format!(
        "## Context\n\n### Planner Task\nThe planner was asked to develop a logical plan to \
         answer the following question:\n{question}\n{file}\n### Planner Plan\nResearch \
         steps:\n{research}\n\nExpert steps:\n{expert}\n\n## Review\nDoes the plan have the \
         correct and logical research and expert steps needed to answer the question?{check} \
         If yes, approve. If no, reject and give direct feedback on how to improve the plan.",
        question = state.question(),
        file = file,
        research = bullet_list(&state.research_steps),
        expert = bullet_list(&state.expert_steps),
        check = file_check,
    )
}

pub fn critic_researcher_brief(topic: &str, result: &str) -> String {
    format!(
        "## Context\n\n### Research Topic\nThe researcher was asked to research: {}\n\n\
         ### Research Results\n{}\n\n## Review\nDo the results contain sufficient \
         information on the topic? If yes, approve. If no, reject and give direct feedback \
         on how to improve the research.",
        topic, result
    )
}

pub fn expert_brief(state: &SessionState) -> String {
    format!(
        "## Context\n\n### Researched Information\n{research}\n\n### Recommended \
         Instructions\nIt was recommended to perform the following steps:\n{steps}\n\n\
         ## Question\nAnswer the question: {question}",
        research = bullet_list(state.research_results.as_slice()),
        steps = bullet_list(&state.expert_steps),
        question = state.question(),
    )
}

pub fn critic_expert_brief(state: &SessionState) -> String {
    format!(
        "## Context\n\n### Expert Question\n{question}\n\n### Researched Information\n\
         {research}\n\n### Expert Answer\n{answer}\n\n### Expert Reasoning\n{reasoning}\n\n\
         ## Review\nDoes the expert's answer actually answer the question to a satisfactory \
         level? If yes, approve. If no, reject and give direct feedback on how to improve \
         the answer.",
        question = state.question(),
        research = bullet_list(state.research_results.as_slice()),
        answer = state.expert_answer,
        reasoning = state.expert_reasoning,
    )
}

pub fn finalizer_brief(state: &SessionState) -> String {
    format!(
        "## Context\n\n### Question\n{question}\n\n### Research Steps\n{research}\n\n\
         ### Expert Steps\n{steps}\n\n### Expert Answer\n{answer}\n\n### Expert Reasoning\n\
         {reasoning}\n\n## Task\nGenerate the final answer and the reasoning trace that \
         answers the question.",
        question = state.question(),
        research = bullet_list(&state.research_steps),
        steps = bullet_list(&state.expert_steps),
        answer = state.expert_answer,
        reasoning = state.expert_reasoning,
    )
}

/// Instruction recorded when the session is finalized without calling the model
pub fn finalizer_failure_brief() -> String {
    "The workflow could not produce an approved answer. Record the failure answer.".to_string()
}
