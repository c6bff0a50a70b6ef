//! The Guardrails Coordinator: an optional structured-reasoning pass that
//! runs goal inference, option enumeration, constraint synthesis, and a
//! final decision as four separate model calls, then scrubs any leaked
//! reasoning vocabulary from the result before it reaches the user.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;
use crate::model::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailsMode {
    Off,
    #[default]
    Auto,
    Always,
}

/// Terms that must never survive into a rationale line — they read as
/// the model narrating its own reasoning process rather than giving an
/// answer.
const DENY_LIST: &[&str] = &["analysis", "thought", "step-by-step"];

pub struct GuardrailsOutcome {
    pub text: String,
    pub rationale: Vec<String>,
    pub used: bool,
}

#[derive(Deserialize, Default)]
struct GoalInference {
    #[serde(default)]
    goal: String,
}

#[derive(Deserialize, Default)]
struct EntitiesAndOptions {
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    options: Vec<String>,
}

#[derive(Deserialize, Default)]
struct Constraints {
    #[serde(default)]
    constraints: Vec<String>,
}

#[derive(Deserialize, Default)]
struct Decision {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    rationale: Vec<String>,
}

async fn call_json<T: Default + for<'de> Deserialize<'de>>(llm: &dyn LlmClient, system: &str, prompt: String) -> Option<T> {
    let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
    let cancel = Arc::new(AtomicBool::new(false));
    let response = llm.chat(&messages, None, Some(200), cancel).await.ok()?;
    let content = response.content?;
    serde_json::from_str(content.trim()).ok()
}

fn scrub(rationale: &[String]) -> Vec<String> {
    rationale
        .iter()
        .filter(|line| {
            let lower = line.to_ascii_lowercase();
            !DENY_LIST.iter().any(|term| lower.contains(term))
        })
        .cloned()
        .collect()
}

/// Whether this turn should run the reasoning pipeline at all. `Off` never
/// runs it; `Always` always does; `Auto` only runs it when `complex_hint`
/// (set by the caller from router confidence/intent) suggests the turn
/// would benefit from it.
pub fn should_run(mode: GuardrailsMode, complex_hint: bool) -> bool {
    match mode {
        GuardrailsMode::Off => false,
        GuardrailsMode::Always => true,
        GuardrailsMode::Auto => complex_hint,
    }
}

/// Runs the four-stage pipeline. Any malformed stage aborts the whole
/// pipeline with `used=false` — the caller falls back to its normal
/// (non-guardrailed) response path rather than surfacing a partial result.
#[tracing::instrument(skip(llm, user_message))]
pub async fn run(llm: &dyn LlmClient, user_message: &str) -> GuardrailsOutcome {
    tracing::debug!("guardrails pipeline starting");
    let fallback = GuardrailsOutcome { text: String::new(), rationale: Vec::new(), used: false };

    let Some(goal) = call_json::<GoalInference>(
        llm,
        "Infer the user's underlying goal. Reply with only JSON: {\"goal\": string}.",
        format!("Message: {user_message}"),
    )
    .await
    else {
        return fallback;
    };
    if goal.goal.trim().is_empty() {
        return fallback;
    }

    let Some(entities_and_options) = call_json::<EntitiesAndOptions>(
        llm,
        "List relevant entities and candidate options for this goal. Reply with only JSON: \
         {\"entities\": [string], \"options\": [string]}.",
        format!("Goal: {}\nMessage: {user_message}", goal.goal),
    )
    .await
    else {
        return fallback;
    };
    if entities_and_options.options.is_empty() {
        return fallback;
    }

    let Some(constraints) = call_json::<Constraints>(
        llm,
        "List the constraints that should narrow these options. Reply with only JSON: \
         {\"constraints\": [string]}.",
        format!(
            "Goal: {}\nOptions: {}\nMessage: {user_message}",
            goal.goal,
            entities_and_options.options.join(", ")
        ),
    )
    .await
    else {
        return fallback;
    };

    let Some(decision) = call_json::<Decision>(
        llm,
        "Decide the best option given the constraints and write a short answer plus a list of \
         one-sentence rationale bullet points. Reply with only JSON: \
         {\"answer\": string, \"rationale\": [string]}.",
        format!(
            "Goal: {}\nOptions: {}\nConstraints: {}\nMessage: {user_message}",
            goal.goal,
            entities_and_options.options.join(", "),
            constraints.constraints.join(", ")
        ),
    )
    .await
    else {
        return fallback;
    };
    if decision.answer.trim().is_empty() {
        return fallback;
    }

    let mut rationale = vec![format!("Goal: {}", goal.goal)];
    rationale.extend(constraints.constraints.iter().map(|c| format!("Constraint: {c}")));
    rationale.extend(decision.rationale.iter().map(|r| format!("Decision: {r}")));

    tracing::info!("guardrails pipeline produced a decision");
    GuardrailsOutcome { text: decision.answer, rationale: scrub(&rationale), used: true }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FinishReason, LlmResponse, LlmResult};
    use crate::model::ToolDefinition;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
            _max_tokens_override: Option<u32>,
            _cancel: Arc<AtomicBool>,
        ) -> LlmResult<LlmResponse> {
            match self.responses.lock().unwrap().remove(0) {
                Some(text) => Ok(LlmResponse { is_complete: true, content: Some(text), tool_calls: None, finish_reason: FinishReason::Stop }),
                None => Err("unreachable".to_string()),
            }
        }
    }

    #[test]
    fn auto_mode_only_runs_on_complex_hint() {
        assert!(!should_run(GuardrailsMode::Auto, false));
        assert!(should_run(GuardrailsMode::Auto, true));
        assert!(!should_run(GuardrailsMode::Off, true));
        assert!(should_run(GuardrailsMode::Always, false));
    }

    #[tokio::test]
    async fn complete_pipeline_produces_a_scrubbed_decision() {
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![
                Some(r#"{"goal":"pick a laptop for travel"}"#.to_string()),
                Some(r#"{"entities":["laptop"],"options":["Model A","Model B"]}"#.to_string()),
                Some(r#"{"constraints":["under 3 pounds","good battery life"]}"#.to_string()),
                Some(
                    r#"{"answer":"Model A","rationale":["It weighs less.","My step-by-step analysis favors it.","Battery lasts longer."]}"#
                        .to_string(),
                ),
            ]),
        };
        let outcome = run(&llm, "which laptop should I get for travel?").await;
        assert!(outcome.used);
        assert_eq!(outcome.text, "Model A");
        assert_eq!(
            outcome.rationale,
            vec![
                "Goal: pick a laptop for travel".to_string(),
                "Constraint: under 3 pounds".to_string(),
                "Constraint: good battery life".to_string(),
                "Decision: It weighs less.".to_string(),
                "Decision: Battery lasts longer.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_first_stage_aborts_with_unused() {
        let llm = ScriptedLlm { responses: Mutex::new(vec![Some("not json".to_string())]) };
        let outcome = run(&llm, "whatever").await;
        assert!(!outcome.used);
        assert!(outcome.rationale.is_empty());
    }

    #[tokio::test]
    async fn empty_options_list_aborts_pipeline() {
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![
                Some(r#"{"goal":"do a thing"}"#.to_string()),
                Some(r#"{"entities":[],"options":[]}"#.to_string()),
            ]),
        };
        let outcome = run(&llm, "whatever").await;
        assert!(!outcome.used);
    }
}
