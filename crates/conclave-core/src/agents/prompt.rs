//! Prompt construction
//!
//! Agent files may carry `system_prompt` / `user_prompt` templates with
//! `{{ dotted.path }}` placeholders. Placeholders resolve against a JSON context;
//! anything missing renders as the empty string.

use super::definition::AgentDefinition;
use super::knowledge::Knowledge;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").ok());

const DEFAULT_LANGUAGE: &str = "JavaScript";
const DEFAULT_FRAMEWORK: &str = "Express";

/// Render `template`, replacing each `{{ path }}` with the value found in `context`
#[must_use]
pub fn render_template(template: &str, context: &Value) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &regex::Captures<'_>| {
        lookup(context, &caps[1]).map(value_to_text).unwrap_or_default()
    })
    .into_owned()
}

fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(context, |value, key| value.as_object()?.get(key))
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Template context: `input`, `knowledge`, `payload`, `agentName`, `agentRole`,
/// plus the payload's own top-level keys (which win on conflict)
#[must_use]
pub fn template_context(
    agent: &AgentDefinition,
    input: &str,
    knowledge: &Knowledge,
    payload: &Value,
) -> Value {
    let mut map = Map::new();
    map.insert("input".into(), Value::String(input.to_string()));
    map.insert("knowledge".into(), Value::String(knowledge.joined()));
    map.insert("payload".into(), payload.clone());
    map.insert("agentName".into(), Value::String(agent.name.clone()));
    map.insert("agentRole".into(), Value::String(agent.role.clone()));
    if let Value::Object(fields) = payload {
        for (key, value) in fields {
            map.insert(key.clone(), value.clone());
        }
    }
    Value::Object(map)
}

/// System and user prompt for a standalone agent run
#[must_use]
pub fn runner_prompts(
    agent: &AgentDefinition,
    input: &str,
    knowledge: &Knowledge,
    payload: &Value,
) -> (String, String) {
    let context = template_context(agent, input, knowledge, payload);

    let system = match &agent.system_prompt {
        Some(template) => render_template(template, &context),
        None => format!(
            "You are {}. Role: {}. Use the knowledge responsibly.",
            agent.name, agent.role
        ),
    };
    let user = match &agent.user_prompt {
        Some(template) => render_template(template, &context),
        None => format!(
            "Knowledge:\n{}\n\nUser Input:\n{}",
            knowledge.joined(),
            input
        ),
    };

    (system, user)
}

/// System and user prompt for an agent inside an orchestrated job
#[must_use]
pub fn orchestration_prompts(
    agent: &AgentDefinition,
    payload: &Value,
    context: &Value,
    knowledge: &Knowledge,
) -> (String, String) {
    let pretty = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());

    let system = match &agent.system_prompt {
        Some(template) => {
            let mut ctx = template_context(agent, "", knowledge, payload);
            if let (Value::Object(map), Value::Object(extra)) = (&mut ctx, context) {
                for (key, value) in extra {
                    map.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            render_template(template, &ctx)
        }
        None => {
            let language = context
                .get("primaryLanguage")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_LANGUAGE);
            let framework = context
                .get("framework")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_FRAMEWORK);

            let mut system = format!("You are {}.\nRole: {}.\n", agent.name, agent.role);
            if let Some(instructions) = agent.instructions.as_deref().filter(|s| !s.is_empty()) {
                system.push_str(&format!("Instructions: {instructions}\n"));
            }
            system.push_str(&format!(
                "Repository context: language={language}, framework={framework}."
            ));
            system
        }
    };

    let user = format!(
        "Analyze this payload and return JSON with keys decision, score, comments.\nPayload:\n{}\nKnowledge:\n{}",
        pretty,
        knowledge.joined()
    );

    (system, user)
}
