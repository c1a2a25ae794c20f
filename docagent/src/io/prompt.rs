//! System prompt builder.
//!
//! The prompt is rendered once per task loop and stays fixed for the session.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::EnvironmentContext;
use crate::core::usage::{Usage, render_usages};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

/// Everything that varies between system prompts.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    /// What this flow is for, in a sentence or two.
    pub task: String,
    /// Usages of the wired tools, in display order.
    pub tools: Vec<&'static Usage>,
    pub max_steps: usize,
    /// Caller-supplied blocks appended verbatim, in order.
    pub environment: Vec<EnvironmentContext>,
}

/// Template engine wrapper around minijinja.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        Self { env }
    }

    pub fn build(&self, input: &PromptInputs) -> Result<String> {
        let template = self.env.get_template("system")?;
        let rendered = template.render(context! {
            task => input.task.trim(),
            tools => render_usages(&input.tools),
            max_steps => input.max_steps,
            environment => input.environment
                .iter()
                .filter(|ctx| !ctx.name.trim().is_empty())
                .collect::<Vec<_>>(),
        })?;
        Ok(rendered)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::CommandKind;
    use crate::core::usage::usage_for;

    fn inputs() -> PromptInputs {
        PromptInputs {
            task: "Answer the question.".to_string(),
            tools: vec![
                usage_for(CommandKind::FindFile),
                usage_for(CommandKind::AttemptComplete),
            ],
            max_steps: 7,
            environment: vec![
                EnvironmentContext::new("conversation", "ana: how do I rotate keys?"),
                EnvironmentContext::new("repository_tree", "docs/keys.md"),
            ],
        }
    }

    #[test]
    fn sections_appear_in_order() {
        let prompt = PromptBuilder::new().build(&inputs()).expect("render");
        let task = prompt.find("<task>").expect("task");
        let tools = prompt.find("TOOL USE").expect("tools");
        let format = prompt.find("RESPONSE FORMAT").expect("format");
        let budget = prompt.find("STEP BUDGET").expect("budget");
        let conversation = prompt.find("<conversation>").expect("conversation");
        let tree = prompt.find("<repository_tree>").expect("tree");
        assert!(task < tools && tools < format && format < budget);
        assert!(budget < conversation && conversation < tree);
        assert!(prompt.contains("at most 7 replies"));
    }

    #[test]
    fn only_wired_tools_are_listed() {
        let prompt = PromptBuilder::new().build(&inputs()).expect("render");
        assert!(prompt.contains("## find_file"));
        assert!(prompt.contains("## attempt_complete"));
        assert!(!prompt.contains("## query_rag"));
    }

    #[test]
    fn environment_values_are_not_escaped() {
        let mut input = inputs();
        input.environment = vec![EnvironmentContext::new("conversation", "a < b & c")];
        let prompt = PromptBuilder::new().build(&input).expect("render");
        assert!(prompt.contains("<conversation>\na < b & c\n</conversation>"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let builder = PromptBuilder::new();
        assert_eq!(
            builder.build(&inputs()).expect("render"),
            builder.build(&inputs()).expect("render")
        );
    }
}
