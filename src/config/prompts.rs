//! Prompt templates for slidesearch.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub describe: DescribePrompts,
    pub answer: AnswerPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompt sent alongside each slide image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescribePrompts {
    pub user: String,
}

impl Default for DescribePrompts {
    fn default() -> Self {
        Self {
            user: "Describe this image.".to_string(),
        }
    }
}

/// Prompts for answering questions over slide descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    pub system: String,
    pub user: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            system: r#"You answer questions about a collection of presentation slides.
You only see textual descriptions of the slides, never the slides themselves.
If the descriptions do not contain the answer, say so plainly."#
                .to_string(),

            user: r#"Here are descriptions of Images:

{{descriptions}}Here is the Question:
{{question}}
Please answer the question using only the context from the descriptions that are relevant to the question."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let describe_path = custom_path.join("describe.toml");
            if describe_path.exists() {
                let content = std::fs::read_to_string(&describe_path)?;
                prompts.describe = toml::from_str(&content)?;
            }

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are replaced in a single pass, so `{{...}}` inside an
    /// inserted value stays literal. Unknown placeholders are left untouched.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid regex"));

        re.replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The describe prompt with custom variables applied.
    pub fn describe_prompt(&self) -> String {
        self.render_with_custom(&self.describe.user, &HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert_eq!(prompts.describe_prompt(), "Describe this image.");
        assert!(prompts.answer.user.contains("{{question}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} slides.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        assert_eq!(Prompts::render(template, &vars), "Hello Alice, you have 5 slides.");
    }

    #[test]
    fn test_inserted_values_are_not_rendered_again() {
        let template = "{{descriptions}}Q: {{question}} {{unknown}}";
        let mut vars = HashMap::new();
        vars.insert("descriptions".to_string(), "Ansible template uses {{question}}\n".to_string());
        vars.insert("question".to_string(), "Q?".to_string());

        for _ in 0..20 {
            assert_eq!(
                Prompts::render(template, &vars),
                "Ansible template uses {{question}}\nQ: Q? {{unknown}}"
            );
        }
    }

    #[test]
    fn test_custom_prompt_files_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("describe.toml"),
            "user = \"Summarize the {{topic}} slide.\"\n",
        )
        .unwrap();

        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), "finance".to_string());
        let prompts = Prompts::load(dir.path().to_str(), Some(&vars)).unwrap();

        assert_eq!(prompts.describe_prompt(), "Summarize the finance slide.");
        assert!(prompts.answer.system.contains("slides"));
    }
}
