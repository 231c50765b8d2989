//! Answer generation from the descriptions of previously retrieved slides.

use crate::config::{AnswerSettings, Prompts};
use crate::error::{Result, SlideSearchError};
use crate::openai::create_client;
use crate::vector_store::{SlideRecord, VectorStore};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Reply when a question arrives before any search.
pub const NO_SEARCH_ANSWER: &str = "Please search for slides first before asking a question.";

/// An answer together with the slides it was based on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Ids of the slides whose descriptions were in the prompt.
    pub sources: Vec<String>,
}

/// `Description <n>:\n<text>\n\n` for each record, numbered from 1.
pub fn format_descriptions(records: &[SlideRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("Description {}:\n{}\n\n", i + 1, r.description.trim()))
        .collect()
}

/// Answers questions with a chat model, using slide descriptions as the only context.
pub struct AnswerEngine {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    vector_store: Arc<dyn VectorStore>,
    prompts: Prompts,
}

impl AnswerEngine {
    pub fn new(vector_store: Arc<dyn VectorStore>, settings: &AnswerSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings.base_url.as_deref())?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            vector_store,
            prompts: Prompts::default(),
        })
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Override the chat model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Render the user prompt for a question over the given slides.
    pub fn build_prompt(&self, question: &str, records: &[SlideRecord]) -> String {
        let mut vars = HashMap::new();
        vars.insert("descriptions".to_string(), format_descriptions(records));
        vars.insert("question".to_string(), question.to_string());
        self.prompts.render_with_custom(&self.prompts.answer.user, &vars)
    }

    /// Answer `question` from the descriptions of `slide_ids`.
    ///
    /// Without any ids the fixed [`NO_SEARCH_ANSWER`] is returned and no model is called.
    #[instrument(skip(self, slide_ids), fields(slides = slide_ids.len()))]
    pub async fn answer(&self, question: &str, slide_ids: &[String]) -> Result<Answer> {
        if slide_ids.is_empty() {
            return Ok(Answer {
                answer: NO_SEARCH_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let question = question.trim();
        if question.is_empty() {
            return Err(SlideSearchError::InvalidInput("Question is empty".to_string()));
        }

        let records = self.vector_store.get_many(slide_ids).await?;
        if records.len() < slide_ids.len() {
            debug!("{} of {} slides are no longer indexed", slide_ids.len() - records.len(), slide_ids.len());
        }

        info!("Answering over {} slide descriptions", records.len());
        let user_prompt = self.build_prompt(question, &records);
        let system_prompt = self.prompts.render_with_custom(&self.prompts.answer.system, &HashMap::new());

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| SlideSearchError::Answer(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| SlideSearchError::Answer(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| SlideSearchError::Answer(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            SlideSearchError::OpenAI(format!("Failed to generate answer: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SlideSearchError::Answer("Empty response from LLM".to_string()))?
            .trim()
            .to_string();

        Ok(Answer {
            answer,
            sources: records.into_iter().map(|r| r.id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::MemoryVectorStore;

    fn record(id: &str, description: &str) -> SlideRecord {
        SlideRecord::new(
            id.to_string(),
            "deck".to_string(),
            None,
            description.to_string(),
            format!("/img/{}", id),
            vec![1.0],
        )
    }

    fn engine() -> AnswerEngine {
        let store = Arc::new(MemoryVectorStore::default());
        AnswerEngine::new(store, &AnswerSettings::default()).unwrap()
    }

    #[test]
    fn test_prompt_layout() {
        let records = vec![record("deck/slide_1.png", " Revenue chart \n"), record("deck/slide_2.png", "Team photo")];
        let prompt = engine().build_prompt("What was revenue?", &records);
        assert_eq!(
            prompt,
            "Here are descriptions of Images:\n\n\
             Description 1:\nRevenue chart\n\n\
             Description 2:\nTeam photo\n\n\
             Here is the Question:\nWhat was revenue?\n\
             Please answer the question using only the context from the descriptions that are relevant to the question."
        );
    }

    #[test]
    fn test_custom_variables_reach_prompt() {
        let mut prompts = Prompts::default();
        prompts.answer.user = "{{company}}: {{question}}".to_string();
        prompts.variables.insert("company".to_string(), "Acme".to_string());
        let prompt = engine().with_prompts(prompts).build_prompt("Why?", &[]);
        assert_eq!(prompt, "Acme: Why?");
    }

    #[tokio::test]
    async fn test_no_search_yet() {
        let answer = engine().answer("What is AI benchmark performance?", &[]).await.unwrap();
        assert_eq!(answer.answer, NO_SEARCH_ANSWER);
        assert!(answer.sources.is_empty());

        let answer = engine().answer("  ", &[]).await.unwrap();
        assert_eq!(answer.answer, NO_SEARCH_ANSWER);
    }

    #[test]
    fn test_template_text_in_description_stays_literal() {
        let records = vec![record("deck/slide_1.png", "Ansible template uses {{question}} variable")];
        let prompt = engine().build_prompt("Q?", &records);
        assert!(prompt.contains("Description 1:\nAnsible template uses {{question}} variable\n"));
        assert!(prompt.contains("Here is the Question:\nQ?\n"));
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let err = engine()
            .answer(" ", &["deck/slide_1.png".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SlideSearchError::InvalidInput(_)));
    }
}
