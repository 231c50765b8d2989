//! Vision descriptions through an OpenAI-compatible chat completions API.

use super::Describer;
use crate::config::VisionSettings;
use crate::error::{Result, SlideSearchError};
use crate::openai::create_client;
use crate::slides::mime_type;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::{debug, instrument};

/// Describes images by sending them inline as base64 data URLs.
pub struct OpenAIDescriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
}

impl OpenAIDescriber {
    pub fn from_settings(settings: &VisionSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings.base_url.as_deref())?,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        })
    }
}

/// `data:<mime>;base64,<payload>` URL for an image file.
pub fn image_data_url(path: &Path, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes))
}

fn request_error(e: impl std::fmt::Display) -> SlideSearchError {
    SlideSearchError::Describe(format!("Failed to build request: {}", e))
}

#[async_trait]
impl Describer for OpenAIDescriber {
    #[instrument(skip(self, prompt), fields(image = %image.display(), model = %self.model))]
    async fn describe(&self, image: &Path, prompt: &str) -> Result<String> {
        let bytes = tokio::fs::read(image).await?;
        debug!("Sending {} bytes to {}", bytes.len(), self.model);

        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(image_data_url(image, &bytes))
                    .detail(ImageDetail::Auto)
                    .build()
                    .map_err(request_error)?,
            )
            .build()
            .map_err(request_error)?;

        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(prompt)
            .build()
            .map_err(request_error)?;

        let content = ChatCompletionRequestUserMessageContent::Array(vec![
            ChatCompletionRequestUserMessageContentPart::ImageUrl(image_part),
            ChatCompletionRequestUserMessageContentPart::Text(text_part),
        ]);

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(request_error)?;

        let messages: Vec<ChatCompletionRequestMessage> = vec![message.into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(request_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            SlideSearchError::OpenAI(format!("Vision API error: {}", e))
        })?;

        let description = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        if description.is_empty() {
            return Err(SlideSearchError::Describe(format!(
                "{} returned an empty description for {}",
                self.model,
                image.display()
            )));
        }

        Ok(description.to_string())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_data_url() {
        let url = image_data_url(Path::new("deck/slide_1.png"), b"abc");
        assert_eq!(url, "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_describer_from_settings() {
        let settings = VisionSettings {
            model: "Qwen/Qwen2.5-VL-3B-Instruct".to_string(),
            base_url: Some("http://localhost:8000/v1".to_string()),
            max_tokens: 512,
        };
        let describer = OpenAIDescriber::from_settings(&settings).unwrap();
        assert_eq!(describer.model(), "Qwen/Qwen2.5-VL-3B-Instruct");
        assert_eq!(describer.max_tokens, 512);
    }
}
