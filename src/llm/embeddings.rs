use serde_json::json;

use crate::llm::provider::{Provider, ProviderError};
use crate::llm::watsonx::WatsonxContext;

/// IBM watsonx.ai embeddings client.
#[derive(Debug, Clone)]
pub struct WatsonxEmbeddings {
    model: String,
    context: WatsonxContext,
    client: reqwest::Client,
}

impl WatsonxEmbeddings {
    /// Creates a client from a model id and the `IBM_*` env vars.
    pub fn new(model: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            model: model.into(),
            context: WatsonxContext::resolve()?,
            client: reqwest::Client::new(),
        })
    }

    /// Embeds a batch of texts and returns one dense vector per input.
    pub async fn embed_texts(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let provider = Provider::Watsonx;
        let payload = json!({
            "model_id": self.model,
            "project_id": self.context.project_id,
            "inputs": inputs,
        });

        let token = self.context.iam_token(&self.client).await?;
        let response = self
            .client
            .post(self.context.embeddings_url())
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ProviderError::Request { provider, source })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider,
                status,
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|source| ProviderError::Request { provider, source })?;
        let results = body["results"]
            .as_array()
            .ok_or(ProviderError::EmptyResponse { provider })?;

        let mut vectors = Vec::with_capacity(results.len());
        for result in results {
            let embedding = result["embedding"]
                .as_array()
                .ok_or(ProviderError::EmptyResponse { provider })?;
            let mut vector = Vec::with_capacity(embedding.len());
            for value in embedding {
                let number = value
                    .as_f64()
                    .ok_or(ProviderError::EmptyResponse { provider })?;
                vector.push(number as f32);
            }
            vectors.push(vector);
        }

        if vectors.len() != inputs.len() {
            return Err(ProviderError::EmptyResponse { provider });
        }
        Ok(vectors)
    }

    /// Embeds a single query string and returns the dense vector.
    pub async fn embed_query(&self, input: impl Into<String>) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_texts(&[input.into()]).await?;
        vectors
            .pop()
            .ok_or(ProviderError::EmptyResponse {
                provider: Provider::Watsonx,
            })
    }
}
