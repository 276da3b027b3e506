use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::IconGenerator;
use crate::config::AiConfig;
use crate::error::{BoardError, Result};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Talks to the Gemini API: a text model for classification, an image
/// model for icons.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    text_model: String,
    image_model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            api_key,
        })
    }

    /// Build a client if the configured key variable is set.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>> {
        match config.api_key() {
            Some(key) => Ok(Some(Self::new(config, key)?)),
            None => Ok(None),
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    async fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BoardError::Ai(format!(
                "{} returned {}: {}",
                url,
                status.as_u16(),
                body
            )));
        }
        Ok(response)
    }
}

fn classify_prompt(text: &str) -> String {
    format!(
        "Is the following text a single concrete noun or short noun phrase \
         that could be drawn as a simple icon? Answer only \"yes\" or \"no\".\n\n{}",
        text
    )
}

fn icon_prompt(text: &str) -> String {
    format!(
        "A simple, flat, colorful icon of {} on a plain white background, \
         no text",
        text
    )
}

/// Reads a yes/no answer. Anything else is an error so the caller falls back.
fn parse_answer(answer: &str) -> Result<bool> {
    let answer = answer
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    match answer.as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => Err(BoardError::Ai(format!("ambiguous classification: {:?}", other))),
    }
}

#[async_trait]
impl IconGenerator for GeminiClient {
    async fn classify(&self, text: &str) -> Result<bool> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: classify_prompt(text),
                }],
            }],
        };

        let url = self.endpoint(&self.text_model, "generateContent");
        let response: GenerateContentResponse = self.post(&url, &request).await?.json().await?;

        let answer = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| BoardError::Ai("classification returned no candidates".to_string()))?;

        debug!(answer = %answer.trim(), "classified note text");
        parse_answer(&answer)
    }

    async fn generate_icon(&self, text: &str) -> Result<String> {
        let request = PredictRequest {
            instances: vec![PredictInstance {
                prompt: icon_prompt(text),
            }],
            parameters: PredictParameters { sample_count: 1 },
        };

        let url = self.endpoint(&self.image_model, "predict");
        let response: PredictResponse = self.post(&url, &request).await?.json().await?;

        let prediction = response
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| BoardError::Ai("image generation returned nothing".to_string()))?;
        let bytes = prediction
            .bytes_base64_encoded
            .filter(|b| !b.is_empty())
            .ok_or_else(|| BoardError::Ai("image generation returned no image".to_string()))?;
        let mime = prediction.mime_type.unwrap_or_else(|| "image/png".to_string());

        Ok(format!("data:{};base64,{}", mime, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        let config = AiConfig {
            base_url: server.uri(),
            text_model: "text-model".to_string(),
            image_model: "image-model".to_string(),
            ..AiConfig::default()
        };
        GeminiClient::new(&config, "test-key".to_string()).unwrap()
    }

    fn answer(text: &str) -> serde_json::Value {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
    }

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("Yes").unwrap());
        assert!(parse_answer(" yes.\n").unwrap());
        assert!(!parse_answer("NO").unwrap());
        assert!(parse_answer("maybe").is_err());
    }

    #[tokio::test]
    async fn test_classify_sends_key_and_reads_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-model:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("yes")))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).classify("cat").await.unwrap());
    }

    #[tokio::test]
    async fn test_classify_no() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-model:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("No")))
            .mount(&server)
            .await;

        assert!(!client(&server)
            .classify("buy milk before friday")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_classify_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server).classify("cat").await.unwrap_err();
        assert!(matches!(err, BoardError::Ai(_)));
    }

    #[tokio::test]
    async fn test_generate_icon_builds_data_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/image-model:predict"))
            .and(body_partial_json(json!({"parameters": {"sampleCount": 1}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{"bytesBase64Encoded": "aGVsbG8=", "mimeType": "image/jpeg"}]
            })))
            .mount(&server)
            .await;

        let uri = client(&server).generate_icon("cat").await.unwrap();
        assert_eq!(uri, "data:image/jpeg;base64,aGVsbG8=");
    }

    #[tokio::test]
    async fn test_generate_icon_without_image_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/image-model:predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
            .mount(&server)
            .await;

        assert!(client(&server).generate_icon("cat").await.is_err());
    }
}
