use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;
use voice_cart::interpreter::{
    CommandInterpreter, InterpretRequest, Interpretation, InterpreterError,
};

pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

const SYSTEM_PROMPT: &str = r#"You are a voice shopping assistant for a Shopify store. Turn the shopper's command into actions a browser executor runs on the current page.

Reply with ONE JSON object, no markdown:
{"speech": "short reply read aloud", "action": <action or null>, "followUp": [<more actions, in order>]}

Actions (camelCase, "type" names the action):
- {"type":"navigate","destination":"homepage|catalog|cart|checkout|back|forward|/relative/path|https://...","target":"_self|_blank"}
- {"type":"search","query":"...","filters":{"price":"under-50" or {"min":10,"max":40},"color":"...","size":"...","category":"..."}}
- {"type":"addToCart","productId":"...","quantity":1,"variant":"..."}
- {"type":"selectVariant","value":"Large"}
- {"type":"goToCart"}
- {"type":"goToCheckout","skipToPayment":false,"shippingFields":{"city":"..."}}
- {"type":"clickElement","selector":"...","text":"visible text","waitFor":"selector"}
- {"type":"scroll","direction":"up|down|top|bottom","amount":400}
- {"type":"sort","by":"price|title|created|best-selling","order":"asc|desc"}
- {"type":"filter","category":"price|color|size|category","value":"..."}
- {"type":"applyDiscount","code":"..."}
- {"type":"updateQuantity","quantity":2,"productId":"..."}
- {"type":"removeFromCart","productId":"..."}  (omit productId to empty the cart)
- {"type":"hover","selector":"..."}
- {"type":"getText","selector":"..."}
- {"type":"setAttribute","selector":"...","attribute":"...","value":"..."}
- {"type":"removeElement","selector":"..."}
- {"type":"wait","durationMs":1000}
- {"type":"back"}
- {"type":"refreshPage"}
- {"type":"inform","message":"..."}  (questions and anything you cannot act on)

Rules:
1. Prefer a direct action over inform when one clearly fits.
2. Use clickElement with "text" when you do not know a selector.
3. Use the page context: on a product page addToCart needs no productId.
4. Keep speech short and natural."#;

/// Interprets commands with an OpenAI-compatible chat completions endpoint.
pub struct LlmInterpreter {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl LlmInterpreter {
    pub fn from_env(api_base: &str, model: &str) -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| anyhow!("set GROQ_API_KEY or OPENAI_API_KEY"))?;
        Ok(Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }
}

fn user_message(request: &InterpretRequest) -> String {
    let context = serde_json::to_string_pretty(&request.page_context).unwrap_or_default();
    format!(
        "Current URL: {}\nPage context:\n{}\n\nCommand: {}",
        request.current_url, context, request.command
    )
}

#[async_trait]
impl CommandInterpreter for LlmInterpreter {
    async fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation, InterpreterError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": user_message(request)},
                ],
                "temperature": 0.2,
            }))
            .send()
            .await
            .map_err(|e| InterpreterError::Request(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InterpreterError::Request(e.to_string()))?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown API error")
                .to_string();
            return Err(InterpreterError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(InterpreterError::Empty)?;
        debug!(content, "model replied");
        Interpretation::parse(content)
    }
}
