//! Skill executors.
//!
//! `spec.md` §1 keeps the real executors out of scope ("the core calls them
//! as opaque async functions returning a structured result or failing").
//! [`SPEC_FULL.md`](../SPEC_FULL.md) §4.11 asks for concrete implementations
//! so the gateway is runnable end-to-end; `markdown-to-html` actually
//! renders (it is the one path scenario S1 observes), the paid skills call a
//! configured backend service, and `ai-analysis` degrades gracefully when no
//! provider key is configured, per `spec.md` §7.

use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Config;

/// Wall-clock budget for a single executor invocation, per `spec.md` §5.
pub const EXECUTOR_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ExecutorOutput {
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("executor timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend service error: {0}")]
    Backend(String),
    #[error("unknown skill {0}")]
    UnknownSkill(String),
}

/// Invokes the executor for `skill_id` with `args`, as a value — never an
/// exception — per `spec.md` §7/§9.
pub async fn execute(config: &Config, client: &reqwest::Client, skill_id: &str, args: &Value) -> Result<ExecutorOutput, ExecutorError> {
    match skill_id {
        "markdown-to-html" => run_markdown_to_html(args),
        "markdown-to-pdf" => with_timeout(run_backend_call(config, client, "markdown-to-pdf", args)).await,
        "screenshot" => with_timeout(run_backend_call(config, client, "screenshot", args)).await,
        "ai-analysis" => with_timeout(run_ai_analysis(config, client, args)).await,
        other => Err(ExecutorError::UnknownSkill(other.to_string())),
    }
}

/// Wraps an un-awaited executor future in the 30s deadline, so a hung
/// backend or AI-provider call actually times out instead of the timeout
/// racing against an already-resolved value.
async fn with_timeout(call: impl std::future::Future<Output = Result<ExecutorOutput, ExecutorError>>) -> Result<ExecutorOutput, ExecutorError> {
    match tokio::time::timeout(EXECUTOR_TIMEOUT, call).await {
        Ok(result) => result,
        Err(_) => Err(ExecutorError::Timeout(EXECUTOR_TIMEOUT)),
    }
}

fn run_markdown_to_html(args: &Value) -> Result<ExecutorOutput, ExecutorError> {
    let markdown = args.get("markdown").and_then(Value::as_str).unwrap_or_default();
    let parser = pulldown_cmark::Parser::new(markdown);
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    Ok(ExecutorOutput {
        content_type: "text/html",
        body: html.clone().into_bytes(),
        data: json!({ "html": html }),
    })
}

async fn run_backend_call(
    config: &Config,
    client: &reqwest::Client,
    skill_id: &str,
    args: &Value,
) -> Result<ExecutorOutput, ExecutorError> {
    let base_url = match config.backend_url() {
        Some(url) => url,
        None => return Ok(placeholder_output(skill_id)),
    };
    let endpoint = format!("{}/{}", base_url.trim_end_matches('/'), skill_id);
    let mut request = client.post(&endpoint).json(args);
    if let Some(key) = config.backend_key() {
        request = request.bearer_auth(key);
    }
    let response = request
        .send()
        .await
        .map_err(|e| ExecutorError::Backend(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ExecutorError::Backend(format!(
            "backend returned status {}",
            response.status()
        )));
    }
    let content_type = match skill_id {
        "markdown-to-pdf" => "application/pdf",
        "screenshot" => "image/png",
        _ => "application/octet-stream",
    };
    let body = response
        .bytes()
        .await
        .map_err(|e| ExecutorError::Backend(e.to_string()))?
        .to_vec();
    Ok(ExecutorOutput {
        content_type,
        body,
        data: json!({ "bytes": body.len() }),
    })
}

fn placeholder_output(skill_id: &str) -> ExecutorOutput {
    ExecutorOutput {
        content_type: "application/json",
        body: Vec::new(),
        data: json!({ "status": "backend_not_configured", "skill": skill_id }),
    }
}

async fn run_ai_analysis(config: &Config, client: &reqwest::Client, args: &Value) -> Result<ExecutorOutput, ExecutorError> {
    let content = args.get("content").and_then(Value::as_str).unwrap_or_default();
    let Some(api_key) = config.ai_provider_key() else {
        return Ok(ExecutorOutput {
            content_type: "application/json",
            body: Vec::new(),
            data: json!({
                "status": "api_key_required",
                "summary": format!("(placeholder) received {} characters to analyze", content.len()),
            }),
        });
    };
    let Some(base_url) = config.ai_provider_url() else {
        return Ok(ExecutorOutput {
            content_type: "application/json",
            body: Vec::new(),
            data: json!({ "status": "api_key_required", "summary": "no AI provider URL configured" }),
        });
    };
    let response = client
        .post(base_url)
        .bearer_auth(api_key)
        .json(&json!({ "input": content }))
        .send()
        .await
        .map_err(|e| ExecutorError::Backend(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ExecutorError::Backend(format!(
            "AI provider returned status {}",
            response.status()
        )));
    }
    let data: Value = response
        .json()
        .await
        .map_err(|e| ExecutorError::Backend(e.to_string()))?;
    Ok(ExecutorOutput {
        content_type: "application/json",
        body: serde_json::to_vec(&data).unwrap_or_default(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn markdown_to_html_renders_headings() {
        let config = Config::for_tests();
        let client = reqwest::Client::new();
        let output = execute(&config, &client, "markdown-to-html", &json!({ "markdown": "# Hello" }))
            .await
            .unwrap();
        let html = String::from_utf8(output.body).unwrap();
        assert!(html.contains("Hello"));
        assert!(html.contains("<h1>"));
    }

    #[tokio::test]
    async fn ai_analysis_degrades_gracefully_without_a_key() {
        let config = Config::for_tests();
        let client = reqwest::Client::new();
        let output = execute(&config, &client, "ai-analysis", &json!({ "content": "some text" }))
            .await
            .unwrap();
        assert_eq!(output.data["status"], "api_key_required");
    }

    #[tokio::test]
    async fn backend_call_without_configured_url_is_a_placeholder_not_an_error() {
        let config = Config::for_tests();
        let client = reqwest::Client::new();
        let output = execute(&config, &client, "screenshot", &json!({ "url": "https://example.com" }))
            .await
            .unwrap();
        assert_eq!(output.data["status"], "backend_not_configured");
    }

    #[tokio::test]
    async fn unknown_skill_is_an_error() {
        let config = Config::for_tests();
        let client = reqwest::Client::new();
        assert!(execute(&config, &client, "nonexistent", &json!({})).await.is_err());
    }
}
