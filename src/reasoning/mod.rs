//! Reasoning Client (C4): wires the HTTP client to the centralized prompt
//! builders so every call site gets a consistent fallback string on
//! unavailability instead of handling `Option<String>` itself.

pub mod client;
pub mod prompts;

use client::{CompletionParams, ReasoningClient};

/// Fallback text substituted wherever the reasoning service is unavailable
/// or returns an empty response, per the "unavailable" contract in C4.
pub const UNAVAILABLE_FALLBACK: &str = "(reasoning unavailable)";

pub struct Reasoner {
    client: ReasoningClient,
    params: CompletionParams,
}

impl Reasoner {
    pub fn new(client: ReasoningClient, params: CompletionParams) -> Self {
        Self { client, params }
    }

    pub async fn healthy(&self) -> bool {
        self.client.healthy().await
    }

    pub async fn selection_rationale(&self, prompt: &str, command_name: &str, synopsis: &str) -> String {
        let built = prompts::selection_rationale_prompt(prompt, command_name, synopsis);
        self.complete_or_fallback(&built).await
    }

    pub async fn edge_rationale(&self, from: &str, to: &str, kind: &str) -> String {
        let built = prompts::edge_rationale_prompt(from, to, kind);
        self.complete_or_fallback(&built).await
    }

    pub async fn interpretation(&self, command: &str, output: &str) -> String {
        let built = prompts::interpretation_prompt(command, output);
        self.complete_or_fallback(&built).await
    }

    async fn complete_or_fallback(&self, prompt: &str) -> String {
        match self.client.complete(prompt, &self.params).await {
            Some(text) if !text.trim().is_empty() => text,
            _ => UNAVAILABLE_FALLBACK.to_string(),
        }
    }
}
