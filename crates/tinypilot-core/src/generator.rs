//! Answer generation: context assembly, prompt templates, and the chat model seam.
//!
//! The generator re-derives the query kind from the text with the shared
//! [`classify`] function, so it behaves the same whichever retriever fed it.

use anyhow::Result;
use async_trait::async_trait;

use crate::classify::{classify, QueryKind};
use crate::models::{DocType, RetrievedDocument};
use crate::retriever::sort_by_score;

/// Sampling temperature used for every answer.
pub const ANSWER_TEMPERATURE: f32 = 0.0;

/// A hosted or local LLM that completes a single prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini-2024-07-18"`).
    fn model_name(&self) -> &str;
    /// Complete `prompt` and return the text output verbatim.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}

pub const BOUNTY_TEMPLATE: &str = "\
You are an assistant that answers questions about tinygrad bounties.

Rules:
1. List EVERY bounty in the context that is relevant to the question. Do not skip any.
2. Use one bullet point per bounty.
3. For each bounty include all fields present in the context: Type, Value, GitHub Owner, Link.
4. If the question asks for a specific value or type, put those bounties first.
5. If no bounty matches the question, say so explicitly.

Context (available bounties):
{context}

Question: {query}

Answer: Here are the relevant bounties:
";

pub const GENERAL_TEMPLATE: &str = "\
You are an assistant that answers questions about the tinygrad codebase and related concepts.

The context has up to two sections:
- TUTORIAL CONTENT: community tutorials, each marked with \"=== Tutorial: <name> ===\".
- ADDITIONAL CONTEXT: source code and other documents.

Rules:
1. Check the tutorials first. When one is relevant, name it and quote the parts you rely on.
2. Use the additional context to supplement the tutorials, and say which source each point comes from.
3. If no tutorial covers the question, say so before answering from the additional context.
4. Ground every claim in the context. Prefer the context over general knowledge.
5. If the context does not settle something, say you are unsure instead of guessing.

Context:
{context}

Question: {query}

Answer:
";

/// Fill `{context}` and `{query}` in one pass.
///
/// Placeholders inside the substituted values are left untouched.
pub fn render_template(template: &str, context: &str, query: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + query.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{query}") {
            out.push_str(query);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Build the context block handed to the LLM.
///
/// `limit` caps how many of the top-ranked documents a general query uses;
/// `None` uses all of them. Bounty queries always use every bounty document.
pub fn build_context(kind: QueryKind, docs: &[RetrievedDocument], limit: Option<usize>) -> String {
    match kind {
        QueryKind::Bounty => bounty_context(docs),
        QueryKind::General => general_context(docs, limit),
    }
}

fn bounty_context(docs: &[RetrievedDocument]) -> String {
    let bounties: Vec<RetrievedDocument> = docs
        .iter()
        .filter(|d| d.doc_type() == DocType::Bounty)
        .cloned()
        .collect();
    let mut selected = if bounties.is_empty() {
        docs.to_vec()
    } else {
        bounties
    };
    sort_by_score(&mut selected);
    selected
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn general_context(docs: &[RetrievedDocument], limit: Option<usize>) -> String {
    let mut ranked = docs.to_vec();
    sort_by_score(&mut ranked);
    if let Some(n) = limit {
        ranked.truncate(n);
    }

    let (tutorials, others): (Vec<_>, Vec<_>) = ranked
        .into_iter()
        .partition(|d| d.doc_type() == DocType::Tutorial);

    let mut sections = Vec::new();
    if !tutorials.is_empty() {
        let body = tutorials
            .iter()
            .map(|d| format!("=== Tutorial: {} ===\n\n{}", d.metadata.source, d.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!("=== TUTORIAL CONTENT ===\n\n{}", body));
    }
    if !others.is_empty() {
        let body = others
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!("=== ADDITIONAL CONTEXT ===\n\n{}", body));
    }
    sections.join("\n\n")
}

/// Build the full prompt for a query and its retrieved documents.
pub fn build_prompt(query: &str, docs: &[RetrievedDocument], limit: Option<usize>) -> String {
    let kind = classify(query);
    let context = build_context(kind, docs, limit);
    let template = match kind {
        QueryKind::Bounty => BOUNTY_TEMPLATE,
        QueryKind::General => GENERAL_TEMPLATE,
    };
    render_template(template, &context, query)
}

/// Turns a query plus ranked documents into an answer.
pub struct Generator<'a, C: ChatModel + ?Sized> {
    chat: &'a C,
    context_limit: Option<usize>,
}

impl<'a, C: ChatModel + ?Sized> Generator<'a, C> {
    pub fn new(chat: &'a C, context_limit: Option<usize>) -> Self {
        Self {
            chat,
            context_limit,
        }
    }

    /// Generate an answer. Errors from the chat model propagate unchanged.
    pub async fn generate(&self, query: &str, docs: &[RetrievedDocument]) -> Result<String> {
        let prompt = build_prompt(query, docs, self.context_limit);
        self.chat.complete(&prompt, ANSWER_TEMPERATURE).await
    }
}
