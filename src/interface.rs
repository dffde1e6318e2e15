//! Question answering and the interactive chat loop.
//!
//! [`Assistant`] wires one retriever to one generator. The chat loop reads
//! lines from any [`AsyncBufRead`] and writes to any [`Write`], so the same code
//! runs against a terminal in `tinypilot chat` and against byte buffers in
//! tests. A failed turn never ends the session.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use tinypilot_core::embedding::Embedder;
use tinypilot_core::generator::{ChatModel, Generator};
use tinypilot_core::models::RetrievedDocument;
use tinypilot_core::retriever::Retriever;
use tinypilot_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::llm::OpenAIChat;
use crate::search::warn_foreign_models;
use crate::sqlite_store::SqliteStore;
use crate::transcript::TranscriptLog;

pub const WELCOME_BANNER: &str = "\
tinypilot: ask about the tinygrad codebase, its bounties, and community tutorials.
Type 'exit' to quit or 'clear' to start over.";

/// Shown in place of the answer when a turn fails. Details go to the log.
pub const FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while answering that. Please try again.";

pub const EMPTY_INPUT_HINT: &str = "Please enter a question (or 'exit' to quit).";

/// An answer plus the documents it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub documents: Vec<RetrievedDocument>,
}

pub struct Assistant<'a, S, E, C>
where
    S: VectorStore + ?Sized,
    E: Embedder + ?Sized,
    C: ChatModel + ?Sized,
{
    retriever: Retriever<'a, S, E>,
    generator: Generator<'a, C>,
    top_k: usize,
}

impl<'a, S, E, C> Assistant<'a, S, E, C>
where
    S: VectorStore + ?Sized,
    E: Embedder + ?Sized,
    C: ChatModel + ?Sized,
{
    pub fn new(retriever: Retriever<'a, S, E>, generator: Generator<'a, C>, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
        }
    }

    /// Retrieve, then generate.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let documents = self.retriever.retrieve(query, self.top_k).await?;
        tracing::debug!(query, documents = documents.len(), "retrieved context");
        let text = self.generator.generate(query, &documents).await?;
        Ok(Answer { text, documents })
    }
}

/// One completed exchange kept in the session history.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub query: String,
    pub answer: String,
}

/// What the loop should do after a line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct ChatSession<'s, 'a, S, E, C>
where
    S: VectorStore + ?Sized,
    E: Embedder + ?Sized,
    C: ChatModel + ?Sized,
{
    assistant: &'s Assistant<'a, S, E, C>,
    log: Option<&'s TranscriptLog>,
    history: Vec<Turn>,
}

impl<'s, 'a, S, E, C> ChatSession<'s, 'a, S, E, C>
where
    S: VectorStore + ?Sized,
    E: Embedder + ?Sized,
    C: ChatModel + ?Sized,
{
    pub fn new(assistant: &'s Assistant<'a, S, E, C>, log: Option<&'s TranscriptLog>) -> Self {
        Self {
            assistant,
            log,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Read lines until `exit` or end of input.
    pub async fn run<R, W>(&mut self, mut input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(out, "{}\n", WELCOME_BANNER)?;
        loop {
            write!(out, "> ")?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line).await? == 0 {
                writeln!(out)?;
                return Ok(());
            }
            if self.handle_line(&line, out).await? == Flow::Exit {
                return Ok(());
            }
        }
    }

    pub async fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let query = line.trim();
        match query {
            "exit" => return Ok(Flow::Exit),
            "clear" => {
                self.history.clear();
                writeln!(out, "{}\n", WELCOME_BANNER)?;
                return Ok(Flow::Continue);
            }
            "" => {
                writeln!(out, "{}", EMPTY_INPUT_HINT)?;
                return Ok(Flow::Continue);
            }
            _ => {}
        }

        let (shown, recorded, ok) = match self.assistant.answer(query).await {
            Ok(answer) => {
                let shown = format!("{}{}", answer.text, sources_line(&answer.documents));
                (shown, answer.text, true)
            }
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "failed to answer query");
                (FAILURE_MESSAGE.to_string(), format!("{:#}", e), false)
            }
        };

        writeln!(out, "\n{}\n", shown)?;
        record(self.log, query, &recorded, ok).await;
        self.history.push(Turn {
            query: query.to_string(),
            answer: if ok { recorded } else { FAILURE_MESSAGE.to_string() },
        });
        Ok(Flow::Continue)
    }
}

/// `tinypilot ask`: answer one question and exit.
///
/// The turn is recorded either way; a failure is also returned to `main`.
pub async fn run_ask(config: &Config, query: &str) -> Result<()> {
    let chat = OpenAIChat::new(&config.llm)?;
    let embedder = create_embedder(&config.embedding)?;
    let store = SqliteStore::open(config, embedder.model_name()).await?;
    warn_foreign_models(&store).await;
    tracing::debug!(
        chat_model = chat.model_name(),
        embedding_model = embedder.model_name(),
        dims = embedder.dims(),
        "models ready"
    );
    let log = TranscriptLog::new(store.pool().clone());

    let assistant = Assistant::new(
        Retriever::new(&store, embedder.as_ref(), config.retrieval.params()),
        Generator::new(&chat, config.retrieval.context_limit),
        config.retrieval.top_k,
    );

    let result = assistant.answer(query).await;
    match &result {
        Ok(answer) => {
            record(Some(&log), query, &answer.text, true).await;
            println!("{}{}", answer.text, sources_line(&answer.documents));
        }
        Err(e) => record(Some(&log), query, &format!("{:#}", e), false).await,
    }

    store.pool().close().await;
    result.map(|_| ())
}

/// `tinypilot chat`: interactive loop on stdin/stdout.
pub async fn run_chat(config: &Config) -> Result<()> {
    let chat = OpenAIChat::new(&config.llm)?;
    let embedder = create_embedder(&config.embedding)?;
    let store = SqliteStore::open(config, embedder.model_name()).await?;
    warn_foreign_models(&store).await;
    tracing::debug!(
        chat_model = chat.model_name(),
        embedding_model = embedder.model_name(),
        dims = embedder.dims(),
        "models ready"
    );
    let log = TranscriptLog::new(store.pool().clone());

    let assistant = Assistant::new(
        Retriever::new(&store, embedder.as_ref(), config.retrieval.params()),
        Generator::new(&chat, config.retrieval.context_limit),
        config.retrieval.top_k,
    );

    let mut session = ChatSession::new(&assistant, Some(&log));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    session.run(stdin, &mut stdout).await?;

    store.pool().close().await;
    Ok(())
}

/// Append to the transcript; a failing log never fails the turn.
pub async fn record(log: Option<&TranscriptLog>, query: &str, answer: &str, ok: bool) {
    if let Some(log) = log {
        if let Err(e) = log.append(query, answer, ok).await {
            tracing::warn!(error = %e, "failed to write transcript");
        }
    }
}

/// `"\n\nSources: a, b"` for the documents behind an answer, empty when none.
pub fn sources_line(docs: &[RetrievedDocument]) -> String {
    if docs.is_empty() {
        return String::new();
    }
    let mut seen: Vec<&str> = Vec::new();
    for doc in docs {
        let source = doc.metadata.source.as_str();
        if !seen.contains(&source) {
            seen.push(source);
        }
    }
    format!("\n\nSources: {}", seen.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::io::Cursor;
    use tinypilot_core::models::{DocType, DocumentRecord, RecordMetadata};
    use tinypilot_core::retriever::RetrievalParams;
    use tinypilot_core::store::memory::InMemoryStore;

    struct ConstEmbedder;

    #[async_trait]
    impl Embedder for ConstEmbedder {
        fn model_name(&self) -> &str {
            "const"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct EchoChat;

    #[async_trait]
    impl ChatModel for EchoChat {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String> {
            if prompt.contains("explode") {
                bail!("upstream 500");
            }
            Ok("an answer".to_string())
        }
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let rec = DocumentRecord {
            id: "tutorial_intro.txt".to_string(),
            document: "tinygrad is small".to_string(),
            metadata: RecordMetadata {
                source: "intro.txt".to_string(),
                doc_type: DocType::Tutorial,
                bounty_type: None,
                value: None,
            },
        };
        store.upsert(&[rec], &[vec![1.0, 0.0]]).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_session_commands() {
        let store = seeded_store().await;
        let assistant = Assistant::new(
            Retriever::new(&store, &ConstEmbedder, RetrievalParams::default()),
            Generator::new(&EchoChat, None),
            5,
        );
        let mut session = ChatSession::new(&assistant, None);
        let mut out = Vec::new();

        assert_eq!(session.handle_line("   \n", &mut out).await.unwrap(), Flow::Continue);
        assert!(session.history().is_empty());

        session.handle_line("what is tinygrad?\n", &mut out).await.unwrap();
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].answer, "an answer");

        session.handle_line("clear", &mut out).await.unwrap();
        assert!(session.history().is_empty());

        assert_eq!(session.handle_line("exit\n", &mut out).await.unwrap(), Flow::Exit);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(EMPTY_INPUT_HINT));
        assert!(text.contains("Sources: intro.txt"));
        assert_eq!(text.matches(WELCOME_BANNER).count(), 1);
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_loop_alive() {
        let store = seeded_store().await;
        let assistant = Assistant::new(
            Retriever::new(&store, &ConstEmbedder, RetrievalParams::default()),
            Generator::new(&EchoChat, None),
            5,
        );
        let mut session = ChatSession::new(&assistant, None);
        let input = Cursor::new("please explode\nwhat is tinygrad?\nexit\n");
        let mut out = Vec::new();

        session.run(input, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(FAILURE_MESSAGE));
        assert!(!text.contains("upstream 500"));
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].answer, "an answer");
    }

    #[tokio::test]
    async fn test_run_awaits_input_from_async_stream() {
        use tokio::io::AsyncWriteExt;

        let store = seeded_store().await;
        let assistant = Assistant::new(
            Retriever::new(&store, &ConstEmbedder, RetrievalParams::default()),
            Generator::new(&EchoChat, None),
            5,
        );
        let mut session = ChatSession::new(&assistant, None);
        let (mut tx, rx) = tokio::io::duplex(16);

        // Single-threaded runtime: the writer only makes progress if `run` yields.
        let writer = tokio::spawn(async move {
            for line in ["what is tinygrad?\n", "clear\n", "what is tinygrad?\n"] {
                tx.write_all(line.as_bytes()).await.unwrap();
                tokio::task::yield_now().await;
            }
        });
        let mut out = Vec::new();
        session
            .run(tokio::io::BufReader::new(rx), &mut out)
            .await
            .unwrap();
        writer.await.unwrap();

        assert_eq!(session.history().len(), 1);
        assert!(String::from_utf8(out).unwrap().contains("an answer"));
    }

    #[test]
    fn test_sources_line_dedups() {
        let doc = |source: &str| RetrievedDocument {
            id: source.to_string(),
            content: "x".to_string(),
            metadata: RecordMetadata {
                source: source.to_string(),
                doc_type: DocType::Bounty,
                bounty_type: None,
                value: None,
            },
            score: 1.0,
        };
        assert_eq!(sources_line(&[]), "");
        assert_eq!(
            sources_line(&[doc("bounties"), doc("bounties"), doc("a.py")]),
            "\n\nSources: bounties, a.py"
        );
    }
}
