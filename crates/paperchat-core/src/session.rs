//! The chat session: an append-only transcript plus the Idle/Answering
//! state machine that drives one streamed completion per question.
//!
//! The session owns the message sequence behind a lock and is the only
//! writer, so appends are serialized. A busy flag rejects a second question
//! while one is streaming, and every exit path of the answering task
//! restores Idle through a drop guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use paperchat_provider::{ChatRequest, CompletionProvider};
use paperchat_retrieval::EmbeddingProvider;
use paperchat_schema::{ChatMessage, UploadedFile};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::pipeline::gather_context;

/// Seeded as the first transcript entry of every session.
pub const GREETING: &str = "Ask something about the uploaded documents";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a question is already being answered")]
    Busy,
}

/// Outcome of submitting a question.
pub enum Submission {
    /// Precondition unmet (empty question or no files); nothing happened.
    Ignored,
    /// The question was accepted; events arrive on this receiver.
    Accepted(mpsc::Receiver<ChatEvent>),
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A file the pipeline could not use; the round continues without it.
    FileSkipped { name: String, reason: String },
    /// One incremental fragment of the streamed answer.
    Delta(String),
    /// The round finished; `answer` is the full concatenated text.
    Completed { answer: String },
    /// The round was cancelled mid-stream.
    Cancelled { partial: String },
    /// The round failed; an error message was appended to the transcript.
    Failed { error: String },
}

pub struct ChatSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    history: Mutex<Vec<ChatMessage>>,
    answering: AtomicBool,
    cancel: Mutex<CancellationToken>,
    provider: Arc<dyn CompletionProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: AppConfig,
}

/// Restores Idle when the answering task exits, however it exits.
struct IdleGuard(Arc<SessionInner>);

impl Drop for IdleGuard {
    fn drop(&mut self) {
        self.0.answering.store(false, Ordering::SeqCst);
    }
}

impl ChatSession {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: AppConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                history: Mutex::new(vec![ChatMessage::assistant(GREETING)]),
                answering: AtomicBool::new(false),
                cancel: Mutex::new(CancellationToken::new()),
                provider,
                embedder,
                config,
            }),
        }
    }

    /// Snapshot of the transcript, greeting first.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.inner.history.lock().expect("session history lock").clone()
    }

    pub fn is_answering(&self) -> bool {
        self.inner.answering.load(Ordering::SeqCst)
    }

    /// Cancel the in-flight answer, if any.
    pub fn cancel(&self) {
        self.inner.cancel.lock().expect("session cancel lock").cancel();
    }

    /// Submit one question over the given files.
    ///
    /// A blank question or an empty file list is a no-op precondition, not
    /// an error. A second submission while a round is streaming is rejected
    /// with [`SessionError::Busy`].
    pub fn submit(
        &self,
        question: &str,
        files: Vec<UploadedFile>,
    ) -> Result<Submission, SessionError> {
        if question.trim().is_empty() || files.is_empty() {
            return Ok(Submission::Ignored);
        }
        if self
            .inner
            .answering
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::Busy);
        }

        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().expect("session cancel lock") = cancel.clone();

        let (tx, rx) = mpsc::channel(32);
        let inner = Arc::clone(&self.inner);
        let question = question.to_string();
        tokio::spawn(async move {
            answer_round(inner, question, files, tx, cancel).await;
        });

        Ok(Submission::Accepted(rx))
    }
}

async fn answer_round(
    inner: Arc<SessionInner>,
    question: String,
    files: Vec<UploadedFile>,
    tx: mpsc::Sender<ChatEvent>,
    cancel: CancellationToken,
) {
    let _guard = IdleGuard(Arc::clone(&inner));

    let gathered = match gather_context(
        &files,
        &question,
        inner.embedder.as_ref(),
        &inner.config.retrieval,
    )
    .await
    {
        Ok(gathered) => gathered,
        Err(err) => {
            // Nothing appended yet: record the whole round as user + error
            // so the transcript alternation survives.
            let error = err.to_string();
            {
                let mut history = inner.history.lock().expect("session history lock");
                history.push(ChatMessage::user(question.as_str()));
                history.push(ChatMessage::assistant(format!("⚠️ {error}")));
            }
            let _ = tx.send(ChatEvent::Failed { error }).await;
            return;
        }
    };

    for skipped in &gathered.skipped {
        let _ = tx
            .send(ChatEvent::FileSkipped {
                name: skipped.name.clone(),
                reason: skipped.reason.clone(),
            })
            .await;
    }

    let messages = {
        let mut history = inner.history.lock().expect("session history lock");
        history.push(ChatMessage::user(question.as_str()));
        history.clone()
    };

    let request = ChatRequest {
        model: inner.config.provider.model.clone(),
        system: Some(format!(
            "Here's the content of the file:\n\n{}",
            gathered.context
        )),
        messages,
        max_tokens: inner.config.provider.max_tokens,
    };

    let mut stream = match inner.provider.stream(request).await {
        Ok(stream) => stream,
        Err(err) => {
            finish_with_error(&inner, &tx, err.to_string()).await;
            return;
        }
    };

    let mut answer = String::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let partial = answer.clone();
                let content = if partial.is_empty() {
                    "[answer cancelled]".to_string()
                } else {
                    format!("{partial}\n[answer cancelled]")
                };
                inner
                    .history
                    .lock()
                    .expect("session history lock")
                    .push(ChatMessage::assistant(content));
                let _ = tx.send(ChatEvent::Cancelled { partial }).await;
                return;
            }
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    if !chunk.delta.is_empty() {
                        answer.push_str(&chunk.delta);
                        let _ = tx.send(ChatEvent::Delta(chunk.delta)).await;
                    }
                    if chunk.is_final {
                        break;
                    }
                }
                Some(Err(err)) => {
                    finish_with_error(&inner, &tx, err.to_string()).await;
                    return;
                }
                None => break,
            }
        }
    }

    inner
        .history
        .lock()
        .expect("session history lock")
        .push(ChatMessage::assistant(answer.clone()));
    tracing::debug!(chars = answer.len(), "answer round completed");
    let _ = tx.send(ChatEvent::Completed { answer }).await;
}

/// The user message is already in the transcript: close the round with an
/// assistant-visible error so no partial append is left behind.
async fn finish_with_error(inner: &SessionInner, tx: &mpsc::Sender<ChatEvent>, error: String) {
    tracing::warn!("answer round failed: {error}");
    inner
        .history
        .lock()
        .expect("session history lock")
        .push(ChatMessage::assistant(format!("⚠️ {error}")));
    let _ = tx.send(ChatEvent::Failed { error }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperchat_provider::StubCompletionProvider;
    use paperchat_retrieval::StubEmbeddingProvider;
    use paperchat_schema::Role;

    fn session() -> ChatSession {
        ChatSession::new(
            Arc::new(StubCompletionProvider),
            Arc::new(StubEmbeddingProvider::new(8)),
            AppConfig::default(),
        )
    }

    fn txt(name: &str, content: &str) -> UploadedFile {
        UploadedFile::new(name, content.as_bytes().to_vec())
    }

    async fn drain(mut rx: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn new_session_is_seeded_with_the_greeting() {
        let session = session();
        let history = session.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::Assistant);
        assert_eq!(history[0].content, GREETING);
        assert!(!session.is_answering());
    }

    #[tokio::test]
    async fn blank_question_is_ignored() {
        let session = session();
        let submission = session.submit("   ", vec![txt("a.txt", "x")]).unwrap();
        assert!(matches!(submission, Submission::Ignored));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn no_files_is_ignored() {
        let session = session();
        let submission = session.submit("why?", Vec::new()).unwrap();
        assert!(matches!(submission, Submission::Ignored));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn one_round_appends_user_then_assistant() {
        let session = session();
        let Submission::Accepted(rx) = session
            .submit("what is this about?", vec![txt("doc.txt", "some document text")])
            .unwrap()
        else {
            panic!("expected acceptance");
        };
        let events = drain(rx).await;
        assert!(matches!(events.last(), Some(ChatEvent::Completed { .. })));

        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, Role::User);
        assert_eq!(history[1].content, "what is this about?");
        assert_eq!(history[2].role, Role::Assistant);
        assert!(history[2].content.contains("what is this about?"));
        assert!(!session.is_answering());
    }

    #[tokio::test]
    async fn deltas_concatenate_to_the_final_answer() {
        let session = session();
        let Submission::Accepted(rx) = session
            .submit("question", vec![txt("doc.txt", "text")])
            .unwrap()
        else {
            panic!("expected acceptance");
        };
        let events = drain(rx).await;

        let mut streamed = String::new();
        let mut completed = None;
        for event in events {
            match event {
                ChatEvent::Delta(delta) => streamed.push_str(&delta),
                ChatEvent::Completed { answer } => completed = Some(answer),
                _ => {}
            }
        }
        assert_eq!(Some(streamed), completed);
    }

    #[tokio::test]
    async fn skipped_files_are_reported_but_not_fatal() {
        let session = session();
        let Submission::Accepted(rx) = session
            .submit(
                "question",
                vec![txt("good.txt", "content"), txt("bad.csv", "a,b")],
            )
            .unwrap()
        else {
            panic!("expected acceptance");
        };
        let events = drain(rx).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, ChatEvent::FileSkipped { name, .. } if name == "bad.csv")));
        assert!(matches!(events.last(), Some(ChatEvent::Completed { .. })));
    }

    #[tokio::test]
    async fn transcript_alternates_after_n_rounds() {
        let session = session();
        let rounds = 3;
        for i in 0..rounds {
            let Submission::Accepted(rx) = session
                .submit(&format!("question {i}"), vec![txt("doc.txt", "text")])
                .unwrap()
            else {
                panic!("expected acceptance");
            };
            drain(rx).await;
        }

        let history = session.history();
        assert_eq!(history.len(), 1 + 2 * rounds);
        for (i, message) in history.iter().enumerate().skip(1) {
            let expected = if i % 2 == 1 { Role::User } else { Role::Assistant };
            assert_eq!(message.role, expected, "message {i}");
        }
    }
}
