//! Line-oriented chat front-end.
//!
//! Reads questions, forwards them to the agent, records the exchange in the
//! transcript and prints the answer with the agent's trace.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use crate::agent::AgentClient;
use crate::error::{QueryDeskError, Result};
use crate::prompts::EXAMPLE_PROMPTS;
use crate::transcript::{format_response, render_list, Answer, Transcript, APOLOGY};

/// Maximum accepted question length, in characters.
pub const MAX_QUESTION_CHARS: usize = 2000;

const HELP: &str = "Commands:\n  /examples  show example prompts\n  /history   show the conversation, newest first\n  /end       end the session and clear history\n  /quit      exit";

/// What the caller should do after a line is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStep {
    /// Print this text and keep reading.
    Continue(String),
    /// Print this text and stop.
    Quit(String),
}

/// One chat session against an agent.
pub struct ChatSession {
    agent: Arc<dyn AgentClient>,
    session_id: String,
    transcript: Transcript,
}

impl ChatSession {
    /// Creates a session.
    pub fn new(agent: Arc<dyn AgentClient>, session_id: impl Into<String>, max_exchanges: usize) -> Self {
        Self {
            agent,
            session_id: session_id.into(),
            transcript: Transcript::with_max_exchanges(max_exchanges),
        }
    }

    /// Returns the transcript.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Handles one input line.
    pub async fn handle_line(&mut self, line: &str) -> ChatStep {
        let input = line.trim();
        match input {
            "" => ChatStep::Continue(String::new()),
            "/help" => ChatStep::Continue(HELP.to_string()),
            "/examples" => ChatStep::Continue(render_list("Example prompts", &EXAMPLE_PROMPTS)),
            "/history" => ChatStep::Continue(self.transcript.render()),
            "/end" => ChatStep::Continue(self.end_session().await),
            "/quit" | "/exit" => ChatStep::Quit(self.end_session().await),
            question => ChatStep::Continue(self.ask(question).await),
        }
    }

    async fn ask(&mut self, question: &str) -> String {
        if question.chars().count() > MAX_QUESTION_CHARS {
            return format!("Questions are limited to {MAX_QUESTION_CHARS} characters.");
        }

        match self.agent.ask(&self.session_id, question).await {
            Ok(reply) => {
                let answer = format_response(&reply.response);
                let rendered = answer.render();
                self.transcript.add(question, answer);
                if reply.trace.is_empty() {
                    rendered
                } else {
                    format!("{rendered}\n\n[trace]\n{}", reply.trace)
                }
            }
            Err(e) => {
                error!("{}: {}", e.category(), e);
                self.transcript
                    .add(question, Answer::Text(APOLOGY.to_string()));
                APOLOGY.to_string()
            }
        }
    }

    async fn end_session(&mut self) -> String {
        if let Err(e) = self.agent.end_session(&self.session_id).await {
            error!("Failed to end agent session: {e}");
        }
        info!(session_id = %self.session_id, "Session ended");
        self.transcript.end_session().to_string()
    }

    /// Runs the read-answer loop until EOF or `/quit`.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let io_err = |e: std::io::Error| QueryDeskError::internal(format!("terminal I/O failed: {e}"));
        let mut lines = reader.lines();

        writer
            .write_all(b"Ask a question about your data (/help for commands).\n> ")
            .await
            .map_err(io_err)?;
        writer.flush().await.map_err(io_err)?;

        while let Some(line) = lines.next_line().await.map_err(io_err)? {
            let (text, quit) = match self.handle_line(&line).await {
                ChatStep::Continue(text) => (text, false),
                ChatStep::Quit(text) => (text, true),
            };
            if !text.is_empty() {
                writer.write_all(text.as_bytes()).await.map_err(io_err)?;
                writer.write_all(b"\n").await.map_err(io_err)?;
            }
            if quit {
                break;
            }
            writer.write_all(b"> ").await.map_err(io_err)?;
            writer.flush().await.map_err(io_err)?;
        }

        writer.flush().await.map_err(io_err)?;
        Ok(())
    }
}
