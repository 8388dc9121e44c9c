//! Host-driven donation flow.
//!
//! The host renders prompts and reports what the participant did; this
//! state machine only decides what to ask next. Sequence:
//! select file, extract (or offer a retry), ask consent, donate or decline.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::pipeline::{ExtractionPipeline, ExtractionResult};

/// Anything that can turn a selected file into step totals.
pub trait StepSource {
    fn extract(&self, path: &Path) -> Result<ExtractionResult>;
}

impl StepSource for ExtractionPipeline {
    fn extract(&self, path: &Path) -> Result<ExtractionResult> {
        ExtractionPipeline::extract(self, path)
    }
}

/// Instruction for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send `payload` to the research backend under `key`.
    Donate { key: String, payload: String },
    /// Ask the participant to choose their export archive.
    PromptFile,
    /// The file could not be processed; ask whether to try another one.
    PromptRetry,
    /// Show the extracted table, plus the session's debug trail as a second
    /// table, and ask for consent to donate them.
    PromptConsent {
        result: ExtractionResult,
        log: Vec<LogMessage>,
    },
    Exit { code: i32, info: String },
    /// Show the closing page.
    End,
}

/// One row of the debug trail shown next to the extracted data.
///
/// Never carries file names or extracted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
}

/// What the participant did in response to the last prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    FileSelected(PathBuf),
    /// The participant skipped file selection.
    Skipped,
    RetryAnswered(bool),
    /// Consent given; carries the JSON the consent form produced.
    Consented(String),
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    NotStarted,
    AwaitingFile,
    AwaitingRetry,
    AwaitingConsent,
    Finished,
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("flow has already started")]
    AlreadyStarted,
    #[error("event {event:?} is not expected while {state:?}")]
    UnexpectedEvent { state: FlowState, event: HostEvent },
}

/// One participant session.
pub struct DonationFlow<S: StepSource> {
    session_id: String,
    source: S,
    state: FlowState,
    log: Vec<LogMessage>,
}

impl<S: StepSource> DonationFlow<S> {
    pub fn new(session_id: impl Into<String>, source: S) -> Self {
        Self {
            session_id: session_id.into(),
            source,
            state: FlowState::NotStarted,
            log: Vec::new(),
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Debug trail collected so far.
    pub fn log(&self) -> &[LogMessage] {
        &self.log
    }

    fn debug(&mut self, message: impl Into<String>) {
        self.log.push(LogMessage {
            kind: "debug",
            message: message.into(),
        });
    }

    /// Record that the participant entered the script, then ask for a file.
    pub fn start(&mut self) -> Result<Vec<Command>, FlowError> {
        if self.state != FlowState::NotStarted {
            return Err(FlowError::AlreadyStarted);
        }
        self.state = FlowState::AwaitingFile;
        Ok(vec![
            Command::Donate {
                key: format!("{}-tracking", self.session_id),
                payload: r#"[{ "message": "user entered script" }]"#.to_string(),
            },
            Command::PromptFile,
        ])
    }

    pub fn handle(&mut self, event: HostEvent) -> Result<Vec<Command>, FlowError> {
        let commands = match (self.state, event) {
            (FlowState::AwaitingFile, HostEvent::FileSelected(path)) => {
                self.debug("extracting file");
                match self.source.extract(&path) {
                    Ok(result) => {
                        tracing::debug!(days = result.rows.len(), "extraction succeeded");
                        self.debug("extraction successful, go to consent form");
                        self.state = FlowState::AwaitingConsent;
                        vec![Command::PromptConsent {
                            result,
                            log: self.log.clone(),
                        }]
                    }
                    Err(err) => {
                        tracing::warn!(
                            kind = ?err.kind(),
                            "could not process selected file: {err}"
                        );
                        self.debug(format!(
                            "extraction failed ({:?}), prompt confirmation to retry file selection",
                            err.kind()
                        ));
                        self.state = FlowState::AwaitingRetry;
                        vec![Command::PromptRetry]
                    }
                }
            }
            (FlowState::AwaitingRetry, HostEvent::RetryAnswered(true)) => {
                self.debug("retry prompt file");
                self.state = FlowState::AwaitingFile;
                vec![Command::PromptFile]
            }
            (FlowState::AwaitingFile, HostEvent::Skipped) => {
                self.debug("skip to next step");
                self.finish(None)
            }
            (FlowState::AwaitingRetry, HostEvent::RetryAnswered(false)) => {
                self.debug("skip due to invalid file");
                self.finish(None)
            }
            (FlowState::AwaitingConsent, HostEvent::Declined) => {
                self.debug("consent declined");
                self.finish(None)
            }
            (FlowState::AwaitingConsent, HostEvent::Consented(payload)) => {
                self.debug("donate consent data");
                let key = format!("{}-{}", self.session_id, crate::pipeline::RESULT_ID);
                self.finish(Some(Command::Donate { key, payload }))
            }
            (state, event) => return Err(FlowError::UnexpectedEvent { state, event }),
        };
        Ok(commands)
    }

    fn finish(&mut self, donation: Option<Command>) -> Vec<Command> {
        self.state = FlowState::Finished;
        donation
            .into_iter()
            .chain([
                Command::Exit {
                    code: 0,
                    info: "Success".to_string(),
                },
                Command::End,
            ])
            .collect()
    }
}
