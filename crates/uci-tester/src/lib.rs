//! UCI エンジンのテストハーネス
//!
//! 外部エンジンを起動し、`uci` / `isready` / `ucinewgame` / `position fen` / `go` / `quit`
//! を順に送って応答を記録する。

pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod transcript;
pub mod wait;

pub use config::HarnessConfig;
pub use engine::{EngineConfig, EngineProcess};
pub use error::{SessionError, SessionResult};
pub use session::{SessionConfig, SessionReport, SessionStep, StepRecord, run_session};
pub use transcript::{ConsoleTranscript, RecordingTranscript, Transcript, TranscriptEntry};
pub use wait::{LineSource, ReadOutcome, ReplyBatch, WaitOutcome, wait_for_keyword};
