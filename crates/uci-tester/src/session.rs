//! UCI セッション driver
//!
//! 固定の手順 `uci` → `isready` → `ucinewgame` → `position fen` → `go` → `quit` で
//! エンジンを動かし、応答を期待するステップではキーワードかタイムアウトまで待つ。

use std::process::ExitStatus;
use std::time::Duration;

use crate::engine::{EngineConfig, EngineProcess};
use crate::error::SessionResult;
use crate::transcript::Transcript;
use crate::wait::{ReplyBatch, WaitOutcome, wait_for_keyword};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_FEN: &str = "7k/8/8/8/8/8/4Q3/5K2 w - - 0 1";
pub const DEFAULT_GO_COMMAND: &str = "go";

/// セッション全体の設定
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub engine: EngineConfig,
    /// 各応答待ちのタイムアウト
    pub timeout: Duration,
    pub fen: String,
    pub go_command: String,
}

impl SessionConfig {
    pub fn new(engine: EngineConfig) -> Self {
        Self {
            engine,
            timeout: DEFAULT_TIMEOUT,
            fen: DEFAULT_FEN.to_string(),
            go_command: DEFAULT_GO_COMMAND.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStep {
    Handshake,
    ReadyCheck,
    NewGame,
    PositionSet,
    Search,
    Shutdown,
}

impl SessionStep {
    pub const SEQUENCE: [SessionStep; 6] = [
        SessionStep::Handshake,
        SessionStep::ReadyCheck,
        SessionStep::NewGame,
        SessionStep::PositionSet,
        SessionStep::Search,
        SessionStep::Shutdown,
    ];

    pub fn command(self, cfg: &SessionConfig) -> String {
        match self {
            SessionStep::Handshake => "uci".to_string(),
            SessionStep::ReadyCheck => "isready".to_string(),
            SessionStep::NewGame => "ucinewgame".to_string(),
            SessionStep::PositionSet => format!("position fen {}", cfg.fen),
            SessionStep::Search => cfg.go_command.clone(),
            SessionStep::Shutdown => "quit".to_string(),
        }
    }

    /// 応答を待つステップなら、その終端キーワード
    pub fn expected_keyword(self) -> Option<&'static str> {
        match self {
            SessionStep::Handshake => Some("uciok"),
            SessionStep::ReadyCheck => Some("readyok"),
            SessionStep::Search => Some("bestmove"),
            SessionStep::NewGame | SessionStep::PositionSet | SessionStep::Shutdown => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionStep::Handshake => "handshake",
            SessionStep::ReadyCheck => "ready_check",
            SessionStep::NewGame => "new_game",
            SessionStep::PositionSet => "position_set",
            SessionStep::Search => "search",
            SessionStep::Shutdown => "shutdown",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StepRecord {
    pub step: SessionStep,
    pub command: String,
    pub reply: Option<ReplyBatch>,
}

/// 1 セッション分の結果
#[derive(Debug, Default)]
pub struct SessionReport {
    pub steps: Vec<StepRecord>,
    pub exit_status: Option<ExitStatus>,
}

impl SessionReport {
    pub fn reply(&self, step: SessionStep) -> Option<&ReplyBatch> {
        self.steps.iter().find(|r| r.step == step).and_then(|r| r.reply.as_ref())
    }

    /// キーワードに到達しなかった待ち
    pub fn unmatched(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|r| r.reply.as_ref().is_some_and(|b| !b.matched()))
    }

    pub fn all_matched(&self) -> bool {
        self.unmatched().next().is_none()
    }

    /// `bestmove` 行（得られた場合）
    pub fn bestmove_line(&self) -> Option<&str> {
        self.reply(SessionStep::Search).and_then(ReplyBatch::matched_line)
    }
}

/// エンジンを 1 本起動して固定の UCI 手順を流す。
///
/// 起動失敗と送信失敗だけがエラーになる。応答待ちのタイムアウトは記録して先へ進む。
pub fn run_session(
    cfg: &SessionConfig,
    transcript: &mut dyn Transcript,
) -> SessionResult<SessionReport> {
    transcript.notice(&format!("Starting engine: {}\n", cfg.engine.path.display()));
    let engine = EngineProcess::launch(&cfg.engine)?;
    log::debug!("{}: session started (pid {})", engine.label, engine.id());

    let mut session = Session {
        engine,
        transcript,
        timeout: cfg.timeout,
    };
    let mut report = SessionReport::default();

    for step in SessionStep::SEQUENCE {
        let command = step.command(cfg);
        log::debug!("{}: step {}", session.engine.label, step.label());
        // 送信失敗時は `?` で抜け、EngineProcess の Drop が後始末する
        session.send(&command)?;
        let reply = step.expected_keyword().map(|keyword| session.wait(keyword));
        report.steps.push(StepRecord {
            step,
            command,
            reply,
        });
    }

    report.exit_status = session.engine.terminate();
    session.transcript.notice("\nTest complete.");
    Ok(report)
}

struct Session<'a> {
    engine: EngineProcess,
    transcript: &'a mut dyn Transcript,
    timeout: Duration,
}

impl Session<'_> {
    fn send(&mut self, command: &str) -> SessionResult<()> {
        self.transcript.outbound(command);
        self.engine.send(command).inspect_err(|e| {
            log::error!("{}: {e}", self.engine.label);
        })
    }

    fn wait(&mut self, keyword: &str) -> ReplyBatch {
        let batch = wait_for_keyword(&mut self.engine, keyword, self.timeout, self.transcript);
        match batch.outcome() {
            WaitOutcome::Matched => {}
            WaitOutcome::TimedOut => {
                log::warn!("{}: no '{keyword}' within {:?}", self.engine.label, self.timeout);
                self.transcript.notice(&format!("Timed out waiting for '{keyword}'."));
            }
            WaitOutcome::EndOfStream => {
                log::warn!("{}: output closed before '{keyword}'", self.engine.label);
                self.transcript
                    .notice(&format!("Engine output closed while waiting for '{keyword}'."));
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_follow_fixed_uci_sequence() {
        let cfg = SessionConfig::new(EngineConfig::new("engine"));
        let commands: Vec<String> = SessionStep::SEQUENCE.iter().map(|s| s.command(&cfg)).collect();
        assert_eq!(
            commands,
            vec![
                "uci",
                "isready",
                "ucinewgame",
                "position fen 7k/8/8/8/8/8/4Q3/5K2 w - - 0 1",
                "go",
                "quit",
            ]
        );
    }

    #[test]
    fn only_handshake_ready_and_search_wait_for_reply() {
        let waits: Vec<(SessionStep, &str)> = SessionStep::SEQUENCE
            .iter()
            .filter_map(|s| s.expected_keyword().map(|k| (*s, k)))
            .collect();
        assert_eq!(
            waits,
            vec![
                (SessionStep::Handshake, "uciok"),
                (SessionStep::ReadyCheck, "readyok"),
                (SessionStep::Search, "bestmove"),
            ]
        );
    }

    #[test]
    fn custom_fen_and_go_are_used() {
        let mut cfg = SessionConfig::new(EngineConfig::new("engine"));
        cfg.fen = "8/8/8/8/8/8/8/K6k w - - 0 1".to_string();
        cfg.go_command = "go movetime 300".to_string();

        assert_eq!(SessionStep::PositionSet.command(&cfg), "position fen 8/8/8/8/8/8/8/K6k w - - 0 1");
        assert_eq!(SessionStep::Search.command(&cfg), "go movetime 300");
    }
}
