//! タイムアウト付きの応答待ち

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::transcript::Transcript;

/// 1 回の読み取り結果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// 指定時間内に行が届かなかった
    Idle,
    /// 出力ストリームが閉じ、残りの行もすべて読み終えた
    EndOfStream,
}

/// 行単位の読み取り元。`timeout` を超えてブロックしてはならない。
pub trait LineSource {
    fn read_line(&mut self, timeout: Duration) -> ReadOutcome;
}

impl LineSource for Receiver<String> {
    fn read_line(&mut self, timeout: Duration) -> ReadOutcome {
        match self.recv_timeout(timeout) {
            Ok(line) => ReadOutcome::Line(line),
            Err(RecvTimeoutError::Timeout) => ReadOutcome::Idle,
            Err(RecvTimeoutError::Disconnected) => ReadOutcome::EndOfStream,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Matched,
    TimedOut,
    EndOfStream,
}

/// キーワード待ちの間に受け取った行
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyBatch {
    keyword: String,
    lines: Vec<String>,
    outcome: WaitOutcome,
}

impl ReplyBatch {
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn outcome(&self) -> WaitOutcome {
        self.outcome
    }

    pub fn matched(&self) -> bool {
        self.outcome == WaitOutcome::Matched
    }

    /// キーワードを含んだ行（一致した場合のみ）
    pub fn matched_line(&self) -> Option<&str> {
        if self.matched() {
            self.lines.last().map(String::as_str)
        } else {
            None
        }
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// `keyword` を部分文字列として含む行が届くか、`timeout` が経過するまで読み続ける。
///
/// 空行は捨てる。stdout が閉じた場合はそれ以上行が来ないので即座に返す。
pub fn wait_for_keyword<S: LineSource + ?Sized>(
    source: &mut S,
    keyword: &str,
    timeout: Duration,
    transcript: &mut dyn Transcript,
) -> ReplyBatch {
    let start = Instant::now();
    let mut lines = Vec::new();

    let outcome = loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        match source.read_line(remaining) {
            ReadOutcome::Line(raw) => {
                let line = raw.trim();
                if !line.is_empty() {
                    transcript.inbound(line);
                    lines.push(line.to_string());
                    if line.contains(keyword) {
                        break WaitOutcome::Matched;
                    }
                }
            }
            ReadOutcome::Idle => {}
            ReadOutcome::EndOfStream => break WaitOutcome::EndOfStream,
        }
        if start.elapsed() >= timeout {
            break WaitOutcome::TimedOut;
        }
    };

    log::debug!(
        "wait for '{keyword}' finished: {outcome:?} after {:?} ({} lines)",
        start.elapsed(),
        lines.len()
    );

    ReplyBatch {
        keyword: keyword.to_string(),
        lines,
        outcome,
    }
}
