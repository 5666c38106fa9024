//! 送受信ログ（トランスクリプト）の出力先
//!
//! driver は送信コマンド・受信行・通知をすべてここへ流す。CLI では stdout に
//! `>>> ` / `<<< ` 付きで書き出し、テストでは [`RecordingTranscript`] で内容を検証する。

use std::io::Write;

pub const OUTBOUND_PREFIX: &str = ">>> ";
pub const INBOUND_PREFIX: &str = "<<< ";

/// トランスクリプトの出力先
pub trait Transcript {
    /// エンジンへ送ったコマンド
    fn outbound(&mut self, command: &str);
    /// エンジンから受け取った 1 行
    fn inbound(&mut self, line: &str);
    /// タイムアウト等の通知
    fn notice(&mut self, message: &str);
}

/// 任意の writer へコンソール形式で書き出す。書き込みエラーは無視する。
pub struct ConsoleTranscript<W: Write> {
    out: W,
}

impl<W: Write> ConsoleTranscript<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, prefix: &str, text: &str) {
        let _ = writeln!(self.out, "{prefix}{text}");
        let _ = self.out.flush();
    }
}

impl ConsoleTranscript<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Transcript for ConsoleTranscript<W> {
    fn outbound(&mut self, command: &str) {
        self.write_line(OUTBOUND_PREFIX, command);
    }

    fn inbound(&mut self, line: &str) {
        self.write_line(INBOUND_PREFIX, line);
    }

    fn notice(&mut self, message: &str) {
        self.write_line("", message);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptEntry {
    Outbound(String),
    Inbound(String),
    Notice(String),
}

impl TranscriptEntry {
    /// コンソール形式の 1 行に整形する
    pub fn render(&self) -> String {
        match self {
            TranscriptEntry::Outbound(s) => format!("{OUTBOUND_PREFIX}{s}"),
            TranscriptEntry::Inbound(s) => format!("{INBOUND_PREFIX}{s}"),
            TranscriptEntry::Notice(s) => s.clone(),
        }
    }
}

/// メモリ上に記録するだけのトランスクリプト
#[derive(Default, Debug)]
pub struct RecordingTranscript {
    entries: Vec<TranscriptEntry>,
}

impl RecordingTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// 送信したコマンドを送信順に返す
    pub fn sent(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Outbound(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    /// 受信した行を受信順に返す
    pub fn received(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Inbound(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Notice(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn render(&self) -> Vec<String> {
        self.entries.iter().map(TranscriptEntry::render).collect()
    }
}

impl Transcript for RecordingTranscript {
    fn outbound(&mut self, command: &str) {
        self.entries.push(TranscriptEntry::Outbound(command.to_string()));
    }

    fn inbound(&mut self, line: &str) {
        self.entries.push(TranscriptEntry::Inbound(line.to_string()));
    }

    fn notice(&mut self, message: &str) {
        self.entries.push(TranscriptEntry::Notice(message.to_string()));
    }
}
