//! セッション中に発生し得るエラー型
//!
//! タイムアウトや stdout の EOF はエラーではなく [`crate::wait::WaitOutcome`] として扱う。

use std::io;
use std::path::PathBuf;

/// UCI セッションの致命的エラー
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// エンジンプロセスを起動できなかった（存在しない・実行権限がない等）
    #[error("failed to launch engine at {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// stdin への書き込みに失敗した。エンジンが落ちたとみなす。
    #[error("failed to send '{command}' to engine: {source}")]
    Write {
        command: String,
        #[source]
        source: io::Error,
    },

    /// piped で起動したはずの標準ストリームが取得できなかった
    #[error("engine {stream} was not captured")]
    StdioUnavailable { stream: &'static str },
}

impl SessionError {
    /// エンジン側の異常（起動失敗を除く）かどうか
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, SessionError::Write { .. })
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
