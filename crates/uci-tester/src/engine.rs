//! エンジンプロセスの起動と行単位の入出力

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::error::{SessionError, SessionResult};
use crate::wait::{LineSource, ReadOutcome};

pub const DEFAULT_QUIT_GRACE: Duration = Duration::from_millis(1000);
pub const ENGINE_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// reader スレッドの終了を待つ上限
const READER_JOIN_TIMEOUT: Duration = Duration::from_millis(200);
const LINE_CHANNEL_SIZE: usize = 1024;

/// エンジンプロセス起動時の設定。
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    /// `terminate` で自発的な終了を待つ時間。超えたら kill する。
    pub quit_grace: Duration,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            quit_grace: DEFAULT_QUIT_GRACE,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// 1本のエンジンに対する入出力をカプセル化する。
///
/// stdout は専用スレッドが 1 行ずつ bounded channel へ流し、stderr は別スレッドが
/// ログへ吐き出す。Drop 時には [`EngineProcess::terminate`] が走る。
pub struct EngineProcess {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    rx: Option<Receiver<String>>,
    stdout_reader: Option<JoinHandle<()>>,
    stderr_reader: Option<JoinHandle<()>>,
    quit_grace: Duration,
    exit_status: Option<ExitStatus>,
    terminated: bool,
    pub label: String,
}

impl EngineProcess {
    pub fn launch(cfg: &EngineConfig) -> SessionResult<Self> {
        let mut cmd = Command::new(&cfg.path);
        if !cfg.args.is_empty() {
            cmd.args(&cfg.args);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SessionError::Launch {
                path: cfg.path.clone(),
                source,
            })?;

        let label = cfg
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| cfg.path.display().to_string());

        let (stdin, stdout, stderr) =
            match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
                (Some(i), Some(o), Some(e)) => (i, o, e),
                (i, o, _) => {
                    let stream = if i.is_none() {
                        "stdin"
                    } else if o.is_none() {
                        "stdout"
                    } else {
                        "stderr"
                    };
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SessionError::StdioUnavailable { stream });
                }
            };

        let (tx, rx) = bounded::<String>(LINE_CHANNEL_SIZE);
        let stdout_reader = spawn_stdout_reader(stdout, tx, label.clone());
        let stderr_reader = spawn_stderr_drain(stderr, label.clone());

        log::debug!("{label}: spawned pid {}", child.id());

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            rx: Some(rx),
            stdout_reader: Some(stdout_reader),
            stderr_reader: Some(stderr_reader),
            quit_grace: cfg.quit_grace,
            exit_status: None,
            terminated: false,
            label,
        })
    }

    /// 1 行送信して即座に flush する。
    pub fn send(&mut self, command: &str) -> SessionResult<()> {
        let write_error = |source: std::io::Error| SessionError::Write {
            command: command.to_string(),
            source,
        };
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "engine stdin already closed",
            ))
        })?;
        stdin.write_all(command.as_bytes()).map_err(write_error)?;
        stdin.write_all(b"\n").map_err(write_error)?;
        stdin.flush().map_err(write_error)?;
        Ok(())
    }

    /// 次の 1 行を最大 `timeout` だけ待つ。
    pub fn read_line(&mut self, timeout: Duration) -> ReadOutcome {
        match self.rx.as_mut() {
            Some(rx) => rx.read_line(timeout),
            None => ReadOutcome::EndOfStream,
        }
    }

    pub fn is_running(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// stdin → stdout → stderr の順に閉じ、プロセスの終了を待つ。
    ///
    /// `quit_grace` 以内に終わらなければ kill する。何度呼んでもよく、エラーは返さない。
    pub fn terminate(&mut self) -> Option<ExitStatus> {
        if self.terminated {
            return self.exit_status;
        }
        self.terminated = true;

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.flush();
        }
        // receiver を落とすと reader スレッドは次の送信で抜ける
        self.rx = None;

        self.exit_status = self.wait_with_grace();

        join_reader(self.stdout_reader.take(), &self.label, "stdout");
        join_reader(self.stderr_reader.take(), &self.label, "stderr");

        match self.exit_status {
            Some(status) => log::debug!("{}: exited with {status}", self.label),
            None => log::warn!("{}: exit status unavailable", self.label),
        }
        self.exit_status
    }

    fn wait_with_grace(&mut self) -> Option<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Some(status);
        }
        let deadline = Instant::now() + self.quit_grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("{}: try_wait failed: {e}", self.label);
                    break;
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(ENGINE_QUIT_POLL_INTERVAL);
        }

        log::warn!("{}: did not exit within {:?}, killing", self.label, self.quit_grace);
        let _ = self.child.kill();
        self.child.wait().ok()
    }
}

impl LineSource for EngineProcess {
    fn read_line(&mut self, timeout: Duration) -> ReadOutcome {
        EngineProcess::read_line(self, timeout)
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn spawn_stdout_reader<R: Read + Send + 'static>(
    stdout: R,
    tx: Sender<String>,
    label: String,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("{label}: stdout read error: {e}");
                    break;
                }
            }
        }
        log::debug!("{label}: stdout closed");
    })
}

fn spawn_stderr_drain<R: Read + Send + 'static>(stderr: R, label: String) -> JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(stderr);
        for line in reader.split(b'\n').map_while(Result::ok) {
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end();
            if !line.is_empty() {
                log::debug!("{label} stderr: {line}");
            }
        }
    })
}

/// 終わっていればスレッドを回収し、終わらなければ切り離す。
fn join_reader(handle: Option<JoinHandle<()>>, label: &str, stream: &str) {
    let Some(handle) = handle else {
        return;
    };
    let deadline = Instant::now() + READER_JOIN_TIMEOUT;
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(ENGINE_QUIT_POLL_INTERVAL);
    }
    if handle.is_finished() {
        let _ = handle.join();
    } else {
        // 子プロセスがパイプを継承したまま生き残っている場合など
        log::warn!("{label}: {stream} reader still blocked, detaching");
    }
}
