//! Python module host
//!
//! Every loaded unit runs in its own interpreter process, started with an
//! embedded driver script. The driver executes the module file and then
//! waits for an unload request. Host and driver exchange one JSON object per
//! line over the child's stdin/stdout; the child's stderr (including
//! anything the module prints) is forwarded to the log from a worker thread.
//!
//! Isolation between units is therefore process isolation: two modules never
//! share interpreter state.

use super::{ExecError, HostError, ModuleHost, UnitHandle, UnloadReport};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

const DRIVER: &str = include_str!("driver.py");

/// Log target for lines a module writes to stdout/stderr
pub const STDERR_TARGET: &str = "module.stderr";

/// Interpreter used when neither configuration nor environment names one
pub fn default_interpreter() -> &'static str {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            "python"
        } else {
            "python3"
        }
    }
}

/// Resolve the interpreter binary
///
/// Order: configured value, `VOXSHELL_PYTHON`, platform default.
pub fn resolve_interpreter(configured: &str) -> PathBuf {
    let configured = configured.trim();
    if !configured.is_empty() {
        return PathBuf::from(configured);
    }
    if let Ok(raw) = std::env::var("VOXSHELL_PYTHON") {
        let t = raw.trim();
        if !t.is_empty() {
            return PathBuf::from(t);
        }
    }
    PathBuf::from(default_interpreter())
}

#[derive(Serialize)]
struct Request {
    op: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Reply {
    Loaded,
    Error {
        detail: String,
    },
    Unloaded {
        hook: HookStatus,
        #[serde(default)]
        detail: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum HookStatus {
    Called,
    Missing,
    Failed,
}

struct PythonUnit {
    path: PathBuf,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr_forwarder: Option<JoinHandle<()>>,
}

impl PythonUnit {
    fn request(&mut self, request: &Request) -> Result<Option<Reply>, HostError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| HostError::Protocol(e.to_string()))?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| HostError::Protocol(format!("write to interpreter failed: {}", e)))?;
        read_reply(&mut self.stdout)
    }

    /// Wait for the interpreter to exit and the stderr forwarder to drain
    fn finish(mut self) {
        drop(self.stdin);
        if let Err(e) = self.child.wait() {
            log::warn!("Failed to reap interpreter for {}: {}", self.path.display(), e);
        }
        if let Some(handle) = self.stderr_forwarder.take() {
            let _ = handle.join();
        }
    }

    fn kill(mut self) {
        let _ = self.child.kill();
        self.finish();
    }
}

/// Read one reply line; `Ok(None)` means the interpreter closed stdout
fn read_line(stdout: &mut BufReader<ChildStdout>) -> Result<Option<String>, HostError> {
    let mut line = String::new();
    let n = stdout
        .read_line(&mut line)
        .map_err(|e| HostError::Protocol(format!("read from interpreter failed: {}", e)))?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end().to_string()))
}

fn read_reply(stdout: &mut BufReader<ChildStdout>) -> Result<Option<Reply>, HostError> {
    match read_line(stdout)? {
        Some(line) => serde_json::from_str(&line)
            .map(Some)
            .map_err(|e| HostError::Protocol(format!("unexpected reply {:?}: {}", line, e))),
        None => Ok(None),
    }
}

/// Interpret the first line a unit writes after executing its module
///
/// Anything that is not a reply was written by the module itself, so it
/// counts against that module rather than the host.
fn parse_load_reply(line: &str) -> Result<Reply, ExecError> {
    serde_json::from_str(line).map_err(|_| {
        ExecError::Module(format!("module wrote to the reply channel: {:?}", line))
    })
}

fn forward_stderr(short_name: String, stderr: impl io::Read + Send + 'static) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(stderr).lines() {
            match line {
                Ok(line) => log::warn!(target: STDERR_TARGET, "[{}] {}", short_name, line),
                Err(_) => break,
            }
        }
    })
}

/// Module host running each unit in a dedicated Python process
pub struct PythonHost {
    interpreter: PathBuf,
    next_id: u64,
    units: HashMap<u64, PythonUnit>,
}

impl PythonHost {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            next_id: 1,
            units: HashMap::new(),
        }
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Number of live interpreter processes
    pub fn live_units(&self) -> usize {
        self.units.len()
    }

    fn spawn(&self, path: &Path) -> Result<PythonUnit, HostError> {
        let program = self.interpreter.display().to_string();
        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(DRIVER)
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    HostError::Unavailable(format!("interpreter not found: {}", program))
                } else {
                    HostError::Spawn { program, source }
                }
            })?;

        let short_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(HostError::Protocol(
                "interpreter pipes not available".to_string(),
            ));
        };

        Ok(PythonUnit {
            path: path.to_path_buf(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr_forwarder: Some(forward_stderr(short_name, stderr)),
        })
    }
}

impl ModuleHost for PythonHost {
    fn execute(&mut self, path: &Path) -> Result<UnitHandle, ExecError> {
        let mut unit = self.spawn(path)?;

        let reply = match read_line(&mut unit.stdout) {
            Ok(Some(line)) => match parse_load_reply(&line) {
                Ok(reply) => Some(reply),
                Err(e) => {
                    unit.kill();
                    return Err(e);
                }
            },
            Ok(None) => None,
            Err(e) => {
                unit.kill();
                return Err(e.into());
            }
        };

        match reply {
            Some(Reply::Loaded) => {
                let id = self.next_id;
                self.next_id += 1;
                self.units.insert(id, unit);
                Ok(UnitHandle::new(id))
            }
            Some(Reply::Error { detail }) => {
                unit.finish();
                Err(ExecError::Module(detail))
            }
            Some(other) => {
                unit.kill();
                Err(HostError::Protocol(format!("unexpected reply to load: {:?}", other)).into())
            }
            None => {
                // The interpreter died before reporting (e.g. os._exit in the module)
                let status = unit.child.wait();
                unit.finish();
                let detail = match status {
                    Ok(status) => format!("interpreter exited with {} before reporting", status),
                    Err(e) => format!("interpreter vanished before reporting: {}", e),
                };
                Err(ExecError::Module(detail))
            }
        }
    }

    fn unload(&mut self, handle: UnitHandle) -> UnloadReport {
        let Some(mut unit) = self.units.remove(&handle.raw()) else {
            return UnloadReport::HookFailed(format!("unknown unit {}", handle.raw()));
        };

        let report = match unit.request(&Request { op: "unload" }) {
            Ok(Some(Reply::Unloaded { hook, detail })) => match hook {
                HookStatus::Called => UnloadReport::HookCalled,
                HookStatus::Missing => UnloadReport::HookMissing,
                HookStatus::Failed => UnloadReport::HookFailed(detail.unwrap_or_default()),
            },
            Ok(Some(other)) => {
                UnloadReport::HookFailed(format!("unexpected reply to unload: {:?}", other))
            }
            Ok(None) => UnloadReport::HookFailed("interpreter exited during unload".to_string()),
            Err(e) => UnloadReport::HookFailed(e.to_string()),
        };

        if matches!(report, UnloadReport::HookFailed(_)) {
            unit.kill();
        } else {
            unit.finish();
        }
        report
    }

    fn shutdown(&mut self) {
        if self.units.is_empty() {
            return;
        }
        log::info!("Stopping {} module interpreter(s)", self.units.len());
        for (_, unit) in self.units.drain() {
            unit.kill();
        }
    }
}

impl Drop for PythonHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn interpreter_available() -> Option<PathBuf> {
        let interpreter = resolve_interpreter("");
        let ok = Command::new(&interpreter)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        ok.then_some(interpreter)
    }

    #[test]
    fn test_resolve_interpreter_prefers_configured() {
        assert_eq!(
            resolve_interpreter("  /opt/py/bin/python3 "),
            PathBuf::from("/opt/py/bin/python3")
        );
    }

    #[test]
    fn test_missing_interpreter_is_host_error() {
        let td = tempfile::tempdir().expect("tempdir");
        let module = td.path().join("a.py");
        fs::write(&module, "x = 1\n").expect("write");

        let mut host = PythonHost::new(td.path().join("no-such-python"));
        let err = host.execute(&module).expect_err("missing interpreter");
        assert!(matches!(err, ExecError::Host(HostError::Unavailable(_))));
    }

    #[test]
    fn test_load_and_unload_with_hook() {
        let Some(interpreter) = interpreter_available() else {
            return;
        };
        let td = tempfile::tempdir().expect("tempdir");
        let marker = td.path().join("unloaded.txt");
        let module = td.path().join("a.py");
        fs::write(
            &module,
            format!(
                "import os\n\
                 assert os.path.basename(__file__) == 'a.py'\n\
                 def unload():\n    open({:?}, 'w').close()\n",
                marker.display().to_string()
            ),
        )
        .expect("write");

        let mut host = PythonHost::new(interpreter);
        let handle = host.execute(&module).expect("load");
        assert_eq!(host.live_units(), 1);
        assert_eq!(host.unload(handle), UnloadReport::HookCalled);
        assert_eq!(host.live_units(), 0);
        assert!(marker.exists());
    }

    #[test]
    fn test_failing_module_is_contained() {
        let Some(interpreter) = interpreter_available() else {
            return;
        };
        let td = tempfile::tempdir().expect("tempdir");
        let module = td.path().join("b.py");
        fs::write(&module, "raise RuntimeError('boom')\n").expect("write");

        let mut host = PythonHost::new(interpreter);
        match host.execute(&module) {
            Err(ExecError::Module(detail)) => assert!(detail.contains("boom")),
            other => panic!("expected module error, got {:?}", other.map(|h| h.raw())),
        }
        assert_eq!(host.live_units(), 0);
    }

    #[test]
    fn test_stray_load_output_is_a_module_error() {
        assert!(matches!(parse_load_reply(r#"{"status":"loaded"}"#), Ok(Reply::Loaded)));
        match parse_load_reply("launched") {
            Err(ExecError::Module(detail)) => assert!(detail.contains("launched")),
            other => panic!("expected module error, got {:?}", other),
        }
    }

    #[test]
    fn test_child_process_output_does_not_reach_reply_channel() {
        let Some(interpreter) = interpreter_available() else {
            return;
        };
        let td = tempfile::tempdir().expect("tempdir");
        let module = td.path().join("launcher.py");
        fs::write(
            &module,
            "import os, sys\n\
             os.system('echo launched')\n\
             sys.__stdout__.write('raw stdout\\n')\n\
             sys.__stdout__.flush()\n\
             def unload():\n    os.system('echo stopping')\n",
        )
        .expect("write");

        let mut host = PythonHost::new(interpreter);
        let handle = host.execute(&module).expect("module loads despite printing");
        assert_eq!(host.unload(handle), UnloadReport::HookCalled);
        assert_eq!(host.live_units(), 0);
    }

    #[test]
    fn test_missing_hook_and_isolated_namespaces() {
        let Some(interpreter) = interpreter_available() else {
            return;
        };
        let td = tempfile::tempdir().expect("tempdir");
        let first = td.path().join("first.py");
        let second = td.path().join("second.py");
        fs::write(&first, "shared = 1\nprint('noise on stdout')\n").expect("write");
        fs::write(&second, "try:\n    shared\nexcept NameError:\n    pass\nelse:\n    raise RuntimeError('leaked')\n")
            .expect("write");

        let mut host = PythonHost::new(interpreter);
        let a = host.execute(&first).expect("first loads");
        let b = host.execute(&second).expect("second sees a fresh namespace");
        assert_eq!(host.unload(a), UnloadReport::HookMissing);
        assert_eq!(host.unload(b), UnloadReport::HookMissing);
    }
}
