//! `ServiceController` wired against the host's service manager. On unix
//! this shells out to `systemctl`; the self-test is run as a child process
//! polled to a timeout rather than awaited, since `ServiceController`'s
//! methods are synchronous and the apply step runs on a blocking task, not
//! the async runtime, so a blocking wait here does not stall other agent work.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use ransomeye_updater::{ServiceController, UpdaterError};
use tracing::warn;

pub struct SystemServiceController {
    service_name: String,
    self_test_cmd: String,
}

impl SystemServiceController {
    pub fn new(service_name: impl Into<String>, self_test_cmd: impl Into<String>) -> Self {
        SystemServiceController {
            service_name: service_name.into(),
            self_test_cmd: self_test_cmd.into(),
        }
    }

    fn systemctl(&self, verb: &str) -> Result<(), UpdaterError> {
        let status = Command::new("systemctl").arg(verb).arg(&self.service_name).status().map_err(|e| UpdaterError::Service(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(UpdaterError::Service(format!("systemctl {verb} {} exited with {status}", self.service_name)))
        }
    }
}

impl ServiceController for SystemServiceController {
    fn stop(&self) -> Result<(), UpdaterError> {
        self.systemctl("stop")
    }

    fn start(&self) -> Result<(), UpdaterError> {
        self.systemctl("start")
    }

    /// Runs `self_test_path` (relative to `install_dir`) and polls for
    /// completion rather than blocking on `Child::wait`, so a hung
    /// self-test is killed and treated as a failure instead of wedging the
    /// apply thread past `timeout`.
    fn self_test(&self, install_dir: &Path, self_test_path: &str, timeout: Duration) -> Result<(), UpdaterError> {
        let program = install_dir.join(self_test_path);
        let mut child = Command::new(if program.exists() { program.as_os_str().to_owned() } else { self.self_test_cmd.clone().into() })
            .current_dir(install_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| UpdaterError::Service(e.to_string()))?;

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait().map_err(|e| UpdaterError::Service(e.to_string()))? {
                Some(status) if status.success() => return Ok(()),
                Some(status) => return Err(UpdaterError::Service(format!("self-test exited with {status}"))),
                None if Instant::now() >= deadline => {
                    warn!("self-test exceeded {:?}, killing", timeout);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(UpdaterError::SelfTestFailed);
                }
                None => std::thread::sleep(Duration::from_millis(200)),
            }
        }
    }
}
