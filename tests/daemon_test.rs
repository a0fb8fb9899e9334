use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const DAEMON: &str = env!("CARGO_BIN_EXE_auto-natpmp");

fn fake_natpmpc(dir: &Path, calls_log: &Path) -> PathBuf {
    let path = dir.join("natpmpc");
    let body = format!(
        "#!/bin/sh\n\
         echo \"$4\" >> {}\n\
         echo \"Mapped public port 4000 protocol $4 to local port $3 lifetime $5\"\n",
        calls_log.display()
    );
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const FAST_TIMING: &[&str] = &["--lifetime", "2", "--sleep-time", "1", "--retry-interval", "1"];

fn spawn_daemon(temp_dir: &Path, natpmpc: &Path, timing: &[&str]) -> Child {
    Command::new(DAEMON)
        .arg("--port-file")
        .arg(temp_dir.join("run/auto-natpmp/port"))
        .arg("--log-file")
        .arg(temp_dir.join("log/auto-natpmp.log"))
        .arg("--natpmpc-path")
        .arg(natpmpc)
        .args(["--gateway-ip", "127.0.0.1"])
        .args(timing)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start daemon")
}

fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    condition()
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("daemon did not exit within {:?}", timeout);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn test_sigterm_during_sleep_removes_port_file_and_stops_requests() {
    let temp_dir = TempDir::new().unwrap();
    let calls_log = temp_dir.path().join("calls.log");
    let natpmpc = fake_natpmpc(temp_dir.path(), &calls_log);
    let port_file = temp_dir.path().join("run/auto-natpmp/port");

    let mut child = spawn_daemon(temp_dir.path(), &natpmpc, FAST_TIMING);

    let published = wait_for(
        || std::fs::read_to_string(&port_file).map_or(false, |c| c == "4000"),
        Duration::from_secs(10),
    );
    if !published {
        let _ = child.kill();
        panic!("port file was never written");
    }

    // land the signal inside the 1s sleep that follows the publish
    std::thread::sleep(Duration::from_millis(300));
    let calls_before = std::fs::read_to_string(&calls_log).unwrap();

    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let exit = wait_for_exit(&mut child, Duration::from_secs(10));
    assert_eq!(exit.code(), Some(0));
    assert!(!port_file.exists());
    assert_eq!(
        std::fs::read_dir(port_file.parent().unwrap()).unwrap().count(),
        0
    );

    // past the point where the next iteration would have started
    std::thread::sleep(Duration::from_millis(1500));
    let calls = std::fs::read_to_string(&calls_log).unwrap();
    assert_eq!(calls, calls_before);
    assert!(calls.lines().eq(["udp", "tcp"]));

    let log = std::fs::read_to_string(temp_dir.path().join("log/auto-natpmp.log")).unwrap();
    assert!(log.contains("Starting auto-natpmp service"));
    assert!(log.contains("Port updated to 4000"));
}

#[test]
fn test_missing_natpmpc_exits_with_failure() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("no-such-natpmpc");

    let mut child = spawn_daemon(temp_dir.path(), &missing, FAST_TIMING);

    let exit = wait_for_exit(&mut child, Duration::from_secs(10));
    assert_eq!(exit.code(), Some(1));
    assert!(!temp_dir.path().join("run/auto-natpmp/port").exists());
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let calls_log = temp_dir.path().join("calls.log");
    let natpmpc = fake_natpmpc(temp_dir.path(), &calls_log);

    // sleep-time must stay below lifetime
    let timing = ["--lifetime", "2", "--sleep-time", "5"];
    let mut child = spawn_daemon(temp_dir.path(), &natpmpc, &timing);

    let exit = wait_for_exit(&mut child, Duration::from_secs(10));
    assert_eq!(exit.code(), Some(1));
    assert!(!calls_log.exists());
}
