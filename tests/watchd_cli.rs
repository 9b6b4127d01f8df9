use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

const WATCHD: &str = env!("CARGO_BIN_EXE_watchd");

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("temp workspace"),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Small, fast config: tiny frames, outbox notifier, clips under the workspace.
    fn write_config(&self, fps: u32, idle_secs: u64) -> PathBuf {
        let config = serde_json::json!({
            "source": {
                "url": "stub://cli",
                "target_fps": fps,
                "width": 64,
                "height": 48,
                "pace": true
            },
            "reference_dir": self.path("known_faces"),
            "motion": { "threshold": 25, "blur_kernel": 5 },
            "recording": { "idle_secs": idle_secs },
            "notify": { "kind": "outbox", "outbox_dir": self.path("outbox") },
            "archive": { "dir": self.path("clips") }
        });
        let path = self.path("watchd.json");
        std::fs::write(&path, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
        path
    }

    fn entries(&self, name: &str) -> Vec<PathBuf> {
        match std::fs::read_dir(self.path(name)) {
            Ok(dir) => dir.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn watchd(config: &Path) -> Command {
    let mut cmd = Command::new(WATCHD);
    cmd.arg("--config").arg(config);
    for (key, _) in std::env::vars() {
        if key.starts_with("WATCHD_") {
            cmd.env_remove(key);
        }
    }
    cmd.env("RUST_LOG", "info");
    cmd
}

fn write_still(path: &Path, shade: u8) {
    RgbImage::from_pixel(16, 16, Rgb([shade, shade, shade]))
        .save(path)
        .unwrap();
}

#[test]
fn replayed_stills_exit_cleanly_at_end_of_stream() {
    let ws = Workspace::new();
    let config = ws.write_config(10, 12);
    let stills = ws.path("stills");
    std::fs::create_dir_all(&stills).unwrap();
    for i in 0..3 {
        write_still(&stills.join(format!("frame_{:04}.png", i)), 40 + i * 10);
    }

    let output = watchd(&config)
        .arg("--source")
        .arg(&stills)
        .arg("--no-pace")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn corrupt_frame_is_fatal_with_nonzero_exit() {
    let ws = Workspace::new();
    let config = ws.write_config(10, 12);
    let stills = ws.path("stills");
    std::fs::create_dir_all(&stills).unwrap();
    write_still(&stills.join("frame_0001.png"), 80);
    std::fs::write(stills.join("frame_0002.png"), b"not an image").unwrap();

    let output = watchd(&config)
        .arg("--source")
        .arg(&stills)
        .arg("--no-pace")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error while reading frame"), "stderr: {}", stderr);
}

#[test]
fn missing_source_is_fatal_before_the_loop() {
    let ws = Workspace::new();
    let config = ws.write_config(10, 12);

    let output = watchd(&config)
        .arg("--source")
        .arg(ws.path("no_such_dir"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("video source not found"), "stderr: {}", stderr);
}

#[cfg(unix)]
#[test]
fn sigterm_flushes_open_recording() {
    let ws = Workspace::new();
    // Long idle window: the recording can only be flushed by the signal.
    let config = ws.write_config(50, 600);

    let mut child = watchd(&config)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let stderr = child.stderr.take().unwrap();
    let (line_tx, line_rx) = mpsc::channel();
    let reader = std::thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            let _ = line_tx.send(line);
        }
    });

    let recording = loop {
        match line_rx.recv_timeout(Duration::from_secs(30)) {
            Ok(line) if line.contains("recording evidence") => break true,
            Ok(_) => continue,
            Err(_) => break false,
        }
    };
    if !recording {
        let _ = child.kill();
        panic!("watchd never started recording");
    }

    let status = Command::new("kill")
        .arg("-TERM")
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(status.success());

    let exit = child.wait().unwrap();
    reader.join().unwrap();
    let logs: Vec<String> = line_rx.try_iter().collect();
    assert!(exit.success(), "logs: {:#?}", logs);
    assert!(logs.iter().any(|l| l.contains("flushed open recording")));

    let clips = ws.entries("clips");
    assert_eq!(clips.len(), 1);
    assert!(clips[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("unidentified_video_"));
    assert_eq!(ws.entries("outbox").len(), 1);
}
