//! Video backgrounds rendered by an `mpv` subprocess.
//!
//! mpv is started paused or playing, muted and looping forever. Later
//! changes go through its JSON IPC socket. Changes made before the socket
//! exists are queued, latest value wins, and flushed by the watcher thread
//! when the socket first accepts a connection. The watcher then reports the
//! player ready, or failed if the process dies on its own.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};
use tvbackground::{
    BackgroundError, MediaSourceSpec, PlayerEvent, PlayerFactory, PlayerHandle, PlayerObserver,
    RepeatMode, Result,
};

const WATCH_INTERVAL: Duration = Duration::from_millis(250);

static NEXT_SOCKET: AtomicU64 = AtomicU64::new(0);

/// Builds [`MpvPlayer`]s.
#[derive(Debug, Clone)]
pub struct MpvFactory {
    command: String,
    ipc_dir: PathBuf,
}

impl MpvFactory {
    pub fn new(command: impl Into<String>, ipc_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            ipc_dir: ipc_dir.into(),
        }
    }
}

impl PlayerFactory for MpvFactory {
    fn create(
        &self,
        source: &MediaSourceSpec,
        observer: PlayerObserver,
    ) -> Result<Box<dyn PlayerHandle>> {
        let socket = self.ipc_dir.join(format!(
            "mpv-{}-{}.sock",
            std::process::id(),
            NEXT_SOCKET.fetch_add(1, Ordering::SeqCst)
        ));

        Ok(Box::new(MpvPlayer {
            command: self.command.clone(),
            source: source.clone(),
            socket,
            observer,
            child: Arc::new(Mutex::new(None)),
            ipc: Arc::new(Mutex::new(IpcQueue::default())),
            released: Arc::new(AtomicBool::new(false)),
            exited: Arc::new(AtomicBool::new(false)),
        }))
    }
}

pub struct MpvPlayer {
    command: String,
    source: MediaSourceSpec,
    socket: PathBuf,
    observer: PlayerObserver,
    child: Arc<Mutex<Option<Child>>>,
    ipc: Arc<Mutex<IpcQueue>>,
    released: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
}

/// Property changes not yet delivered to mpv.
#[derive(Debug, Default)]
struct IpcQueue {
    connected: bool,
    pause: Option<bool>,
    volume: Option<f32>,
}

impl IpcQueue {
    fn set_pause(&mut self, socket: &Path, pause: bool) {
        self.pause = Some(pause);
        if self.connected {
            self.flush(socket);
        }
    }

    fn set_volume(&mut self, socket: &Path, volume: f32) {
        self.volume = Some(volume);
        if self.connected {
            self.flush(socket);
        }
    }

    fn mark_connected(&mut self, socket: &Path) {
        self.connected = true;
        self.flush(socket);
    }

    fn flush(&mut self, socket: &Path) {
        let mut commands = Vec::new();
        if let Some(pause) = self.pause.take() {
            commands.push(json!({ "command": ["set_property", "pause", pause] }));
        }
        if let Some(volume) = self.volume.take() {
            commands.push(json!({ "command": ["set_property", "volume", volume_percent(volume)] }));
            commands.push(json!({ "command": ["set_property", "mute", volume <= 0.0] }));
        }
        for command in commands {
            if let Err(e) = send_ipc(socket, &command) {
                warn!(socket = %socket.display(), error = %e, "mpv IPC command not delivered");
            }
        }
    }
}

impl MpvPlayer {
    fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "--no-terminal".to_string(),
            "--force-window=yes".to_string(),
            "--keep-open=yes".to_string(),
            format!("--input-ipc-server={}", self.socket.display()),
            format!("--volume={}", volume_percent(self.source.volume)),
        ];
        if self.source.volume <= 0.0 {
            args.push("--mute=yes".to_string());
        }
        if self.source.repeat == RepeatMode::Infinite {
            args.push("--loop-file=inf".to_string());
        }
        if !self.source.play_when_ready {
            args.push("--pause".to_string());
        }
        args.push(self.source.url.clone());
        args
    }

    fn is_started(&self) -> bool {
        self.child.lock().is_some()
    }

    fn watch(&self) {
        let child = self.child.clone();
        let released = self.released.clone();
        let exited = self.exited.clone();
        let observer = self.observer.clone();
        let socket = self.socket.clone();
        let ipc = self.ipc.clone();

        thread::spawn(move || {
            let mut ready = false;
            loop {
                thread::sleep(WATCH_INTERVAL);
                if released.load(Ordering::SeqCst) {
                    break;
                }

                let status = match child.lock().as_mut() {
                    Some(child) => child.try_wait(),
                    None => break,
                };
                match status {
                    Ok(Some(status)) => {
                        exited.store(true, Ordering::SeqCst);
                        if !released.load(Ordering::SeqCst) {
                            observer(PlayerEvent::Error(format!("mpv exited with {status}")));
                        }
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        exited.store(true, Ordering::SeqCst);
                        observer(PlayerEvent::Error(format!("cannot watch mpv: {e}")));
                        break;
                    }
                }

                if !ready && UnixStream::connect(&socket).is_ok() {
                    ready = true;
                    ipc.lock().mark_connected(&socket);
                    observer(PlayerEvent::Ready);
                }
            }
        });
    }
}

impl PlayerHandle for MpvPlayer {
    fn prepare(&mut self) -> Result<()> {
        if self.is_started() {
            return Ok(());
        }
        if let Some(dir) = self.socket.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                BackgroundError::playback(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }

        let child = Command::new(&self.command)
            .args(self.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BackgroundError::playback(format!("cannot start {}: {}", self.command, e)))?;

        info!(pid = child.id(), url = %self.source.url, "mpv started");
        *self.child.lock() = Some(child);
        self.watch();
        Ok(())
    }

    // Before prepare the command line carries the value
    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.source.play_when_ready = play_when_ready;
        if self.is_started() {
            self.ipc.lock().set_pause(&self.socket, !play_when_ready);
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.source.volume = volume;
        if self.is_started() {
            self.ipc.lock().set_volume(&self.socket, volume);
        }
    }

    fn release(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(mut child) = self.child.lock().take() {
            if let Err(e) = child.kill() {
                debug!(error = %e, "mpv already gone");
            }
            let _ = child.wait();
        }
        if self.socket.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket) {
                warn!(socket = %self.socket.display(), error = %e, "Cannot remove mpv socket");
            }
        }
    }

    fn is_usable(&self) -> bool {
        !self.exited.load(Ordering::SeqCst) && !self.released.load(Ordering::SeqCst)
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.release();
    }
}

fn volume_percent(volume: f32) -> u32 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u32
}

fn send_ipc(socket: &Path, command: &serde_json::Value) -> std::io::Result<()> {
    let mut stream = UnixStream::connect(socket)?;
    stream.set_write_timeout(Some(Duration::from_secs(1)))?;
    let mut line = command.to_string();
    line.push('\n');
    stream.write_all(line.as_bytes())
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixListener;

    use super::*;

    fn player(source: MediaSourceSpec) -> MpvPlayer {
        MpvPlayer {
            command: "mpv".to_string(),
            source,
            socket: PathBuf::from("/tmp/tvb.sock"),
            observer: Arc::new(|_: PlayerEvent| {}),
            child: Arc::new(Mutex::new(None)),
            ipc: Arc::new(Mutex::new(IpcQueue::default())),
            released: Arc::new(AtomicBool::new(false)),
            exited: Arc::new(AtomicBool::new(false)),
        }
    }

    fn read_command(listener: &UnixListener) -> serde_json::Value {
        let (mut stream, _) = listener.accept().unwrap();
        let mut line = String::new();
        stream.read_to_string(&mut line).unwrap();
        serde_json::from_str(line.trim()).unwrap()
    }

    #[test]
    fn background_loop_arguments() {
        let args = player(MediaSourceSpec::background_loop("/v/a.mp4")).arguments();

        assert!(args.contains(&"--loop-file=inf".to_string()));
        assert!(args.contains(&"--mute=yes".to_string()));
        assert!(args.contains(&"--volume=0".to_string()));
        assert!(args.contains(&"--input-ipc-server=/tmp/tvb.sock".to_string()));
        assert!(!args.contains(&"--pause".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/v/a.mp4"));
    }

    #[test]
    fn paused_source_starts_paused() {
        let mut source = MediaSourceSpec::background_loop("/v/a.mp4");
        source.play_when_ready = false;
        assert!(player(source).arguments().contains(&"--pause".to_string()));
    }

    #[test]
    fn changes_before_start_go_to_the_command_line() {
        let mut p = player(MediaSourceSpec::background_loop("/v/a.mp4"));
        p.set_play_when_ready(false);

        assert!(p.arguments().contains(&"--pause".to_string()));
        assert!(p.ipc.lock().pause.is_none());
    }

    #[test]
    fn changes_wait_for_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("mpv.sock");
        let mut queue = IpcQueue::default();

        // No socket yet: nothing is sent, the latest value is kept
        queue.set_pause(&socket, true);
        queue.set_pause(&socket, false);
        queue.set_pause(&socket, true);
        queue.set_volume(&socket, 0.0);
        assert_eq!(queue.pause, Some(true));
        assert_eq!(queue.volume, Some(0.0));

        let listener = UnixListener::bind(&socket).unwrap();
        queue.mark_connected(&socket);

        assert!(queue.pause.is_none());
        assert!(queue.volume.is_none());
        assert_eq!(
            read_command(&listener),
            json!({ "command": ["set_property", "pause", true] })
        );
        assert_eq!(
            read_command(&listener),
            json!({ "command": ["set_property", "volume", 0] })
        );
        assert_eq!(
            read_command(&listener),
            json!({ "command": ["set_property", "mute", true] })
        );

        // Once connected, changes go straight through
        queue.set_pause(&socket, false);
        assert!(queue.pause.is_none());
        assert_eq!(
            read_command(&listener),
            json!({ "command": ["set_property", "pause", false] })
        );
    }

    #[test]
    fn release_without_process_is_harmless() {
        let mut p = player(MediaSourceSpec::background_loop("/v/a.mp4"));
        p.release();
        p.release();
        assert!(!p.is_usable());
    }

    #[test]
    fn missing_binary_fails_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MpvFactory::new("/nonexistent/mpv-binary", dir.path());
        let mut handle = factory
            .create(
                &MediaSourceSpec::background_loop("/v/a.mp4"),
                Arc::new(|_: PlayerEvent| {}),
            )
            .unwrap();

        assert!(matches!(handle.prepare(), Err(BackgroundError::Playback(_))));
        handle.release();
    }
}
