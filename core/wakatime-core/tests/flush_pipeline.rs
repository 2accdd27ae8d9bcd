use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};

use wakatime_core::{
    ActivityInput, CliInvocation, EditorActivity, EditorEvent, EngineConfig, FlushOutcome,
    HeartbeatEngine, InstalledCli, Launcher, LineStats, MemoryConfigStore, Notifier,
    PluginIdentity, ProxyConfig, SchedulerState, Timestamp,
};

#[derive(Default)]
struct RecordingLauncher {
    launched: Mutex<Vec<CliInvocation>>,
}

impl RecordingLauncher {
    fn launched(&self) -> Vec<CliInvocation> {
        self.launched.lock().unwrap().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, invocation: CliInvocation) {
        self.launched.lock().unwrap().push(invocation);
    }
}

/// Panics on the first launch, records the rest.
#[derive(Default)]
struct FlakyLauncher {
    calls: AtomicUsize,
    inner: RecordingLauncher,
}

impl Launcher for FlakyLauncher {
    fn launch(&self, invocation: CliInvocation) {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first send blows up");
        }
        self.inner.launch(invocation);
    }
}

struct QuietNotifier;

impl Notifier for QuietNotifier {
    fn warn_user(&self, _title: &str, _message: &str) {}
}

fn identity() -> PluginIdentity {
    PluginIdentity::new("GoLand", "2023.2.1", "14.2.0")
}

fn ready_cli(path: &str) -> Arc<InstalledCli> {
    let cli = InstalledCli::at(path);
    cli.mark_ready();
    Arc::new(cli)
}

fn engine_with(
    config: EngineConfig,
    cli: Arc<InstalledCli>,
    launcher: Arc<dyn Launcher>,
) -> HeartbeatEngine {
    HeartbeatEngine::with_launcher(
        config,
        cli,
        Arc::new(MemoryConfigStore::with_api_key("00000000-0000-0000-0000-00000000abcd")),
        Arc::new(QuietNotifier),
        launcher,
    )
}

fn engine(launcher: Arc<dyn Launcher>) -> HeartbeatEngine {
    engine_with(
        EngineConfig {
            identity: identity(),
            ..EngineConfig::default()
        },
        ready_cli("/usr/local/bin/wakatime-cli"),
        launcher,
    )
}

fn save(file: &str, time: &str) -> EditorEvent {
    EditorEvent::Save(EditorActivity {
        time: Some(time.parse().unwrap()),
        is_unsaved: Some(false),
        ..EditorActivity::new(file)
    })
}

fn edit(file: &str, secs: i64) -> EditorEvent {
    EditorEvent::Edit(EditorActivity {
        time: Some(Timestamp::from_secs(secs)),
        is_unsaved: Some(false),
        ..EditorActivity::new(file)
    })
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn rapid_saves_flush_as_one_batch() {
    let launcher = Arc::new(RecordingLauncher::default());
    let engine = engine(launcher.clone());

    assert!(engine.handle_event(save("/a.go", "1700000000.1000")));
    assert!(engine.handle_event(save("/a.go", "1700000000.4000")));
    assert!(engine.handle_event(save("/b.go", "1700000000.9000")));
    assert_eq!(engine.queued(), 3);

    assert_eq!(engine.flush_now(), FlushOutcome::Sent { heartbeats: 3 });
    assert_eq!(engine.queued(), 0);

    let launched = launcher.launched();
    assert_eq!(launched.len(), 1);
    let invocation = &launched[0];
    assert_eq!(
        invocation.argv,
        vec![
            "/usr/local/bin/wakatime-cli",
            "--entity",
            "/a.go",
            "--time",
            "1700000000.1000",
            "--key",
            "00000000-0000-0000-0000-00000000abcd",
            "--plugin",
            "GoLand/2023.2.1 GoLand-wakatime/14.2.0",
            "--write",
            "--extra-heartbeats",
        ]
    );

    let payload = invocation.stdin.as_deref().unwrap();
    assert!(!payload.contains('\n'));
    assert_eq!(
        payload,
        r#"[{"entity":"/a.go","timestamp":1700000000.4000,"is_write":true},{"entity":"/b.go","timestamp":1700000000.9000,"is_write":true}]"#
    );
}

#[test]
fn repeated_edit_inside_window_is_suppressed() {
    let launcher = Arc::new(RecordingLauncher::default());
    let engine = engine(launcher.clone());

    assert!(engine.handle_event(edit("/a.go", 0)));
    assert!(!engine.handle_event(edit("/a.go", 10)));
    assert_eq!(engine.queued(), 1);

    engine.flush_now();
    let launched = launcher.launched();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].stdin, None);
    assert!(!launched[0].argv.contains(&"--extra-heartbeats".to_string()));
}

#[test]
fn queue_waits_for_cli_to_appear() {
    let temp = tempfile::tempdir().unwrap();
    let cli_path = temp.path().join("wakatime-cli");
    let launcher = Arc::new(RecordingLauncher::default());
    let engine = engine_with(
        EngineConfig {
            identity: identity(),
            ..EngineConfig::default()
        },
        Arc::new(InstalledCli::at(&cli_path)),
        launcher.clone(),
    );

    engine.handle_event(edit("/a.go", 0));
    engine.handle_event(edit("/b.go", 1));
    assert_eq!(engine.flush_now(), FlushOutcome::NotReady);
    assert_eq!(engine.queued(), 2);
    assert!(launcher.launched().is_empty());

    fs_err::write(&cli_path, b"").unwrap();
    assert_eq!(engine.flush_now(), FlushOutcome::Sent { heartbeats: 2 });
    assert_eq!(engine.queued(), 0);
}

#[test]
fn cursor_telemetry_can_be_disabled() {
    let launcher = Arc::new(RecordingLauncher::default());
    let engine = engine_with(
        EngineConfig {
            identity: identity(),
            send_cursor_telemetry: false,
            proxy: Some(ProxyConfig {
                port: Some(3128),
                ..ProxyConfig::new("proxy.local")
            }),
            ..EngineConfig::default()
        },
        ready_cli("/usr/local/bin/wakatime-cli"),
        launcher.clone(),
    );

    let stats = Some(LineStats {
        line_count: 40,
        line_number: 7,
        cursor_position: 3,
    });
    for (secs, file) in [(0, "/a.go"), (1, "/b.go")] {
        engine.append_heartbeat(ActivityInput {
            time: Some(Timestamp::from_secs(secs)),
            is_unsaved_entity: Some(false),
            line_stats: stats,
            ..ActivityInput::new(file, false)
        });
    }
    engine.flush_now();

    let invocation = &launcher.launched()[0];
    assert!(invocation.argv.contains(&"--lines-in-file".to_string()));
    assert!(!invocation.argv.contains(&"--lineno".to_string()));
    assert!(!invocation.argv.contains(&"--cursorpos".to_string()));
    let proxy = invocation.argv.iter().position(|arg| arg == "--proxy").unwrap();
    assert_eq!(invocation.argv[proxy + 1], "https://proxy.local:3128");

    let payload: serde_json::Value =
        serde_json::from_str(invocation.stdin.as_deref().unwrap()).unwrap();
    assert_eq!(payload[0]["lines"], 40);
    assert!(payload[0].get("lineno").is_none());
    assert!(payload[0].get("cursorpos").is_none());
}

#[test]
fn timer_sends_and_shutdown_flushes_the_rest() {
    let launcher = Arc::new(RecordingLauncher::default());
    let engine = engine_with(
        EngineConfig {
            identity: identity(),
            flush_interval: Duration::from_millis(25),
            ..EngineConfig::default()
        },
        ready_cli("/usr/local/bin/wakatime-cli"),
        launcher.clone(),
    );

    engine.start().unwrap();
    assert_eq!(engine.state(), SchedulerState::Running);
    engine.handle_event(edit("/timer.go", 0));
    assert!(wait_until(Duration::from_secs(5), || launcher.launched().len() == 1));

    engine.handle_event(edit("/late.go", 1));
    assert!(engine.shutdown());
    assert_eq!(engine.state(), SchedulerState::Stopped);
    assert_eq!(engine.queued(), 0);

    let entities: Vec<String> = launcher
        .launched()
        .iter()
        .map(|invocation| invocation.argv[2].clone())
        .collect();
    assert_eq!(entities, vec!["/timer.go", "/late.go"]);
}

#[test]
fn timer_survives_a_panicking_send() {
    let launcher = Arc::new(FlakyLauncher::default());
    let engine = engine_with(
        EngineConfig {
            identity: identity(),
            flush_interval: Duration::from_millis(10),
            ..EngineConfig::default()
        },
        ready_cli("/usr/local/bin/wakatime-cli"),
        launcher.clone(),
    );
    engine.start().unwrap();

    engine.handle_event(edit("/first.go", 0));
    assert!(wait_until(Duration::from_secs(5), || {
        launcher.calls.load(Ordering::SeqCst) >= 1
    }));

    engine.handle_event(edit("/second.go", 1));
    assert!(wait_until(Duration::from_secs(5), || {
        !launcher.inner.launched().is_empty()
    }));
    assert_eq!(launcher.inner.launched()[0].argv[2], "/second.go");

    engine.shutdown();
}

#[test]
fn concurrent_producers_lose_nothing() {
    let launcher = Arc::new(RecordingLauncher::default());
    let engine = Arc::new(engine(launcher.clone()));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for i in 0..50 {
                    engine.handle_event(save(&format!("/w{}/{}.rs", worker, i), "1700000000"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.queued(), 200);
    assert_eq!(engine.flush_now(), FlushOutcome::Sent { heartbeats: 200 });
    let payload: serde_json::Value =
        serde_json::from_str(launcher.launched()[0].stdin.as_deref().unwrap()).unwrap();
    assert_eq!(payload.as_array().unwrap().len(), 199);
}
