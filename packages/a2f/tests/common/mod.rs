#![allow(dead_code)]

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use a2f_client::{A2fConfig, Gateway, RequestResult, ServerLauncher, ServerProcess};
use parking_lot::Mutex;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub route: String,
    pub payload: Value,
}

type Rule = Box<dyn Fn(&str, &Value) -> Option<RequestResult> + Send + Sync>;

/// Fake server that records every call and answers `{"status": "OK"}`
/// unless a rule says otherwise.
pub struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    up: Arc<AtomicBool>,
    rules: Vec<Rule>,
}

impl RecordingGateway {
    pub fn ready() -> Self {
        Self::answering_while(Arc::new(AtomicBool::new(true)))
    }

    pub fn never_ready() -> Self {
        Self::answering_while(Arc::new(AtomicBool::new(false)))
    }

    /// Answers the readiness probe only while `up` is set
    pub fn answering_while(up: Arc<AtomicBool>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            up,
            rules: Vec::new(),
        }
    }

    /// Answer calls matching `rule` with its result
    pub fn with_rule(
        mut self,
        rule: impl Fn(&str, &Value) -> Option<RequestResult> + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.route.clone()).collect()
    }

    /// Routes other than the readiness probe
    pub fn mutations(&self) -> Vec<String> {
        self.routes().into_iter().filter(|r| r != "status").collect()
    }

    pub fn count(&self, route: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.route == route).count()
    }

    fn answer(&self, route: &str, payload: Value) -> RequestResult {
        let reply = self.rules.iter().find_map(|rule| rule(route, &payload));
        self.calls.lock().push(Call {
            route: route.to_string(),
            payload,
        });
        reply.unwrap_or_else(|| RequestResult::Success(json!({"status": "OK"})))
    }
}

impl Gateway for RecordingGateway {
    async fn get(&self, route: &str) -> RequestResult {
        if route == "status" {
            self.calls.lock().push(Call {
                route: route.to_string(),
                payload: Value::Null,
            });
            return if self.up.load(Ordering::SeqCst) {
                RequestResult::Success(json!("OK"))
            } else {
                RequestResult::TransportError("connection refused".to_string())
            };
        }
        self.answer(route, Value::Null)
    }

    async fn post(&self, route: &str, payload: Value) -> RequestResult {
        self.answer(route, payload)
    }
}

/// Launcher that never starts anything real. With [`FakeLauncher::bringing_up`]
/// a launch sets the shared flag and terminating the process clears it.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub launches: Arc<AtomicUsize>,
    up: Option<Arc<AtomicBool>>,
}

impl FakeLauncher {
    pub fn bringing_up(up: Arc<AtomicBool>) -> Self {
        Self {
            launches: Arc::default(),
            up: Some(up),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct FakeProcess {
    up: Option<Arc<AtomicBool>>,
}

impl ServerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    fn terminate(&mut self) -> io::Result<()> {
        if let Some(up) = &self.up {
            up.store(false, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl ServerLauncher for FakeLauncher {
    fn launch(&self, _executable: &Path) -> io::Result<Box<dyn ServerProcess>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(up) = &self.up {
            up.store(true, Ordering::SeqCst);
        }
        Ok(Box::new(FakeProcess {
            up: self.up.clone(),
        }))
    }
}

/// Configuration rooted in `dir`, with an installed launcher script
pub fn test_config(dir: &Path) -> A2fConfig {
    let install = dir.join("install");
    std::fs::create_dir_all(&install).unwrap();
    let config = A2fConfig {
        install_path: install,
        mark_scene: dir.join("scenes/mark.usd"),
        streaming_scene: dir.join("scenes/mark_streaming.usd"),
        ..A2fConfig::default()
    };
    std::fs::write(config.executable_path(), b"#!/bin/sh\n").unwrap();
    config
}

/// Create an (empty) audio file at `dir/name`
pub fn touch(dir: &Path, name: &str) -> std::path::PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, b"RIFF").unwrap();
    path
}
