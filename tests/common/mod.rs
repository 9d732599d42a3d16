#![allow(dead_code)]

use okeanos_filelink::api::{AccountInfo, ObjectPath, ObjectStoreClient, UploadBody};
use okeanos_filelink::auth::{AuthSession, AuthToken};
use okeanos_filelink::error::{ApiError, ApiResult, ProviderError, ProviderResult};
use okeanos_filelink::{RequestObserver, RequestStatus};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(10);
pub const PUBLIC_BASE: &str = "https://pithos.example/public";

pub fn write_file(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![b'x'; size]).unwrap();
    path
}

/// Login always succeeds unless `deny_logins` is set.
pub struct FakeAuth {
    current: Mutex<Option<AuthToken>>,
    deny: Mutex<bool>,
    pub logins: AtomicUsize,
    pub invalidations: AtomicUsize,
}

impl FakeAuth {
    pub fn logged_out() -> Self {
        Self {
            current: Mutex::new(None),
            deny: Mutex::new(false),
            logins: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        }
    }

    pub fn logged_in(token: &str) -> Self {
        let auth = Self::logged_out();
        *auth.current.lock().unwrap() = Some(AuthToken {
            token: token.to_string(),
            user: "user-uuid".to_string(),
        });
        auth
    }

    pub fn deny_logins(&self) {
        *self.deny.lock().unwrap() = true;
    }

    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn invalidation_count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl AuthSession for FakeAuth {
    fn login(&self, _with_ui: bool) -> ProviderResult<AuthToken> {
        let attempt = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.deny.lock().unwrap() {
            return Err(ProviderError::auth("token rejected"));
        }
        let token = AuthToken {
            token: format!("fresh-{attempt}"),
            user: "user-uuid".to_string(),
        };
        *self.current.lock().unwrap() = Some(token.clone());
        Ok(token)
    }

    fn current_token(&self) -> Option<AuthToken> {
        self.current.lock().unwrap().clone()
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = None;
    }
}

/// In-memory object store that records every call.
/// Any operation can be held open or made to fail, and the number of
/// calls running at the same time is tracked.
pub struct FakeStore {
    account: Mutex<AccountInfo>,
    calls: Mutex<Vec<String>>,
    head_rejections: AtomicUsize,
    failures: Mutex<HashMap<&'static str, (u16, String)>>,
    held: Mutex<HashSet<&'static str>>,
    released: Condvar,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    entered_tx: Mutex<Sender<String>>,
    entered_rx: Mutex<Receiver<String>>,
}

/// Decrements the in-flight counter when a call returns.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeStore {
    pub fn with_quota(bytes_used: u64, quota: u64) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            account: Mutex::new(AccountInfo { bytes_used, quota }),
            calls: Mutex::new(Vec::new()),
            head_rejections: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            entered_tx: Mutex::new(tx),
            entered_rx: Mutex::new(rx),
        }
    }

    pub fn roomy() -> Self {
        Self::with_quota(0, 1 << 30)
    }

    pub fn reject_next_account_queries(&self, count: usize) {
        self.head_rejections.store(count, Ordering::SeqCst);
    }

    /// Every later call to `operation` fails with this status and body.
    pub fn fail(&self, operation: &'static str, status: u16, body: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, (status, body.to_string()));
    }

    pub fn fail_transfers(&self, status: u16, body: &str) {
        self.fail("put_object", status, body);
    }

    /// Calls to `operation` block until `release` is called.
    pub fn hold(&self, operation: &'static str) {
        self.held.lock().unwrap().insert(operation);
    }

    pub fn release(&self, operation: &'static str) {
        self.held.lock().unwrap().remove(operation);
        self.released.notify_all();
    }

    pub fn hold_transfers(&self) {
        self.hold("put_object");
    }

    pub fn release_transfers(&self) {
        self.release("put_object");
    }

    /// Blocks until a call to `operation` starts; returns its argument.
    pub fn wait_for(&self, operation: &str) -> String {
        let entered = self.entered_rx.lock().unwrap();
        loop {
            let call = entered
                .recv_timeout(WAIT)
                .unwrap_or_else(|_| panic!("{operation} was never called"));
            if let Some((op, argument)) = call.split_once(':') {
                if op == operation {
                    return argument.to_string();
                }
            }
        }
    }

    /// Blocks until a transfer starts; returns the object key.
    pub fn wait_for_transfer(&self) -> String {
        self.wait_for("put_object")
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(operation))
            .count()
    }

    /// Records the call and waits while `operation` is held.
    fn enter(&self, operation: &'static str, argument: &str) -> InFlight<'_> {
        let call = format!("{operation}:{argument}");
        self.calls.lock().unwrap().push(call.clone());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let _ = self.entered_tx.lock().unwrap().send(call);

        let mut held = self.held.lock().unwrap();
        while held.contains(operation) {
            let (guard, timeout) = self.released.wait_timeout(held, WAIT).unwrap();
            held = guard;
            if timeout.timed_out() {
                break;
            }
        }
        InFlight(&self.in_flight)
    }

    fn failure(&self, operation: &str) -> ApiResult<()> {
        match self.failures.lock().unwrap().get(operation).cloned() {
            Some((status, body)) => Err(ApiError::Status { status, body }),
            None => Ok(()),
        }
    }
}

impl ObjectStoreClient for FakeStore {
    fn head_account(&self, token: &AuthToken) -> ApiResult<AccountInfo> {
        let _running = self.enter("head_account", &token.token);
        let pending = self.head_rejections.load(Ordering::SeqCst);
        if pending > 0 {
            self.head_rejections.store(pending - 1, Ordering::SeqCst);
            return Err(ApiError::Status {
                status: 401,
                body: "token expired".to_string(),
            });
        }
        Ok(*self.account.lock().unwrap())
    }

    fn ensure_container(&self, _token: &AuthToken, container: &str) -> ApiResult<()> {
        let _running = self.enter("ensure_container", container);
        self.failure("ensure_container")
    }

    fn put_object(
        &self,
        _token: &AuthToken,
        path: &ObjectPath,
        mut body: UploadBody,
        _content_type: &str,
    ) -> ApiResult<()> {
        let _running = self.enter("put_object", &path.key);
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)?;
        self.failure("put_object")?;
        self.account.lock().unwrap().bytes_used += bytes.len() as u64;
        Ok(())
    }

    fn set_public(&self, _token: &AuthToken, path: &ObjectPath) -> ApiResult<()> {
        let _running = self.enter("set_public", &path.key);
        self.failure("set_public")
    }

    fn get_public_url(&self, _token: &AuthToken, path: &ObjectPath) -> ApiResult<String> {
        let _running = self.enter("get_public_url", &path.key);
        self.failure("get_public_url")?;
        Ok(format!("{PUBLIC_BASE}/{}", path.file_name()))
    }

    fn delete_object(&self, _token: &AuthToken, path: &ObjectPath) -> ApiResult<()> {
        let _running = self.enter("delete_object", &path.key);
        self.failure("delete_object")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    Stop(String, RequestStatus),
}

/// Observer that forwards every callback, tagged with its name, to one channel.
pub struct RecordingObserver {
    name: String,
    events: Mutex<Sender<Event>>,
}

impl RecordingObserver {
    pub fn channel() -> (Sender<Event>, Receiver<Event>) {
        mpsc::channel()
    }

    pub fn new(name: &str, events: &Sender<Event>) -> Self {
        Self {
            name: name.to_string(),
            events: Mutex::new(events.clone()),
        }
    }
}

impl RequestObserver for RecordingObserver {
    fn on_start_request(&self) {
        let _ = self
            .events
            .lock()
            .unwrap()
            .send(Event::Start(self.name.clone()));
    }

    fn on_stop_request(&self, status: RequestStatus) {
        let _ = self
            .events
            .lock()
            .unwrap()
            .send(Event::Stop(self.name.clone(), status));
    }
}

pub fn next_event(events: &Receiver<Event>) -> Event {
    events.recv_timeout(WAIT).expect("observer was not notified")
}

/// Asserts that nothing else arrives within a short grace period.
pub fn assert_quiet(events: &Receiver<Event>) {
    if let Ok(extra) = events.recv_timeout(Duration::from_millis(300)) {
        panic!("unexpected extra notification: {extra:?}");
    }
}
