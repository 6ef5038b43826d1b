use codenav_protocol::CancelToken;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    terminated: bool,
    current: Option<CancelToken>,
}

/// Holds the cancel token of the currently running cancelable operation.
///
/// Terminating flips the flag and cancels the in-flight operation; after
/// that every registration is refused, so new navigation and build calls
/// fail fast.
#[derive(Debug, Default)]
pub(crate) struct Terminator {
    inner: Mutex<Inner>,
}

impl Terminator {
    pub fn new() -> Terminator {
        Terminator::default()
    }

    /// Register the token of a starting operation. Refused (returns
    /// false) once terminated.
    pub fn register(&self, token: CancelToken) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.terminated {
            return false;
        }
        inner.current = Some(token);
        true
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.current = None;
    }

    pub fn terminate(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.terminated = true;
        if let Some(token) = inner.current.take() {
            token.cancel();
        }
    }

    pub fn was_terminated(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .terminated
    }
}
