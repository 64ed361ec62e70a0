// SPDX-License-Identifier: GPL-3.0-only

//! Scan delivery to the storefront
//!
//! Every code, whether read by the camera, typed by the operator or pushed by
//! an external caller, ends up here. The bridge validates it, applies the
//! duplicate guard and hands the result to the currently registered
//! listener. Registration is scoped: dropping the returned
//! [`Registration`] removes the listener, but only if it is still the
//! current one.

use super::controller::DetectionHandler;
use crate::barcode::{self, EAN13_LENGTH, InvalidCode, ScanCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Where a scan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSource {
    /// Camera detection
    Camera,
    /// Typed by the operator
    Manual,
    /// Programmatic trigger
    External,
}

/// What the listener receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A valid code to add to the cart
    Accepted { code: ScanCode, source: ScanSource },
    /// Input that failed validation
    Invalid { error: InvalidCode, source: ScanSource },
}

type Listener = Arc<dyn Fn(&ScanEvent) + Send + Sync>;

#[derive(Default)]
struct GuardState {
    last_delivery: Option<(ScanCode, Instant)>,
    last_invalid: Option<String>,
}

struct BridgeInner {
    listener: Mutex<Option<(u64, Listener)>>,
    next_id: AtomicU64,
    guard: Mutex<GuardState>,
    duplicate_window: Duration,
}

impl BridgeInner {
    fn lock_listener(&self) -> MutexGuard<'_, Option<(u64, Listener)>> {
        self.listener.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_guard(&self) -> MutexGuard<'_, GuardState> {
        self.guard.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dispatch(&self, event: ScanEvent) -> ScanEvent {
        let listener = self.lock_listener().as_ref().map(|(_, l)| Arc::clone(l));
        match listener {
            Some(listener) => listener(&event),
            None => debug!(?event, "No scan listener registered"),
        }
        event
    }
}

/// Scan handler registry
#[derive(Clone)]
pub struct ScanBridge {
    inner: Arc<BridgeInner>,
}

impl ScanBridge {
    /// Create a bridge dropping repeats of the same code within `duplicate_window`
    pub fn new(duplicate_window: Duration) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                listener: Mutex::new(None),
                next_id: AtomicU64::new(1),
                guard: Mutex::new(GuardState::default()),
                duplicate_window,
            }),
        }
    }

    /// Install `listener` as the current scan handler, replacing any other
    pub fn register<F>(&self, listener: F) -> Registration
    where
        F: Fn(&ScanEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let previous = self.inner.lock_listener().replace((id, Arc::new(listener)));
        if let Some((old, _)) = previous {
            debug!(old, new = id, "Scan listener replaced");
        }
        Registration {
            inner: Arc::clone(&self.inner),
            id,
        }
    }

    /// Whether a listener is installed
    pub fn is_registered(&self) -> bool {
        self.inner.lock_listener().is_some()
    }

    /// Trigger a scan programmatically
    ///
    /// Goes through the same validation and duplicate guard as camera scans.
    pub fn trigger(&self, raw: &str) -> Option<ScanEvent> {
        self.deliver_at(raw, ScanSource::External, Instant::now())
    }

    /// Deliver raw scan text
    ///
    /// Returns the event handed to the listener, or `None` when the scan was
    /// dropped (a repeat within the duplicate window, or an invalid input
    /// already reported).
    pub fn deliver(&self, raw: &str, source: ScanSource) -> Option<ScanEvent> {
        self.deliver_at(raw, source, Instant::now())
    }

    /// [`deliver`](Self::deliver) with an explicit clock reading
    pub fn deliver_at(&self, raw: &str, source: ScanSource, now: Instant) -> Option<ScanEvent> {
        let normalized = barcode::extract_digits(raw);
        let event = {
            let mut guard = self.inner.lock_guard();
            match barcode::get_valid_code(&normalized) {
                None => {
                    if guard.last_invalid.as_deref() == Some(normalized.as_str()) {
                        trace!(input = %normalized, "Invalid scan already reported");
                        return None;
                    }
                    guard.last_invalid = Some(normalized.clone());
                    ScanEvent::Invalid {
                        error: InvalidCode { normalized },
                        source,
                    }
                }
                Some(code) => {
                    guard.last_invalid = None;
                    if let Some((last, at)) = &guard.last_delivery
                        && *last == code
                        && now.saturating_duration_since(*at) < self.inner.duplicate_window
                    {
                        trace!(code = %code, "Duplicate scan dropped");
                        return None;
                    }
                    guard.last_delivery = Some((code.clone(), now));
                    info!(code = %code, ?source, "Scan accepted");
                    ScanEvent::Accepted { code, source }
                }
            }
        };
        Some(self.inner.dispatch(event))
    }

    /// Manual entry funnel sharing this bridge's state
    pub fn manual_entry(&self) -> ManualEntry {
        ManualEntry {
            bridge: self.clone(),
        }
    }
}

impl DetectionHandler for ScanBridge {
    fn on_detected(&self, code: &ScanCode) {
        self.deliver(code.as_str(), ScanSource::Camera);
    }
}

impl std::fmt::Debug for ScanBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanBridge")
            .field("registered", &self.is_registered())
            .field("duplicate_window", &self.inner.duplicate_window)
            .finish()
    }
}

/// Scoped listener registration
///
/// Removes the listener on drop unless another one replaced it meanwhile.
#[must_use = "dropping the registration removes the listener"]
pub struct Registration {
    inner: Arc<BridgeInner>,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut listener = self.inner.lock_listener();
        if listener.as_ref().is_some_and(|(id, _)| *id == self.id) {
            *listener = None;
            debug!(id = self.id, "Scan listener removed");
        }
    }
}

/// State of the manual entry field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualInput {
    /// Nothing typed
    Empty,
    /// Fewer than 13 digits so far
    Incomplete(String),
    /// 13 digits with a bad check digit
    Invalid(String),
    /// A valid code
    Ready(ScanCode),
}

/// Operator-typed codes
#[derive(Debug, Clone)]
pub struct ManualEntry {
    bridge: ScanBridge,
}

impl ManualEntry {
    /// Clean up field input: digits only, at most 13
    pub fn sanitize(raw: &str) -> String {
        barcode::normalize(raw)
    }

    /// Classify the field contents as the operator types
    ///
    /// A complete but invalid code is reported to the listener once per
    /// distinct value.
    pub fn inspect(&self, raw: &str) -> ManualInput {
        let sanitized = Self::sanitize(raw);
        if sanitized.is_empty() {
            return ManualInput::Empty;
        }
        if sanitized.len() < EAN13_LENGTH {
            return ManualInput::Incomplete(sanitized);
        }

        let inner = &self.bridge.inner;
        match barcode::get_valid_code(&sanitized) {
            Some(code) => {
                inner.lock_guard().last_invalid = None;
                ManualInput::Ready(code)
            }
            None => {
                let first_report = {
                    let mut guard = inner.lock_guard();
                    let first = guard.last_invalid.as_deref() != Some(sanitized.as_str());
                    guard.last_invalid = Some(sanitized.clone());
                    first
                };
                if first_report {
                    inner.dispatch(ScanEvent::Invalid {
                        error: InvalidCode {
                            normalized: sanitized.clone(),
                        },
                        source: ScanSource::Manual,
                    });
                }
                ManualInput::Invalid(sanitized)
            }
        }
    }

    /// Submit the field contents
    ///
    /// Invalid input is always reported. Valid codes skip the duplicate guard:
    /// typing the same code twice means adding it twice.
    pub fn submit(&self, raw: &str) -> Result<ScanCode, InvalidCode> {
        let inner = &self.bridge.inner;
        let sanitized = Self::sanitize(raw);
        match barcode::get_valid_code(&sanitized) {
            Some(code) => {
                inner.lock_guard().last_invalid = None;
                info!(code = %code, "Manual code accepted");
                inner.dispatch(ScanEvent::Accepted {
                    code: code.clone(),
                    source: ScanSource::Manual,
                });
                Ok(code)
            }
            None => {
                inner.lock_guard().last_invalid = Some(sanitized.clone());
                let error = InvalidCode {
                    normalized: sanitized,
                };
                inner.dispatch(ScanEvent::Invalid {
                    error: error.clone(),
                    source: ScanSource::Manual,
                });
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "4006381333931";
    const OTHER: &str = "4901234567894";

    fn recording_bridge() -> (ScanBridge, Registration, Arc<Mutex<Vec<ScanEvent>>>) {
        let bridge = ScanBridge::new(Duration::from_millis(1200));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let registration = bridge.register(move |event| sink.lock().unwrap().push(event.clone()));
        (bridge, registration, events)
    }

    #[test]
    fn test_duplicate_guard_window() {
        let (bridge, _reg, events) = recording_bridge();
        let t0 = Instant::now();

        assert!(bridge.deliver_at(VALID, ScanSource::Camera, t0).is_some());
        assert!(
            bridge
                .deliver_at(VALID, ScanSource::Camera, t0 + Duration::from_millis(1199))
                .is_none()
        );
        assert!(
            bridge
                .deliver_at(VALID, ScanSource::Camera, t0 + Duration::from_millis(2400))
                .is_some()
        );
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_different_codes_always_pass() {
        let (bridge, _reg, events) = recording_bridge();
        let t0 = Instant::now();
        bridge.deliver_at(VALID, ScanSource::Camera, t0);
        bridge.deliver_at(OTHER, ScanSource::Camera, t0 + Duration::from_millis(10));
        bridge.deliver_at(VALID, ScanSource::Camera, t0 + Duration::from_millis(20));
        assert_eq!(events.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_reported_once_per_input() {
        let (bridge, _reg, events) = recording_bridge();
        let bad = "4901234567890";

        assert!(matches!(
            bridge.trigger(bad),
            Some(ScanEvent::Invalid { source: ScanSource::External, .. })
        ));
        assert!(bridge.trigger(bad).is_none());
        assert!(bridge.trigger(" 4901234567890 ").is_none());
        assert!(bridge.trigger("123").is_some());

        // A valid scan resets the memory
        bridge.trigger(VALID);
        assert!(bridge.trigger(bad).is_some());
        assert_eq!(events.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_trigger_normalizes_full_width() {
        let (bridge, _reg, _events) = recording_bridge();
        let full_width = "４００６３８１３３３９３１";
        match bridge.trigger(full_width) {
            Some(ScanEvent::Accepted { code, .. }) => assert_eq!(code.as_str(), VALID),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_trigger_rejects_longer_digit_runs() {
        let (bridge, _reg, events) = recording_bridge();

        // Starts with a valid code, but the whole run is 17 digits
        match bridge.trigger("40063813339315999") {
            Some(ScanEvent::Invalid { error, source }) => {
                assert_eq!(error.normalized, "40063813339315999");
                assert_eq!(source, ScanSource::External);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            bridge.deliver("40063813339315", ScanSource::Camera),
            Some(ScanEvent::Invalid { .. })
        ));
        assert!(
            events
                .lock()
                .unwrap()
                .iter()
                .all(|e| matches!(e, ScanEvent::Invalid { .. }))
        );
    }

    #[test]
    fn test_manual_field_caps_length() {
        let (bridge, _reg, _events) = recording_bridge();
        let entry = bridge.manual_entry();

        // The field itself holds at most 13 digits
        assert!(matches!(entry.inspect("40063813339315"), ManualInput::Ready(_)));
        assert_eq!(entry.submit("40063813339315").unwrap().as_str(), VALID);
    }

    #[test]
    fn test_registration_scoped_to_owner() {
        let bridge = ScanBridge::new(Duration::from_millis(1200));
        let first = bridge.register(|_| {});
        let second = bridge.register(|_| {});

        // Dropping a stale registration leaves the current one alone
        drop(first);
        assert!(bridge.is_registered());

        drop(second);
        assert!(!bridge.is_registered());
    }

    #[test]
    fn test_camera_detection_goes_through_bridge() {
        let (bridge, _reg, events) = recording_bridge();
        let code: ScanCode = VALID.parse().unwrap();
        bridge.on_detected(&code);
        bridge.on_detected(&code);
        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![ScanEvent::Accepted {
                code,
                source: ScanSource::Camera
            }]
        );
    }

    #[test]
    fn test_manual_sanitize() {
        assert_eq!(ManualEntry::sanitize("40-0638 1333931xx"), VALID);
        assert_eq!(ManualEntry::sanitize("12345678901234567"), "1234567890123");
        assert_eq!(ManualEntry::sanitize("ab"), "");
    }

    #[test]
    fn test_manual_inspect() {
        let (bridge, _reg, events) = recording_bridge();
        let entry = bridge.manual_entry();

        assert_eq!(entry.inspect(""), ManualInput::Empty);
        assert_eq!(entry.inspect("4006"), ManualInput::Incomplete("4006".into()));
        assert_eq!(
            entry.inspect("4006381333932"),
            ManualInput::Invalid("4006381333932".into())
        );
        entry.inspect("4006381333932");
        assert_eq!(events.lock().unwrap().len(), 1);

        assert!(matches!(entry.inspect(VALID), ManualInput::Ready(_)));
    }

    #[test]
    fn test_manual_submit_bypasses_duplicate_guard() {
        let (bridge, _reg, events) = recording_bridge();
        let entry = bridge.manual_entry();

        assert_eq!(entry.submit(VALID).unwrap().as_str(), VALID);
        assert!(entry.submit(VALID).is_ok());
        assert!(entry.submit("4006381333932").is_err());
        assert!(entry.submit("4006381333932").is_err());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[3],
            ScanEvent::Invalid {
                source: ScanSource::Manual,
                ..
            }
        ));
    }
}
