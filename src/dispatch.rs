use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error};

use crate::types::{EventDetails, VerifiedEvent};

/// Which message handler an admitted event goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Mention(EventDetails),
    DirectThread(EventDetails),
    Thread(EventDetails),
    DirectMessage(EventDetails),
    Ignored(&'static str),
    Unhandled(String),
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Mention(_) => "mention",
            Route::DirectThread(_) => "direct_thread",
            Route::Thread(_) => "thread",
            Route::DirectMessage(_) => "direct_message",
            Route::Ignored(_) => "ignored",
            Route::Unhandled(_) => "unhandled",
        }
    }
}

/// Classifies an event. Pure: a wrong guess only means no reply.
pub fn route_event(event: VerifiedEvent, bot_name: &str) -> Route {
    match event {
        VerifiedEvent::AppMention(details) => Route::Mention(details),
        VerifiedEvent::Message(details) => route_message(details, bot_name),
        VerifiedEvent::Challenge { .. } => Route::Ignored("challenge"),
        VerifiedEvent::Unknown { event_type } => Route::Unhandled(event_type),
    }
}

fn route_message(details: EventDetails, bot_name: &str) -> Route {
    // our own replies come back as message events
    if details.bot_id.is_some() {
        return Route::Ignored("bot message");
    }

    let has_thread = details.thread_ts.is_some();
    let is_direct = details.is_direct();

    match details.subtype.as_deref() {
        None => {}
        Some("file_share") if is_direct => {}
        Some(_) => return Route::Ignored("message subtype"),
    }

    match (has_thread, is_direct) {
        (true, true) => Route::DirectThread(details),
        (true, false) if strip_wake_phrase(&details.text, bot_name).is_some() => {
            Route::Thread(details)
        }
        (true, false) => Route::Ignored("thread message without wake phrase"),
        (false, true) => Route::DirectMessage(details),
        (false, false) => Route::Ignored("channel message"),
    }
}

/// Returns the text after a leading `hey <bot_name>`, matched case-insensitively.
/// The bot name has to end there: `hey ragbotty` is not a wake phrase.
pub fn strip_wake_phrase<'a>(text: &'a str, bot_name: &str) -> Option<&'a str> {
    let phrase = format!("hey {}", bot_name);
    let head = text.get(..phrase.len())?;
    if !head.eq_ignore_ascii_case(&phrase) {
        return None;
    }
    let rest = &text[phrase.len()..];
    if rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some(rest.trim_start_matches([',', ':']).trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Saturated;

/// Bounded pool of background handler tasks.
///
/// Each task runs under a supervisor so a panicking handler is logged and
/// its slot returned without touching the caller.
#[derive(Clone)]
pub struct Dispatcher {
    slots: Arc<Semaphore>,
    dispatched: Arc<AtomicU64>,
}

/// A reserved place in the pool. Dropping it unused frees the place.
pub struct Slot {
    permit: OwnedSemaphorePermit,
    dispatched: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_in_flight.max(1))),
            dispatched: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Claims a slot without waiting, or reports the pool as full.
    pub fn reserve(&self) -> Result<Slot, Saturated> {
        let permit = self
            .slots
            .clone()
            .try_acquire_owned()
            .map_err(|_| Saturated)?;
        Ok(Slot {
            permit,
            dispatched: self.dispatched.clone(),
        })
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

impl Slot {
    pub fn spawn<F>(self, task_name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        let permit = self.permit;
        let handle = tokio::spawn(async move {
            let _permit = permit;
            task.await;
        });
        tokio::spawn(async move {
            match handle.await {
                Ok(()) => debug!(task = task_name, "handler finished"),
                Err(e) if e.is_panic() => error!(task = task_name, "handler panicked"),
                Err(e) => error!(task = task_name, error = %e, "handler aborted"),
            }
        });
    }
}
