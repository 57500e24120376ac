//! Filesystem-driven polling of the chat database.
//!
//! Two long-lived threads joined by unbounded channels: a *poller* that
//! reacts to debounced filesystem notifications by querying rows newer than
//! a watermark, and a *consumer* that drains the message channel into an
//! event sink. Notifications arriving while a poll is in flight are dropped
//! (busy flag); the watermark only ever advances.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{select, unbounded, Sender};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tracing::{debug, info, warn};

use crate::db::MessageStore;
use crate::error::{BridgeError, Result};
use crate::event::{classify, MessageEvent};
use crate::model::message::{Message, ReadReceipt, APPLE_EPOCH_UNIX_SECS};

/// Watcher tuning.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Debounce window for filesystem notifications.
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Receives the translated events. Implementations run on the consumer
/// thread; a slow sink backs up the unbounded channel, never the poller.
pub trait EventSink: Send {
    fn on_message(&mut self, event: MessageEvent);
    fn on_read_receipt(&mut self, receipt: ReadReceipt);
}

/// Handles to the two running threads.
pub struct WatchHandle {
    poller_stop: Sender<()>,
    consumer_stop: Sender<()>,
    poller: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop both threads and wait for them to exit.
    pub fn stop(self) {
        let _ = self.poller_stop.send(());
        let _ = self.consumer_stop.send(());
        let _ = self.poller.join();
        let _ = self.consumer.join();
    }
}

/// Start watching the database behind `store`, delivering events to `sink`.
pub fn watch_messages(
    store: MessageStore,
    options: WatchOptions,
    mut sink: Box<dyn EventSink>,
) -> Result<WatchHandle> {
    let mut watermark = store.max_message_time()?;
    let mut receipt_watermark =
        Utc::now().timestamp_nanos_opt().unwrap_or(0) - APPLE_EPOCH_UNIX_SECS * 1_000_000_000;

    let (fs_tx, fs_rx) = unbounded::<()>();
    let (message_tx, message_rx) = unbounded::<Message>();
    let (receipt_tx, receipt_rx) = unbounded::<ReadReceipt>();
    let (poller_stop_tx, poller_stop_rx) = unbounded::<()>();
    let (consumer_stop_tx, consumer_stop_rx) = unbounded::<()>();

    let busy = Arc::new(AtomicBool::new(false));
    let busy_for_handler = Arc::clone(&busy);

    let mut debouncer = new_debouncer(options.debounce, move |result: DebounceEventResult| {
        match result {
            Ok(_events) => {
                // Drop notifications while a poll is in flight.
                if !busy_for_handler.load(Ordering::SeqCst) {
                    let _ = fs_tx.send(());
                }
            }
            Err(err) => warn!(error = %err, "Filesystem watcher error"),
        }
    })
    .map_err(|err| BridgeError::Watch(err.to_string()))?;

    let watch_dir = store
        .path()
        .parent()
        .ok_or_else(|| BridgeError::Watch("database path has no parent directory".to_string()))?
        .to_path_buf();
    debouncer
        .watcher()
        .watch(&watch_dir, notify::RecursiveMode::NonRecursive)
        .map_err(|err| BridgeError::Watch(err.to_string()))?;
    info!(dir = %watch_dir.display(), watermark, "Watching chat database");

    let poller = std::thread::spawn(move || {
        // Keeps the watcher registered for the thread's lifetime.
        let _debouncer = debouncer;
        let mut non_sent_messages: HashSet<String> = HashSet::new();
        loop {
            select! {
                recv(poller_stop_rx) -> _ => break,
                recv(fs_rx) -> received => {
                    if received.is_err() {
                        break;
                    }
                    busy.store(true, Ordering::SeqCst);
                    match store.messages_newer_than(watermark) {
                        Ok(messages) => {
                            debug!(count = messages.len(), watermark, "Polled new messages");
                            for message in messages {
                                watermark = advance_watermark(watermark, &message);
                                if !should_forward(&mut non_sent_messages, &message.guid, message.is_sent) {
                                    continue;
                                }
                                let _ = message_tx.send(message);
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "Error reading messages after notification");
                        }
                    }
                    match store.read_receipts_since(receipt_watermark) {
                        Ok((receipts, new_watermark)) => {
                            receipt_watermark = new_watermark;
                            for receipt in receipts {
                                let _ = receipt_tx.send(receipt);
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "Error reading receipts after notification");
                        }
                    }
                    busy.store(false, Ordering::SeqCst);
                }
            }
        }
    });

    let consumer = std::thread::spawn(move || loop {
        select! {
            recv(consumer_stop_rx) -> _ => break,
            recv(message_rx) -> received => {
                match received {
                    Ok(message) => sink.on_message(classify(message)),
                    Err(_) => break,
                }
            }
            recv(receipt_rx) -> received => {
                match received {
                    Ok(receipt) => sink.on_read_receipt(receipt),
                    Err(_) => break,
                }
            }
        }
    });

    Ok(WatchHandle {
        poller_stop: poller_stop_tx,
        consumer_stop: consumer_stop_tx,
        poller,
        consumer,
    })
}

/// The watermark advances to the maximum of the three date columns seen.
fn advance_watermark(current: i64, message: &Message) -> i64 {
    current
        .max(message.date)
        .max(message.date_edited)
        .max(message.date_retracted)
}

/// Rows that are not yet sent are remembered by GUID; their re-delivery
/// once sent is suppressed (the first sighting was already forwarded).
fn should_forward(non_sent: &mut HashSet<String>, guid: &str, is_sent: bool) -> bool {
    if !is_sent {
        non_sent.insert(guid.to_string());
        true
    } else if non_sent.remove(guid) {
        false
    } else {
        true
    }
}
