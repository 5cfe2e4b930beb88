#![allow(dead_code)]
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use rpc_bridge::{Error, PushConsumer};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum Event<T> {
    Next(T),
    Error(Error),
    Completed,
}

impl<T> Event<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Next(_))
    }
}

/// A transport-side consumer that records every call it gets
pub struct Recorder<T> {
    tx: mpsc::UnboundedSender<Event<T>>,
}

pub struct Recording<T> {
    rx: mpsc::UnboundedReceiver<Event<T>>,
}

pub fn recorder<T>() -> (Recorder<T>, Recording<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Recorder { tx }, Recording { rx })
}

impl<T: Send> PushConsumer<T> for Recorder<T> {
    fn on_next(&self, value: T) {
        let _ = self.tx.send(Event::Next(value));
    }
    fn on_error(&self, error: Error) {
        let _ = self.tx.send(Event::Error(error));
    }
    fn on_completed(&self) {
        let _ = self.tx.send(Event::Completed);
    }
}

impl<T> Recording<T> {
    pub async fn next(&mut self) -> Option<Event<T>> {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for an event")
    }

    /// Every event up to and including the first terminal one
    pub async fn until_terminal(&mut self) -> Vec<Event<T>> {
        let mut events = vec![];
        while let Some(event) = self.next().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    /// Events that arrive within `quiet`, without waiting for a terminal one
    pub async fn drain_for(&mut self, quiet: Duration) -> Vec<Event<T>> {
        let mut events = vec![];
        while let Ok(Some(event)) = tokio::time::timeout(quiet, self.rx.recv()).await {
            events.push(event);
        }
        events
    }
}

pub fn values<T: Clone>(events: &[Event<T>]) -> Vec<T> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Next(value) => Some(value.clone()),
            _ => None,
        })
        .collect()
}

/// Set when dropped, to observe that a stream was released
#[derive(Debug, Clone, Default)]
pub struct DropFlag(Arc<AtomicBool>);

pub struct DropGuard(Arc<AtomicBool>);

impl DropFlag {
    pub fn guard(&self) -> DropGuard {
        DropGuard(self.0.clone())
    }
    pub fn is_dropped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
    pub async fn wait_dropped(&self) {
        tokio::time::timeout(WAIT, async {
            while !self.is_dropped() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for a drop")
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
