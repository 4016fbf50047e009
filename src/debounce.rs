use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Forwards the last value of every input burst once `quiet` has passed with
/// no newer value. Superseded values are never emitted.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn(quiet: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, input) = mpsc::unbounded_channel();
        let (output, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_debounce(input, output, quiet));
        (Self { tx, task }, rx)
    }

    pub fn push(&self, value: T) {
        let _ = self.tx.send(value);
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_debounce<T>(
    mut input: mpsc::UnboundedReceiver<T>,
    output: mpsc::UnboundedSender<T>,
    quiet: Duration,
) {
    let mut pending: Option<T> = None;
    loop {
        match pending.take() {
            None => match input.recv().await {
                Some(value) => pending = Some(value),
                None => return,
            },
            Some(value) => {
                tokio::select! {
                    next = input.recv() => match next {
                        Some(newer) => pending = Some(newer),
                        None => {
                            let _ = output.send(value);
                            return;
                        }
                    },
                    _ = sleep(quiet) => {
                        if output.send(value).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}
