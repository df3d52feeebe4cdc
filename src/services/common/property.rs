use std::fmt::Debug;

use futures::stream::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A value that can be read synchronously and watched for changes.
///
/// Watchers receive the current value first, then every distinct update.
#[derive(Clone)]
pub struct Property<T: Clone + Send + Sync + 'static> {
    tx: watch::Sender<T>,
    rx: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    /// Create a property holding `initial`.
    pub fn new(initial: T) -> Self {
        let (tx, rx) = watch::channel(initial);
        Self { tx, rx }
    }

    /// Replace the value, notifying watchers only if it differs.
    pub(crate) fn set(&self, new_value: T)
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current == new_value {
                return false;
            }
            *current = new_value;
            true
        });
    }

    /// Edit the value in place, notifying watchers only if the edit changed it.
    pub(crate) fn modify(&self, edit: impl FnOnce(&mut T))
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            let before = current.clone();
            edit(current);
            *current != before
        });
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Stream of the current value followed by each change.
    pub fn watch(&self) -> impl Stream<Item = T> + Send + use<T> {
        WatchStream::new(self.rx.clone())
    }
}

impl<T: Clone + Send + Sync + Debug + 'static> Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Property").field(&*self.rx.borrow()).finish()
    }
}
