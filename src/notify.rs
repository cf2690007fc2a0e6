use futures_util::task::ArcWake;
use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Waker;

/// The waker every fetch hands to the source.
///
/// A wake from the source reaches every parked reader, not only the one whose
/// poll started the fetch. A reader whose `read` future is dropped mid-fetch
/// therefore never strands the others.
#[derive(Debug)]
pub(crate) struct FetchNotifier {
    state: Mutex<Parked>,
}

#[derive(Debug)]
struct Parked {
    // True while no fetch is waiting on the source.
    ready: bool,
    wakers: HashMap<usize, Waker>,
}

impl FetchNotifier {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(Parked {
                ready: true,
                wakers: HashMap::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, Parked> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parks reader `key` until the next wake.
    ///
    /// Returns `true` if the source may be polled right now, in which case the
    /// caller has claimed the fetch. Otherwise a fetch is already waiting on
    /// the source and its wake will reach this reader.
    pub(crate) fn park(&self, key: usize, waker: &Waker) -> bool {
        let mut state = self.state();
        if !state
            .wakers
            .get(&key)
            .is_some_and(|parked| parked.will_wake(waker))
        {
            state.wakers.insert(key, waker.clone());
        }
        mem::replace(&mut state.ready, false)
    }

    pub(crate) fn forget(&self, key: usize) {
        self.state().wakers.remove(&key);
    }

    /// Marks the source as pollable and wakes every parked reader.
    pub(crate) fn notify(&self) {
        let wakers = {
            let mut state = self.state();
            state.ready = true;
            mem::take(&mut state.wakers)
        };
        for waker in wakers.into_values() {
            waker.wake();
        }
    }
}

impl ArcWake for FetchNotifier {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.notify();
    }
}
