use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

type CancelHook<T> = Box<dyn FnOnce(T) + Send>;

enum SlotState<T> {
    Running,
    Done(T),
    Taken,
    Cancelled,
}

struct TaskSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
    on_cancelled: Mutex<Option<CancelHook<T>>>,
}

impl<T> TaskSlot<T> {
    fn lock_state(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_cancel_hook(&self, value: T) {
        let hook = self
            .on_cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook(value);
        }
    }
}

/// Result of a background job that can be polled, awaited or cancelled.
///
/// A result produced after cancellation, or produced but never collected, is
/// handed to the cancel hook exactly once.
pub struct WorkerTask<T> {
    slot: Arc<TaskSlot<T>>,
}

pub fn spawn_worker_task<T, W, C>(name: &str, work: W, on_cancelled: C) -> io::Result<WorkerTask<T>>
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
    C: FnOnce(T) + Send + 'static,
{
    let slot = Arc::new(TaskSlot {
        state: Mutex::new(SlotState::Running),
        ready: Condvar::new(),
        on_cancelled: Mutex::new(Some(Box::new(on_cancelled) as CancelHook<T>)),
    });

    let worker_slot = Arc::clone(&slot);
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let result = work();
            let mut state = worker_slot.lock_state();
            if matches!(*state, SlotState::Cancelled) {
                drop(state);
                worker_slot.run_cancel_hook(result);
                return;
            }
            *state = SlotState::Done(result);
            drop(state);
            worker_slot.ready.notify_all();
        })?;

    Ok(WorkerTask { slot })
}

impl<T> WorkerTask<T> {
    pub fn is_finished(&self) -> bool {
        !matches!(*self.slot.lock_state(), SlotState::Running)
    }

    /// Takes the result if the job has finished.
    pub fn poll(&self) -> Option<T> {
        let mut state = self.slot.lock_state();
        if !matches!(*state, SlotState::Done(_)) {
            return None;
        }
        match std::mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Done(value) => Some(value),
            _ => None,
        }
    }

    /// Blocks until the job finishes and takes its result.
    pub fn wait(&self) -> Option<T> {
        let mut state = self.slot.lock_state();
        while matches!(*state, SlotState::Running) {
            state = self
                .slot
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        match std::mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Done(value) => Some(value),
            other => {
                *state = other;
                None
            }
        }
    }

    pub fn cancel(&self) {
        let mut state = self.slot.lock_state();
        let previous = std::mem::replace(&mut *state, SlotState::Cancelled);
        drop(state);
        if let SlotState::Done(value) = previous {
            self.slot.run_cancel_hook(value);
        }
    }
}

impl<T> Drop for WorkerTask<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> std::fmt::Debug for WorkerTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerTask")
            .field("finished", &self.is_finished())
            .finish()
    }
}
