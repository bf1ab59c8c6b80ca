use std::sync::{Arc, Condvar, Mutex};

/// A counted lock bounding the number of concurrent holders to `limit`,
/// gating calls through an [`ImageSource`](crate::batch::driver::ImageSource)
/// or [`ImageSink`](crate::batch::driver::ImageSink).
#[derive(Clone)]
pub struct CountedLock {
    state: Arc<(Mutex<usize>, Condvar)>,
    limit: usize,
}

impl CountedLock {
    pub fn new(limit: usize) -> Self {
        Self {
            state: Arc::new((Mutex::new(0), Condvar::new())),
            limit: limit.max(1),
        }
    }

    /// Block until a slot is free, then return a RAII guard releasing it on drop.
    pub fn acquire(&self) -> CountedLockGuard<'_> {
        let (mutex, condvar) = &*self.state;
        let mut count = mutex.lock().unwrap();
        while *count >= self.limit {
            count = condvar.wait(count).unwrap();
        }
        *count += 1;
        CountedLockGuard { lock: self }
    }
}

pub struct CountedLockGuard<'a> {
    lock: &'a CountedLock,
}

impl Drop for CountedLockGuard<'_> {
    fn drop(&mut self) {
        let (mutex, condvar) = &*self.lock.state;
        let mut count = mutex.lock().unwrap();
        *count -= 1;
        condvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn never_exceeds_the_configured_limit() {
        let lock = CountedLock::new(2);
        let peak = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let peak = Arc::clone(&peak);
                let current = Arc::clone(&current);
                thread::spawn(move || {
                    let _guard = lock.acquire();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    current.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
