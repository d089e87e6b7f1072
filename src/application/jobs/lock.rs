use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

const POISON_HINT: &str = "job state may be stale after a panic in another task";

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = target,
            lock_kind = "rwlock.read",
            result = "poisoned_recovered",
            hint = POISON_HINT,
            "Recovered from poisoned job lock"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = target,
            lock_kind = "rwlock.write",
            result = "poisoned_recovered",
            hint = POISON_HINT,
            "Recovered from poisoned job lock"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = target,
            lock_kind = "mutex.lock",
            result = "poisoned_recovered",
            hint = POISON_HINT,
            "Recovered from poisoned job lock"
        );
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::{panic, sync::Arc};

    use super::*;

    #[test]
    fn poisoned_rwlock_is_recovered() {
        let lock = Arc::new(RwLock::new(1_u32));
        let poisoner = Arc::clone(&lock);
        let _ = panic::catch_unwind(move || {
            let _guard = poisoner.write().expect("first write");
            panic!("poison the lock");
        });
        assert!(lock.is_poisoned());

        *rw_write(&lock, "tests", "poison") += 1;
        assert_eq!(*rw_read(&lock, "tests", "poison"), 2);
    }

    #[test]
    fn poisoned_mutex_is_recovered() {
        let lock = Arc::new(Mutex::new(Vec::<u8>::new()));
        let poisoner = Arc::clone(&lock);
        let _ = panic::catch_unwind(move || {
            let _guard = poisoner.lock().expect("first lock");
            panic!("poison the lock");
        });

        mutex_lock(&lock, "tests", "poison").push(7);
        assert_eq!(*mutex_lock(&lock, "tests", "poison"), vec![7]);
    }
}
