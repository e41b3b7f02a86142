//! Scratch state reused across one-shot calls.

use std::fmt;
use std::ops::{Deref, DerefMut};

use object_pool::Reusable;

type MakeFn<T> = Box<dyn Fn() -> T + Send + Sync>;
type ResetFn<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Hands out exclusive objects and takes them back when their guard drops.
///
/// Objects are reset before they return to the pool, on every exit path of
/// the borrower, errors and panics included.
pub struct Pool<T> {
    objects: object_pool::Pool<T>,
    make: MakeFn<T>,
    reset: ResetFn<T>,
    cap: usize,
}

impl<T> Pool<T> {
    /// `make` builds a fresh object when the pool is empty, `reset` clears
    /// one before it is pooled again.
    pub fn new<M, R>(make: M, reset: R) -> Self
    where
        M: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        let make: MakeFn<T> = Box::new(make);
        Self {
            objects: object_pool::Pool::new(0, &make),
            make,
            reset: Box::new(reset),
            cap: 64,
        }
    }

    /// Caps the number of idle objects kept around.
    pub fn with_capacity(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn get(&self) -> Pooled<'_, T> {
        Pooled {
            pool: self,
            item: Some(self.objects.pull(|| (self.make)())),
        }
    }

    /// Number of idle objects.
    pub fn idle(&self) -> usize {
        self.objects.len()
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle())
            .field("cap", &self.cap)
            .finish()
    }
}

/// Exclusive access to a pooled object.
pub struct Pooled<'p, T> {
    pool: &'p Pool<T>,
    item: Option<Reusable<'p, T>>,
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => &**item,
            None => unreachable!("pooled object used after release"),
        }
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => &mut **item,
            None => unreachable!("pooled object used after release"),
        }
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            (self.pool.reset)(&mut *item);
            if self.pool.idle() >= self.pool.cap {
                // Dropped here instead of going back to the pool.
                let _ = item.detach();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_are_reused_after_reset() {
        let pool = Pool::new(Vec::<u8>::new, Vec::clear);
        {
            let mut buf = pool.get();
            buf.extend_from_slice(b"scratch");
        }
        assert_eq!(pool.idle(), 1);
        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 7);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn released_on_error_paths() {
        let pool = Pool::new(String::new, String::clear);
        let run = |fail: bool| -> Result<(), String> {
            let mut s = pool.get();
            s.push_str("x");
            if fail {
                return Err("failed".into());
            }
            Ok(())
        };
        assert!(run(true).is_err());
        assert!(run(false).is_ok());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn reset_runs_when_the_borrower_panics() {
        let pool = Pool::new(String::new, String::clear);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut s = pool.get();
            s.push_str("half");
            panic!("borrower failed");
        }));
        assert!(res.is_err());
        assert_eq!(pool.idle(), 1);
        assert!(pool.get().is_empty());
    }

    #[test]
    fn idle_objects_are_capped() {
        let pool = Pool::new(|| 0u32, |n: &mut u32| *n = 0).with_capacity(1);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }
}
