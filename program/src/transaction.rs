use std::ops::{Deref, DerefMut};

/// All-or-nothing mutation of `T`.
///
/// Changes made through the guard are kept only if [`Transaction::commit`]
/// is called; dropping the guard on any other path (including `?`)
/// restores the value captured by [`Transaction::begin`].
pub struct Transaction<'a, T: Clone> {
    target: &'a mut T,
    saved: Option<T>,
}

impl<'a, T: Clone> Transaction<'a, T> {
    pub fn begin(target: &'a mut T) -> Self {
        let saved = Some(target.clone());
        Self { target, saved }
    }

    pub fn commit(mut self) {
        self.saved = None;
    }
}

impl<T: Clone> Deref for Transaction<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.target
    }
}

impl<T: Clone> DerefMut for Transaction<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.target
    }
}

impl<T: Clone> Drop for Transaction<'_, T> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.target = saved;
        }
    }
}
