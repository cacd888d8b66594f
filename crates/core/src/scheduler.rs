use std::collections::BTreeMap;

/// How much of the next frame has to be redone.
///
/// `Content` repaints canvases only; `Full` additionally re-runs track
/// layout. Requesting both before the frame fires upgrades to `Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RedrawLevel {
    Content,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallbackId(u64);

/// Coalesces "something changed" signals into at most one repaint per
/// frame.
///
/// Any number of requests between frames collapse into a single pending
/// level (dedup, not a queue). Registered callbacks run on every frame
/// regardless of level so continuous animations can piggyback on the
/// frame pump instead of owning their own timer.
pub struct RedrawScheduler {
    pending: Option<RedrawLevel>,
    callbacks: BTreeMap<CallbackId, Box<dyn FnMut()>>,
    next_callback: u64,
}

impl RedrawScheduler {
    pub fn new() -> RedrawScheduler {
        RedrawScheduler {
            pending: None,
            callbacks: BTreeMap::new(),
            next_callback: 0,
        }
    }

    /// Ask for a redraw at the given level. Callers pick the minimum
    /// sufficient level; conflicting requests upgrade.
    pub fn request(&mut self, level: RedrawLevel) {
        self.pending = Some(match self.pending {
            Some(existing) => existing.max(level),
            None => level,
        });
    }

    pub fn pending(&self) -> Option<RedrawLevel> {
        self.pending
    }

    /// Consume the pending request at frame time. Returns `None` when no
    /// redraw was asked for since the last frame.
    pub fn take(&mut self) -> Option<RedrawLevel> {
        self.pending.take()
    }

    /// Register a callback that runs on every scheduled frame. Returns a
    /// handle for removal.
    pub fn add_callback(&mut self, callback: Box<dyn FnMut()>) -> CallbackId {
        let id = CallbackId(self.next_callback);
        self.next_callback += 1;
        self.callbacks.insert(id, callback);
        id
    }

    /// Remove a callback. Safe at any time, including from another
    /// callback's run; takes effect from the next frame.
    pub fn remove_callback(&mut self, id: CallbackId) {
        self.callbacks.remove(&id);
    }

    pub fn has_callbacks(&self) -> bool {
        !self.callbacks.is_empty()
    }

    /// Run every registered frame callback once.
    pub fn run_callbacks(&mut self) {
        // Ids are collected first so a callback that registers or removes
        // others mid-cycle cannot invalidate the iteration.
        let ids: Vec<CallbackId> = self.callbacks.keys().copied().collect();
        for id in ids {
            if let Some(mut cb) = self.callbacks.remove(&id) {
                cb();
                // Re-insert unless the callback removed itself.
                self.callbacks.entry(id).or_insert(cb);
            }
        }
    }
}

impl Default for RedrawScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn requests_coalesce() {
        let mut s = RedrawScheduler::new();
        s.request(RedrawLevel::Content);
        s.request(RedrawLevel::Content);
        s.request(RedrawLevel::Content);
        assert_eq!(s.take(), Some(RedrawLevel::Content));
        assert_eq!(s.take(), None);
    }

    #[test]
    fn conflicting_requests_upgrade_to_full() {
        let mut s = RedrawScheduler::new();
        s.request(RedrawLevel::Content);
        s.request(RedrawLevel::Full);
        s.request(RedrawLevel::Content);
        assert_eq!(s.take(), Some(RedrawLevel::Full));
    }

    #[test]
    fn callbacks_run_every_frame() {
        let mut s = RedrawScheduler::new();
        let ticks = Rc::new(Cell::new(0));
        let t = ticks.clone();
        s.add_callback(Box::new(move || t.set(t.get() + 1)));
        s.run_callbacks();
        s.run_callbacks();
        assert_eq!(ticks.get(), 2);
    }

    #[test]
    fn removal_takes_effect_next_frame() {
        let mut s = RedrawScheduler::new();
        let ticks = Rc::new(Cell::new(0));
        let t = ticks.clone();
        let id = s.add_callback(Box::new(move || t.set(t.get() + 1)));
        s.run_callbacks();
        s.remove_callback(id);
        s.run_callbacks();
        assert_eq!(ticks.get(), 1);
        assert!(!s.has_callbacks());
    }
}
