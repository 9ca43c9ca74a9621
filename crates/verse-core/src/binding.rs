use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared attach/detach flag between the playback controller and the event
/// source of one audio handle.
///
/// The controller detaches a binding before it releases the handle; once
/// detached, nothing routed through the binding reaches the controller again.
#[derive(Clone, Debug, Default)]
pub struct EventBinding {
    detached: Arc<AtomicBool>,
}

impl EventBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        !self.detached.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::EventBinding;

    #[test]
    fn detach_is_visible_through_clones() {
        let binding = EventBinding::new();
        let observer = binding.clone();
        assert!(observer.is_attached());

        binding.detach();
        assert!(!observer.is_attached());

        binding.detach();
        assert!(!observer.is_attached());
    }
}
