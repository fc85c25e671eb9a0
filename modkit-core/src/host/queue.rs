//! Host hook queue.

use super::{HookKind, HookQueue};

/// Ordered tweak and transformer lists, as handed to the host launcher.
#[derive(Debug, Clone, Default)]
pub struct LaunchQueue {
    tweaks: Vec<String>,
    transformers: Vec<String>,
}

impl LaunchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue populated with hooks the host registered on its own.
    pub fn with_existing<I, S>(tweaks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tweaks: tweaks.into_iter().map(Into::into).collect(),
            transformers: Vec::new(),
        }
    }

    pub fn tweaks(&self) -> &[String] {
        &self.tweaks
    }

    pub fn transformers(&self) -> &[String] {
        &self.transformers
    }

    pub fn len(&self) -> usize {
        self.tweaks.len() + self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HookQueue for LaunchQueue {
    fn is_enqueued(&self, class_name: &str) -> bool {
        self.tweaks.iter().any(|t| t == class_name)
            || self.transformers.iter().any(|t| t == class_name)
    }

    fn enqueue(&mut self, kind: HookKind, class_name: &str) -> bool {
        if class_name.is_empty() || self.is_enqueued(class_name) {
            return false;
        }

        match kind {
            HookKind::Tweak => self.tweaks.push(class_name.to_string()),
            HookKind::Transformer => self.transformers.push(class_name.to_string()),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_rejects_duplicates_across_kinds() {
        let mut queue = LaunchQueue::with_existing(["host.Tweak"]);
        assert!(!queue.enqueue(HookKind::Tweak, "host.Tweak"));
        assert!(queue.enqueue(HookKind::Transformer, "a.Transformer"));
        assert!(!queue.enqueue(HookKind::Tweak, "a.Transformer"));
        assert!(!queue.enqueue(HookKind::Tweak, ""));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.transformers(), ["a.Transformer".to_string()]);
    }
}
