use std::fmt;
use std::sync::Arc;

/// Causal chain of requests, child to parent, kept for diagnostics only
#[derive(Clone)]
pub struct RequestTrace(Arc<Frame>);

struct Frame {
    data: String,
    parent: Option<RequestTrace>,
}

impl RequestTrace {
    pub fn new(data: impl Into<String>) -> Self {
        Self(Arc::new(Frame {
            data: data.into(),
            parent: None,
        }))
    }

    /// Child of `parent`, or a new root when there is no parent
    pub fn new_child(parent: Option<&RequestTrace>, data: impl Into<String>) -> Self {
        Self(Arc::new(Frame {
            data: data.into(),
            parent: parent.cloned(),
        }))
    }

    pub fn child(&self, data: impl Into<String>) -> Self {
        Self::new_child(Some(self), data)
    }

    pub fn data(&self) -> &str {
        &self.0.data
    }

    pub fn parent(&self) -> Option<&RequestTrace> {
        self.0.parent.as_ref()
    }

    /// This trace followed by its ancestors
    pub fn iter(&self) -> impl Iterator<Item = &RequestTrace> {
        std::iter::successors(Some(self), |t| t.parent())
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }
}

impl fmt::Debug for RequestTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|t| t.data())).finish()
    }
}

impl fmt::Display for RequestTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frames: Vec<&str> = self.iter().map(|t| t.data()).collect();
        f.write_str(&frames.join(" <- "))
    }
}
