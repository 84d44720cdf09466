/// Auxiliary notes injected into the prompt ahead of the user's query.
///
/// Notes keep their insertion order and render joined by single spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBundle {
    notes: Vec<String>,
}

impl ContextBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// True when rendering would yield only whitespace.
    pub fn is_empty(&self) -> bool {
        self.notes.iter().all(|n| n.trim().is_empty())
    }

    pub fn render(&self) -> String {
        self.notes.join(" ")
    }
}
