//! Sentence-by-sentence reveal of an NPC reply

/// What an advance did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep {
    /// Now showing sentence `index`
    Next { index: usize, text: String },
    /// Moved past the last sentence; the reveal is over
    Finished,
    /// Nothing was being revealed
    Idle,
}

/// Cursor over the sentences of one reply.
#[derive(Debug, Clone, Default)]
pub struct SentenceReveal {
    sentences: Vec<String>,
    index: usize,
    active: bool,
}

impl SentenceReveal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin revealing; returns the first sentence, or `None` (and stays
    /// idle) when there is nothing to show.
    pub fn start(&mut self, sentences: Vec<String>) -> Option<&str> {
        self.sentences = sentences;
        self.index = 0;
        self.active = !self.sentences.is_empty();
        self.current()
    }

    pub fn advance(&mut self) -> RevealStep {
        if !self.active {
            return RevealStep::Idle;
        }
        if self.index + 1 < self.sentences.len() {
            self.index += 1;
            RevealStep::Next {
                index: self.index,
                text: self.sentences[self.index].clone(),
            }
        } else {
            self.cancel();
            RevealStep::Finished
        }
    }

    /// Drop the reveal without finishing it. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.sentences.clear();
        self.index = 0;
        was_active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current(&self) -> Option<&str> {
        if self.active {
            self.sentences.get(self.index).map(String::as_str)
        } else {
            None
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}
