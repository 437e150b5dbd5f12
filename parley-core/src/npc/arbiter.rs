//! Which NPC holds the conversation when only one may talk at a time

use crate::id::NpcId;

#[derive(Debug, Default)]
pub struct ConversationArbiter {
    holder: Option<NpcId>,
}

impl ConversationArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the conversation, returning whoever held it before.
    pub fn force_acquire(&mut self, npc: &NpcId) -> Option<NpcId> {
        let previous = self.holder.replace(npc.clone());
        previous.filter(|holder| holder != npc)
    }

    /// Release if `npc` is the holder.
    pub fn release(&mut self, npc: &NpcId) -> bool {
        if self.holder.as_ref() == Some(npc) {
            self.holder = None;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&NpcId> {
        self.holder.as_ref()
    }
}
