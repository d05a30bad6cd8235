//! Managed multi-buffer registry: named and scratch buffers addressed by a
//! stable id, with a single "current" selection.

use std::collections::HashMap;

use core_text::Buffer as TextBuffer;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferManagerError {
    #[error("buffer manager at capacity")]
    MaxBuffers,
    #[error("buffer name already in use: {0}")]
    BufferExists(String),
    #[error("no buffer with id {0:?}")]
    NotFound(BufferId),
    #[error("no buffer named {0}")]
    NameNotFound(String),
}

type Result<T> = std::result::Result<T, BufferManagerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Named,
    Scratch,
}

pub struct ManagedBuffer {
    pub id: BufferId,
    pub name: Option<String>,
    pub kind: BufferKind,
    pub text: TextBuffer,
}

/// Registry owning every open buffer plus the creation-order list used for
/// "promote predecessor" semantics on delete of the current buffer.
pub struct BufferManager {
    max_buffers: usize,
    next_id: u64,
    buffers: HashMap<BufferId, ManagedBuffer>,
    names: HashMap<String, BufferId>,
    /// Creation order, oldest first. Doubles as the "linked list" the
    /// delete-current promotion rule walks.
    order: Vec<BufferId>,
    current: Option<BufferId>,
}

impl BufferManager {
    pub fn new(max_buffers: usize) -> Self {
        Self {
            max_buffers,
            next_id: 0,
            buffers: HashMap::new(),
            names: HashMap::new(),
            order: Vec::new(),
            current: None,
        }
    }

    fn alloc_id(&mut self) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, kind: BufferKind, name: Option<String>, text: TextBuffer) -> Result<BufferId> {
        if self.buffers.len() >= self.max_buffers {
            return Err(BufferManagerError::MaxBuffers);
        }
        if let Some(n) = &name {
            if self.names.contains_key(n) {
                return Err(BufferManagerError::BufferExists(n.clone()));
            }
        }
        let id = self.alloc_id();
        if let Some(n) = &name {
            self.names.insert(n.clone(), id);
        }
        self.buffers.insert(
            id,
            ManagedBuffer {
                id,
                name,
                kind,
                text,
            },
        );
        self.order.push(id);
        if self.current.is_none() {
            self.current = Some(id);
        }
        Ok(id)
    }

    /// Create a new empty named buffer.
    pub fn create_named(&mut self, name: impl Into<String>) -> Result<BufferId> {
        let name = name.into();
        let text = TextBuffer::from_str(name.clone(), "")
            .expect("empty string is always valid buffer content");
        self.insert(BufferKind::Named, Some(name), text)
    }

    /// Create a new empty scratch buffer (unnamed).
    pub fn create_scratch(&mut self) -> Result<BufferId> {
        let text = TextBuffer::from_str("*scratch*", "")
            .expect("empty string is always valid buffer content");
        self.insert(BufferKind::Scratch, None, text)
    }

    fn promote_after_removal(&mut self, removed_pos: usize) {
        let predecessor = if removed_pos > 0 {
            self.order.get(removed_pos - 1).copied()
        } else {
            None
        };
        self.current = predecessor.or_else(|| self.order.get(removed_pos).copied());
    }

    /// Delete a buffer by id. If it was `current`, promotes the most
    /// recently created buffer before it in creation order, or `nil` if none
    /// remain.
    pub fn delete(&mut self, id: BufferId) -> Result<()> {
        let buf = self.buffers.remove(&id).ok_or(BufferManagerError::NotFound(id))?;
        if let Some(n) = &buf.name {
            self.names.remove(n);
        }
        let pos = self
            .order
            .iter()
            .position(|&x| x == id)
            .expect("order list must contain every live buffer id");
        self.order.remove(pos);
        if self.current == Some(id) {
            self.promote_after_removal(pos);
        }
        Ok(())
    }

    pub fn delete_by_name(&mut self, name: &str) -> Result<()> {
        let id = *self
            .names
            .get(name)
            .ok_or_else(|| BufferManagerError::NameNotFound(name.to_string()))?;
        self.delete(id)
    }

    /// Rename a buffer. Renaming a scratch buffer promotes it to a named
    /// (persistent) buffer in the same call.
    pub fn rename(&mut self, id: BufferId, new_name: impl Into<String>) -> Result<()> {
        let new_name = new_name.into();
        if self.names.contains_key(&new_name) {
            return Err(BufferManagerError::BufferExists(new_name));
        }
        let buf = self
            .buffers
            .get_mut(&id)
            .ok_or(BufferManagerError::NotFound(id))?;
        if let Some(old) = &buf.name {
            self.names.remove(old);
        }
        self.names.insert(new_name.clone(), id);
        buf.name = Some(new_name);
        buf.kind = BufferKind::Named;
        Ok(())
    }

    pub fn switch(&mut self, id: BufferId) -> Result<()> {
        if !self.buffers.contains_key(&id) {
            return Err(BufferManagerError::NotFound(id));
        }
        self.current = Some(id);
        Ok(())
    }

    pub fn switch_by_name(&mut self, name: &str) -> Result<()> {
        let id = *self
            .names
            .get(name)
            .ok_or_else(|| BufferManagerError::NameNotFound(name.to_string()))?;
        self.switch(id)
    }

    pub fn current(&self) -> Option<BufferId> {
        self.current
    }

    pub fn current_buffer(&self) -> Option<&ManagedBuffer> {
        self.current.and_then(|id| self.buffers.get(&id))
    }

    pub fn current_buffer_mut(&mut self) -> Option<&mut ManagedBuffer> {
        let id = self.current?;
        self.buffers.get_mut(&id)
    }

    pub fn get(&self, id: BufferId) -> Option<&ManagedBuffer> {
        self.buffers.get(&id)
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut ManagedBuffer> {
        self.buffers.get_mut(&id)
    }

    pub fn has(&self, id: BufferId) -> bool {
        self.buffers.contains_key(&id)
    }

    /// Creation-ordered list of all live buffer ids.
    pub fn list(&self) -> &[BufferId] {
        &self.order
    }

    pub fn count(&self) -> usize {
        self.buffers.len()
    }

    pub fn count_named(&self) -> usize {
        self.buffers
            .values()
            .filter(|b| b.kind == BufferKind::Named)
            .count()
    }

    pub fn count_scratch(&self) -> usize {
        self.buffers
            .values()
            .filter(|b| b.kind == BufferKind::Scratch)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_current_selection() {
        let mut mgr = BufferManager::new(8);
        let a = mgr.create_named("a").unwrap();
        assert_eq!(mgr.current(), Some(a));
        let b = mgr.create_named("b").unwrap();
        assert_eq!(mgr.current(), Some(a), "current stays until switched");
        mgr.switch(b).unwrap();
        assert_eq!(mgr.current(), Some(b));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut mgr = BufferManager::new(8);
        mgr.create_named("dup").unwrap();
        let err = mgr.create_named("dup").unwrap_err();
        assert_eq!(err, BufferManagerError::BufferExists("dup".to_string()));
    }

    #[test]
    fn capacity_enforced() {
        let mut mgr = BufferManager::new(1);
        mgr.create_named("only").unwrap();
        let err = mgr.create_scratch().unwrap_err();
        assert_eq!(err, BufferManagerError::MaxBuffers);
    }

    #[test]
    fn delete_current_promotes_predecessor() {
        let mut mgr = BufferManager::new(8);
        let a = mgr.create_named("a").unwrap();
        let b = mgr.create_named("b").unwrap();
        let c = mgr.create_named("c").unwrap();
        mgr.switch(b).unwrap();
        mgr.delete(b).unwrap();
        assert_eq!(mgr.current(), Some(a));
        assert!(mgr.has(a));
        assert!(mgr.has(c));
    }

    #[test]
    fn delete_only_buffer_yields_nil_current() {
        let mut mgr = BufferManager::new(8);
        let a = mgr.create_named("solo").unwrap();
        mgr.delete(a).unwrap();
        assert_eq!(mgr.current(), None);
    }

    #[test]
    fn rename_scratch_promotes_to_named() {
        let mut mgr = BufferManager::new(8);
        let s = mgr.create_scratch().unwrap();
        assert_eq!(mgr.get(s).unwrap().kind, BufferKind::Scratch);
        mgr.rename(s, "promoted").unwrap();
        let buf = mgr.get(s).unwrap();
        assert_eq!(buf.kind, BufferKind::Named);
        assert_eq!(buf.name.as_deref(), Some("promoted"));
    }

    #[test]
    fn delete_by_name_and_switch_by_name() {
        let mut mgr = BufferManager::new(8);
        mgr.create_named("one").unwrap();
        mgr.switch_by_name("one").unwrap();
        mgr.delete_by_name("one").unwrap();
        assert_eq!(mgr.count(), 0);
        assert_eq!(
            mgr.switch_by_name("missing"),
            Err(BufferManagerError::NameNotFound("missing".to_string()))
        );
    }
}
