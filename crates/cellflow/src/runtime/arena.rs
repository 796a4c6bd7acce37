/// Generational index into the arena.
/// Allows safe reuse of slots with use-after-free detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SlotId {
    pub index: u32,
    pub generation: u32,
}

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage for runtime variables.
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free_list: Vec<u32>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn alloc(&mut self, value: T) -> SlotId {
        if let Some(index) = self.free_list.pop() {
            let entry = &mut self.entries[index as usize];
            entry.value = Some(value);
            SlotId {
                index,
                generation: entry.generation,
            }
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Entry {
                generation: 0,
                value: Some(value),
            });
            SlotId {
                index,
                generation: 0,
            }
        }
    }

    /// Frees a slot, bumping its generation so stale ids stop resolving.
    pub fn free(&mut self, slot: SlotId) -> Option<T> {
        if !self.is_valid(slot) {
            return None;
        }
        let entry = &mut self.entries[slot.index as usize];
        entry.generation += 1;
        self.free_list.push(slot.index);
        entry.value.take()
    }

    pub fn is_valid(&self, slot: SlotId) -> bool {
        self.entries
            .get(slot.index as usize)
            .is_some_and(|entry| entry.generation == slot.generation && entry.value.is_some())
    }

    pub fn get(&self, slot: SlotId) -> Option<&T> {
        self.entries
            .get(slot.index as usize)
            .filter(|entry| entry.generation == slot.generation)
            .and_then(|entry| entry.value.as_ref())
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut T> {
        self.entries
            .get_mut(slot.index as usize)
            .filter(|entry| entry.generation == slot.generation)
            .and_then(|entry| entry.value.as_mut())
    }

    /// Live slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            let value = entry.value.as_ref()?;
            Some((
                SlotId {
                    index: index as u32,
                    generation: entry.generation,
                },
                value,
            ))
        })
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.entries.len() - self.free_list.len()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
