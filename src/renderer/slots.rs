//! Per-batch texture slot table.

use std::rc::Rc;

/// Texture units available to one batch.
pub const TEXTURE_SLOT_COUNT: usize = 16;

/// Slot reserved for the blank white texture used by untextured quads.
pub const BLANK_SLOT: usize = 0;

/// Maps texture identity to the texture unit it occupies in the current batch.
///
/// Slot 0 always holds the blank texture, so a fresh table has one occupied
/// slot. Textures are compared by `Rc` pointer identity, never by value.
pub struct TextureSlots<T> {
    slots: [Option<Rc<T>>; TEXTURE_SLOT_COUNT],
    count: usize,
}

impl<T> TextureSlots<T> {
    pub fn new(blank: Rc<T>) -> Self {
        let mut slots: [Option<Rc<T>>; TEXTURE_SLOT_COUNT] = Default::default();
        slots[BLANK_SLOT] = Some(blank);
        Self { slots, count: 1 }
    }

    /// Resolves `texture` to a slot index, claiming a new slot if needed.
    ///
    /// `None` resolves to [`BLANK_SLOT`]. Returns `None` only when the texture
    /// is not in the table and every slot is taken.
    pub fn slot(&mut self, texture: Option<&Rc<T>>) -> Option<usize> {
        let Some(texture) = texture else {
            return Some(BLANK_SLOT);
        };

        for index in (BLANK_SLOT + 1)..self.count {
            match &self.slots[index] {
                Some(bound) if Rc::ptr_eq(bound, texture) => return Some(index),
                Some(_) => (),
                None => {
                    self.slots[index] = Some(Rc::clone(texture));
                    return Some(index);
                }
            }
        }

        if self.is_full() {
            return None;
        }
        let index = self.count;
        self.slots[index] = Some(Rc::clone(texture));
        self.count += 1;
        log::trace!("texture claimed slot {index}");
        Some(index)
    }

    /// Occupied slots, starting with the blank texture.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count >= TEXTURE_SLOT_COUNT
    }

    /// The occupied prefix of the table, in texture-unit order.
    pub fn occupied(&self) -> &[Option<Rc<T>>] {
        &self.slots[..self.count]
    }

    pub fn get(&self, index: usize) -> Option<&Rc<T>> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Releases every texture except the blank one.
    pub fn reset(&mut self) {
        for slot in &mut self.slots[(BLANK_SLOT + 1)..] {
            *slot = None;
        }
        self.count = 1;
    }
}
