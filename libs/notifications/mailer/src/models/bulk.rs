//! Several messages sent in one API call.

use super::param::Param;

/// Optional shared part plus one [`Param`] per message.
///
/// The global part and the items are independent; both are emitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bulk {
    global: Option<Param>,
    items: Vec<Param>,
}

impl Bulk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global(&mut self, param: Param) {
        self.global = Some(param);
    }

    pub fn global(&self) -> Option<&Param> {
        self.global.as_ref()
    }

    pub fn global_mut(&mut self) -> Option<&mut Param> {
        self.global.as_mut()
    }

    pub fn add_item(&mut self, param: Param) {
        self.items.push(param);
    }

    pub fn items(&self) -> &[Param] {
        &self.items
    }

    /// Drop the items, and the global part unless `keep_global`.
    pub fn clear(&mut self, keep_global: bool) {
        self.items.clear();
        if !keep_global {
            self.global = None;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.items.is_empty()
    }
}
