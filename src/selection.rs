use std::sync::Arc;

use crate::error::InvalidSelectionError;
use crate::models::ModuleCatalog;

/// Current module choice for one session. Only catalog members are ever held.
#[derive(Debug, Clone)]
pub struct SelectionController {
    catalog: Arc<ModuleCatalog>,
    current: String,
}

impl SelectionController {
    pub fn new(catalog: Arc<ModuleCatalog>, initial: &str) -> Result<Self, InvalidSelectionError> {
        if !catalog.contains(initial) {
            return Err(InvalidSelectionError {
                module: initial.to_string(),
            });
        }
        Ok(Self {
            catalog,
            current: initial.to_string(),
        })
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Switches to `module`. On error the previous selection is kept.
    pub fn set_selection(&mut self, module: &str) -> Result<(), InvalidSelectionError> {
        if !self.catalog.contains(module) {
            return Err(InvalidSelectionError {
                module: module.to_string(),
            });
        }
        self.current = module.to_string();
        Ok(())
    }
}
