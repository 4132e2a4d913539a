//! Apply state machine.
//!
//! Walks the ordered component list one step per call, pushing each desired
//! object into the cluster. A failing step does not advance the cursor, so
//! the failing component is the first thing retried on the next pass.

use crate::error::ControllerError;
use crate::manifests::Component;
use crate::store::ResourceStore;
use tracing::debug;

/// Steppable application of an ordered component list.
///
/// Constructed fresh for every reconciliation pass; the cursor is not
/// persisted across passes. Invariant: `0 <= cursor <= components.len()`,
/// with equality on the right meaning the pass is complete.
#[derive(Debug)]
pub struct ApplyStateMachine {
    components: Vec<Component>,
    cursor: usize,
}

impl ApplyStateMachine {
    /// Creates a machine positioned at the first component.
    pub fn new(components: Vec<Component>) -> Self {
        Self {
            components,
            cursor: 0,
        }
    }

    /// Applies the component under the cursor and advances.
    ///
    /// On failure the cursor stays put and the error carries the failing
    /// component's kind and name. Stepping a complete machine is a no-op.
    pub async fn step<S: ResourceStore>(&mut self, store: &S) -> Result<(), ControllerError> {
        let Some(component) = self.components.get(self.cursor) else {
            return Ok(());
        };

        debug!(
            "Applying component {}/{}: {} {}",
            self.cursor + 1,
            self.components.len(),
            component.kind(),
            component.name()
        );
        component
            .apply(store)
            .await
            .map_err(|source| ControllerError::Apply {
                kind: component.kind(),
                name: component.name(),
                source,
            })?;

        self.cursor += 1;
        Ok(())
    }

    /// True once every component has been applied.
    pub fn last(&self) -> bool {
        self.cursor == self.components.len()
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The component list the machine was built from.
    pub fn components(&self) -> &[Component] {
        &self.components
    }
}
