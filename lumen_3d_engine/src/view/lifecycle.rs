/// Render view lifecycle: `Created -> Configured -> Updated -> Drawn -> (Updated ...) -> Destroyed`.

use std::fmt;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    /// Built, targets not set yet
    Created,
    /// Targets set
    Configured,
    /// `update` ran this frame
    Updated,
    /// `draw` ran this frame
    Drawn,
    Destroyed,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewState::Created => "created",
            ViewState::Configured => "configured",
            ViewState::Updated => "updated",
            ViewState::Drawn => "drawn",
            ViewState::Destroyed => "destroyed",
        };
        write!(f, "{}", name)
    }
}

/// State machine shared by every view kind
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    view: &'static str,
    state: ViewState,
}

impl Lifecycle {
    pub(crate) fn new(view: &'static str) -> Self {
        Self { view, state: ViewState::Created }
    }

    pub(crate) fn state(&self) -> ViewState {
        self.state
    }

    fn check_alive(&self, operation: &str) -> Result<()> {
        if self.state == ViewState::Destroyed {
            return Err(Error::InvalidOperation(format!(
                "{} on a destroyed {} view", operation, self.view
            )));
        }
        Ok(())
    }

    /// Fails unless targets have been set and the view is alive
    pub(crate) fn require_configured(&self, operation: &str) -> Result<()> {
        self.check_alive(operation)?;
        if self.state == ViewState::Created {
            return Err(Error::UnconfiguredView(format!(
                "{} before set_targets on a {} view", operation, self.view
            )));
        }
        Ok(())
    }

    /// `set_targets`: any live state -> Configured
    pub(crate) fn configure(&mut self) -> Result<()> {
        self.check_alive("set_targets")?;
        self.state = ViewState::Configured;
        Ok(())
    }

    pub(crate) fn updated(&mut self) -> Result<()> {
        self.require_configured("update")?;
        self.state = ViewState::Updated;
        Ok(())
    }

    pub(crate) fn drawn(&mut self) -> Result<()> {
        self.require_configured("draw")?;
        self.state = ViewState::Drawn;
        Ok(())
    }

    pub(crate) fn destroy(&mut self) -> Result<()> {
        self.check_alive("destroy")?;
        self.state = ViewState::Destroyed;
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
