//! Client-side edit lifecycle for a draft that is eventually saved through an
//! anchored write. The state carries the draft, so an edit can never be lost
//! between a failed save and a retry.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EditState<D> {
    Idle,
    Editing { draft: D },
    Saving { draft: D },
    Failed { draft: D, message: String },
}

impl<D> EditState<D> {
    pub fn name(&self) -> &'static str {
        match self {
            EditState::Idle => "idle",
            EditState::Editing { .. } => "editing",
            EditState::Saving { .. } => "saving",
            EditState::Failed { .. } => "failed",
        }
    }

    pub fn draft(&self) -> Option<&D> {
        match self {
            EditState::Idle => None,
            EditState::Editing { draft }
            | EditState::Saving { draft }
            | EditState::Failed { draft, .. } => Some(draft),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} while {state}")]
pub struct TransitionError {
    pub action: &'static str,
    pub state: &'static str,
}

/// Tagged state machine: Idle → Editing → Saving → Idle, with Saving → Failed
/// and Failed → Saving (retry) or Editing (edit). A rejected transition leaves
/// the state untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditSession<D> {
    state: EditState<D>,
}

impl<D> Default for EditSession<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> EditSession<D> {
    pub fn new() -> Self {
        Self {
            state: EditState::Idle,
        }
    }

    pub fn state(&self) -> &EditState<D> {
        &self.state
    }

    pub fn begin(&mut self, draft: D) -> Result<(), TransitionError> {
        match self.state {
            EditState::Idle => {
                self.state = EditState::Editing { draft };
                Ok(())
            }
            _ => Err(self.reject("begin")),
        }
    }

    /// Apply `f` to the draft. Allowed while editing, or after a failed save
    /// (which returns the session to editing).
    pub fn edit(&mut self, f: impl FnOnce(&mut D)) -> Result<(), TransitionError> {
        match std::mem::replace(&mut self.state, EditState::Idle) {
            EditState::Editing { mut draft } | EditState::Failed { mut draft, .. } => {
                f(&mut draft);
                self.state = EditState::Editing { draft };
                Ok(())
            }
            other => {
                self.state = other;
                Err(self.reject("edit"))
            }
        }
    }

    /// Move to Saving and hand back the draft to persist.
    pub fn start_save(&mut self) -> Result<&D, TransitionError> {
        match std::mem::replace(&mut self.state, EditState::Idle) {
            EditState::Editing { draft } => {
                self.state = EditState::Saving { draft };
            }
            other => {
                self.state = other;
                return Err(self.reject("save"));
            }
        }
        match &self.state {
            EditState::Saving { draft } => Ok(draft),
            _ => Err(self.reject("save")),
        }
    }

    /// Save succeeded: the draft is returned and the session goes idle.
    pub fn finish_saved(&mut self) -> Result<D, TransitionError> {
        match std::mem::replace(&mut self.state, EditState::Idle) {
            EditState::Saving { draft } => Ok(draft),
            other => {
                self.state = other;
                Err(self.reject("finish a save"))
            }
        }
    }

    pub fn finish_failed(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        match std::mem::replace(&mut self.state, EditState::Idle) {
            EditState::Saving { draft } => {
                self.state = EditState::Failed {
                    draft,
                    message: message.into(),
                };
                Ok(())
            }
            other => {
                self.state = other;
                Err(self.reject("fail a save"))
            }
        }
    }

    /// Retry a failed save with the same draft.
    pub fn retry(&mut self) -> Result<&D, TransitionError> {
        match std::mem::replace(&mut self.state, EditState::Idle) {
            EditState::Failed { draft, .. } => {
                self.state = EditState::Saving { draft };
            }
            other => {
                self.state = other;
                return Err(self.reject("retry"));
            }
        }
        match &self.state {
            EditState::Saving { draft } => Ok(draft),
            _ => Err(self.reject("retry")),
        }
    }

    /// Drop the draft. Not allowed mid-save.
    pub fn cancel(&mut self) -> Result<Option<D>, TransitionError> {
        match std::mem::replace(&mut self.state, EditState::Idle) {
            EditState::Idle => Ok(None),
            EditState::Editing { draft } | EditState::Failed { draft, .. } => Ok(Some(draft)),
            saving @ EditState::Saving { .. } => {
                self.state = saving;
                Err(self.reject("cancel"))
            }
        }
    }

    fn reject(&self, action: &'static str) -> TransitionError {
        TransitionError {
            action,
            state: self.state.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_returns_to_idle() {
        let mut s = EditSession::new();
        s.begin("v1".to_string()).unwrap();
        s.edit(|d| d.push_str("+x")).unwrap();
        assert_eq!(s.start_save().unwrap(), "v1+x");
        assert_eq!(s.finish_saved().unwrap(), "v1+x");
        assert_eq!(s.state(), &EditState::Idle);
    }

    #[test]
    fn failed_save_keeps_draft_for_retry() {
        let mut s = EditSession::new();
        s.begin(1u32).unwrap();
        s.start_save().unwrap();
        s.finish_failed("storage unavailable").unwrap();
        assert_eq!(
            s.state(),
            &EditState::Failed {
                draft: 1,
                message: "storage unavailable".to_string()
            }
        );
        assert_eq!(*s.retry().unwrap(), 1);
        assert_eq!(s.state().name(), "saving");
    }

    #[test]
    fn edit_after_failure_resumes_editing() {
        let mut s = EditSession::new();
        s.begin(1u32).unwrap();
        s.start_save().unwrap();
        s.finish_failed("x").unwrap();
        s.edit(|d| *d += 1).unwrap();
        assert_eq!(s.state(), &EditState::Editing { draft: 2 });
    }

    #[test]
    fn invalid_transitions_leave_state_alone() {
        let mut s: EditSession<u32> = EditSession::new();
        let err = s.start_save().unwrap_err();
        assert_eq!(err.state, "idle");
        assert!(s.finish_saved().is_err());
        assert!(s.retry().is_err());

        s.begin(5).unwrap();
        assert!(s.begin(6).is_err());
        s.start_save().unwrap();
        assert!(s.edit(|d| *d = 0).is_err());
        assert!(s.cancel().is_err());
        assert_eq!(s.state(), &EditState::Saving { draft: 5 });
    }

    #[test]
    fn cancel_drops_draft() {
        let mut s = EditSession::new();
        s.begin("d").unwrap();
        assert_eq!(s.cancel().unwrap(), Some("d"));
        assert_eq!(s.state(), &EditState::Idle);
    }
}
