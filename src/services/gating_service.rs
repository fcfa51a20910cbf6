//! Per-learner module state machine.
//!
//! `locked -> available -> in_progress -> completed`. States are never stored;
//! they are folded from each module's progress on every read. The only cached
//! piece is `ModuleProgress::is_completed`, written by [`settle_module`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::course::Module;
use crate::models::module_progress::ModuleProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Locked,
    Available,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatingEvent {
    /// The previous module completed, or this is the first module.
    PredecessorCompleted,
    /// First slide view or quiz attempt.
    Engaged,
    /// All slides viewed and the quiz requirement met.
    CompletionCriteriaMet,
}

impl ModuleState {
    pub fn transition(self, event: GatingEvent) -> ModuleState {
        use GatingEvent::*;
        use ModuleState::*;
        match (self, event) {
            (Completed, _) => Completed,
            (Locked, PredecessorCompleted) => Available,
            (Locked, _) => Locked,
            (Available, Engaged) => InProgress,
            (Available | InProgress, CompletionCriteriaMet) => Completed,
            (state, _) => state,
        }
    }

    pub fn is_open(self) -> bool {
        self != ModuleState::Locked
    }
}

/// Completion criteria: every slide viewed and, when the quiz is required,
/// the quiz passed. Once cached as completed it stays completed. A module
/// with no slides and no required quiz never gets a progress row and counts
/// as completed as soon as it opens.
pub fn completion_satisfied(module: &Module, progress: Option<&ModuleProgress>) -> bool {
    match progress {
        Some(p) => {
            p.is_completed
                || (p.all_slides_viewed(module.total_slides)
                    && (p.quiz_passed || !module.requires_quiz()))
        }
        None => module.total_slides == 0 && !module.requires_quiz(),
    }
}

/// Recomputes the cached completion flag. Returns true when the module
/// completed with this call.
pub fn settle_module(module: &Module, progress: &mut ModuleProgress, now: DateTime<Utc>) -> bool {
    if progress.is_completed || !completion_satisfied(module, Some(progress)) {
        return false;
    }
    progress.is_completed = true;
    progress.completed_at.get_or_insert(now);
    true
}

/// Derives every module's state in course order. `progress` is keyed by
/// module id.
pub fn derive_states(modules: &[Module], progress: &HashMap<Uuid, ModuleProgress>) -> Vec<ModuleState> {
    let mut states = Vec::with_capacity(modules.len());
    let mut predecessor_completed = true;

    for module in modules {
        let entry = progress.get(&module.id);
        let mut state = ModuleState::Locked;
        if predecessor_completed {
            state = state.transition(GatingEvent::PredecessorCompleted);
        }
        if entry.is_some() {
            state = state.transition(GatingEvent::Engaged);
        }
        if completion_satisfied(module, entry) {
            state = state.transition(GatingEvent::CompletionCriteriaMet);
        }
        predecessor_completed = state == ModuleState::Completed;
        states.push(state);
    }

    states
}
