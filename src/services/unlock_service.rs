use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::course::Module;
use crate::models::enrollment::Enrollment;
use crate::models::module_progress::ModuleProgress;
use crate::services::gating_service;

/// Which module quizzes gate the final exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockPolicy {
    /// Every module with a quiz, required or optional.
    #[default]
    AllQuizzes,
    /// Only modules whose quiz is required for completion.
    RequiredQuizzesOnly,
}

impl UnlockPolicy {
    fn gates(self, module: &Module) -> bool {
        match self {
            UnlockPolicy::AllQuizzes => module.has_quiz,
            UnlockPolicy::RequiredQuizzesOnly => module.requires_quiz(),
        }
    }
}

impl FromStr for UnlockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all_quizzes" | "all" => Ok(UnlockPolicy::AllQuizzes),
            "required_quizzes" | "required" => Ok(UnlockPolicy::RequiredQuizzesOnly),
            other => Err(format!("unknown unlock policy '{}'", other)),
        }
    }
}

impl fmt::Display for UnlockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockPolicy::AllQuizzes => write!(f, "all_quizzes"),
            UnlockPolicy::RequiredQuizzesOnly => write!(f, "required_quizzes"),
        }
    }
}

/// The unlock predicate shared by the quiz-pass path and the lazy repair at
/// exam access. With no gating quiz in the course, every module must be
/// completed instead.
pub fn unlock_condition_met(
    modules: &[Module],
    progress: &HashMap<Uuid, ModuleProgress>,
    policy: UnlockPolicy,
) -> bool {
    let mut gating = modules.iter().filter(|m| policy.gates(m)).peekable();
    if gating.peek().is_none() {
        return !modules.is_empty()
            && modules
                .iter()
                .all(|m| gating_service::completion_satisfied(m, progress.get(&m.id)));
    }
    gating.all(|m| progress.get(&m.id).is_some_and(|p| p.quiz_passed))
}

/// Sets `final_exam_unlocked` when the predicate holds. Returns true only
/// on the false -> true edge; never relocks.
pub fn apply_unlock(
    enrollment: &mut Enrollment,
    modules: &[Module],
    progress: &HashMap<Uuid, ModuleProgress>,
    policy: UnlockPolicy,
) -> bool {
    if enrollment.final_exam_unlocked || !unlock_condition_met(modules, progress, policy) {
        return false;
    }
    enrollment.final_exam_unlocked = true;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct Fixture {
        enrollment: Enrollment,
        modules: Vec<Module>,
        progress: HashMap<Uuid, ModuleProgress>,
    }

    impl Fixture {
        fn new() -> Self {
            let course_id = Uuid::new_v4();
            Self {
                enrollment: Enrollment::new(Uuid::new_v4(), course_id, Utc::now()),
                modules: vec![
                    Module::new(course_id, 1, 1),
                    Module::new(course_id, 2, 1).with_quiz(true, 70, None),
                    Module::new(course_id, 3, 1).with_quiz(false, 70, None),
                    Module::new(course_id, 4, 1).with_quiz(true, 70, None),
                ],
                progress: HashMap::new(),
            }
        }

        fn pass_quiz(&mut self, idx: usize) {
            let module = &self.modules[idx];
            let entry = self
                .progress
                .entry(module.id)
                .or_insert_with(|| ModuleProgress::new(&self.enrollment, module, Utc::now()));
            entry.quiz_passed = true;
        }
    }

    #[test]
    fn all_quizzes_policy_waits_for_optional_quiz() {
        let mut f = Fixture::new();
        f.pass_quiz(1);
        f.pass_quiz(3);
        assert!(!unlock_condition_met(&f.modules, &f.progress, UnlockPolicy::AllQuizzes));
        assert!(unlock_condition_met(&f.modules, &f.progress, UnlockPolicy::RequiredQuizzesOnly));
        f.pass_quiz(2);
        assert!(unlock_condition_met(&f.modules, &f.progress, UnlockPolicy::AllQuizzes));
    }

    #[test]
    fn unlock_is_order_independent() {
        for order in [[1, 2, 3], [3, 1, 2], [2, 3, 1]] {
            let mut f = Fixture::new();
            for (step, idx) in order.iter().enumerate() {
                f.pass_quiz(*idx);
                let unlocked = apply_unlock(
                    &mut f.enrollment,
                    &f.modules,
                    &f.progress,
                    UnlockPolicy::AllQuizzes,
                );
                assert_eq!(unlocked, step == order.len() - 1);
            }
            assert!(f.enrollment.final_exam_unlocked);
        }
    }

    #[test]
    fn unlock_never_reverts() {
        let mut f = Fixture::new();
        f.enrollment.final_exam_unlocked = true;
        assert!(!apply_unlock(&mut f.enrollment, &f.modules, &f.progress, UnlockPolicy::AllQuizzes));
        assert!(f.enrollment.final_exam_unlocked);
    }

    #[test]
    fn quizless_course_unlocks_on_full_completion() {
        let course_id = Uuid::new_v4();
        let enrollment = Enrollment::new(Uuid::new_v4(), course_id, Utc::now());
        let modules = vec![Module::new(course_id, 1, 1)];
        let mut progress = HashMap::new();
        assert!(!unlock_condition_met(&modules, &progress, UnlockPolicy::AllQuizzes));

        let mut p = ModuleProgress::new(&enrollment, &modules[0], Utc::now());
        p.is_completed = true;
        progress.insert(modules[0].id, p);
        assert!(unlock_condition_met(&modules, &progress, UnlockPolicy::AllQuizzes));
    }

    #[test]
    fn policy_parses_from_config_values() {
        assert_eq!("all_quizzes".parse::<UnlockPolicy>(), Ok(UnlockPolicy::AllQuizzes));
        assert_eq!(
            "Required_Quizzes".parse::<UnlockPolicy>(),
            Ok(UnlockPolicy::RequiredQuizzesOnly)
        );
        assert!("sometimes".parse::<UnlockPolicy>().is_err());
    }
}
