//! Tutorial step tracker: three guided steps, each with its own input
//! precondition.

use crate::error::TutorialError;

use super::stage::Stage;
use super::state::OnboardingState;

/// Background styles offered in the style-picking step.
pub const BACKGROUND_STYLES: [&str; 5] = ["minimal", "gradient", "natural", "studio", "vintage"];

/// What a step needs before it may be marked complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRequirement {
    /// A non-blank project name.
    ProjectName,
    /// One of [`BACKGROUND_STYLES`].
    BackgroundStyle,
    /// A non-blank reference to the uploaded image.
    ImageUpload,
}

impl StepRequirement {
    fn check(&self, step: u32, input: &str) -> Result<(), TutorialError> {
        let input = input.trim();
        match self {
            Self::ProjectName if input.is_empty() => Err(TutorialError::InputRequired {
                step,
                hint: "enter a project name".into(),
            }),
            Self::ImageUpload if input.is_empty() => Err(TutorialError::InputRequired {
                step,
                hint: "choose an image to upload".into(),
            }),
            Self::BackgroundStyle if input.is_empty() => Err(TutorialError::InputRequired {
                step,
                hint: "pick a background style".into(),
            }),
            Self::BackgroundStyle if !BACKGROUND_STYLES.contains(&input) => {
                Err(TutorialError::UnknownStyle {
                    style: input.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// One guided step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorialStep {
    pub number: u32,
    pub title: &'static str,
    pub requirement: StepRequirement,
}

/// Tracks the guided tutorial. Steps are numbered from 1.
#[derive(Debug, Clone)]
pub struct TutorialTracker {
    steps: Vec<TutorialStep>,
}

impl Default for TutorialTracker {
    fn default() -> Self {
        Self {
            steps: vec![
                TutorialStep {
                    number: 1,
                    title: "Create a project",
                    requirement: StepRequirement::ProjectName,
                },
                TutorialStep {
                    number: 2,
                    title: "Pick a background style",
                    requirement: StepRequirement::BackgroundStyle,
                },
                TutorialStep {
                    number: 3,
                    title: "Upload a product image",
                    requirement: StepRequirement::ImageUpload,
                },
            ],
        }
    }
}

impl TutorialTracker {
    /// Number of steps (N).
    pub fn len(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn steps(&self) -> &[TutorialStep] {
        &self.steps
    }

    /// Mark `step` complete once its input precondition holds.
    ///
    /// Returns `Ok(false)` when the step was already complete; its input is
    /// no longer consulted. Steps may be completed in any order. Completing
    /// step `k < N` moves the current step to `k + 1`.
    pub fn complete_step(
        &self,
        state: &mut OnboardingState,
        step: u32,
        input: &str,
    ) -> Result<bool, TutorialError> {
        let max = self.len();
        let def = step
            .checked_sub(1)
            .and_then(|i| self.steps.get(i as usize))
            .ok_or(TutorialError::StepOutOfRange { step, max })?;

        if state.completed_steps.contains(&step) {
            return Ok(false);
        }
        def.requirement.check(step, input)?;

        state.completed_steps.insert(step);
        if step < max {
            state.update_tutorial_step(step + 1);
        }
        Ok(true)
    }

    /// Mark every step complete when a backend record shows the tutorial
    /// was finished: the last step reached and the dashboard entered.
    ///
    /// Returns whether anything changed. Earlier partial progress can't be
    /// recovered this way; the backend only stores the current step.
    pub fn restore_finished(&self, state: &mut OnboardingState) -> bool {
        let max = self.len();
        let finished = max > 0
            && state.current_stage == Stage::Dashboard
            && state.tutorial_step >= max;
        if !finished {
            return false;
        }
        let before = state.completed_steps.len();
        state.completed_steps.extend(1..=max);
        state.completed_steps.len() != before
    }

    pub fn is_step_complete(&self, state: &OnboardingState, step: u32) -> bool {
        state.completed_steps.contains(&step)
    }

    pub fn is_tutorial_complete(&self, state: &OnboardingState) -> bool {
        (1..=self.len()).all(|s| state.completed_steps.contains(&s))
    }

    /// The step currently in focus, never below 1.
    pub fn current_step(&self, state: &OnboardingState) -> u32 {
        state.tutorial_step.clamp(1, self.len().max(1))
    }

    /// Percentage of steps completed.
    pub fn progress(&self, state: &OnboardingState) -> f64 {
        let total = self.len();
        if total == 0 {
            return 0.0;
        }
        let done = (1..=total).filter(|s| state.completed_steps.contains(s)).count();
        (done as f64 / total as f64) * 100.0
    }
}
