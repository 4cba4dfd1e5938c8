//! The decision channel the resolver consults when several builders could
//! produce one image.

use pipegen_core::{BuilderArtifact, InitError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Answer to one ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Index into the candidate slice
    Builder(usize),
    /// Leave the image without a builder
    Skip,
}

pub trait Interaction: Send {
    /// False when nobody can answer, e.g. stdin is not a terminal.
    fn is_available(&self) -> bool;

    /// Candidates arrive sorted by descriptor path.
    fn choose(&mut self, image: &str, candidates: &[&BuilderArtifact])
        -> Result<Choice, InitError>;
}

/// Headless runs: ambiguities fall back to the deterministic rule.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInteraction;

impl Interaction for NoInteraction {
    fn is_available(&self) -> bool {
        false
    }

    fn choose(
        &mut self,
        image: &str,
        _candidates: &[&BuilderArtifact],
    ) -> Result<Choice, InitError> {
        Err(InitError::AmbiguityUnresolved {
            image: image.to_string(),
        })
    }
}

/// Pre-recorded answers, consumed in order. Every question asked is kept in
/// a transcript shared with the creator.
#[derive(Debug, Default)]
pub struct ScriptedInteraction {
    answers: VecDeque<Choice>,
    transcript: Arc<Mutex<Vec<String>>>,
}

impl ScriptedInteraction {
    pub fn new(answers: impl IntoIterator<Item = Choice>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            transcript: Arc::default(),
        }
    }

    pub fn transcript(&self) -> Arc<Mutex<Vec<String>>> {
        self.transcript.clone()
    }
}

impl Interaction for ScriptedInteraction {
    fn is_available(&self) -> bool {
        true
    }

    fn choose(
        &mut self,
        image: &str,
        candidates: &[&BuilderArtifact],
    ) -> Result<Choice, InitError> {
        let paths: Vec<String> = candidates
            .iter()
            .map(|c| c.path.display().to_string())
            .collect();
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{}: {}", image, paths.join(", ")));

        match self.answers.pop_front() {
            Some(Choice::Builder(idx)) if idx >= candidates.len() => {
                Err(InitError::Internal(anyhow::anyhow!(
                    "Choice {} out of range for {} candidates",
                    idx,
                    candidates.len()
                )))
            }
            Some(choice) => Ok(choice),
            None => Err(InitError::AmbiguityUnresolved {
                image: image.to_string(),
            }),
        }
    }
}
