//! In-memory candidate registry.
//!
//! Candidates are kept in registration order; re-registering an id
//! replaces the entry in place.

use std::collections::HashMap;
use strata_core::{Candidate, CandidateRegistry};

#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    candidates: Vec<Candidate>,
    index: HashMap<String, usize>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate, replacing any with the same id.
    pub fn register(&mut self, candidate: Candidate) {
        match self.index.get(&candidate.id) {
            Some(&i) => self.candidates[i] = candidate,
            None => {
                self.index
                    .insert(candidate.id.clone(), self.candidates.len());
                self.candidates.push(candidate);
            }
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, candidate: Candidate) -> Self {
        self.register(candidate);
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl CandidateRegistry for StaticRegistry {
    fn get(&self, id: &str) -> Option<Candidate> {
        self.index.get(id).map(|&i| self.candidates[i].clone())
    }

    fn by_provider(&self, provider: &str) -> Vec<Candidate> {
        self.candidates
            .iter()
            .filter(|c| c.provider == provider)
            .cloned()
            .collect()
    }

    fn all(&self) -> Vec<Candidate> {
        self.candidates.clone()
    }
}
