use std::fmt;

use thiserror::Error;

/// Orchestrator states a request moves through before it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStage {
    Validating,
    EnsuringRoom,
    AwaitingExclusiveSection,
    Scanning,
    Evaluating,
    Reconciling,
    IssuingCredential,
}

impl AdmissionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::EnsuringRoom => "ensuring_room",
            Self::AwaitingExclusiveSection => "awaiting_exclusive_section",
            Self::Scanning => "scanning",
            Self::Evaluating => "evaluating",
            Self::Reconciling => "reconciling",
            Self::IssuingCredential => "issuing_credential",
        }
    }
}

impl fmt::Display for AdmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("collaborator failure while {stage}: {source:#}")]
    Collaborator {
        stage: AdmissionStage,
        source: anyhow::Error,
    },
}

impl AdmissionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn collaborator(stage: AdmissionStage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Collaborator { stage, source }
    }

    pub fn stage(&self) -> AdmissionStage {
        match self {
            Self::InvalidRequest(_) => AdmissionStage::Validating,
            Self::Collaborator { stage, .. } => *stage,
        }
    }
}
