use super::{Diagnosis, StepReport, VerificationOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub id: Uuid,
    pub event_type: DiagnosticEventType,
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub payload: EventPayload,
}

impl DiagnosticEvent {
    pub fn new(event_type: DiagnosticEventType, run_id: Uuid, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            run_id,
            payload,
        }
    }

    pub fn scope_resolved(run_id: Uuid, namespaces: Vec<String>) -> Self {
        Self::new(
            DiagnosticEventType::ScopeResolved,
            run_id,
            EventPayload::ScopeResolved(ScopeResolvedPayload { namespaces }),
        )
    }

    pub fn namespace_diagnosed(run_id: Uuid, diagnosis: &Diagnosis) -> Self {
        Self::new(
            DiagnosticEventType::NamespaceDiagnosed,
            run_id,
            EventPayload::NamespaceDiagnosed(NamespaceDiagnosedPayload {
                namespace: diagnosis.namespace().to_string(),
                blocker_count: diagnosis.blockers.len(),
                notes: diagnosis.notes.clone(),
            }),
        )
    }

    pub fn step_finished(run_id: Uuid, report: StepReport) -> Self {
        Self::new(
            DiagnosticEventType::StepFinished,
            run_id,
            EventPayload::StepFinished(report),
        )
    }

    pub fn namespace_verified(
        run_id: Uuid,
        namespace: String,
        outcome: VerificationOutcome,
    ) -> Self {
        Self::new(
            DiagnosticEventType::NamespaceVerified,
            run_id,
            EventPayload::NamespaceVerified(NamespaceVerifiedPayload { namespace, outcome }),
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiagnosticEventType {
    ScopeResolved,
    NamespaceDiagnosed,
    StepFinished,
    NamespaceVerified,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EventPayload {
    ScopeResolved(ScopeResolvedPayload),
    NamespaceDiagnosed(NamespaceDiagnosedPayload),
    StepFinished(StepReport),
    NamespaceVerified(NamespaceVerifiedPayload),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScopeResolvedPayload {
    pub namespaces: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamespaceDiagnosedPayload {
    pub namespace: String,
    pub blocker_count: usize,
    pub notes: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamespaceVerifiedPayload {
    pub namespace: String,
    pub outcome: VerificationOutcome,
}
