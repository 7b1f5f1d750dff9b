//! Cross-entity reference propagation
//!
//! Bill creation attaches the bill id to the clinical records it covers;
//! deletion detaches it. The underlying records belong to other
//! subsystems, so every propagation step is an independent single-document
//! write. The fan-out is deliberately not pretended to be atomic: each
//! target's outcome is reported, and [`Propagator::detach_dangling`] plus
//! re-running [`Propagator::attach`] give an idempotent reconciliation
//! path driven by the intent recorded on the bill itself.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use core_kernel::{AppointmentId, BillId, LabTestId, PatientId, PrescriptionId, StoreError};

use crate::ports::LinkStore;

/// One record that holds (or should hold) a reference to a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LinkTarget {
    Appointment(AppointmentId),
    LabTest(LabTestId),
    Prescription(PrescriptionId),
    Patient(PatientId),
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkTarget::Appointment(id) => write!(f, "appointment {id}"),
            LinkTarget::LabTest(id) => write!(f, "lab test {id}"),
            LinkTarget::Prescription(id) => write!(f, "prescription {id}"),
            LinkTarget::Patient(id) => write!(f, "patient {id}"),
        }
    }
}

/// The links recorded on a bill: the propagation intent
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSet {
    pub patient: PatientId,
    pub appointment: Option<AppointmentId>,
    pub lab_tests: Vec<LabTestId>,
    pub prescriptions: Vec<PrescriptionId>,
}

impl LinkSet {
    /// All targets, the patient's bill set included
    pub fn targets(&self) -> Vec<LinkTarget> {
        let mut targets = Vec::with_capacity(
            2 + self.lab_tests.len() + self.prescriptions.len(),
        );
        if let Some(appointment) = self.appointment {
            targets.push(LinkTarget::Appointment(appointment));
        }
        targets.extend(self.lab_tests.iter().copied().map(LinkTarget::LabTest));
        targets.extend(
            self.prescriptions
                .iter()
                .copied()
                .map(LinkTarget::Prescription),
        );
        targets.push(LinkTarget::Patient(self.patient));
        targets
    }
}

/// A propagation step that did not apply
#[derive(Debug, Clone, Serialize)]
pub struct LinkFailure {
    pub target: LinkTarget,
    pub reason: String,
}

/// Per-target outcome of a propagation fan-out
#[derive(Debug, Clone, Default, Serialize)]
pub struct PropagationReport {
    pub applied: Vec<LinkTarget>,
    pub failed: Vec<LinkFailure>,
}

impl PropagationReport {
    /// True when every target was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, target: LinkTarget, outcome: Result<(), StoreError>) {
        match outcome {
            Ok(()) => self.applied.push(target),
            Err(err) => {
                warn!(%target, error = %err, "bill link propagation step failed");
                self.failed.push(LinkFailure {
                    target,
                    reason: err.to_string(),
                });
            }
        }
    }
}

/// Synchronizes bill references into the linked clinical records
#[derive(Clone)]
pub struct Propagator {
    links: Arc<dyn LinkStore>,
}

impl Propagator {
    pub fn new(links: Arc<dyn LinkStore>) -> Self {
        Self { links }
    }

    /// Sets the bill reference on every target in the bill's link set.
    ///
    /// Targets are disjoint documents, so the writes run concurrently.
    /// Idempotent: re-attaching an already-linked target is a no-op write.
    pub async fn attach(&self, bill: BillId, links: &LinkSet) -> PropagationReport {
        self.fan_out(bill, links.targets(), Op::Attach).await
    }

    /// Clears the bill reference from every target in the link set
    pub async fn detach(&self, bill: BillId, links: &LinkSet) -> PropagationReport {
        self.fan_out(bill, links.targets(), Op::Detach).await
    }

    /// Clears any reference still pointing at a bill that no longer
    /// exists; used to reconcile after an incomplete detach
    pub async fn detach_dangling(&self, bill: BillId) -> Result<PropagationReport, StoreError> {
        let targets = self.links.referencing(bill).await?;
        Ok(self.fan_out(bill, targets, Op::Detach).await)
    }

    async fn fan_out(
        &self,
        bill: BillId,
        targets: Vec<LinkTarget>,
        op: Op,
    ) -> PropagationReport {
        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let links = Arc::clone(&self.links);
            handles.push((
                target,
                tokio::spawn(async move {
                    match op {
                        Op::Attach => links.attach(target, bill).await,
                        Op::Detach => links.detach(target, bill).await,
                    }
                }),
            ));
        }

        let mut report = PropagationReport::default();
        for (target, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(StoreError::query(join_err.to_string())),
            };
            report.record(target, outcome);
        }
        report
    }
}

#[derive(Clone, Copy)]
enum Op {
    Attach,
    Detach,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_set_targets_include_the_patient() {
        let set = LinkSet {
            patient: PatientId::new(),
            appointment: Some(AppointmentId::new()),
            lab_tests: vec![LabTestId::new(), LabTestId::new()],
            prescriptions: vec![PrescriptionId::new()],
        };

        let targets = set.targets();
        assert_eq!(targets.len(), 5);
        assert!(matches!(targets.last(), Some(LinkTarget::Patient(_))));
    }

    #[test]
    fn report_completeness() {
        let mut report = PropagationReport::default();
        report.record(LinkTarget::Patient(PatientId::new()), Ok(()));
        assert!(report.is_complete());

        report.record(
            LinkTarget::Appointment(AppointmentId::new()),
            Err(StoreError::unavailable("down")),
        );
        assert!(!report.is_complete());
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.failed.len(), 1);
    }
}
