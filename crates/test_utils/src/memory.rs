//! In-memory store
//!
//! Implements the three domain ports against a single mutex-guarded world,
//! preserving the semantics the ledger relies on: version compare-and-swap
//! on bills, the payment insert + bill commit as one atomic unit, and
//! idempotent link writes. Individual link targets can be made to fail to
//! exercise partial-propagation paths.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use core_kernel::{
    AppointmentId, BillId, DateRange, LabTestId, Money, PatientId, PrescriptionId, StoreError,
};
use domain_billing::statistics::{BillAggregates, MethodTotals};
use domain_billing::{
    Bill, BillFilter, BillStore, LinkStore, LinkTarget, Payment, PaymentMethod, PaymentStore,
};

#[derive(Default)]
struct World {
    bills: HashMap<BillId, Bill>,
    /// Insertion order is recording order
    payments: Vec<Payment>,
    appointments: HashMap<AppointmentId, Option<BillId>>,
    lab_tests: HashMap<LabTestId, Option<BillId>>,
    prescriptions: HashMap<PrescriptionId, Option<BillId>>,
    patient_bills: HashMap<PatientId, HashSet<BillId>>,
    failing_targets: HashSet<LinkTarget>,
}

/// The in-memory ledger store shared by a test
#[derive(Default)]
pub struct MemoryStore {
    world: Mutex<World>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an appointment record the propagator can write to
    pub fn seed_appointment(&self, id: AppointmentId) {
        self.world.lock().unwrap().appointments.insert(id, None);
    }

    pub fn seed_lab_test(&self, id: LabTestId) {
        self.world.lock().unwrap().lab_tests.insert(id, None);
    }

    pub fn seed_prescription(&self, id: PrescriptionId) {
        self.world.lock().unwrap().prescriptions.insert(id, None);
    }

    /// Makes every link write against the target fail until cleared
    pub fn fail_target(&self, target: LinkTarget) {
        self.world.lock().unwrap().failing_targets.insert(target);
    }

    pub fn clear_failures(&self) {
        self.world.lock().unwrap().failing_targets.clear();
    }

    /// The bill currently referenced by an appointment record
    pub fn appointment_bill(&self, id: AppointmentId) -> Option<BillId> {
        self.world
            .lock()
            .unwrap()
            .appointments
            .get(&id)
            .copied()
            .flatten()
    }

    pub fn lab_test_bill(&self, id: LabTestId) -> Option<BillId> {
        self.world.lock().unwrap().lab_tests.get(&id).copied().flatten()
    }

    pub fn prescription_bill(&self, id: PrescriptionId) -> Option<BillId> {
        self.world
            .lock()
            .unwrap()
            .prescriptions
            .get(&id)
            .copied()
            .flatten()
    }

    /// The patient's bill set maintained by the propagator
    pub fn patient_bill_set(&self, id: PatientId) -> HashSet<BillId> {
        self.world
            .lock()
            .unwrap()
            .patient_bills
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn payment_count(&self) -> usize {
        self.world.lock().unwrap().payments.len()
    }
}

#[async_trait]
impl BillStore for MemoryStore {
    async fn insert(&self, bill: &Bill) -> Result<(), StoreError> {
        let mut world = self.world.lock().unwrap();
        if world.bills.contains_key(&bill.id) {
            return Err(StoreError::query(format!("bill {} already exists", bill.id)));
        }
        world.bills.insert(bill.id, bill.clone());
        Ok(())
    }

    async fn fetch(&self, id: BillId) -> Result<Option<Bill>, StoreError> {
        Ok(self.world.lock().unwrap().bills.get(&id).cloned())
    }

    async fn update(&self, bill: &Bill, expected_version: i64) -> Result<bool, StoreError> {
        let mut world = self.world.lock().unwrap();
        match world.bills.get_mut(&bill.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = bill.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: BillId, expected_version: i64) -> Result<bool, StoreError> {
        let mut world = self.world.lock().unwrap();
        match world.bills.get(&id) {
            Some(stored) if stored.version == expected_version => {
                world.bills.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, filter: &BillFilter) -> Result<Vec<Bill>, StoreError> {
        let world = self.world.lock().unwrap();
        let mut bills: Vec<Bill> = world
            .bills
            .values()
            .filter(|bill| {
                filter.patient.map_or(true, |p| bill.patient == p)
                    && filter.status.map_or(true, |s| bill.status == s)
                    && filter.created.contains(bill.created_at)
            })
            .cloned()
            .collect();
        bills.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bills)
    }

    async fn aggregate(&self, range: &DateRange) -> Result<BillAggregates, StoreError> {
        let world = self.world.lock().unwrap();
        let mut aggregates = BillAggregates::default();
        for bill in world.bills.values() {
            if !range.contains(bill.created_at) {
                continue;
            }
            aggregates.total_bills += 1;
            aggregates.total_amount += bill.total_amount;
            aggregates.discounted_amount += bill.discounted_amount;
            aggregates.collected_amount += bill.discounted_amount - bill.remaining_amount;
            aggregates.pending_amount += bill.remaining_amount;
        }
        Ok(aggregates)
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn record(
        &self,
        payment: &Payment,
        bill: &Bill,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let mut world = self.world.lock().unwrap();

        if let Some(transaction_id) = payment.transaction_id.as_deref() {
            let duplicate = world.payments.iter().any(|p| {
                p.bill == payment.bill && p.transaction_id.as_deref() == Some(transaction_id)
            });
            if duplicate {
                return Ok(false);
            }
        }

        match world.bills.get(&bill.id) {
            Some(stored) if stored.version == expected_version => {}
            _ => return Ok(false),
        }

        world.payments.push(payment.clone());
        world.bills.insert(bill.id, bill.clone());
        Ok(true)
    }

    async fn fetch_by_transaction(
        &self,
        bill: BillId,
        transaction_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let world = self.world.lock().unwrap();
        Ok(world
            .payments
            .iter()
            .find(|p| p.bill == bill && p.transaction_id.as_deref() == Some(transaction_id))
            .cloned())
    }

    async fn list_for_bill(&self, bill: BillId) -> Result<Vec<Payment>, StoreError> {
        let world = self.world.lock().unwrap();
        let mut payments: Vec<Payment> = world
            .payments
            .iter()
            .filter(|p| p.bill == bill)
            .cloned()
            .collect();
        payments.reverse();
        Ok(payments)
    }

    async fn total_for_bill(&self, bill: BillId) -> Result<Money, StoreError> {
        let world = self.world.lock().unwrap();
        Ok(world
            .payments
            .iter()
            .filter(|p| p.bill == bill)
            .map(|p| p.amount)
            .sum())
    }

    async fn method_breakdown(&self, range: &DateRange) -> Result<Vec<MethodTotals>, StoreError> {
        let world = self.world.lock().unwrap();
        let mut by_method: HashMap<PaymentMethod, (u64, Money)> = HashMap::new();
        for payment in world.payments.iter().filter(|p| range.contains(p.created_at)) {
            let entry = by_method.entry(payment.method).or_insert((0, Money::ZERO));
            entry.0 += 1;
            entry.1 += payment.amount;
        }

        let mut totals: Vec<MethodTotals> = by_method
            .into_iter()
            .map(|(method, (count, amount))| MethodTotals {
                method,
                count,
                amount,
            })
            .collect();
        totals.sort_by_key(|t| t.method);
        Ok(totals)
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn attach(&self, target: LinkTarget, bill: BillId) -> Result<(), StoreError> {
        let mut world = self.world.lock().unwrap();
        if world.failing_targets.contains(&target) {
            return Err(StoreError::unavailable(format!("injected failure for {target}")));
        }
        match target {
            LinkTarget::Appointment(id) => match world.appointments.get_mut(&id) {
                Some(slot) => *slot = Some(bill),
                None => {
                    return Err(StoreError::query(format!("appointment {id} does not exist")))
                }
            },
            LinkTarget::LabTest(id) => match world.lab_tests.get_mut(&id) {
                Some(slot) => *slot = Some(bill),
                None => return Err(StoreError::query(format!("lab test {id} does not exist"))),
            },
            LinkTarget::Prescription(id) => match world.prescriptions.get_mut(&id) {
                Some(slot) => *slot = Some(bill),
                None => {
                    return Err(StoreError::query(format!("prescription {id} does not exist")))
                }
            },
            LinkTarget::Patient(id) => {
                world.patient_bills.entry(id).or_default().insert(bill);
            }
        }
        Ok(())
    }

    async fn detach(&self, target: LinkTarget, bill: BillId) -> Result<(), StoreError> {
        let mut world = self.world.lock().unwrap();
        if world.failing_targets.contains(&target) {
            return Err(StoreError::unavailable(format!("injected failure for {target}")));
        }
        match target {
            LinkTarget::Appointment(id) => {
                if let Some(slot) = world.appointments.get_mut(&id) {
                    if *slot == Some(bill) {
                        *slot = None;
                    }
                }
            }
            LinkTarget::LabTest(id) => {
                if let Some(slot) = world.lab_tests.get_mut(&id) {
                    if *slot == Some(bill) {
                        *slot = None;
                    }
                }
            }
            LinkTarget::Prescription(id) => {
                if let Some(slot) = world.prescriptions.get_mut(&id) {
                    if *slot == Some(bill) {
                        *slot = None;
                    }
                }
            }
            LinkTarget::Patient(id) => {
                if let Some(set) = world.patient_bills.get_mut(&id) {
                    set.remove(&bill);
                }
            }
        }
        Ok(())
    }

    async fn referencing(&self, bill: BillId) -> Result<Vec<LinkTarget>, StoreError> {
        let world = self.world.lock().unwrap();
        let mut targets = Vec::new();
        for (id, slot) in &world.appointments {
            if *slot == Some(bill) {
                targets.push(LinkTarget::Appointment(*id));
            }
        }
        for (id, slot) in &world.lab_tests {
            if *slot == Some(bill) {
                targets.push(LinkTarget::LabTest(*id));
            }
        }
        for (id, slot) in &world.prescriptions {
            if *slot == Some(bill) {
                targets.push(LinkTarget::Prescription(*id));
            }
        }
        for (id, set) in &world.patient_bills {
            if set.contains(&bill) {
                targets.push(LinkTarget::Patient(*id));
            }
        }
        Ok(targets)
    }
}
