//! Simulation controller.

use std::sync::Arc;

use anyhow::bail;
use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use rentescrow_common::{
    AgreementId, Amount, Clock, Identity, ManualClock, PropertyId, PropertyListing, Result,
};
use rentescrow_ledger::journal::total;
use rentescrow_ledger::{EntryType, InMemoryLedger, Ledger, LedgerAccount};
use rentescrow_registry::agreement_engine::deposit_reference;
use rentescrow_registry::{Registry, RegistryConfig};

use crate::metrics::SimulationMetrics;
use crate::party::{Parties, PartyFactory};
use crate::scenario::{AssertCondition, Scenario, ScenarioStep};

/// Clock start for every run: 2026-01-01T00:00:00Z.
pub const SIMULATION_EPOCH_UNIX: i64 = 1_767_225_600;

/// Drives a registry backed by an in-memory ledger and a manual clock.
pub struct SimulationController {
    registry: Arc<Registry>,
    ledger: Arc<InMemoryLedger>,
    clock: Arc<ManualClock>,
    parties: Parties,
    rng: StdRng,
    metrics: SimulationMetrics,
    day_unit: Duration,
}

impl SimulationController {
    /// Create a registry and fund every tenant with `tenant_funding`.
    pub fn new(
        config: RegistryConfig,
        owners: usize,
        tenants: usize,
        seed: Option<u64>,
        tenant_funding: Amount,
    ) -> anyhow::Result<Self> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::at_unix(SIMULATION_EPOCH_UNIX));
        let day_unit = config.day_unit_chrono().map_err(anyhow::Error::msg)?;
        let registry = Arc::new(Registry::new(config, ledger.clone(), clock.clone())?);

        let parties = PartyFactory::create(owners, tenants);
        parties.fund_tenants(&ledger, tenant_funding)?;

        info!(owners, tenants, funding = %tenant_funding, "Simulation initialized");

        Ok(Self {
            registry,
            ledger,
            clock,
            parties,
            rng,
            metrics: SimulationMetrics::new(),
            day_unit,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    /// Run every step of `scenario`, stopping at the first unmet expectation.
    pub fn run_scenario(&mut self, scenario: &Scenario) -> anyhow::Result<()> {
        info!(scenario = %scenario.name, description = %scenario.description, "Running scenario");

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(index + 1, step)?;
        }

        self.verify_integrity()?;
        info!(scenario = %scenario.name, checks = self.metrics.checks_passed, "Scenario passed");
        Ok(())
    }

    fn execute_step(&mut self, index: usize, step: &ScenarioStep) -> anyhow::Result<()> {
        debug!(index, ?step, "Executing step");

        match step {
            ScenarioStep::RegisterProperty {
                owner,
                price_per_day,
                security_deposit,
                expect,
            } => {
                let owner = self.identity(owner);
                let listing = PropertyListing::new(
                    format!("Property of {}", owner),
                    Amount::from(*price_per_day),
                    Amount::from(*security_deposit),
                );
                let result = self.registry.register_property(&owner, listing);
                self.check_outcome(index, "register_property", result, expect)?;
            }
            ScenarioStep::SetAvailability {
                caller,
                property,
                available,
                expect,
            } => {
                let caller = self.identity(caller);
                let result = self.registry.update_property_availability(
                    &caller,
                    PropertyId::new(*property),
                    *available,
                );
                self.check_outcome(index, "update_property_availability", result, expect)?;
            }
            ScenarioStep::CreateAgreement {
                tenant,
                property,
                start_in_days,
                days,
                pay_delta,
                expect,
            } => {
                let tenant = self.identity(tenant);
                let start = self.clock.now() + self.days(*start_in_days);
                let end = start + self.days(*days);
                let result = self.rent(&tenant, PropertyId::new(*property), start, end, *pay_delta);
                self.check_outcome(index, "create_rental_agreement", result, expect)?;
            }
            ScenarioStep::AdvanceClock { hours } => {
                self.clock.advance(Duration::hours(*hours));
                info!(hours, now = %self.clock.now(), "Clock advanced");
            }
            ScenarioStep::ReturnDeposit {
                caller,
                agreement,
                expect,
            } => {
                let caller = self.identity(caller);
                let result = self.return_deposit(&caller, AgreementId::new(*agreement));
                self.check_outcome(index, "return_security_deposit", result, expect)?;
            }
            ScenarioStep::FreezeAccount { party } => {
                self.ledger.freeze(LedgerAccount::from(&self.identity(party)));
            }
            ScenarioStep::UnfreezeAccount { party } => {
                self.ledger.unfreeze(&LedgerAccount::from(&self.identity(party)));
            }
            ScenarioStep::RecoverFunds { caller, expect } => {
                let caller = self.identity(caller);
                let result = self.registry.recover_funds(&caller);
                self.check_outcome(index, "recover_funds", result, expect)?;
            }
            ScenarioStep::Assert { condition } => {
                self.check_condition(index, condition)?;
                self.metrics.record_check();
            }
        }

        Ok(())
    }

    fn check_outcome<T>(
        &mut self,
        index: usize,
        operation: &str,
        result: Result<T>,
        expect: &Option<String>,
    ) -> anyhow::Result<()> {
        self.record(&result);
        match (result, expect) {
            (Ok(_), None) => {
                self.metrics.record_check();
                Ok(())
            }
            (Err(e), Some(code)) if e.error_code() == code.as_str() => {
                info!(step = index, operation, code = %code, "Expected failure observed");
                self.metrics.record_check();
                Ok(())
            }
            (Ok(_), Some(code)) => {
                bail!("step {} ({}): expected {} but the operation succeeded", index, operation, code)
            }
            (Err(e), _) => {
                bail!("step {} ({}): unexpected {}: {}", index, operation, e.error_code(), e)
            }
        }
    }

    fn check_condition(&self, index: usize, condition: &AssertCondition) -> anyhow::Result<()> {
        match condition {
            AssertCondition::BalanceEquals { party, amount } => {
                let account = LedgerAccount::from(&self.identity(party));
                let actual = self.ledger.balance_of(&account);
                if actual != Amount::from(*amount) {
                    bail!("step {}: balance of {} is {}, expected {}", index, account, actual, amount);
                }
            }
            AssertCondition::CustodyEquals { amount } => {
                let actual = self.ledger.custody_balance();
                if actual != Amount::from(*amount) {
                    bail!("step {}: custody holds {}, expected {}", index, actual, amount);
                }
            }
            AssertCondition::Availability { property, available } => {
                let details = self.registry.get_property_details(PropertyId::new(*property))?;
                if details.is_available != *available {
                    bail!(
                        "step {}: property {} availability is {}, expected {}",
                        index,
                        property,
                        details.is_available,
                        available
                    );
                }
            }
        }
        Ok(())
    }

    /// Run `rounds` randomly chosen operations.
    pub fn run_random(&mut self, rounds: usize) -> anyhow::Result<()> {
        let owners = self.parties.owner_ids();
        let tenants = self.parties.tenant_ids();
        if owners.is_empty() || tenants.is_empty() {
            bail!("random mode needs at least one owner and one tenant");
        }

        info!(rounds, "Running randomized workload");
        let mut open: Vec<AgreementId> = Vec::new();

        for _ in 0..rounds {
            match self.rng.gen_range(0..100) {
                0..=19 => self.random_register(&owners),
                20..=69 => self.random_rent(&tenants, &mut open),
                70..=84 => {
                    let hours = self.rng.gen_range(6..=72);
                    self.clock.advance(Duration::hours(hours));
                }
                _ => self.random_return(&mut open),
            }
        }

        self.verify_integrity()?;
        info!(
            operations = self.metrics.operations_total,
            open_agreements = open.len(),
            "Randomized workload complete"
        );
        Ok(())
    }

    fn random_register(&mut self, owners: &[Identity]) {
        let owner = &owners[self.rng.gen_range(0..owners.len())];
        let price = self.rng.gen_range(50u64..=500);
        let deposit = self.rng.gen_range(0u64..=10) * 100;

        let listing = PropertyListing::new(
            format!("Listing {}", self.registry.get_all_properties().len() + 1),
            Amount::from(price),
            Amount::from(deposit),
        );
        let result = self.registry.register_property(owner, listing);
        self.record(&result);
    }

    fn random_rent(&mut self, tenants: &[Identity], open: &mut Vec<AgreementId>) {
        let properties = self.registry.get_all_properties();
        if properties.is_empty() {
            return;
        }

        let property_id = properties[self.rng.gen_range(0..properties.len())];
        let tenant = tenants[self.rng.gen_range(0..tenants.len())].clone();
        let start_in = self.rng.gen_range(1..=5);
        let length = self.rng.gen_range(1..=7);
        let start = self.clock.now() + self.days(start_in);
        let end = start + self.days(length);
        let pay_delta = if self.rng.gen_bool(0.1) { 1 } else { 0 };

        let result = self.rent(&tenant, property_id, start, end, pay_delta);
        self.record(&result);
        if let Ok(id) = result {
            open.push(id);
        }
    }

    fn random_return(&mut self, open: &mut Vec<AgreementId>) {
        let now = self.clock.now();
        let due: Vec<usize> = open
            .iter()
            .enumerate()
            .filter(|(_, id)| {
                self.registry
                    .get_rental_agreement_details(**id)
                    .map(|a| a.end_date < now)
                    .unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect();
        if due.is_empty() {
            return;
        }

        let slot = due[self.rng.gen_range(0..due.len())];
        let agreement_id = open[slot];
        let caller = if self.rng.gen_bool(0.5) {
            self.registry.admin().clone()
        } else {
            match self
                .registry
                .get_rental_agreement_details(agreement_id)
                .and_then(|a| self.registry.get_property_details(a.property_id))
            {
                Ok(property) => property.owner,
                Err(_) => return,
            }
        };

        let result = self.return_deposit(&caller, agreement_id);
        self.record(&result);
        if result.is_ok() {
            open.swap_remove(slot);
        }
    }

    /// Create an agreement paying the exact quote plus `pay_delta`.
    fn rent(
        &mut self,
        tenant: &Identity,
        property_id: PropertyId,
        start: rentescrow_common::Timestamp,
        end: rentescrow_common::Timestamp,
        pay_delta: i64,
    ) -> Result<AgreementId> {
        let quote = self.registry.quote(property_id, start, end).ok();
        let exact = quote.map(|q| q.total_amount).unwrap_or(Amount::ZERO);
        let delta = Amount::from(pay_delta.unsigned_abs());
        let paid = if pay_delta >= 0 {
            exact.checked_add(delta)
        } else {
            exact.checked_sub(delta)
        }
        .unwrap_or(Amount::ZERO);

        let result = self
            .registry
            .create_rental_agreement(tenant, property_id, start, end, paid);
        if let (Ok(_), Some(quote)) = (&result, quote) {
            self.metrics.record_rent(quote.total_rent.value());
        }
        result
    }

    fn return_deposit(&mut self, caller: &Identity, agreement_id: AgreementId) -> Result<()> {
        self.registry.return_security_deposit(caller, agreement_id)?;
        let refund = self.ledger.entries_for(&deposit_reference(agreement_id));
        self.metrics
            .record_deposit_returned(total(&refund, EntryType::Credit).value());
        Ok(())
    }

    fn record<T>(&mut self, result: &Result<T>) {
        match result {
            Ok(_) => self.metrics.record_success(),
            Err(e) => self.metrics.record_failure(e.error_code()),
        }
    }

    fn verify_integrity(&self) -> anyhow::Result<()> {
        if !self.ledger.verify_integrity() {
            bail!("ledger integrity check failed");
        }
        if let Err(index) = self.registry.verify_audit() {
            bail!("audit chain broken at record {}", index);
        }
        Ok(())
    }

    /// Resolve a scenario party name. `admin` names the configured admin.
    fn identity(&self, name: &str) -> Identity {
        if name == "admin" {
            self.registry.admin().clone()
        } else {
            Identity::new(name)
        }
    }

    fn days(&self, n: i64) -> Duration {
        Duration::milliseconds(self.day_unit.num_milliseconds().saturating_mul(n))
    }
}
