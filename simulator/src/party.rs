//! Simulated owners and tenants.

use anyhow::Context;
use rentescrow_common::{Amount, Identity};
use rentescrow_ledger::InMemoryLedger;

/// Role a simulated party plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Tenant,
}

/// A simulated party.
#[derive(Debug, Clone)]
pub struct SimulatedParty {
    pub identity: Identity,
    pub role: Role,
}

/// All simulated parties.
#[derive(Debug, Clone, Default)]
pub struct Parties {
    pub members: Vec<SimulatedParty>,
}

impl Parties {
    fn with_role(&self, role: Role) -> impl Iterator<Item = &SimulatedParty> {
        self.members.iter().filter(move |p| p.role == role)
    }

    pub fn owner_ids(&self) -> Vec<Identity> {
        self.with_role(Role::Owner).map(|p| p.identity.clone()).collect()
    }

    pub fn tenant_ids(&self) -> Vec<Identity> {
        self.with_role(Role::Tenant).map(|p| p.identity.clone()).collect()
    }

    /// Credit every tenant with `amount` so it can pay for rentals.
    pub fn fund_tenants(&self, ledger: &InMemoryLedger, amount: Amount) -> anyhow::Result<()> {
        for tenant in self.with_role(Role::Tenant) {
            ledger
                .fund(&tenant.identity, amount)
                .with_context(|| format!("funding {}", tenant.identity))?;
        }
        Ok(())
    }
}

/// Creates parties with stable names so scenarios can refer to them.
pub struct PartyFactory;

impl PartyFactory {
    /// Create `owners` owners (`owner-1`, ...) and `tenants` tenants
    /// (`tenant-1`, ...).
    pub fn create(owners: usize, tenants: usize) -> Parties {
        let make = |prefix: &'static str, role: Role, count: usize| {
            (1..=count).map(move |i| SimulatedParty {
                identity: Identity::new(format!("{}-{}", prefix, i)),
                role,
            })
        };

        Parties {
            members: make("owner", Role::Owner, owners)
                .chain(make("tenant", Role::Tenant, tenants))
                .collect(),
        }
    }
}
