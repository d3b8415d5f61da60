//! Scripted scenarios.
//!
//! Properties and agreements are referred to by the sequential ids the
//! registry hands out, which are predictable within a scenario.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A scripted scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
///
/// Steps carrying `expect` succeed when the operation fails with that error
/// code; without it the operation must succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    RegisterProperty {
        owner: String,
        price_per_day: u64,
        security_deposit: u64,
        #[serde(default)]
        expect: Option<String>,
    },
    SetAvailability {
        caller: String,
        property: u64,
        available: bool,
        #[serde(default)]
        expect: Option<String>,
    },
    /// Rent for `days` days starting `start_in_days` from the current clock,
    /// paying the exact quote plus `pay_delta`.
    CreateAgreement {
        tenant: String,
        property: u64,
        start_in_days: i64,
        days: i64,
        #[serde(default)]
        pay_delta: i64,
        #[serde(default)]
        expect: Option<String>,
    },
    AdvanceClock {
        hours: i64,
    },
    ReturnDeposit {
        caller: String,
        agreement: u64,
        #[serde(default)]
        expect: Option<String>,
    },
    FreezeAccount {
        party: String,
    },
    UnfreezeAccount {
        party: String,
    },
    RecoverFunds {
        caller: String,
        #[serde(default)]
        expect: Option<String>,
    },
    Assert {
        condition: AssertCondition,
    },
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum AssertCondition {
    BalanceEquals { party: String, amount: u64 },
    CustodyEquals { amount: u64 },
    Availability { property: u64, available: bool },
}

fn ok() -> Option<String> {
    None
}

fn fails(code: &str) -> Option<String> {
    Some(code.to_string())
}

fn register(owner: &str, price_per_day: u64, security_deposit: u64) -> ScenarioStep {
    ScenarioStep::RegisterProperty {
        owner: owner.to_string(),
        price_per_day,
        security_deposit,
        expect: ok(),
    }
}

fn rent(tenant: &str, property: u64, pay_delta: i64, expect: Option<String>) -> ScenarioStep {
    ScenarioStep::CreateAgreement {
        tenant: tenant.to_string(),
        property,
        start_in_days: 1,
        days: 3,
        pay_delta,
        expect,
    }
}

fn return_deposit(caller: &str, agreement: u64, expect: Option<String>) -> ScenarioStep {
    ScenarioStep::ReturnDeposit {
        caller: caller.to_string(),
        agreement,
        expect,
    }
}

fn assert_balance(party: &str, amount: u64) -> ScenarioStep {
    ScenarioStep::Assert {
        condition: AssertCondition::BalanceEquals {
            party: party.to_string(),
            amount,
        },
    }
}

fn assert_custody(amount: u64) -> ScenarioStep {
    ScenarioStep::Assert {
        condition: AssertCondition::CustodyEquals { amount },
    }
}

fn assert_available(property: u64, available: bool) -> ScenarioStep {
    ScenarioStep::Assert {
        condition: AssertCondition::Availability { property, available },
    }
}

impl Scenario {
    /// Names of the built-in scenarios.
    pub const BUILT_IN: [&'static str; 4] = [
        "escrow-lifecycle",
        "double-booking",
        "transfer-failure",
        "emergency-recovery",
    ];

    /// Load a built-in scenario by name, or a JSON scenario file by path.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "escrow-lifecycle" => Ok(Self::escrow_lifecycle()),
            "double-booking" => Ok(Self::double_booking()),
            "transfer-failure" => Ok(Self::transfer_failure()),
            "emergency-recovery" => Ok(Self::emergency_recovery()),
            path if path.ends_with(".json") => Self::from_file(Path::new(path)),
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (built-in: {})",
                name,
                Self::BUILT_IN.join(", ")
            )),
        }
    }

    /// Read a scenario from a JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Pay, wait out the rental, get the deposit back.
    fn escrow_lifecycle() -> Self {
        Self {
            name: "escrow-lifecycle".to_string(),
            description: "Exact payment, rent forwarded, deposit returned after the period".to_string(),
            steps: vec![
                register("owner-1", 100, 500),
                rent("tenant-1", 1, -1, fails("PAYMENT_MISMATCH")),
                rent("tenant-1", 1, 1, fails("PAYMENT_MISMATCH")),
                rent("tenant-1", 1, 0, ok()),
                assert_available(1, false),
                assert_balance("owner-1", 300),
                assert_custody(500),
                return_deposit("owner-1", 1, fails("TOO_EARLY")),
                ScenarioStep::AdvanceClock { hours: 4 * 24 + 1 },
                return_deposit("owner-1", 1, ok()),
                assert_balance("tenant-1", 9_700),
                assert_available(1, true),
                assert_custody(0),
                return_deposit("owner-1", 1, fails("ALREADY_RETURNED")),
            ],
        }
    }

    /// Two tenants race for one property.
    fn double_booking() -> Self {
        Self {
            name: "double-booking".to_string(),
            description: "A rented property cannot be booked or re-listed until closed".to_string(),
            steps: vec![
                register("owner-1", 120, 300),
                rent("tenant-1", 1, 0, ok()),
                rent("tenant-2", 1, 0, fails("NOT_AVAILABLE")),
                ScenarioStep::SetAvailability {
                    caller: "owner-1".to_string(),
                    property: 1,
                    available: true,
                    expect: fails("RENTAL_IN_PROGRESS"),
                },
                ScenarioStep::SetAvailability {
                    caller: "tenant-2".to_string(),
                    property: 1,
                    available: false,
                    expect: fails("UNAUTHORIZED"),
                },
                ScenarioStep::AdvanceClock { hours: 5 * 24 },
                return_deposit("admin", 1, ok()),
                rent("tenant-2", 1, 0, ok()),
                assert_available(1, false),
                assert_custody(300),
            ],
        }
    }

    /// A frozen owner account makes the payment batch fail.
    fn transfer_failure() -> Self {
        Self {
            name: "transfer-failure".to_string(),
            description: "Ledger refusal rolls the agreement back completely".to_string(),
            steps: vec![
                register("owner-1", 100, 500),
                ScenarioStep::FreezeAccount {
                    party: "owner-1".to_string(),
                },
                rent("tenant-1", 1, 0, fails("TRANSFER_FAILED")),
                assert_available(1, true),
                assert_balance("tenant-1", 10_000),
                assert_custody(0),
                ScenarioStep::UnfreezeAccount {
                    party: "owner-1".to_string(),
                },
                rent("tenant-1", 1, 0, ok()),
                assert_custody(500),
                return_deposit("owner-1", 1, fails("TOO_EARLY")),
            ],
        }
    }

    /// The admin drains custody while a deposit is still held.
    fn emergency_recovery() -> Self {
        Self {
            name: "emergency-recovery".to_string(),
            description: "Admin escape hatch bypasses escrow holds".to_string(),
            steps: vec![
                register("owner-1", 100, 500),
                rent("tenant-1", 1, 0, ok()),
                ScenarioStep::RecoverFunds {
                    caller: "owner-1".to_string(),
                    expect: fails("UNAUTHORIZED"),
                },
                ScenarioStep::RecoverFunds {
                    caller: "admin".to_string(),
                    expect: ok(),
                },
                assert_balance("admin", 500),
                assert_custody(0),
                ScenarioStep::AdvanceClock { hours: 5 * 24 },
                return_deposit("owner-1", 1, fails("TRANSFER_FAILED")),
                assert_available(1, false),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_scenarios_load() {
        for name in Scenario::BUILT_IN {
            let scenario = Scenario::load(name).unwrap();
            assert_eq!(scenario.name, name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::load("nope").is_err());
    }

    #[test]
    fn test_step_json_shape() {
        let json = r#"{
            "name": "custom",
            "description": "from file",
            "steps": [
                {"step": "register_property", "owner": "owner-1", "price_per_day": 10, "security_deposit": 0},
                {"step": "create_agreement", "tenant": "tenant-1", "property": 1, "start_in_days": 1, "days": 2, "expect": "NOT_FOUND"},
                {"step": "assert", "condition": {"check": "custody_equals", "amount": 0}}
            ]
        }"#;

        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.steps.len(), 3);
        match &scenario.steps[1] {
            ScenarioStep::CreateAgreement { pay_delta, expect, .. } => {
                assert_eq!(*pay_delta, 0);
                assert_eq!(expect.as_deref(), Some("NOT_FOUND"));
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }
}
