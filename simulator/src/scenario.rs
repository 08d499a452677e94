//! Simulation scenarios.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use innkeep_common::RoomStatus;
use innkeep_store::FaultPoint;

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario. Rooms are referred to by number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Add a room.
    AddRoom { number: String },
    /// Many guests race for the same dates.
    Contend {
        room: String,
        attempts: usize,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    /// Concurrent stays shifted by one day each; all share at least one night.
    Stagger {
        room: String,
        attempts: usize,
        check_in: NaiveDate,
        nights: u64,
    },
    /// Concurrent back-to-back weekly stays; none overlap.
    AdjacentWeeks {
        room: String,
        weeks: u64,
        start: NaiveDate,
    },
    /// Cancel every active booking of a room.
    CancelAll { room: String },
    /// Make the next store call at a point fail.
    InjectFault { fault: FaultKind },
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Faults that can be injected into the in-memory store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum FaultKind {
    /// Fail while writing the payment row.
    PaymentWrite,
    /// Fail while updating the room status.
    RoomUpdate,
    /// Fail at commit.
    Commit,
}

impl FaultKind {
    /// Store step the fault fires at.
    pub fn point(self) -> FaultPoint {
        match self {
            FaultKind::PaymentWrite => FaultPoint::InsertPayment,
            FaultKind::RoomUpdate => FaultPoint::SetRoomStatus,
            FaultKind::Commit => FaultPoint::Commit,
        }
    }
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssertCondition {
    /// The room holds exactly this many PENDING or CONFIRMED bookings.
    ActiveBookings { room: String, count: usize },
    /// The room is in this status.
    RoomStatusIs { room: String, status: RoomStatus },
    /// Every acquired connection has been released.
    PoolBalanced,
}

impl Scenario {
    /// Load a built-in scenario by name, or a JSON scenario file by path.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        if name.ends_with(".json") {
            let text = std::fs::read_to_string(name)?;
            return Ok(serde_json::from_str(&text)?);
        }

        match name {
            "contention" => Ok(Self::contention()),
            "staggered" => Ok(Self::staggered()),
            "adjacent-stays" => Ok(Self::adjacent_stays()),
            "cancel-rebook" => Ok(Self::cancel_rebook()),
            "fault-recovery" => Ok(Self::fault_recovery()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Names accepted by [`Scenario::load`].
    pub fn names() -> &'static [&'static str] {
        &[
            "contention",
            "staggered",
            "adjacent-stays",
            "cancel-rebook",
            "fault-recovery",
        ]
    }

    /// Many guests race for one room and the same dates.
    fn contention() -> Self {
        Self {
            name: "contention".to_string(),
            description: "50 concurrent requests for identical dates".to_string(),
            steps: vec![
                ScenarioStep::AddRoom {
                    number: "101".to_string(),
                },
                ScenarioStep::Contend {
                    room: "101".to_string(),
                    attempts: 50,
                    check_in: date(2024, 1, 1),
                    check_out: date(2024, 1, 5),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ActiveBookings {
                        room: "101".to_string(),
                        count: 1,
                    },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::PoolBalanced,
                },
            ],
        }
    }

    /// Partially overlapping requests.
    fn staggered() -> Self {
        Self {
            name: "staggered".to_string(),
            description: "Overlapping stays shifted by one day".to_string(),
            steps: vec![
                ScenarioStep::AddRoom {
                    number: "102".to_string(),
                },
                ScenarioStep::Stagger {
                    room: "102".to_string(),
                    attempts: 5,
                    check_in: date(2024, 2, 1),
                    nights: 5,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ActiveBookings {
                        room: "102".to_string(),
                        count: 1,
                    },
                },
            ],
        }
    }

    /// Back-to-back stays sharing only a boundary day.
    fn adjacent_stays() -> Self {
        Self {
            name: "adjacent-stays".to_string(),
            description: "Concurrent weekly stays that touch but never overlap".to_string(),
            steps: vec![
                ScenarioStep::AddRoom {
                    number: "103".to_string(),
                },
                ScenarioStep::AdjacentWeeks {
                    room: "103".to_string(),
                    weeks: 12,
                    start: date(2024, 3, 4),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ActiveBookings {
                        room: "103".to_string(),
                        count: 12,
                    },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::PoolBalanced,
                },
            ],
        }
    }

    /// Cancelled dates become bookable again.
    fn cancel_rebook() -> Self {
        Self {
            name: "cancel-rebook".to_string(),
            description: "Book, cancel, then race for the freed dates".to_string(),
            steps: vec![
                ScenarioStep::AddRoom {
                    number: "104".to_string(),
                },
                ScenarioStep::Contend {
                    room: "104".to_string(),
                    attempts: 10,
                    check_in: date(2024, 4, 10),
                    check_out: date(2024, 4, 12),
                },
                ScenarioStep::CancelAll {
                    room: "104".to_string(),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::RoomStatusIs {
                        room: "104".to_string(),
                        status: RoomStatus::Available,
                    },
                },
                ScenarioStep::Contend {
                    room: "104".to_string(),
                    attempts: 10,
                    check_in: date(2024, 4, 10),
                    check_out: date(2024, 4, 12),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ActiveBookings {
                        room: "104".to_string(),
                        count: 1,
                    },
                },
            ],
        }
    }

    /// Store faults mid-reservation leave nothing behind.
    fn fault_recovery() -> Self {
        Self {
            name: "fault-recovery".to_string(),
            description: "Faults during reservation roll back cleanly".to_string(),
            steps: vec![
                ScenarioStep::AddRoom {
                    number: "105".to_string(),
                },
                ScenarioStep::InjectFault {
                    fault: FaultKind::PaymentWrite,
                },
                ScenarioStep::Contend {
                    room: "105".to_string(),
                    attempts: 1,
                    check_in: date(2024, 5, 1),
                    check_out: date(2024, 5, 3),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ActiveBookings {
                        room: "105".to_string(),
                        count: 0,
                    },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::RoomStatusIs {
                        room: "105".to_string(),
                        status: RoomStatus::Available,
                    },
                },
                ScenarioStep::InjectFault {
                    fault: FaultKind::Commit,
                },
                ScenarioStep::Contend {
                    room: "105".to_string(),
                    attempts: 1,
                    check_in: date(2024, 5, 1),
                    check_out: date(2024, 5, 3),
                },
                ScenarioStep::Contend {
                    room: "105".to_string(),
                    attempts: 5,
                    check_in: date(2024, 5, 1),
                    check_out: date(2024, 5, 3),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ActiveBookings {
                        room: "105".to_string(),
                        count: 1,
                    },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::PoolBalanced,
                },
            ],
        }
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    // Scenario dates are literals known to be valid.
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}
