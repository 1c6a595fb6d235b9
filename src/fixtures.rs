//! Seeded queue fixtures for tests and demos.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::models::{user_map, Patient, QueueEntry, QueueEntryId, QueueStatus, UserId, UserMap};

const FIRST_NAMES: &[&str] = &[
    "Maria", "Jose", "Ana", "Juan", "Rosa", "Carlo", "Liza", "Miguel", "Grace", "Paolo",
];

const LAST_NAMES: &[&str] = &[
    "Santos", "Reyes", "Cruz", "Bautista", "Garcia", "Mendoza", "Torres", "Villanueva",
];

const REASONS: &[&str] = &[
    "General check-up",
    "Fever and cough",
    "Follow-up consultation",
    "Blood pressure monitoring",
    "Prenatal visit",
    "Vaccination",
    "Medical certificate",
];

// Weighted towards waiting, as a live queue usually is
const DEFAULT_STATUS_MIX: &[QueueStatus] = &[
    QueueStatus::Waiting,
    QueueStatus::Waiting,
    QueueStatus::Waiting,
    QueueStatus::Called,
    QueueStatus::NowServing,
    QueueStatus::Completed,
];

#[derive(Debug, Clone)]
pub struct FixtureParams {
    pub seed: u64,
    pub count: usize,
    /// Statuses to draw from. Empty means the default mix.
    pub statuses: Vec<QueueStatus>,
    pub first_user_id: u64,
}

impl Default for FixtureParams {
    fn default() -> Self {
        Self {
            seed: 7,
            count: 12,
            statuses: Vec::new(),
            first_user_id: 1000,
        }
    }
}

/// Generate `params.count` queue entries and their patients. Same seed, same output.
pub fn generate_queue(params: &FixtureParams) -> (Vec<QueueEntry>, UserMap) {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let statuses = if params.statuses.is_empty() {
        DEFAULT_STATUS_MIX
    } else {
        params.statuses.as_slice()
    };

    let mut entries = Vec::with_capacity(params.count);
    let mut patients = Vec::with_capacity(params.count);

    for i in 0..params.count {
        let user_id = UserId(params.first_user_id + i as u64);
        let first = FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Juan");
        let last = LAST_NAMES.choose(&mut rng).copied().unwrap_or("Dela Cruz");
        let phone_number = format!("09{:09}", rng.gen_range(0..1_000_000_000u64));

        patients.push(Patient {
            user_id,
            name: format!("{} {}", first, last),
            phone_number,
        });
        entries.push(QueueEntry {
            queue_entry_id: QueueEntryId(i as u64 + 1),
            user_id,
            queue_number: i as u32 + 1,
            queue_status: statuses
                .choose(&mut rng)
                .copied()
                .unwrap_or(QueueStatus::Waiting),
            reason: REASONS
                .choose(&mut rng)
                .copied()
                .unwrap_or_default()
                .to_string(),
        });
    }

    (entries, user_map(patients))
}
