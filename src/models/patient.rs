use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Patient record as owned by the queue service. Read-only on this side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub user_id: UserId,
    pub name: String,
    pub phone_number: String,
}

pub type UserMap = HashMap<UserId, Patient>;

pub fn user_map<I>(patients: I) -> UserMap
where
    I: IntoIterator<Item = Patient>,
{
    patients
        .into_iter()
        .map(|patient| (patient.user_id, patient))
        .collect()
}
