//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

// Backend clients known to the management daemon.
//
// The numeric value of each client is used as the index into the per-client
// arrays of the registration table and of the registry.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientId {
    Staticd = 0,
}

// ===== impl ClientId =====

impl ClientId {
    // Size of the client ID domain.
    pub const MAX: usize = 1;

    // All client IDs, in index order.
    pub const ALL: [ClientId; ClientId::MAX] = [ClientId::Staticd];

    pub fn from_name(name: &str) -> Option<ClientId> {
        ClientId::ALL.into_iter().find(|id| id.name() == name)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            ClientId::Staticd => "staticd",
        }
    }

    pub fn index(&self) -> usize {
        self.to_usize().unwrap_or_default()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
