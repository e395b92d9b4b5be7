//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//
// Sponsored by NLnet as part of the Next Generation Internet initiative.
// See: https://nlnet.nl/NGI0
//

use std::fmt::Write;

use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::packet::consts::PduType;

pub const PDU_COUNTER_SIZE: usize = 10;

// Per-PDU-type packet counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PduCounter([u64; PDU_COUNTER_SIZE]);

// Counter slot. The slot order is also the print order.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum PduCounterIndex {
    HelloLanL1,
    HelloLanL2,
    HelloP2P,
    LspL1,
    LspL2,
    LspFs,
    CsnpL1,
    CsnpL2,
    PsnpL1,
    PsnpL2,
}

// Dropped PDU counters of an area.
#[derive(Debug, Default)]
pub struct PduDropCounters {
    pub counters: PduCounter,
    pub log_pdu_drops: bool,
}

// ===== impl PduCounter =====

impl PduCounter {
    // Increments the counter of the given PDU type. Unknown types are
    // ignored.
    pub fn count(&mut self, pdu_type: u8) {
        if let Some(index) = PduCounterIndex::from_pdu_type(pdu_type) {
            self.0[index as usize] += 1;
        }
    }

    // Returns the counter of the given PDU type, or `u64::MAX` for unknown
    // types.
    pub fn get(&self, pdu_type: u8) -> u64 {
        match PduCounterIndex::from_pdu_type(pdu_type) {
            Some(index) => self.0[index as usize],
            None => u64::MAX,
        }
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PduCounterIndex, u64)> + '_ {
        PduCounterIndex::ALL.into_iter().zip(self.0.iter().copied())
    }

    // Writes one line per non-zero counter.
    pub fn print(
        &self,
        prefix: &str,
        out: &mut impl Write,
    ) -> std::fmt::Result {
        for (index, count) in self.iter().filter(|(_, count)| *count != 0) {
            writeln!(out, "{}{}: {}", prefix, index.name(), count)?;
        }
        Ok(())
    }
}

// ===== impl PduCounterIndex =====

impl PduCounterIndex {
    pub const ALL: [PduCounterIndex; PDU_COUNTER_SIZE] = [
        PduCounterIndex::HelloLanL1,
        PduCounterIndex::HelloLanL2,
        PduCounterIndex::HelloP2P,
        PduCounterIndex::LspL1,
        PduCounterIndex::LspL2,
        PduCounterIndex::LspFs,
        PduCounterIndex::CsnpL1,
        PduCounterIndex::CsnpL2,
        PduCounterIndex::PsnpL1,
        PduCounterIndex::PsnpL2,
    ];

    pub fn from_pdu_type(pdu_type: u8) -> Option<PduCounterIndex> {
        let index = match PduType::from_u8(pdu_type)? {
            PduType::HelloLanL1 => PduCounterIndex::HelloLanL1,
            PduType::HelloLanL2 => PduCounterIndex::HelloLanL2,
            PduType::HelloP2P => PduCounterIndex::HelloP2P,
            PduType::LspL1 => PduCounterIndex::LspL1,
            PduType::LspL2 => PduCounterIndex::LspL2,
            PduType::LspFs => PduCounterIndex::LspFs,
            PduType::CsnpL1 => PduCounterIndex::CsnpL1,
            PduType::CsnpL2 => PduCounterIndex::CsnpL2,
            PduType::PsnpL1 => PduCounterIndex::PsnpL1,
            PduType::PsnpL2 => PduCounterIndex::PsnpL2,
        };
        Some(index)
    }

    // Fixed-width display name.
    pub fn name(&self) -> &'static str {
        match self {
            PduCounterIndex::HelloLanL1 => " L1 IIH",
            PduCounterIndex::HelloLanL2 => " L2 IIH",
            PduCounterIndex::HelloP2P => "P2P IIH",
            PduCounterIndex::LspL1 => " L1 LSP",
            PduCounterIndex::LspL2 => " L2 LSP",
            PduCounterIndex::LspFs => " FS LSP",
            PduCounterIndex::CsnpL1 => "L1 CSNP",
            PduCounterIndex::CsnpL2 => "L2 CSNP",
            PduCounterIndex::PsnpL1 => "L1 PSNP",
            PduCounterIndex::PsnpL2 => "L2 PSNP",
        }
    }
}

// ===== impl PduDropCounters =====

impl PduDropCounters {
    // Records a dropped PDU and logs the updated totals when drop logging is
    // enabled.
    pub fn count_drop(&mut self, area: &str, pdu_type: u8) {
        self.counters.count(pdu_type);

        if !self.log_pdu_drops {
            return;
        }

        let name = PduCounterIndex::from_pdu_type(pdu_type)
            .map(|index| index.name().trim_start())
            .unwrap_or("???????");
        let c = &self.counters;
        info!(
            %area,
            pdu_type = %name,
            total = c.total(),
            l1_iih = c.get(PduType::HelloLanL1 as u8),
            l2_iih = c.get(PduType::HelloLanL2 as u8),
            p2p_iih = c.get(PduType::HelloP2P as u8),
            l1_lsp = c.get(PduType::LspL1 as u8),
            l2_lsp = c.get(PduType::LspL2 as u8),
            fs_lsp = c.get(PduType::LspFs as u8),
            l1_csnp = c.get(PduType::CsnpL1 as u8),
            l2_csnp = c.get(PduType::CsnpL2 as u8),
            l1_psnp = c.get(PduType::PsnpL1 as u8),
            l2_psnp = c.get(PduType::PsnpL2 as u8),
            "PDU drop detected"
        );
    }
}
