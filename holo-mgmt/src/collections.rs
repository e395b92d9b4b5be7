//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::sync::Arc;

use generational_arena::{Arena, Index};

use crate::adapter::Adapter;
use crate::client::ClientId;
use crate::config::BackendCfg;
use crate::error::Error;
use crate::network::Connection;

pub type AdapterId = usize;
pub type AdapterIndex = Index;

#[derive(Debug, Default)]
pub struct Adapters {
    // Adapter arena.
    arena: Arena<Adapter>,
    // Adapter hash table keyed by ID (1:1).
    id_tree: HashMap<AdapterId, AdapterIndex>,
    // Connected adapters, in creation order.
    list: Vec<AdapterIndex>,
    // Active adapter of each backend client.
    client_tree: [Option<AdapterIndex>; ClientId::MAX],
    // Next available ID.
    next_id: AdapterId,
}

// ===== impl Adapters =====

impl Adapters {
    pub(crate) fn insert(
        &mut self,
        conn: Arc<dyn Connection>,
        peer: String,
        config: &BackendCfg,
    ) -> (AdapterIndex, &mut Adapter) {
        // Create and insert adapter into the arena.
        let id = self.next_id();
        let adapter = Adapter::new(id, conn, peer, config);
        let adapter_idx = self.arena.insert(adapter);

        // Link adapter to different collections.
        self.id_tree.insert(id, adapter_idx);
        self.list.push(adapter_idx);

        (adapter_idx, &mut self.arena[adapter_idx])
    }

    pub(crate) fn delete(&mut self, adapter_idx: AdapterIndex) {
        let adapter = &self.arena[adapter_idx];

        // Unlink adapter from different collections.
        self.id_tree.remove(&adapter.id);
        if let Some(client_id) = adapter.client_id {
            self.clear_client(client_id, adapter_idx);
        }
        self.unlink(adapter_idx);

        // Remove adapter from the arena.
        self.arena.remove(adapter_idx);
    }

    // Removes the adapter from the list of connected adapters. The adapter
    // remains reachable by ID until its last reference is released.
    pub(crate) fn unlink(&mut self, adapter_idx: AdapterIndex) {
        self.list.retain(|idx| *idx != adapter_idx);
    }

    // Registers the adapter as the active adapter of the given client.
    pub(crate) fn set_client(
        &mut self,
        client_id: ClientId,
        adapter_idx: AdapterIndex,
    ) {
        self.client_tree[client_id.index()] = Some(adapter_idx);
    }

    // Clears the client slot, but only if it still refers to the given
    // adapter.
    pub(crate) fn clear_client(
        &mut self,
        client_id: ClientId,
        adapter_idx: AdapterIndex,
    ) {
        let slot = &mut self.client_tree[client_id.index()];
        if *slot == Some(adapter_idx) {
            *slot = None;
        }
    }

    // Returns a reference to the adapter corresponding to the given ID.
    pub fn get_by_id(
        &self,
        id: AdapterId,
    ) -> Result<(AdapterIndex, &Adapter), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(|adapter_idx| (adapter_idx, &self.arena[adapter_idx]))
            .ok_or(Error::AdapterIdNotFound(id))
    }

    // Returns a mutable reference to the adapter corresponding to the given
    // ID.
    pub fn get_mut_by_id(
        &mut self,
        id: AdapterId,
    ) -> Result<(AdapterIndex, &mut Adapter), Error> {
        let adapter_idx = self
            .id_tree
            .get(&id)
            .copied()
            .ok_or(Error::AdapterIdNotFound(id))?;
        Ok((adapter_idx, &mut self.arena[adapter_idx]))
    }

    // Returns a reference to the active adapter of the given client.
    pub fn get_by_client(
        &self,
        client_id: ClientId,
    ) -> Option<(AdapterIndex, &Adapter)> {
        self.client_tree[client_id.index()]
            .map(|adapter_idx| (adapter_idx, &self.arena[adapter_idx]))
    }

    // Returns a reference to the connected adapter with the given name.
    pub fn get_by_name(&self, name: &str) -> Option<(AdapterIndex, &Adapter)> {
        self.list
            .iter()
            .map(|adapter_idx| (*adapter_idx, &self.arena[*adapter_idx]))
            .find(|(_, adapter)| adapter.name == name)
    }

    // Returns a reference to the connected adapter using the given file
    // descriptor.
    pub fn get_by_fd(&self, fd: RawFd) -> Option<(AdapterIndex, &Adapter)> {
        self.list
            .iter()
            .map(|adapter_idx| (*adapter_idx, &self.arena[*adapter_idx]))
            .find(|(_, adapter)| adapter.fd == fd)
    }

    // Returns an iterator visiting all connected adapters, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &'_ Adapter> + '_ {
        self.list.iter().map(|adapter_idx| &self.arena[*adapter_idx])
    }

    // Returns the number of connected adapters.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    // Get next adapter ID.
    fn next_id(&mut self) -> AdapterId {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }
}

impl std::ops::Index<AdapterIndex> for Adapters {
    type Output = Adapter;

    fn index(&self, index: AdapterIndex) -> &Self::Output {
        &self.arena[index]
    }
}

impl std::ops::IndexMut<AdapterIndex> for Adapters {
    fn index_mut(&mut self, index: AdapterIndex) -> &mut Self::Output {
        &mut self.arena[index]
    }
}
