//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod adapter;
mod framing;
mod txn;
mod xpath;
