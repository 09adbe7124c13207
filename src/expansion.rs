//! Asynchronous row expansion.
//!
//! Expanding a row through the async hook moves it to
//! `Expansion::Expanding(token)` and hands out an [`ExpansionTicket`]. The
//! children only appear when the ticket comes back through
//! `Grid::complete_expansion` while the row still exists and still carries the
//! same token. Every toggle bumps the row's token, so a completion for an
//! earlier request is recognized as stale and dropped.

use crate::tree::{Expansion, RowId, RowTree};
use log::warn;

/// Receipt for one outstanding expansion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpansionTicket {
    row: RowId,
    token: u64,
}

impl ExpansionTicket {
    pub fn row(&self) -> RowId {
        self.row
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}

/// Put a row into the loading state and issue its ticket.
pub(crate) fn begin(tree: &mut RowTree, ix: usize) -> ExpansionTicket {
    let token = tree.next_expand_token(ix);
    tree.set_expansion(ix, Expansion::Expanding(token));
    ExpansionTicket {
        row: tree.node(ix).id(),
        token,
    }
}

/// Expand synchronously. Any outstanding request becomes stale.
pub(crate) fn expand(tree: &mut RowTree, ix: usize) {
    tree.next_expand_token(ix);
    tree.set_expansion(ix, Expansion::Expanded);
}

/// Collapse. Any outstanding request becomes stale.
pub(crate) fn collapse(tree: &mut RowTree, ix: usize) {
    tree.next_expand_token(ix);
    tree.set_expansion(ix, Expansion::Collapsed);
}

/// Resolve a returning ticket to the row it expands, or None if it is stale.
pub(crate) fn redeem(tree: &RowTree, ticket: ExpansionTicket) -> Option<usize> {
    let Ok(ix) = tree.resolve(ticket.row) else {
        warn!("expansion result for removed row {} dropped", ticket.row);
        return None;
    };
    match tree.node(ix).expansion() {
        Expansion::Expanding(token) if token == ticket.token => Some(ix),
        state => {
            warn!(
                "stale expansion result for row {} (token {}, row is {:?}) dropped",
                ticket.row, ticket.token, state
            );
            None
        }
    }
}
