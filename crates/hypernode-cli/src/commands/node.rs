//! Compute node commands.

use std::io::Write;

use hypernode_market::Marketplace;

use crate::cli::NodeCommands;
use crate::error::CliError;
use crate::output::{Message, NodeListed, NodeView, OutputFormat};

/// Node command executor.
pub struct NodeCommand<'a> {
    place: &'a Marketplace,
}

impl<'a> NodeCommand<'a> {
    /// Create a new node command.
    #[must_use]
    pub const fn new(place: &'a Marketplace) -> Self {
        Self { place }
    }

    /// Execute a node subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if the marketplace rejects the operation or
    /// writing fails.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &NodeCommands,
    ) -> Result<(), CliError> {
        match command {
            NodeCommands::List {
                market,
                node,
                stake,
            } => {
                let admission = self.place.list_node(*market, *node, *stake)?;
                format.write(
                    writer,
                    &NodeListed {
                        node: *node,
                        admission,
                    },
                )?;
            }
            NodeCommands::Delist { market, node } => {
                self.place.delist_node(*market, *node)?;
                let msg = Message::success(format!("Delisted node {node} from market {market}"));
                format.write(writer, &msg)?;
            }
            NodeCommands::Show { node } => {
                let view = NodeView::new(
                    *node,
                    self.place.balance(node),
                    self.place.reputation(node),
                );
                format.write(writer, &view)?;
            }
        }
        Ok(())
    }
}
