//! `draft` subcommands: inspect or drop a saved compose draft.

use clap::Subcommand;
use partquote_client::{DraftStore, LocalStore};
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum DraftCommands {
    /// Print the saved draft for an order and how it will be grouped
    Show { order_id: Uuid },
    /// Delete the saved draft for an order
    Discard { order_id: Uuid },
}

pub(crate) async fn run(command: DraftCommands) -> anyhow::Result<()> {
    let config = partquote_core::load_client_config()?;
    let drafts = DraftStore::new(LocalStore::open(&config.state_dir).await?);

    match command {
        DraftCommands::Show { order_id } => {
            let Some(draft) = drafts.load(order_id).await? else {
                println!("no draft saved for order {order_id}");
                return Ok(());
            };
            println!(
                "draft for order {} saved {}",
                draft.order_id,
                draft.saved_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!(
                "{:<14}{:<18}{:<16}{:>10}{:>5}  TERM",
                "CODE", "TYPE", "MANUFACTURER", "PRICE", "QTY"
            );
            for line in &draft.lines {
                println!(
                    "{:<14}{:<18}{:<16}{:>10}{:>5}  {}",
                    line.part_code,
                    line.part_type,
                    line.manufacturer,
                    line.price_per_unit.to_string(),
                    line.quantity,
                    line.delivery_term
                );
            }
            let grouped = partquote_core::group_draft_lines(&draft.lines);
            println!(
                "{} line(s) group into {} part(s)",
                draft.lines.len(),
                grouped.len()
            );
        }
        DraftCommands::Discard { order_id } => {
            drafts.discard(order_id).await?;
            println!("draft for order {order_id} discarded");
        }
    }
    Ok(())
}
