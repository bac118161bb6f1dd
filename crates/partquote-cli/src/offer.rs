//! `offer` subcommands and session management, all through the API client.

use anyhow::Context;
use clap::Subcommand;
use partquote_client::{ClientError, OfferClient, OfferDocument, OfferQuery, Session};
use partquote_core::OfferStatus;
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum OfferCommands {
    /// List offers, newest first
    List {
        /// Filter by status (e.g. trimisa)
        #[arg(long, value_parser = parse_status)]
        status: Option<OfferStatus>,
        /// Filter by order id
        #[arg(long)]
        order_id: Option<Uuid>,
        #[arg(long, default_value = "1")]
        page: i64,
        #[arg(long, default_value = "20")]
        per_page: i64,
    },
    /// Show one offer with its order, parts and selection
    Show { id: Uuid },
    /// Send a draft offer to the client
    Send { id: Uuid },
    /// Accept an offer awaiting finalization
    Accept { id: Uuid },
    /// Reject an offer awaiting finalization
    Reject { id: Uuid },
    /// Move delivery forward or cancel
    Delivery {
        id: Uuid,
        /// livrare_in_procesare, livrata or anulata
        #[arg(long, value_parser = parse_status)]
        status: OfferStatus,
    },
}

pub(crate) fn parse_status(raw: &str) -> Result<OfferStatus, String> {
    raw.parse()
}

async fn client() -> anyhow::Result<OfferClient> {
    let config = partquote_core::load_client_config()?;
    Ok(OfferClient::from_config(&config).await?)
}

/// Turns a forced sign-out into a hint the user can act on.
fn explain(err: ClientError) -> anyhow::Error {
    match err {
        ClientError::Unauthorized => {
            anyhow::anyhow!("session expired; run `partquote-cli login` and retry")
        }
        other => other.into(),
    }
}

pub(crate) async fn run(command: OfferCommands) -> anyhow::Result<()> {
    let client = client().await?;
    match command {
        OfferCommands::List {
            status,
            order_id,
            page,
            per_page,
        } => {
            let query = OfferQuery {
                status,
                order_id,
                page: Some(page),
                per_page: Some(per_page),
            };
            let page = client.list_offers(&query).await.map_err(explain)?;
            if page.items.is_empty() {
                println!("no offers found");
                return Ok(());
            }
            println!(
                "{:<38}{:<26}{:>6}{:>12}  CREATED",
                "ID", "STATUS", "PARTS", "NET"
            );
            for offer in &page.items {
                println!(
                    "{:<38}{:<26}{:>6}{:>12}  {}",
                    offer.id.to_string(),
                    offer.status.as_str(),
                    offer.parts.len(),
                    offer.total.to_string(),
                    offer.created_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!(
                "page {} ({} per page), {} offer(s) in total",
                page.page, page.per_page, page.total
            );
        }
        OfferCommands::Show { id } => {
            let offer = client.get_offer(id).await.map_err(explain)?;
            print_offer(&offer);
        }
        OfferCommands::Send { id } => {
            let offer = client.send_offer(id).await.map_err(explain)?;
            println!("offer {} is now {}", offer.id, offer.status);
        }
        OfferCommands::Accept { id } => {
            let offer = client.accept_offer(id).await.map_err(explain)?;
            println!("offer {} is now {}", offer.id, offer.status);
        }
        OfferCommands::Reject { id } => {
            let offer = client.reject_offer(id).await.map_err(explain)?;
            println!("offer {} is now {}", offer.id, offer.status);
        }
        OfferCommands::Delivery { id, status } => {
            let offer = client
                .update_delivery(id, status)
                .await
                .map_err(explain)?;
            println!("offer {} is now {}", offer.id, offer.status);
        }
    }
    Ok(())
}

fn print_offer(offer: &OfferDocument) {
    println!("Offer:  {}", offer.id);
    println!("Status: {}", offer.status);
    match offer.order_id.summary() {
        Some(order) => {
            println!("Order:  {} ({})", order.id, order.customer_name);
            if let Some(vehicle) = &order.vehicle {
                println!("Vehicle: {vehicle}");
            }
        }
        None => println!("Order:  {}", offer.order_id.id()),
    }

    println!();
    println!("{:<14}{:<18}{:>5}  {:<12}OPTIONS", "CODE", "TYPE", "QTY", "TERM");
    for part in &offer.parts {
        let options = part
            .options
            .iter()
            .map(|o| format!("{} @ {}", o.manufacturer, o.unit_price))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<14}{:<18}{:>5}  {:<12}{}",
            part.part_code, part.part_type, part.quantity, part.delivery_term, options
        );
    }

    if offer.selected_parts.is_empty() {
        return;
    }
    println!();
    println!("Selected:");
    for line in &offer.selected_parts {
        println!(
            "  {:<18}{:<14}{:>4} x {:>10} = {:>10}",
            line.part_type,
            line.manufacturer,
            line.quantity,
            line.unit_price.to_string(),
            line.line_total.to_string()
        );
    }
    let delivery = if offer.pickup_at_central {
        "pickup at central".to_string()
    } else {
        offer
            .delivery_address
            .as_ref()
            .map_or_else(|| "not set".to_string(), |a| format!("{}, {}", a.street, a.city))
    };
    println!("Delivery: {delivery}");
    println!(
        "Net {} + VAT {} ({}) = {} RON",
        offer.totals.net, offer.totals.vat, offer.totals.vat_rate, offer.totals.gross
    );
}

pub(crate) async fn run_login(
    access_token: String,
    refresh_token: Option<String>,
) -> anyhow::Result<()> {
    let client = client().await?;
    client
        .sign_in(Session::new(access_token, refresh_token))
        .await
        .context("failed to store session")?;
    println!("session stored in {}", client.store().root().display());
    Ok(())
}

pub(crate) async fn run_logout() -> anyhow::Result<()> {
    let client = client().await?;
    client.sign_out().await.context("failed to clear session")?;
    println!("signed out");
    Ok(())
}
