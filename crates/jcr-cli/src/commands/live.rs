//! `jcr watch` / `complete` / `set-open`: live order board commands.
//!
//! Each command mounts the bar's live page (gate, page data, channel), waits
//! for the snapshot, acts, and unmounts so the channel is closed on every
//! path.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Result};
use jcr_config::PortalConfig;
use jcr_gate::HttpIdentitySource;
use jcr_live::{Applied, BoardUpdate, LiveBoard, OrderNotifier};
use jcr_page::{AdminPage, Portal, PortalError};
use jcr_schemas::{BarKind, LiveOrder, OrderId};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

/// Rings the terminal bell once per new order.
pub struct TerminalBell;

impl OrderNotifier for TerminalBell {
    fn order_placed(&self, bar: BarKind, order: &LiveOrder) {
        let mut out = std::io::stdout();
        let _ = write!(out, "\x07");
        let _ = writeln!(out, "new order #{} on {bar}", order.id);
        let _ = out.flush();
    }
}

pub fn live_route(bar: BarKind) -> &'static str {
    match bar {
        BarKind::Toastie => "/admin/toastie/live",
        BarKind::Drinks => "/admin/bar/live",
    }
}

async fn mount(
    portal: &Portal<HttpIdentitySource>,
    bar: BarKind,
    notifier: Arc<dyn OrderNotifier>,
) -> Result<AdminPage<Value>> {
    let path = format!("/api/{}/orders", bar.as_str());
    let page = portal
        .mount_live(live_route(bar), bar, notifier, |rest| async move {
            rest.get_json::<Value>(&path).await
        })
        .await;

    if let Some(err) = page.failure().await {
        bail!("{err}");
    }
    if let Some(err) = page.live_error() {
        bail!("{err}");
    }
    Ok(page)
}

async fn seeded(page: &AdminPage<Value>, cfg: &PortalConfig) -> Result<LiveBoard> {
    let Some(ch) = page.live() else {
        bail!("live channel is not open");
    };
    Ok(ch.wait_for(cfg.request_timeout, |b| b.is_seeded()).await?)
}

pub async fn watch(cfg: &PortalConfig, bar: BarKind, once: bool) -> Result<()> {
    let portal = super::portal(cfg)?;
    let page = mount(&portal, bar, Arc::new(TerminalBell)).await?;
    let board = seeded(&page, cfg).await?;
    print!("{}", render_board(&board));

    if once {
        page.unmount().await;
        return Ok(());
    }

    let Some(ch) = page.live() else {
        bail!("live channel is not open");
    };
    let mut updates = ch.subscribe_updates();
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(BoardUpdate::Applied(Applied::Inconsistent(inc))) => {
                    eprintln!("{}", PortalError::from(inc));
                }
                Ok(BoardUpdate::Applied(Applied::Buffered(_))) => {}
                Ok(BoardUpdate::Applied(_)) | Err(RecvError::Lagged(_)) => {
                    print!("{}", render_board(&ch.board().await));
                }
                Ok(BoardUpdate::Disconnected) | Err(RecvError::Closed) => {
                    eprintln!("live channel disconnected");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    page.unmount().await;
    Ok(())
}

pub async fn complete(cfg: &PortalConfig, bar: BarKind, order: u64) -> Result<()> {
    let portal = super::portal(cfg)?;
    let page = mount(&portal, bar, Arc::new(jcr_live::SilentNotifier)).await?;
    let result = complete_on(&page, cfg, OrderId(order)).await;
    page.unmount().await;
    result
}

async fn complete_on(page: &AdminPage<Value>, cfg: &PortalConfig, id: OrderId) -> Result<()> {
    let board = seeded(page, cfg).await?;
    match board.order(id) {
        None => bail!("order #{id} is not on the {} board", board.bar()),
        Some(o) if !o.is_outstanding() => {
            println!("order #{id} already completed");
            return Ok(());
        }
        Some(_) => {}
    }

    let Some(ch) = page.live() else {
        bail!("live channel is not open");
    };
    ch.request_complete(id, true).await?;
    let board = ch
        .wait_for(cfg.request_timeout, |b| {
            b.order(id).is_some_and(|o| !o.is_outstanding())
        })
        .await?;
    if let Some(at) = board.order(id).and_then(|o| o.completed_at) {
        println!("completed order #{id} at {}", at.to_rfc3339());
    }
    Ok(())
}

pub async fn set_open(cfg: &PortalConfig, bar: BarKind, open: bool) -> Result<()> {
    let portal = super::portal(cfg)?;
    let page = mount(&portal, bar, Arc::new(jcr_live::SilentNotifier)).await?;
    let result = set_open_on(&page, cfg, open).await;
    page.unmount().await;
    result
}

async fn set_open_on(page: &AdminPage<Value>, cfg: &PortalConfig, open: bool) -> Result<()> {
    seeded(page, cfg).await?;
    let Some(ch) = page.live() else {
        bail!("live channel is not open");
    };
    ch.request_set_open(open).await?;
    let board = ch
        .wait_for(cfg.request_timeout, |b| !b.has_pending_open())
        .await?;
    println!("{} is now {}", board.bar(), if board.is_open() { "open" } else { "closed" });
    Ok(())
}

/// Plain-text board: header line, then one line per outstanding order.
pub fn render_board(board: &LiveBoard) -> String {
    let mut out = format!(
        "{} {} outstanding={}\n",
        board.bar(),
        if board.is_open() { "OPEN" } else { "CLOSED" },
        board.outstanding_count()
    );
    for o in board.outstanding() {
        out.push_str(&format!(
            "  #{:<5} {} {}{}\n",
            o.id.0,
            o.placed_at.format("%H:%M:%S"),
            o.payload,
            if board.is_completing(o.id) { " (completing)" } else { "" }
        ));
    }
    out
}
