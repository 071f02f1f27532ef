//! `jcr verify` / `jcr fetch`: the gate -> load path of a regular admin page.

use anyhow::{bail, Result};
use jcr_config::PortalConfig;
use jcr_gate::GateDecision;
use jcr_load::FetchError;
use jcr_page::PageView;
use serde_json::Value;

pub async fn verify(cfg: &PortalConfig, route: &str) -> Result<()> {
    let portal = super::portal(cfg)?;
    let page = portal
        .mount(route, |_rest| async { Ok::<_, FetchError>(()) })
        .await;

    match page.decision() {
        GateDecision::Granted { user } => {
            let who = user.as_ref().map(|u| u.username.as_str()).unwrap_or("-");
            println!("granted route={route} user={who}");
            Ok(())
        }
        GateDecision::Denied { status, reason } => {
            println!("denied route={route} status={status} reason={}", reason.as_str());
            bail!("{} (status={status})", reason.message())
        }
    }
}

pub async fn fetch(cfg: &PortalConfig, route: &str, path: &str) -> Result<()> {
    let portal = super::portal(cfg)?;
    let path = path.to_string();
    let page = portal
        .mount(route, |rest| async move { rest.get_json::<Value>(&path).await })
        .await;

    match page.view().await {
        PageView::Content { data, .. } => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        PageView::Redirect(status) => match page.failure().await {
            Some(err) => bail!("{err} -> error view {status}"),
            None => bail!("redirect to error view {status}"),
        },
        // No status recorded: a page would keep its loading indicator up.
        PageView::Loading | PageView::WaitingForLive => {
            bail!("no response from {}; the page would keep loading", cfg.base_url)
        }
    }
}
