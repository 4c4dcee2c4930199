#![deny(warnings)]

//! Headless driver: runs one FinanCity session from the terminal.

use accounts::{AccountsClient, Credentials};
use anyhow::{anyhow, bail, Context, Result};
use sim_core::{RegionName, UpgradeKind};
use sim_econ::InvestmentKind;
use sim_runtime::{RuntimeConfig, SessionHandle, Snapshot};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config: Option<String>,
    seconds: Option<u64>,
    seed: Option<u64>,
    tick_ms: Option<u64>,
    invest: Vec<(InvestmentKind, RegionName)>,
    upgrades: Vec<UpgradeKind>,
    chat: Option<String>,
    analyze: bool,
    login: Option<(String, String)>,
    register: Option<(String, String)>,
}

fn split_pair(s: &str, flag: &str) -> Result<(String, String)> {
    s.split_once(':')
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .ok_or_else(|| anyhow!("{flag} expects <a>:<b>, got {s:?}"))
}

fn parse_args<I: Iterator<Item = String>>(mut it: I) -> Result<CliArgs> {
    let mut args = CliArgs::default();
    while let Some(arg) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow!("{arg} needs a value"));
        match arg.as_str() {
            "--config" => args.config = Some(value()?),
            "--seconds" => args.seconds = Some(value()?.parse::<u64>().context("--seconds")?),
            "--seed" => args.seed = Some(value()?.parse::<u64>().context("--seed")?),
            "--tick-ms" => args.tick_ms = Some(value()?.parse::<u64>().context("--tick-ms")?),
            "--invest" => {
                let (kind, region) = split_pair(&value()?, "--invest")?;
                args.invest.push((kind.parse()?, region.parse()?));
            }
            "--upgrade" => args.upgrades.push(value()?.parse()?),
            "--chat" => args.chat = Some(value()?),
            "--analyze" => args.analyze = true,
            "--login" => args.login = Some(split_pair(&value()?, "--login")?),
            "--register" => args.register = Some(split_pair(&value()?, "--register")?),
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn load_config(args: &CliArgs) -> Result<RuntimeConfig> {
    let mut cfg = match &args.config {
        Some(path) => RuntimeConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => RuntimeConfig::default(),
    };
    cfg.apply_overrides(|k| std::env::var(k).ok());
    if let Some(seed) = args.seed {
        cfg.game.rng_seed = Some(seed);
    }
    if let Some(ms) = args.tick_ms {
        cfg.timers.tick_interval_ms = ms;
    }
    cfg.validate()?;
    Ok(cfg)
}

async fn authenticate(cfg: &RuntimeConfig, args: &CliArgs) -> Result<()> {
    let (creds, register) = match (&args.register, &args.login) {
        (Some((u, p)), _) => (Credentials::new(u, p), true),
        (None, Some((u, p))) => (Credentials::new(u, p), false),
        (None, None) => return Ok(()),
    };
    let base = cfg
        .accounts
        .base_url
        .as_deref()
        .ok_or_else(|| anyhow!("accounts.base_url is not configured"))?;
    let client = AccountsClient::new(base);
    let session = if register {
        client.register(&creds).await?
    } else {
        client.login(&creds).await?
    };
    println!("Logged in as {}", session.username);
    Ok(())
}

fn print_summary(snap: &Snapshot) {
    let st = &snap.state;
    println!(
        "Session {} | phase: {:?} | time left: {}s | money: ${} | influence: {} | research: {} | avg region influence: {:.1}",
        snap.generation,
        snap.phase,
        st.time_remaining,
        st.assets.money,
        st.assets.influence,
        st.assets.research_points,
        st.average_influence(),
    );
    for (name, r) in &st.regions {
        println!(
            "  {:<14} influence {:>5.1} | vulnerability {:.2} | economy {:>6.1}",
            name.label(),
            r.influence_level,
            r.vulnerability,
            r.economy
        );
    }
    if let Some(p) = st.market_series.last() {
        println!(
            "Market day {} | stocks {:.2} | commodities {:.2} | crypto {:.2}",
            p.day, p.stocks, p.commodities, p.crypto
        );
    }
    if let Some(n) = &st.pending_notification {
        println!("[{:?}] {}", n.kind, n.message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    info!(
        sha = env!("GIT_SHA"),
        built = env!("BUILD_DATE"),
        seconds = ?args.seconds,
        "starting financity"
    );

    let cfg = load_config(&args)?;
    authenticate(&cfg, &args).await?;
    let advisor = cfg.build_advisor(|k| std::env::var(k).ok())?;
    if advisor.is_none() {
        info!("advisor disabled; chat will use fallback replies");
    }

    let (session, task) = SessionHandle::spawn(cfg, advisor);
    session.start()?;

    for (kind, region) in &args.invest {
        match session.invest(*kind, *region).await {
            Ok(()) => println!("Invested in {kind} ({region})"),
            Err(e) => warn!(error = %e, "investment failed"),
        }
    }
    for kind in &args.upgrades {
        match session.purchase_upgrade(*kind).await {
            Ok(()) => println!("Bought {kind}"),
            Err(e) => warn!(error = %e, "upgrade failed"),
        }
    }
    if let Some(text) = &args.chat {
        println!("> {text}");
        println!("{}", session.chat(text).await?);
    }
    if args.analyze {
        println!("{}", session.analyze_risk().await?);
    }

    if let Some(secs) = args.seconds {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    print_summary(&session.snapshot());
    session.shutdown()?;
    task.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_full_command_line() {
        let args = parse(&[
            "--seconds", "12", "--seed", "7", "--invest", "stocks:europe", "--invest",
            "media:na", "--upgrade", "lobbyists", "--chat", "hello", "--analyze",
            "--login", "ana:pw",
        ])
        .unwrap();
        assert_eq!(args.seconds, Some(12));
        assert_eq!(args.seed, Some(7));
        assert_eq!(
            args.invest,
            vec![
                (InvestmentKind::Stocks, RegionName::Europe),
                (InvestmentKind::Media, RegionName::NorthAmerica)
            ]
        );
        assert_eq!(args.upgrades, vec![UpgradeKind::Lobbyists]);
        assert_eq!(args.chat.as_deref(), Some("hello"));
        assert!(args.analyze);
        assert_eq!(args.login, Some(("ana".into(), "pw".into())));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--seconds"]).is_err());
        assert!(parse(&["--invest", "stocks"]).is_err());
        assert!(parse(&["--invest", "bonds:asia"]).is_err());
        assert!(parse(&["--frobnicate"]).is_err());
    }

    #[test]
    fn cli_overrides_config() {
        let args = parse(&["--seed", "3", "--tick-ms", "50"]).unwrap();
        let cfg = load_config(&args).unwrap();
        assert_eq!(cfg.game.rng_seed, Some(3));
        assert_eq!(cfg.timers.tick_interval_ms, 50);
    }
}
