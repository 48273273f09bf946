use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use futures_util::StreamExt;

use bx_domain::config::Config;
use bx_exchange::{Block, BlockStore, Cid, Exchange, Fetcher, FsBlockStore, LocalExchange};
use bx_sessions::Scope;

fn open_store(config: &Config) -> anyhow::Result<FsBlockStore> {
    FsBlockStore::open(&config.store.path)
        .with_context(|| format!("opening block store at {}", config.store.path.display()))
}

fn open_exchange(config: &Config) -> anyhow::Result<LocalExchange> {
    let store = open_store(config)?;
    Ok(LocalExchange::new(Arc::new(store), &config.exchange))
}

fn parse_cid(raw: &str) -> anyhow::Result<Cid> {
    raw.parse().with_context(|| format!("invalid CID {raw:?}"))
}

/// A root scope that is canceled on Ctrl-C.
fn interruptible_scope() -> Scope {
    let scope = Scope::new();
    let on_signal = scope.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, canceling fetch");
            on_signal.cancel();
        }
    });
    scope
}

/// `bx add <files>...`
pub async fn add(config: &Config, files: &[PathBuf]) -> anyhow::Result<()> {
    let exchange = open_exchange(config)?;

    for path in files {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let block = Block::new(data);
        let cid = *block.cid();
        exchange
            .has_block(block)
            .await
            .with_context(|| format!("adding {}", path.display()))?;
        println!("{cid}  {}", path.display());
    }

    exchange.close().context("closing exchange")?;
    Ok(())
}

/// `bx get <cid> [--out <path>]`
pub async fn get(config: &Config, cid: &str, out: Option<&Path>) -> anyhow::Result<()> {
    let cid = parse_cid(cid)?;
    let exchange = open_exchange(config)?;
    let root = interruptible_scope();
    let fetcher = exchange.session(&root);
    tracing::debug!(session = %fetcher.id(), %cid, "fetching block");

    let call = fetcher.scope().with_timeout(config.exchange.fetch_timeout());
    let result = fetcher.get_block(&call, &cid).await;
    root.cancel();
    exchange.close().context("closing exchange")?;

    let block = result.with_context(|| format!("fetching {cid}"))?;
    match out {
        Some(path) => std::fs::write(path, block.data())
            .with_context(|| format!("writing {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(block.data())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// `bx get-many <cids>...`
///
/// Prints `<cid> <size>` for every block delivered and `missing <cid>` on
/// stderr for the rest.  Returns false when any block was not delivered.
pub async fn get_many(config: &Config, cids: &[String]) -> anyhow::Result<bool> {
    let wanted = cids
        .iter()
        .map(|raw| parse_cid(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let exchange = open_exchange(config)?;
    let root = interruptible_scope();
    let fetcher = exchange.session(&root);

    let call = fetcher.scope().with_timeout(config.exchange.fetch_timeout());
    let mut stream = fetcher
        .get_blocks(&call, &wanted)
        .await
        .context("starting block stream")?;

    let mut delivered = HashSet::new();
    while let Some(block) = stream.next().await {
        println!("{} {}", block.cid(), block.len());
        delivered.insert(*block.cid());
    }
    drop(stream);

    if let Some(stats) = exchange.session_stats(fetcher.id()) {
        tracing::debug!(
            session = %stats.id,
            fetched = stats.blocks_fetched,
            missed = stats.blocks_missed,
            "session finished"
        );
    }
    root.cancel();
    exchange.close().context("closing exchange")?;

    let mut complete = true;
    for cid in wanted.iter().filter(|c| !delivered.contains(c)) {
        eprintln!("missing {cid}");
        complete = false;
    }
    Ok(complete)
}

/// `bx has <cid>`
pub fn has(config: &Config, cid: &str) -> anyhow::Result<bool> {
    let cid = parse_cid(cid)?;
    let store = open_store(config)?;
    Ok(store.has(&cid)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.store.path = dir.join("blocks");
        config.exchange.fetch_timeout_ms = 200;
        config
    }

    #[tokio::test]
    async fn added_file_is_present_and_fetchable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let input = dir.path().join("input.txt");
        std::fs::write(&input, b"hello").unwrap();

        add(&config, &[input]).await.unwrap();

        let cid = Cid::raw(b"hello").to_string();
        assert!(has(&config, &cid).unwrap());

        let out = dir.path().join("out.bin");
        get(&config, &cid, Some(&out)).await.unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn get_many_reports_missing_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let input = dir.path().join("a.txt");
        std::fs::write(&input, b"a").unwrap();
        add(&config, &[input]).await.unwrap();

        let present = Cid::raw(b"a").to_string();
        let absent = Cid::raw(b"b").to_string();
        assert!(get_many(&config, &[present.clone()]).await.unwrap());
        assert!(!get_many(&config, &[present, absent]).await.unwrap());
    }

    #[tokio::test]
    async fn get_of_unknown_block_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let cid = Cid::raw(b"nowhere").to_string();
        assert!(!has(&config, &cid).unwrap());
        assert!(get(&config, &cid, None).await.is_err());
    }

    #[test]
    fn bad_cid_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = has(&config, "not-a-cid").unwrap_err();
        assert!(err.to_string().contains("not-a-cid"));
    }
}
