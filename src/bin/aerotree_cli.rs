// src/bin/aerotree_cli.rs
//
// A small maintenance CLI over the engine's two read-side passes: `stats`
// (classify every page in a tree file) and `rescue` (reinsert every record
// from a possibly-damaged file into a fresh one).

use std::env;
use std::fs::OpenOptions;
use std::process::ExitCode;

use log::{info, warn};

use aerotree::analyzer::{rescue_multi, rescue_simple, stats};
use aerotree::config::{Kind, META_SIZE};
use aerotree::storage::pager::Pager;
use aerotree::tree::{multi::MultiTree, simple::SimpleTree, Meta};
use aerotree::Config;

struct Options {
    order: u32,
    ref_order: u32,
    value_size: u32,
    item_size: u32,
    item_order: u32,
    page_size: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Options { order: 64, ref_order: 64, value_size: 64, item_size: 16, item_order: 64, page_size: None }
    }
}

fn parse_flags(args: &[String]) -> Options {
    let mut opts = Options::default();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        let value = || it.clone().next().cloned();
        match arg.as_str() {
            "--order" => opts.order = value().and_then(|v| v.parse().ok()).unwrap_or(opts.order),
            "--ref-order" => opts.ref_order = value().and_then(|v| v.parse().ok()).unwrap_or(opts.ref_order),
            "--value-size" => opts.value_size = value().and_then(|v| v.parse().ok()).unwrap_or(opts.value_size),
            "--item-size" => opts.item_size = value().and_then(|v| v.parse().ok()).unwrap_or(opts.item_size),
            "--item-order" => opts.item_order = value().and_then(|v| v.parse().ok()).unwrap_or(opts.item_order),
            "--page-size" => opts.page_size = value().and_then(|v| v.parse().ok()),
            _ => continue,
        }
        it.next();
    }
    opts
}

fn config_for(kind: Kind, opts: &Options) -> Config {
    Config {
        kind,
        order: opts.order,
        ref_order: opts.ref_order,
        value_size: opts.value_size,
        item_size: opts.item_size,
        item_order: opts.item_order,
        page_size: opts.page_size,
    }
}

/// Peek the meta block's kind tag without committing to a `Config`, so the
/// caller can build the right one before actually opening the tree.
fn peek_kind(path: &str) -> std::io::Result<Kind> {
    let file = OpenOptions::new().read(true).open(path)?;
    let mut probe = Pager::open(file, 1, META_SIZE).map_err(std::io::Error::other)?;
    let raw = probe.read_meta().map_err(std::io::Error::other)?;
    Kind::from_tag(raw[0]).map_err(std::io::Error::other)
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.split_first() {
        Some((cmd, rest)) if cmd == "stats" => cmd_stats(rest),
        Some((cmd, rest)) if cmd == "rescue" => cmd_rescue(rest),
        _ => Err("usage: aerotree-cli <stats|rescue> <args...>".to_string()),
    }
}

fn cmd_stats(rest: &[String]) -> Result<(), String> {
    let path = rest.first().ok_or("usage: aerotree-cli stats <file> [--order N ...]")?;
    let opts = parse_flags(&rest[1..]);
    let kind = peek_kind(path).map_err(|e| e.to_string())?;
    let cfg = config_for(kind, &opts);

    let file = OpenOptions::new().read(true).write(true).open(path).map_err(|e| e.to_string())?;
    let mut pager = Pager::open(file, cfg.resolved_page_size(), META_SIZE).map_err(|e| e.to_string())?;
    let meta_raw = pager.read_meta().map_err(|e| e.to_string())?;
    let meta = Meta::decode(&meta_raw).map_err(|e| e.to_string())?;

    let report = stats(&mut pager, &cfg, &meta).map_err(|e| e.to_string())?;
    info!(
        "pages={} start={} leaf={} structure={} root={} data={} items={} empty={} records={} refs={} root_page={} free_head={}",
        report.page_count,
        report.start_pages,
        report.leaf_pages,
        report.structure_pages,
        report.root_pages,
        report.data_pages,
        report.items_pages,
        report.empty_pages,
        report.record_count,
        report.reference_count,
        report.root_page,
        report.free_head,
    );
    Ok(())
}

fn cmd_rescue(rest: &[String]) -> Result<(), String> {
    if rest.len() < 2 {
        return Err("usage: aerotree-cli rescue <src-file> <dst-file> [--order N ...]".to_string());
    }
    let src_path = &rest[0];
    let dst_path = &rest[1];
    let opts = parse_flags(&rest[2..]);
    let kind = peek_kind(src_path).map_err(|e| e.to_string())?;
    let cfg = config_for(kind, &opts);

    let src_file = OpenOptions::new().read(true).write(true).open(src_path).map_err(|e| e.to_string())?;
    let mut src_pager = Pager::open(src_file, cfg.resolved_page_size(), META_SIZE).map_err(|e| e.to_string())?;

    let dst_file = OpenOptions::new().read(true).write(true).create(true).open(dst_path).map_err(|e| e.to_string())?;

    let report = match kind {
        Kind::Simple => {
            let mut dst = SimpleTree::open(dst_file, cfg).map_err(|e| e.to_string())?;
            let report = rescue_simple(&mut src_pager, &cfg, &mut dst).map_err(|e| e.to_string())?;
            dst.flush().map_err(|e| e.to_string())?;
            report
        }
        Kind::Multi => {
            let mut dst = MultiTree::open(dst_file, cfg).map_err(|e| e.to_string())?;
            let report = rescue_multi(&mut src_pager, &cfg, &mut dst).map_err(|e| e.to_string())?;
            dst.flush().map_err(|e| e.to_string())?;
            report
        }
    };

    info!(
        "rescue complete: seen={} inserted={} duplicates_skipped={}",
        report.records_seen, report.records_inserted, report.duplicates_skipped
    );
    if report.duplicates_skipped > 0 {
        warn!("{} duplicate key(s) were dropped during rescue", report.duplicates_skipped);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            warn!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
