// Copyright 2025 Janek Bevendorff
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! warcstream CLI
//!
//! # Commands
//!
//! - `list` - One line per record (index, offset, type, length, status, URI)
//! - `extract` - Write one record's body to stdout
//! - `stats` - Record counts per type and HTTP status class

mod cli;

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use warcstream::{transport, ArchiveIterator, ArchiveIteratorConfig, BlockSource, WarcRecord};

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = cli.archive_config();
    match &cli.command {
        Command::List { file } => list(file, config),
        Command::Extract { file, index, .. } => extract(file, config, *index),
        Command::Stats { file } => stats(file, config),
    }
}

fn open(path: &Path, config: ArchiveIteratorConfig) -> Result<ArchiveIterator<Box<dyn BufRead>>> {
    transport::open_archive(path, config)
        .with_context(|| format!("failed to open {}", path.display()))
}

/// Call `f` for each record until it returns `false`.
///
/// Recoverable errors (under the yield policy) are logged and iteration
/// continues. Anything that ends iteration is returned.
fn for_each_record<R, F>(archive: &mut ArchiveIterator<R>, mut f: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&mut WarcRecord<BlockSource<'_, R>>) -> Result<bool>,
{
    loop {
        let err = match archive.read_next() {
            Ok(Some(mut record)) => {
                if !f(&mut record)? {
                    return Ok(());
                }
                continue;
            }
            Ok(None) => return Ok(()),
            Err(err) => err,
        };
        if archive.is_finished() {
            return Err(err.into());
        }
        warn!("{err}");
    }
}

fn list(path: &Path, config: ArchiveIteratorConfig) -> Result<()> {
    let mut archive = open(path, config)?;
    let mut out = io::stdout().lock();
    for_each_record(&mut archive, |record| {
        let position = record.position();
        let status = record
            .response()
            .map_or_else(|| "-".to_string(), |r| r.status_code().to_string());
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            position.index,
            position.offset,
            record.record_type(),
            record.content_length(),
            status,
            record.target_uri().as_deref().unwrap_or("-"),
        )?;
        Ok(true)
    })
}

fn extract(path: &Path, config: ArchiveIteratorConfig, index: u64) -> Result<()> {
    let mut archive = open(path, config)?;
    let mut found = false;
    for_each_record(&mut archive, |record| {
        if record.position().index != index {
            return Ok(index > record.position().index);
        }
        let mut out = io::stdout().lock();
        io::copy(record, &mut out).context("failed to copy record body")?;
        out.flush()?;
        found = true;
        Ok(false)
    })?;
    if !found {
        bail!("no record with index {index} in {}", path.display());
    }
    Ok(())
}

fn stats(path: &Path, config: ArchiveIteratorConfig) -> Result<()> {
    let mut archive = open(path, config)?;
    let mut types: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut statuses: BTreeMap<String, u64> = BTreeMap::new();
    let mut bytes = 0u64;
    for_each_record(&mut archive, |record| {
        *types.entry(record.record_type().as_str()).or_default() += 1;
        if let Some(response) = record.response() {
            let class = format!("{}xx", response.status_code() / 100);
            *statuses.entry(class).or_default() += 1;
        }
        bytes += record.content_length();
        Ok(true)
    })?;

    let mut out = io::stdout().lock();
    let total: u64 = types.values().sum();
    writeln!(out, "records\t{total}")?;
    writeln!(out, "content bytes\t{bytes}")?;
    for (record_type, count) in &types {
        writeln!(out, "type {record_type}\t{count}")?;
    }
    for (class, count) in &statuses {
        writeln!(out, "status {class}\t{count}")?;
    }
    Ok(())
}
