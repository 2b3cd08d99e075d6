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

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use warcstream::{ArchiveIteratorConfig, ErrorPolicy, WarcRecordType};

#[derive(Parser, Debug)]
#[command(name = "warcstream")]
#[command(version)]
#[command(about = "List, inspect and extract records from WARC files", long_about = None)]
#[command(after_help = "Examples:\n  \
  warcstream list crawl.warc.gz                 one line per record\n  \
  warcstream --type response stats crawl.warc   count response records\n  \
  warcstream extract crawl.warc --index 3 > body.html")]
pub struct Cli {
    /// What to do when a record is malformed
    #[arg(global = true, long, value_enum, default_value_t = Policy::FailFast)]
    pub policy: Policy,

    /// Tolerate malformed input (skip garbage between records)
    #[arg(global = true, long)]
    pub lenient: bool,

    /// Only read records of this type (repeatable)
    #[arg(global = true, long = "type", value_name = "TYPE", value_parser = parse_record_type)]
    pub types: Vec<WarcRecordType>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print one line per record
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Write a record's HTTP body (or raw content block) to stdout
    Extract {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Index of the record in the file, starting at 0
        #[arg(short, long)]
        index: u64,

        /// Write the raw content block instead of the decoded HTTP body
        #[arg(long)]
        raw: bool,
    },

    /// Count records per type and HTTP status class
    Stats {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    /// Stop at the first error
    FailFast,
    /// Report each error and continue
    Yield,
    /// Log malformed records and skip them
    Skip,
}

impl From<Policy> for ErrorPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::FailFast => ErrorPolicy::FailFast,
            Policy::Yield => ErrorPolicy::Yield,
            Policy::Skip => ErrorPolicy::SkipAndLog,
        }
    }
}

fn parse_record_type(name: &str) -> Result<WarcRecordType, String> {
    match WarcRecordType::from_name(name) {
        WarcRecordType::Unknown if !name.eq_ignore_ascii_case("unknown") => {
            Err(format!("unknown record type '{name}'"))
        }
        record_type => Ok(record_type),
    }
}

impl Cli {
    /// Iterator configuration from the global flags.
    pub fn archive_config(&self) -> ArchiveIteratorConfig {
        let mut config = ArchiveIteratorConfig {
            error_policy: self.policy.into(),
            strict: !self.lenient,
            ..Default::default()
        };
        if !self.types.is_empty() {
            config.record_types = self.types.iter().fold(0, |mask, t| mask | *t as u16);
        }
        if let Command::Extract { raw: true, .. } = self.command {
            config.parse_http = false;
        }
        config
    }
}
