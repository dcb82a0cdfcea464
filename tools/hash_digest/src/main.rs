// Copyright (C) Microsoft Corporation. All rights reserved.

mod cli;

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use azihsm_hash_provider::*;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::*;

#[derive(Debug, thiserror::Error)]
enum ToolError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Provider(#[from] HashProviderError),
}

struct Input {
    name: String,
    data: Vec<u8>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn read_inputs(files: &[PathBuf]) -> Result<Vec<Input>, ToolError> {
    if files.is_empty() {
        let mut data = vec![];
        std::io::stdin()
            .read_to_end(&mut data)
            .map_err(|source| ToolError::Read {
                path: PathBuf::from("-"),
                source,
            })?;
        return Ok(vec![Input {
            name: "-".to_string(),
            data,
        }]);
    }

    files
        .iter()
        .map(|path| {
            let data = std::fs::read(path).map_err(|source| ToolError::Read {
                path: path.clone(),
                source,
            })?;
            Ok(Input {
                name: path.display().to_string(),
                data,
            })
        })
        .collect()
}

fn run(args: &CliArgs) -> Result<(), ToolError> {
    let mut options = ProviderOptions::hash(args.algorithm.into());
    if let Some(implementation) = &args.implementation {
        options = options.with_implementation(implementation.as_str());
    }
    if args.reusable {
        options = options.with_flags(OpenFlags::HASH_REUSABLE);
    }

    let inputs = read_inputs(&args.files)?;
    let provider = AlgorithmProvider::open(options)?;

    if args.concat {
        let digest = provider.hash_chunks(inputs.iter().map(|input| input.data.as_slice()))?;
        let names = inputs
            .iter()
            .map(|input| input.name.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}  {}", hex::encode(digest), names);
    } else {
        for input in &inputs {
            let digest = provider.hash(&input.data)?;
            println!("{}  {}", hex::encode(digest), input.name);
        }
    }

    provider.close()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli_args = CliArgs::parse();
    init_logging(cli_args.verbose);

    match run(&cli_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::debug!(?error, "hash_digest failed");
            eprintln!("hash_digest: {error}");
            ExitCode::FAILURE
        }
    }
}
