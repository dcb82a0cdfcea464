// Copyright (C) Microsoft Corporation. All rights reserved.

use std::path::PathBuf;

use azihsm_hash_provider::HashAlgorithm;
use clap::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct CliArgs {
    /// Hash algorithm
    #[arg(long, short, default_value_t = Algorithm::Sha256, value_enum)]
    pub(crate) algorithm: Algorithm,

    /// Provider implementation name (platform default when omitted)
    #[arg(long)]
    pub(crate) implementation: Option<String>,

    /// Open the provider with the reusable-hash flag
    #[arg(long)]
    pub(crate) reusable: bool,

    /// Hash all inputs as a single message
    #[arg(long)]
    pub(crate) concat: bool,

    /// Log provider lifecycle events to stderr
    #[arg(long, short)]
    pub(crate) verbose: bool,

    /// Files to hash; stdin is read when none are given
    pub(crate) files: Vec<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum, Debug)]
pub(crate) enum Algorithm {
    /// SHA-1 (legacy, not for security-sensitive use)
    Sha1,

    /// SHA-256
    Sha256,

    /// SHA-384
    Sha384,

    /// SHA-512
    Sha512,
}

impl From<Algorithm> for HashAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha1 => HashAlgorithm::Sha1,
            Algorithm::Sha256 => HashAlgorithm::Sha256,
            Algorithm::Sha384 => HashAlgorithm::Sha384,
            Algorithm::Sha512 => HashAlgorithm::Sha512,
        }
    }
}
