use crate::storage::PoolSource;
use crate::utils::HashAlgorithm;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-node", about = "Proof-of-work account ledger node")]
pub struct Opt {
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "keygen", about = "Generate a key pair")]
    Keygen {
        #[arg(long, default_value = "", help = "Seed phrase; random key when empty")]
        seed: String,
    },
    #[command(name = "import-key", about = "Derive the key pair of a private key")]
    ImportKey {
        #[arg(help = "32-byte hex private key, 0x optional")]
        private_key: String,
    },
    #[command(name = "hash", about = "Hash a string")]
    Hash {
        #[arg(help = "Data to hash")]
        data: String,
        #[arg(long, default_value = "Keccak256", help = "SHA256, SHA512 or Keccak256")]
        algorithm: HashAlgorithm,
    },
    #[command(name = "sign", about = "Sign a transaction hash")]
    Sign {
        #[arg(long, help = "Transaction hash (0x hex)")]
        hash: String,
        #[arg(long, help = "Signer's private key")]
        private_key: String,
    },
    #[command(name = "verify", about = "Verify a signature over a transaction hash")]
    Verify {
        #[arg(long)]
        signature: String,
        #[arg(long, help = "Transaction hash (0x hex)")]
        hash: String,
        #[arg(long, help = "Uncompressed public key without the 04 prefix")]
        public_key: String,
    },
    #[command(name = "submit", about = "Sign and submit a transfer")]
    Submit {
        #[arg(long, help = "Sender's private key")]
        private_key: String,
        #[arg(long, help = "Recipient address")]
        to: String,
        #[arg(long)]
        value: i64,
        #[arg(long)]
        data: String,
        #[arg(long, help = "Mine a block immediately, paying the reward to MINER")]
        mine: Option<String>,
    },
    #[command(name = "mine", about = "Mine the pooled transactions into a block")]
    Mine {
        #[arg(long, help = "Address receiving the reward")]
        miner: String,
        #[arg(long, default_value = "")]
        data: String,
        #[arg(
            long,
            default_value_t = -1,
            allow_negative_numbers = true,
            help = "Block number to fill; -1 or 0 for the next block"
        )]
        position: i64,
    },
    #[command(name = "genesis", about = "Replace block 1 with a new genesis block")]
    Genesis {
        #[arg(long, default_value_t = 0)]
        nonce: i64,
        #[arg(long)]
        difficulty: i64,
    },
    #[command(name = "print-chain", about = "Print all blocks")]
    PrintChain,
    #[command(name = "block", about = "Print one block")]
    Block {
        #[arg(help = "Block number")]
        number: i64,
    },
    #[command(name = "tx", about = "Print a mined transaction")]
    Tx {
        #[arg(help = "Transaction hash")]
        hash: String,
    },
    #[command(name = "history", about = "Transactions sent from an address")]
    History { address: String },
    #[command(name = "validate", about = "Check the stored chain")]
    Validate,
    #[command(name = "balance", about = "Balance of an address")]
    Balance { address: String },
    #[command(name = "balances", about = "Balances of every address")]
    Balances,
    #[command(name = "reset", about = "Reset the chain to genesis")]
    Reset,
    #[command(name = "set-difficulty", about = "Set the mining difficulty")]
    SetDifficulty { difficulty: i64 },
    #[command(name = "get-difficulty", about = "Show the mining difficulty")]
    GetDifficulty,
    #[command(name = "pool", about = "List pending transactions")]
    Pool,
    #[command(name = "pool-source", about = "Show or switch the pool backing")]
    PoolSource {
        #[arg(help = "Mempool or Store")]
        source: Option<PoolSource>,
    },
}
