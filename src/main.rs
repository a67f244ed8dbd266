// Entry point for the ledger-node CLI. Every command runs once against the
// on-disk store and exits.

use clap::Parser;
use ledger_node::network::MemoryBroker;
use ledger_node::storage::SledStore;
use ledger_node::utils::{
    current_timestamp, encode_hex_prefixed, generate_key_pair, hash, key_pair_from_private_key,
    KeyPair,
};
use ledger_node::wallet::{sign_hash, verify};
use ledger_node::{Command, Config, Node, Opt, Transaction, TransactionRequest};
use log::{error, info, LevelFilter};
use std::process;
use std::sync::Arc;

fn main() {
    // Info by default, RUST_LOG overrides.
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    // Key and hash helpers need no node.
    match &opt.command {
        Command::Keygen { seed } => {
            print_key_pair(&generate_key_pair(seed)?);
            return Ok(());
        }
        Command::ImportKey { private_key } => {
            print_key_pair(&key_pair_from_private_key(private_key)?);
            return Ok(());
        }
        Command::Hash { data, algorithm } => {
            println!("{}", encode_hex_prefixed(&hash(data.as_bytes(), *algorithm)));
            return Ok(());
        }
        Command::Sign { hash, private_key } => {
            println!("{}", sign_hash(hash, private_key)?);
            return Ok(());
        }
        Command::Verify {
            signature,
            hash,
            public_key,
        } => {
            println!("{}", verify(signature, hash, public_key));
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load(opt.config.as_deref())?;
    let store = Arc::new(SledStore::open(&config.store_path())?);
    let node = Node::offline(&config, store.clone(), Arc::new(MemoryBroker::new()))?;
    let chain = node.chain();

    match opt.command {
        Command::Submit {
            private_key,
            to,
            value,
            data,
            mine,
        } => {
            let key_pair = key_pair_from_private_key(&private_key)?;
            let mut request = TransactionRequest {
                from: key_pair.address().to_string(),
                to,
                value,
                data,
                timestamp: current_timestamp()?,
                signature: String::new(),
                public_key: key_pair.public_key().to_string(),
            };
            let unsigned = Transaction {
                from: request.from.clone(),
                to: request.to.clone(),
                value: request.value,
                data: request.data.clone(),
                timestamp: request.timestamp,
                ..Transaction::default()
            };
            let tx_hash = chain.transaction_service().tx_hash(&unsigned);
            request.signature = sign_hash(&tx_hash, key_pair.private_key())?;

            let transaction = node.submit_transaction(&request)?;
            println!("{}", serde_json::to_string_pretty(&transaction)?);

            if let Some(miner) = mine {
                let block = node.mine("", &miner, -1)?;
                info!("Transaction {} mined in block {}", transaction.hash, block.number);
            }
        }
        Command::Mine {
            miner,
            data,
            position,
        } => {
            let position = if position == 0 { -1 } else { position };
            let block = node.mine(&data, &miner, position)?;
            println!("{}", serde_json::to_string_pretty(&block)?);
        }
        Command::Genesis { nonce, difficulty } => {
            let genesis = chain.new_genesis_block(nonce, difficulty)?;
            println!("{}", serde_json::to_string_pretty(&genesis)?);
        }
        Command::PrintChain => {
            println!("{}", serde_json::to_string_pretty(&chain.get_blocks())?);
        }
        Command::Block { number } => {
            println!("{}", serde_json::to_string_pretty(&chain.get_block(number)?)?);
        }
        Command::Tx { hash } => {
            println!("{}", serde_json::to_string_pretty(&chain.get_transaction(&hash)?)?);
        }
        Command::History { address } => {
            let history = node.wallet().get_transaction_history(&address);
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        Command::Validate => {
            let blocks = chain.get_blocks();
            let (valid, block_number) = chain.is_valid_chain(&blocks);
            if !valid {
                return Err(format!("Chain is invalid at block {block_number}").into());
            }
            chain.is_valid_transaction_data(&blocks)?;
            println!("Chain of {block_number} blocks is valid");
        }
        Command::Balance { address } => {
            let balance = node.wallet().calculate_balance(&address)?;
            println!("Balance of {address}: {balance}");
        }
        Command::Balances => {
            for (address, balance) in node.wallet().calculate_all_balances()? {
                println!("{address}: {balance}");
            }
        }
        Command::Reset => {
            chain.reset()?;
            println!("Done!");
        }
        Command::SetDifficulty { difficulty } => {
            chain.block_service().set_difficulty(difficulty)?;
            println!("Difficulty: {difficulty}");
        }
        Command::GetDifficulty => {
            println!("Difficulty: {}", chain.block_service().get_difficulty());
        }
        Command::Pool => {
            let transactions = chain.pool().get_transactions()?;
            println!("{}", serde_json::to_string_pretty(&transactions)?);
        }
        Command::PoolSource { source } => {
            if let Some(source) = source {
                chain.pool().configure(source)?;
            }
            println!("Pool source: {:?}", chain.pool().source_type());
        }
        Command::Keygen { .. }
        | Command::ImportKey { .. }
        | Command::Hash { .. }
        | Command::Sign { .. }
        | Command::Verify { .. } => {}
    }

    node.shutdown();
    store.flush()?;
    Ok(())
}

fn print_key_pair(key_pair: &KeyPair) {
    println!("Address:     {}", key_pair.address());
    println!("Public key:  {}", key_pair.public_key());
    println!("Private key: {}", key_pair.private_key());
}
