use crate::core::{Block, CancelToken, ChainService};
use crate::error::{BlockchainError, Result};
use log::{error, info};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct MiningJob {
    data: String,
    miner: String,
    position: i64,
    cancel: CancelToken,
    reply: Sender<Result<Block>>,
}

/// Handle to a queued mining job.
pub struct MiningTicket {
    receiver: Receiver<Result<Block>>,
    cancel: CancelToken,
}

impl MiningTicket {
    /// Block until the job finishes or is cancelled.
    pub fn wait(self) -> Result<Block> {
        self.receiver
            .recv()
            .map_err(|_| BlockchainError::Mining("mining worker stopped".to_string()))?
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Runs proof-of-work on its own thread so callers never execute the search
/// themselves. Jobs are mined one at a time in submission order.
pub struct MiningWorker {
    sender: Option<Sender<MiningJob>>,
    handle: Option<JoinHandle<()>>,
}

impl MiningWorker {
    pub fn spawn(chain: Arc<ChainService>) -> Result<MiningWorker> {
        let (sender, receiver) = mpsc::channel::<MiningJob>();
        let handle = thread::Builder::new()
            .name("pow-miner".to_string())
            .spawn(move || {
                for job in receiver {
                    if job.cancel.is_cancelled() {
                        let _ = job.reply.send(Err(BlockchainError::Cancelled(
                            "mining job cancelled before start".to_string(),
                        )));
                        continue;
                    }
                    let result = chain.new_block(&job.data, &job.miner, job.position, &job.cancel);
                    if let Err(e) = &result {
                        info!("Mining job for {} ended without a block: {e}", job.miner);
                    }
                    // The caller may have dropped its ticket.
                    let _ = job.reply.send(result);
                }
                info!("Mining worker stopped");
            })?;

        Ok(MiningWorker {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub fn submit(&self, data: &str, miner: &str, position: i64) -> Result<MiningTicket> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| BlockchainError::Mining("mining worker stopped".to_string()))?;
        let (reply, receiver) = mpsc::channel();
        let cancel = CancelToken::new();
        sender
            .send(MiningJob {
                data: data.to_string(),
                miner: miner.to_string(),
                position,
                cancel: cancel.clone(),
                reply,
            })
            .map_err(|_| BlockchainError::Mining("mining worker stopped".to_string()))?;
        Ok(MiningTicket { receiver, cancel })
    }

    /// Convenience wrapper: submit and wait.
    pub fn mine(&self, data: &str, miner: &str, position: i64) -> Result<Block> {
        self.submit(data, miner, position)?.wait()
    }

    /// Finish queued jobs and join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Mining worker thread panicked");
            }
        }
    }
}

impl Drop for MiningWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
