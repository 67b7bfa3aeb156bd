pub mod client;
pub mod types;

use async_trait::async_trait;
use bitcoin::Txid;

pub use client::{NodeClient, RpcError};
pub use types::{DecodedTransaction, ScriptPubKey, TransactionRecord, TxOutput};

/// Anything that can hand back the node's view of a wallet transaction.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn get_transaction(&self, txid: &Txid) -> Result<TransactionRecord, RpcError>;
}
