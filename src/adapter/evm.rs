//! EVM chain adapter backed by an ethers JSON-RPC provider
//!
//! Implements the [`ChainAdapter`] capability set against any EVM-style
//! chain: receipt polling with a per-chain confirmation depth, manager
//! contract event decoding, and signed `mintToken`/`unlockToken` submissions.

use super::{ApprovalLog, ChainAdapter, ChainSide, ProgressNote, Receipt, TransferLog};
use crate::config::ChainSettings;
use crate::error::{BridgeError, BridgeResult};

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::{debug, info};

/// Event topic signatures (keccak256 of event signature)
pub mod topics {
    use ethers::types::H256;
    use ethers::utils::keccak256;
    use lazy_static::lazy_static;

    lazy_static! {
        pub static ref APPROVAL: H256 =
            H256::from(keccak256("Approval(address,address,uint256)"));
        pub static ref LOCKED: H256 = H256::from(keccak256("Locked(address,uint256,address)"));
        pub static ref BURNED: H256 = H256::from(keccak256("Burned(address,uint256,address)"));
    }
}

/// Chain adapter for EVM-compatible chains
pub struct EvmAdapter {
    settings: ChainSettings,
    side: ChainSide,
    provider: Provider<Http>,
    wallet: LocalWallet,
    manager_contract: Address,
}

impl EvmAdapter {
    /// Create a new adapter for one side of the bridge
    pub fn new(settings: ChainSettings, side: ChainSide, wallet: LocalWallet) -> BridgeResult<Self> {
        let provider = Provider::<Http>::try_from(settings.rpc_url.as_str())
            .map_err(|e| {
                BridgeError::Config(format!("Invalid RPC URL {:?}: {}", settings.rpc_url, e))
            })?
            .interval(Duration::from_millis(settings.poll_interval_ms));

        let manager_contract = settings.manager_address()?;
        let wallet = wallet.with_chain_id(settings.chain_id);

        info!(
            "EVM adapter initialized for {} chain {} (id {})",
            side, settings.name, settings.chain_id
        );

        Ok(Self {
            settings,
            side,
            provider,
            wallet,
            manager_contract,
        })
    }

    fn chain_error(&self, message: impl ToString) -> BridgeError {
        BridgeError::Chain {
            chain: self.settings.name.clone(),
            message: message.to_string(),
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.poll_interval_ms)
    }

    /// Sign and submit a call against the manager contract
    async fn submit_manager_call(&self, data: Vec<u8>) -> BridgeResult<H256> {
        let nonce = self
            .provider
            .get_transaction_count(self.wallet.address(), None)
            .await
            .map_err(|e| self.chain_error(e))?;

        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| self.chain_error(e))?;

        let tx = TransactionRequest::new()
            .to(self.manager_contract)
            .data(data)
            .nonce(nonce)
            .gas_price(gas_price)
            .chain_id(self.settings.chain_id);
        let mut tx = TypedTransaction::Legacy(tx);

        let gas_limit = self
            .provider
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| self.chain_error(e))?;
        // 20% headroom over the node estimate
        tx.set_gas(gas_limit + gas_limit / 5);

        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| BridgeError::Wallet(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);

        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| self.chain_error(e))?;
        let tx_hash = pending.tx_hash();

        info!(
            "Submitted manager call on {} chain {}: {:?}",
            self.side, self.settings.name, tx_hash
        );
        Ok(tx_hash)
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    async fn get_confirmed_receipt(&self, tx_hash: H256) -> BridgeResult<Option<Receipt>> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| self.chain_error(e))?;

            if let Some(receipt) = receipt {
                if receipt.status == Some(0.into()) {
                    debug!(
                        "Transaction {:?} reverted on chain {}",
                        tx_hash, self.settings.name
                    );
                    return Ok(None);
                }

                if let Some(block_number) = receipt.block_number {
                    let current = self
                        .provider
                        .get_block_number()
                        .await
                        .map_err(|e| self.chain_error(e))?;
                    let confirmations = current.as_u64().saturating_sub(block_number.as_u64());

                    if confirmations >= self.settings.confirmation_blocks {
                        info!(
                            "Transaction {:?} finalized on chain {} ({} confirmations)",
                            tx_hash, self.settings.name, confirmations
                        );
                        return Ok(Some(Receipt {
                            transaction_hash: tx_hash,
                            block_number: block_number.as_u64(),
                            logs: receipt.logs,
                        }));
                    }

                    debug!(
                        "Transaction {:?} has {} / {} confirmations on chain {}",
                        tx_hash, confirmations, self.settings.confirmation_blocks, self.settings.name
                    );
                }
            }

            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    fn decode_approval_log(&self, receipt: &Receipt) -> BridgeResult<ApprovalLog> {
        let log = receipt
            .logs
            .iter()
            .find(|log| log.topics.first() == Some(&*topics::APPROVAL))
            .ok_or_else(|| {
                BridgeError::LogDecoding(format!(
                    "No approval event in receipt {:?}",
                    receipt.transaction_hash
                ))
            })?;

        let spender = log
            .topics
            .get(2)
            .map(|t| Address::from_slice(&t.0[12..32]))
            .ok_or_else(|| {
                BridgeError::LogDecoding("Approval event missing spender topic".to_string())
            })?;

        if log.data.len() < 32 {
            return Err(BridgeError::LogDecoding(
                "Approval event data too short".to_string(),
            ));
        }
        let value = U256::from_big_endian(&log.data[0..32]);

        Ok(ApprovalLog { spender, value })
    }

    fn decode_transfer_log(&self, receipt: &Receipt) -> BridgeResult<TransferLog> {
        let log = receipt
            .logs
            .iter()
            .find(|log| {
                matches!(log.topics.first(), Some(t) if *t == *topics::LOCKED || *t == *topics::BURNED)
            })
            .ok_or_else(|| {
                BridgeError::LogDecoding(format!(
                    "No lock/burn event in receipt {:?}",
                    receipt.transaction_hash
                ))
            })?;

        // Non-indexed parameters: uint256 amount, address recipient
        if log.data.len() < 64 {
            return Err(BridgeError::LogDecoding(
                "Lock/burn event data too short".to_string(),
            ));
        }
        let amount = U256::from_big_endian(&log.data[0..32]);
        let recipient = Address::from_slice(&log.data[44..64]);

        Ok(TransferLog { recipient, amount })
    }

    async fn wait_for_block(
        &self,
        target_block: u64,
        progress: ProgressNote,
    ) -> BridgeResult<()> {
        loop {
            let current = self
                .provider
                .get_block_number()
                .await
                .map_err(|e| self.chain_error(e))?
                .as_u64();

            if current >= target_block {
                progress.set(format!("reached block {}", current));
                return Ok(());
            }

            progress.set(format!(
                "waiting for block {}, current block {}",
                target_block, current
            ));
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    async fn mint(
        &self,
        recipient: Address,
        amount: U256,
        source_tx_hash: H256,
    ) -> BridgeResult<H256> {
        let mut data = ethers::utils::id("mintToken(address,uint256,bytes32)").to_vec();
        data.extend(ethers::abi::encode(&[
            Token::Address(recipient),
            Token::Uint(amount),
            Token::FixedBytes(source_tx_hash.as_bytes().to_vec()),
        ]));

        self.submit_manager_call(data).await
    }

    async fn unlock(
        &self,
        recipient: Address,
        amount: U256,
        source_tx_hash: H256,
    ) -> BridgeResult<H256> {
        let mut data = ethers::utils::id("unlockToken(address,uint256,bytes32)").to_vec();
        data.extend(ethers::abi::encode(&[
            Token::Address(recipient),
            Token::Uint(amount),
            Token::FixedBytes(source_tx_hash.as_bytes().to_vec()),
        ]));

        self.submit_manager_call(data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Bytes, Log};

    fn test_adapter() -> EvmAdapter {
        let settings = ChainSettings {
            name: "testchain".to_string(),
            chain_id: 31337,
            rpc_url: "http://localhost:8545".to_string(),
            manager_contract: "0x2fabe97b0a967e009eaf22ae2ee47ecf71106862".to_string(),
            confirmation_blocks: 1,
            poll_interval_ms: 10,
        };
        let wallet = LocalWallet::new(&mut rand_key());
        EvmAdapter::new(settings, ChainSide::Source, wallet).unwrap()
    }

    fn rand_key() -> ethers::core::rand::rngs::ThreadRng {
        ethers::core::rand::thread_rng()
    }

    fn topic_for_address(address: Address) -> H256 {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(address.as_bytes());
        H256::from(bytes)
    }

    fn uint_bytes(value: U256) -> [u8; 32] {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        buf
    }

    fn receipt_with_logs(logs: Vec<Log>) -> Receipt {
        Receipt {
            transaction_hash: H256::repeat_byte(0xab),
            block_number: 100,
            logs,
        }
    }

    #[test]
    fn decodes_approval_event() {
        let spender: Address = "0x4c48a0bd031bcf35e2fcbdb22da4d4d198a07fee"
            .parse()
            .unwrap();
        let owner = Address::repeat_byte(0x11);
        let log = Log {
            topics: vec![*topics::APPROVAL, topic_for_address(owner), topic_for_address(spender)],
            data: Bytes::from(uint_bytes(U256::from(100)).to_vec()),
            ..Default::default()
        };

        let adapter = test_adapter();
        let approval = adapter
            .decode_approval_log(&receipt_with_logs(vec![log]))
            .unwrap();
        assert_eq!(approval.spender, spender);
        assert_eq!(approval.value, U256::from(100));
    }

    #[test]
    fn decodes_lock_event() {
        let sender = Address::repeat_byte(0x22);
        let recipient = Address::repeat_byte(0x33);
        let mut data = uint_bytes(U256::from(250)).to_vec();
        let mut recipient_word = [0u8; 32];
        recipient_word[12..].copy_from_slice(recipient.as_bytes());
        data.extend_from_slice(&recipient_word);

        let log = Log {
            topics: vec![*topics::LOCKED, topic_for_address(sender)],
            data: Bytes::from(data),
            ..Default::default()
        };

        let adapter = test_adapter();
        let transfer = adapter
            .decode_transfer_log(&receipt_with_logs(vec![log]))
            .unwrap();
        assert_eq!(transfer.recipient, recipient);
        assert_eq!(transfer.amount, U256::from(250));
    }

    #[test]
    fn missing_event_is_a_decoding_error() {
        let adapter = test_adapter();
        let err = adapter
            .decode_approval_log(&receipt_with_logs(vec![]))
            .unwrap_err();
        assert!(matches!(err, BridgeError::LogDecoding(_)));
    }
}
