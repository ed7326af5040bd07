//! Seams to the external collaborators: the node connection, the wallet, the
//! program client that builds claim transactions, and the fee read query.

use crate::error::ClaimError;
use crate::types::{
    Address, Checkpoint, ClaimParams, Commitment, FeeSnapshot, SendOptions, Signature,
    SignatureStatus, UnsignedTransaction,
};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Connection context to one node endpoint.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn endpoint(&self) -> &str;

    async fn latest_checkpoint(&self, commitment: Commitment) -> Result<Checkpoint, ClaimError>;

    /// Poll until `signature` reaches `commitment`, fails on-chain, or the
    /// checkpoint expires.
    async fn confirm(
        &self,
        signature: &Signature,
        checkpoint: &Checkpoint,
        commitment: Commitment,
    ) -> Result<(), ClaimError>;

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, ClaimError>;
}

/// Opens a fresh connection context for an endpoint.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &Url) -> Result<Arc<dyn ChainClient>, ClaimError>;
}

/// Connected wallet. Signing may wait on the user indefinitely; callers that
/// need a bound must apply their own timeout.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn public_key(&self) -> Option<Address>;

    fn is_connected(&self) -> bool;

    fn can_sign(&self) -> bool;

    async fn sign_and_send(
        &self,
        tx: UnsignedTransaction,
        connection: &dyn ChainClient,
        options: &SendOptions,
    ) -> Result<Signature, ClaimError>;
}

/// Program client that builds the claim instruction.
#[async_trait]
pub trait ClaimTxBuilder: Send + Sync {
    async fn build_claim(&self, params: &ClaimParams) -> Result<UnsignedTransaction, ClaimError>;
}

/// Read query listing the fee state of every pool in a pool group.
/// Must be idempotent and side-effect free.
#[async_trait]
pub trait FeeSource: Send + Sync {
    async fn pool_fees(
        &self,
        connection: &dyn ChainClient,
        pool_group: &Address,
    ) -> Result<Vec<FeeSnapshot>, ClaimError>;
}

/// Identity usable for claiming, if the wallet is connected and can sign.
pub fn signing_identity(wallet: &dyn Wallet) -> Option<Address> {
    if !wallet.is_connected() || !wallet.can_sign() {
        return None;
    }
    wallet.public_key()
}
