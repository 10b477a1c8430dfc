use std::future::Future;
use std::sync::Arc;

use crate::error::OracleError;
use crate::types::Receipt;

/// Read-only source of transaction receipts.
///
/// `await_receipt` resolves once the transaction is mined and may therefore
/// stay pending for an unbounded time; callers impose their own deadline.
/// Failures are final for the attempt and are never retried here.
pub trait ReceiptOracle: Send + Sync + 'static {
    fn await_receipt(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<Receipt, OracleError>> + Send;
}

impl<O: ReceiptOracle> ReceiptOracle for Arc<O> {
    fn await_receipt(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<Receipt, OracleError>> + Send {
        (**self).await_receipt(hash)
    }
}
