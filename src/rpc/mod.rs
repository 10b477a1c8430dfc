mod client;
mod oracle;

pub use client::JsonRpcReceiptOracle;
pub use oracle::ReceiptOracle;
