use std::sync::Arc;

use txscope::prelude::*;

#[transactional(error_policy = "status", existing_txn_policy = "adopt_autobegin")]
fn tolerant() -> Result<(), TxError> {
    Ok(())
}

#[transactional(nested, manager = manager)]
fn savepointed(manager: &Arc<TxManager>, n: u32) -> Result<u32, TxError> {
    let _ = manager;
    Ok(n + 1)
}

#[transactional(nested = false, existing_txn_policy = "reset")]
fn resetting() -> Result<(), TxError> {
    Ok(())
}

fn main() {
    let _: Outcome<(), TxError> = tolerant();
    let _ = resetting();
    let _ = savepointed;
}
