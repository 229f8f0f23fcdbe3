use txscope::prelude::*;

#[transactional]
fn create(name: String) -> Result<usize, TxError> {
    Ok(name.len())
}

fn main() {
    let _ = create("a".into());
}
