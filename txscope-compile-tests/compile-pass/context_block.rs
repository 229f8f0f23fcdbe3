use txscope::prelude::*;

fn transfer() -> Outcome<(), TxError> {
    TxContext::new()
        .error_policy(ErrorPolicy::Status)
        .nested(true)
        .run(|scope| {
            let _depth = scope.depth()?;
            Ok(())
        })
}

fn guarded() -> Result<(), TxError> {
    let scope = TxContext::new().enter()?;
    scope.exit(Ok::<_, TxError>(()))?;
    Ok(())
}

fn main() {
    let _ = transfer();
    let _ = guarded();
}
