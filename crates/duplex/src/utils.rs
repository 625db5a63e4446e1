/// Returns early with `$error` unless `$predicate` holds.
///
/// Like `assert!`, but for recoverable conditions on decode and encode paths.
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
