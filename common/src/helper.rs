/// Formats an error and the whole chain of its sources.
///
/// Used to implement `Debug` on the error enums of the services, so that logging an error
/// with `?error` shows every underlying cause instead of only the outermost message.
pub fn error_chain_fmt(
    error: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", error)?;

    let mut current = error.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }

    Ok(())
}
