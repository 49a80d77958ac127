use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
/// Error returned when parsing a [`Charset`] name
///
/// [`Charset`]: super::Charset
pub enum CharsetError {
    #[snafu(display("unknown character set '{}'", name))]
    /// The name does not designate any supported character set
    UnknownCharset {
        /// The name that was given
        name: String,
    },
}
