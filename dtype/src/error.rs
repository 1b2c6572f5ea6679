use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Type code outside the fixed table.
    #[snafu(display("unsupported dtype code {code} (expected 0..=11)"))]
    UnsupportedCode { code: u32 },
}
