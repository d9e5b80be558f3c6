//! CLI Module
//!
//! Exit codes and result mapping for the `makcu` binary

pub mod exit_codes;

pub use exit_codes::{exit_code_description, CliResult, ExitCodes};

/// Parse hex report bytes given on the command line.
///
/// Spaces and commas between bytes are ignored, so `"01 00 02"` and
/// `"01,00,02"` both work.
pub fn parse_report_bytes(input: &str) -> Result<Vec<u8>, CliResult> {
    hex::decode(input.replace([' ', ','], "")).map_err(|e| {
        CliResult::error(
            ExitCodes::INVALID_ARGS,
            format!("Invalid report bytes {input:?}: {e}"),
        )
    })
}
