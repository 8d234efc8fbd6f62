//! # media-catalog CLI
//!
//! Command-line consumer of the media catalog.
//!
//! ## Usage
//! ```bash
//! media-catalog scan ~/Pictures
//! media-catalog list --tag beach --tag 2024 --output json
//! media-catalog tag add 42 beach sunset
//! ```

mod cli;

use media_catalog::Result;

fn main() -> Result<()> {
    media_catalog::init_tracing();
    cli::run()
}
