//! CLI domain: parse, route, and presentation for the `infuse` binary, plus
//! the fixture resolver it loads from.

mod fixture;
mod parse;
mod presentation;
mod route;

pub use fixture::Fixture;
pub use parse::{Cli, Commands};
pub use presentation::{format_status_table, format_value};
pub use route::RunContext;
