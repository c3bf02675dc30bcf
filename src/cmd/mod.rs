//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `run`    | `Run`            |
//! | `status` | `Status`         |

pub mod run;
pub mod status;

pub use run::cmd_run;
pub use status::cmd_status;
