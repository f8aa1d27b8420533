//! Request dispatch and HTTP serving for Mochi.
//!
//! - [`Dispatcher`] matches a request against the route table, resolves the
//!   handler and the route middleware, and runs the chain.
//! - [`Kernel`] adds global middleware around the dispatcher and is the
//!   single entry point for a request.
//! - [`Server`] is the hyper-based HTTP/1.1 transport.
//!
//! # Fallbacks
//!
//! | Outcome | Response |
//! |---|---|
//! | no pattern matches | 404 |
//! | pattern matches under other methods only | 405 with `Allow` |
//! | handler or middleware not constructible | 500, logged with the resolution chain |
//! | handler returns an error | JSON error envelope with the error's status |
//! | handler returns no response | 200 with an empty body |

#![doc(html_root_url = "https://docs.rs/mochi-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod dispatcher;
mod error;
mod kernel;
mod server;
pub mod shutdown;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, ServerError};
pub use kernel::{Kernel, KernelBuilder};
pub use server::Server;
pub use shutdown::{ConnectionTracker, ShutdownSignal};
