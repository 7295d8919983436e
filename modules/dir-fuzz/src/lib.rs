//! Directory fuzzing against a single captured HTTP request.
//!
//! A [`BaseRequest`] captured from proxy traffic is re-sent once per wordlist entry with the
//! entry appended to the request's directory. Attempts run strictly one at a time on a
//! worker task owned by the [`ScanController`]; results, progress and status changes flow to
//! the consumer through an [`EventSink`].

pub mod classify;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod http;
pub mod request;
pub mod template;
pub mod wordlist;

pub use classify::{classify, Bucket, Classification};
pub use controller::{RunOutcome, ScanController, ScanOptions};
pub use dispatch::{Dispatch, DispatchOptions, TcpDispatcher};
pub use error::{ClassifyError, FuzzError};
pub use events::{channel, ChannelSink, EventSink, FuzzEvent, FuzzResult, ScanStatus};
pub use http::{parse_response, Http1Parser, ParseResponse, ResponseHead};
pub use request::BaseRequest;
pub use template::{directory_prefix, target_path, TemplatedRequest, Templater};
