//! HTTP vocabulary: request, response, and body types.

mod body;
mod request;
mod response;

pub use body::Body;
pub use request::Request;
pub use response::Response;

pub use bytes::Bytes;
pub use http::header::{HeaderName, HeaderValue};
pub use http::{header, HeaderMap, Method, StatusCode, Uri, Version};
