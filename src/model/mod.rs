//! Wire model: the serializable Request/Response envelopes used for all
//! client↔proxy traffic, plus stored-object metadata.

pub mod object_info;
pub mod request;
pub mod response;

pub use object_info::ObjectInfo;
pub use request::Request;
pub use response::{ClientDetails, Response};
